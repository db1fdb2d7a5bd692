pub mod cli;
pub mod message;
pub mod protocol;

pub use cli::{Command, prompt};
pub use message::{Encoding, Message, MessageHeader, Value, error::MessageError};
pub use protocol::{MllpTransport, Processor, Server, TransportError};

//! Message transport over byte streams.
//!
//! Messages travel in MLLP envelopes. Each message is encoded, transcoded to one byte per
//! character and wrapped as
//!
//! ```text
//! <start block> <message bytes> <end block> <segment delimiter>
//! ```
//!
//! with `0x0B`, `0x1C` and `\r` as the defaults. The framing bytes and the delimiters come from
//! the same [`Encoding`](crate::message::Encoding), so one value configures both ends.
//!
//! # Key Components
//!
//! - [`read_frame`] / [`write_frame`]: the envelope codec over any reader or writer.
//! - [`MllpTransport`]: a buffered bidirectional stream speaking the envelope, with the blocking
//!   [`MllpTransport::exchange`] used by clients.
//! - [`Server`]: a TCP accept loop serving every connection on its own thread, driven by a
//!   [`Processor`] that decides what to answer.
//!
//! # See Also
//!
//! - [`message`](crate::message): the codec for the payload inside each envelope.
mod server;
mod thread;
mod transport;

use thread::Supervisor;

pub use server::{Processor, Server, ServerError, ShutdownHandle};
pub use transport::{MllpTransport, TransportError, read_frame, write_frame};

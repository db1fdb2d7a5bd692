use std::{
    error::Error,
    fs,
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream},
    path::PathBuf,
};

use clap::Parser;
use hl7_wire::{
    Command, Encoding, Message, MllpTransport, TransportError, cli::join_segments, prompt,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address
    address: SocketAddr,
    /// Send the message in this file instead of prompting for messages
    path: Option<PathBuf>,
    /// Separate segments with '\n' instead of '\r'
    #[arg(long)]
    newline: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let encoding = match cli.newline {
        true => Encoding::newline(),
        false => Encoding::default(),
    };
    let stream = TcpStream::connect(cli.address)?;
    let mut transport = MllpTransport::with_encoding(stream, encoding);

    if let Some(path) = cli.path {
        send(&mut transport, &join_segments(&fs::read_to_string(path)?))?;
        return Ok(());
    }

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    loop {
        match prompt(&mut stdin, &mut stdout)? {
            Command::Exit => break,
            Command::Message(text) => {
                if let Err(e) = send(&mut transport, &text) {
                    eprintln!("error: {e}");
                }
            }
        }
    }

    Ok(())
}

fn send<T: Read + Write>(
    transport: &mut MllpTransport<T>,
    text: &str,
) -> Result<(), TransportError> {
    let msg = Message::parse(text)?;

    match transport.exchange(&msg)? {
        Some(reply) => println!("{}", reply.encode().replace('\r', "\n")),
        None => eprintln!("connection closed without a reply"),
    }
    Ok(())
}

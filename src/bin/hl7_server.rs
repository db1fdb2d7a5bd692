use std::{error::Error, net::SocketAddr, time::Duration};

use chrono::Local;
use clap::Parser;
use hl7_wire::{
    Encoding, Message, Value,
    message::{HEADER, time},
    protocol::{Processor, Server},
};
use log::info;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen for new connections at address
    address: SocketAddr,
    /// Check for shutdown at least this often while idle, in milliseconds
    #[arg(long, default_value_t = 250)]
    accept_timeout_ms: u64,
    /// Separate segments with '\n' instead of '\r'
    #[arg(long)]
    newline: bool,
}

/// Answers every message with a positive acknowledgement.
struct Acknowledge;

impl Processor for Acknowledge {
    fn process(&self, mut msg: Message) -> Option<Message> {
        let request = msg.segment_of(HEADER);
        let control_id = request.field(10).value().to_string();
        let trigger = request.component(9, 2).value().to_string();
        info!("acknowledging message {control_id}");

        let mut header = request.clone();
        *header.field(3) = request.field(5).clone();
        *header.field(4) = request.field(6).clone();
        *header.field(5) = request.field(3).clone();
        *header.field(6) = request.field(4).clone();
        time::set_instant(header.field(7), Local::now());
        *header.field(9) = Default::default();
        header.component(9, 1).set_value("ACK");
        header.component(9, 2).set_value(&trigger);

        let mut ack = Message::new();
        *ack.segment(0) = header;
        let msa = ack.segment_of("MSA");
        msa.field(1).set_value("AA");
        msa.field(2).set_value(&control_id);

        Some(ack)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let encoding = match cli.newline {
        true => Encoding::newline(),
        false => Encoding::default(),
    };

    let server = Server::<Acknowledge>::bind(cli.address, Acknowledge)?
        .with_encoding(encoding)
        .with_accept_timeout(Duration::from_millis(cli.accept_timeout_ms));

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("received interrupt, shutting down");
        shutdown.shutdown();
    })?;

    server.run()?;
    Ok(())
}

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::message::{Encoding, Message};

use super::{MllpTransport, Supervisor, TransportError};

/// Upper bound on one sleep between non-blocking accept attempts.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(io::Error),
    #[error("failed to accept connection: {0}")]
    Accept(io::Error),
    #[error("failed to start connection thread: {0}")]
    Spawn(io::Error),
}

/// Application policy plugged into a [`Server`].
///
/// One processor is shared by every connection thread. Any state it keeps must do its own
/// synchronization.
pub trait Processor: Send + Sync + 'static {
    /// Called once per accepted connection; returning `false` closes it unread.
    fn allow_connection(&self, _stream: &TcpStream) -> bool {
        true
    }

    /// Produce the reply for one message, if any.
    fn process(&self, msg: Message) -> Option<Message>;

    /// Called with whatever ended a connection abnormally. The connection is already closed.
    fn handle_error(&self, error: TransportError) {
        warn!("connection error: {error}");
    }

    /// Polled before every accept.
    fn should_shutdown(&self) -> bool {
        false
    }
}

/// Asks a running [`Server`] to stop accepting connections.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// MLLP server running one thread per connection.
pub struct Server<P: Processor> {
    listener: TcpListener,
    processor: Arc<P>,
    encoding: Encoding,
    accept_timeout: Option<Duration>,
    shutdown: ShutdownHandle,
}

impl<P: Processor> Server<P> {
    pub fn new(listener: TcpListener, processor: impl Into<Arc<P>>) -> Self {
        Self {
            listener,
            processor: processor.into(),
            encoding: Encoding::default(),
            accept_timeout: None,
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn bind<A: ToSocketAddrs>(
        address: A,
        processor: impl Into<Arc<P>>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address).map_err(ServerError::Bind)?;
        Ok(Self::new(listener, processor))
    }

    /// Listen on `port` on every interface.
    pub fn with_port(port: u16, processor: impl Into<Arc<P>>) -> Result<Self, ServerError> {
        Self::bind(("0.0.0.0", port), processor)
    }

    /// Frame connections with the delimiters and framing bytes of `encoding`.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Wait at most `timeout` for a connection before checking for shutdown again.
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = Some(timeout);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown is requested.
    ///
    /// Each connection is served on its own thread. The listener is closed when this returns,
    /// on success or failure. Connections still in progress are not waited on; they keep being
    /// served until their peer disconnects.
    pub fn run(self) -> Result<(), ServerError> {
        let mut supervisor = Supervisor::new();
        let Server {
            listener,
            processor,
            encoding,
            accept_timeout,
            shutdown,
        } = self;

        let address = listener.local_addr().map_err(ServerError::Accept)?;
        info!("listening at {address}");

        if accept_timeout.is_some() {
            listener.set_nonblocking(true).map_err(ServerError::Accept)?;
        }

        while !shutdown.is_shutdown() && !processor.should_shutdown() {
            supervisor.reap();

            let Some(stream) = accept(&listener, accept_timeout)? else {
                continue;
            };

            let processor = Arc::clone(&processor);
            let encoding = encoding.clone();
            supervisor
                .spawn(move || {
                    if let Err(e) = handle_connection(stream, &*processor, encoding) {
                        processor.handle_error(e);
                    }
                })
                .map_err(ServerError::Spawn)?;
        }

        info!(
            "shutting down listener at {address}; {} connection(s) left to drain",
            supervisor.active()
        );
        Ok(())
    }
}

fn accept(
    listener: &TcpListener,
    timeout: Option<Duration>,
) -> Result<Option<TcpStream>, ServerError> {
    match listener.accept() {
        Ok((stream, peer)) => {
            debug!("accepted connection from {peer}");
            Ok(Some(stream))
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            thread::sleep(timeout.map_or(ACCEPT_POLL_INTERVAL, |t| t.min(ACCEPT_POLL_INTERVAL)));
            Ok(None)
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(ServerError::Accept(e)),
    }
}

fn handle_connection<P: Processor>(
    stream: TcpStream,
    processor: &P,
    encoding: Encoding,
) -> Result<(), TransportError> {
    // some platforms hand out sockets that inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;

    if !processor.allow_connection(&stream) {
        info!("refused connection from {peer}");
        return Ok(());
    }

    let mut transport = MllpTransport::with_encoding(stream, encoding);
    while let Some(msg) = transport.read_message()? {
        debug!("received message from {peer}");

        if let Some(reply) = processor.process(msg) {
            transport.write_message(&reply)?;
            transport.flush()?;
        }
    }

    debug!("connection from {peer} closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Mutex, thread::JoinHandle, time::Instant};

    use crate::message::Value;

    use super::*;

    #[derive(Default)]
    struct Acknowledger {
        refuse: bool,
        stop: AtomicBool,
        errors: Mutex<Vec<String>>,
    }

    impl Processor for Acknowledger {
        fn allow_connection(&self, _stream: &TcpStream) -> bool {
            !self.refuse
        }

        fn process(&self, mut msg: Message) -> Option<Message> {
            let control_id = msg.segment_of("MSH").field(10).value().to_string();
            match control_id.as_str() {
                "SILENT" => return None,
                "PANIC" => panic!("processor failed on {control_id}"),
                _ => {}
            }

            let mut ack = Message::new();
            let msa = ack.segment_of("MSA");
            msa.field(1).set_value("AA");
            msa.field(2).set_value(&control_id);
            Some(ack)
        }

        fn handle_error(&self, error: TransportError) {
            self.errors.lock().unwrap().push(error.to_string());
        }

        fn should_shutdown(&self) -> bool {
            self.stop.load(Ordering::SeqCst)
        }
    }

    fn start(
        processor: Arc<Acknowledger>,
    ) -> (SocketAddr, ShutdownHandle, JoinHandle<Result<(), ServerError>>) {
        let server = Server::<Acknowledger>::bind("127.0.0.1:0", processor)
            .unwrap()
            .with_accept_timeout(Duration::from_millis(20));
        let address = server.local_addr().unwrap();
        let handle = server.shutdown_handle();

        (address, handle, thread::spawn(move || server.run()))
    }

    fn request(control_id: &str) -> Message {
        let mut msg = Message::new();
        let msh = msg.segment_of("MSH");
        msh.component(9, 1).set_value("ADT");
        msh.component(9, 2).set_value("A01");
        msh.field(10).set_value(control_id);
        msg
    }

    fn acknowledged(reply: Option<Message>) -> String {
        let mut reply = reply.expect("server sent no reply");
        reply.segment_of("MSA").field(2).value().to_string()
    }

    #[test]
    fn concurrent_connections_get_their_own_replies() {
        let (address, handle, server) = start(Arc::default());

        let mut a = MllpTransport::new(TcpStream::connect(address).unwrap());
        let mut b = MllpTransport::new(TcpStream::connect(address).unwrap());

        assert_eq!(acknowledged(a.exchange(&request("A1")).unwrap()), "A1");
        assert_eq!(acknowledged(b.exchange(&request("B1")).unwrap()), "B1");
        assert_eq!(acknowledged(a.exchange(&request("A2")).unwrap()), "A2");

        let c = thread::spawn(move || acknowledged(b.exchange(&request("B2")).unwrap()));
        assert_eq!(acknowledged(a.exchange(&request("A3")).unwrap()), "A3");
        assert_eq!(c.join().unwrap(), "B2");

        drop(a);
        handle.shutdown();
        server.join().unwrap().unwrap();

        assert!(TcpStream::connect(address).is_err());
    }

    #[test]
    fn processor_can_stop_the_server() {
        let processor = Arc::new(Acknowledger::default());
        let (address, _handle, server) = start(Arc::clone(&processor));

        let mut a = MllpTransport::new(TcpStream::connect(address).unwrap());
        assert_eq!(acknowledged(a.exchange(&request("A1")).unwrap()), "A1");
        drop(a);

        processor.stop.store(true, Ordering::SeqCst);
        server.join().unwrap().unwrap();
        assert!(TcpStream::connect(address).is_err());
    }

    #[test]
    fn shutdown_leaves_idle_connections_to_drain() {
        let (address, handle, server) = start(Arc::default());

        let mut idle = MllpTransport::new(TcpStream::connect(address).unwrap());
        assert_eq!(acknowledged(idle.exchange(&request("A1")).unwrap()), "A1");

        handle.shutdown();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !server.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(server.is_finished());
        server.join().unwrap().unwrap();
        assert!(TcpStream::connect(address).is_err());

        // the open connection is still served after the listener is gone
        assert_eq!(acknowledged(idle.exchange(&request("A2")).unwrap()), "A2");
    }

    #[test]
    fn processor_panic_closes_only_its_connection() {
        let (address, handle, server) = start(Arc::default());

        let mut failing = MllpTransport::new(TcpStream::connect(address).unwrap());
        match failing.exchange(&request("PANIC")) {
            Ok(None) | Err(TransportError::Io(_)) => {}
            other => panic!("expected the connection to close, got {other:?}"),
        }

        let mut next = MllpTransport::new(TcpStream::connect(address).unwrap());
        assert_eq!(acknowledged(next.exchange(&request("A1")).unwrap()), "A1");

        drop(next);
        handle.shutdown();
        server.join().unwrap().unwrap();
    }

    #[test]
    fn no_reply_keeps_connection_open() {
        let (address, handle, server) = start(Arc::default());
        let mut a = MllpTransport::new(TcpStream::connect(address).unwrap());

        a.write_message(&request("SILENT")).unwrap();
        assert_eq!(acknowledged(a.exchange(&request("A1")).unwrap()), "A1");

        drop(a);
        handle.shutdown();
        server.join().unwrap().unwrap();
    }

    #[test]
    fn refused_connection_is_closed() {
        let processor = Arc::new(Acknowledger {
            refuse: true,
            ..Default::default()
        });
        let (address, handle, server) = start(processor);

        let mut a = MllpTransport::new(TcpStream::connect(address).unwrap());
        assert!(a.read_message().unwrap().is_none());

        handle.shutdown();
        server.join().unwrap().unwrap();
    }

    #[test]
    fn framing_errors_reach_the_handler() {
        let processor = Arc::new(Acknowledger::default());
        let (address, handle, server) = start(Arc::clone(&processor));

        let mut stream = TcpStream::connect(address).unwrap();
        stream.write_all(b"\x0bMSH|^~\\&|A\x1cX").unwrap();

        let mut transport = MllpTransport::new(stream);
        assert!(transport.read_message().unwrap().is_none());

        let deadline = Instant::now() + Duration::from_secs(5);
        while processor.errors.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let errors = processor.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("[framing error][11 bytes read]"));

        handle.shutdown();
        server.join().unwrap().unwrap();
    }
}

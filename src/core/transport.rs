//! Byte-stream transport
//!
//! The session talks to the remote peer through a `Connector` that opens a
//! `Transport` for a URI. Transport activity comes back to the session as
//! `TransportEvent`s, which the host delivers on its own thread.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Scheme for plain connections
pub const SCHEME: &str = "telnet";
/// Scheme for encrypted connections
pub const SECURE_SCHEME: &str = "telnets";

/// Upper bound on how long opening a TCP transport may block the caller
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to send: {0}")]
    Send(#[source] io::Error),

    #[error("Unsupported scheme: {0}")]
    Unsupported(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Transport is closed")]
    Closed,
}

/// Events raised by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Open,
    /// Bytes arrived from the peer
    Message(Vec<u8>),
    /// Peer closed the connection
    Close,
    /// Connection failed
    Error(String),
}

/// Identifies one opened transport among all a connector has opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A transport event tagged with the connection that raised it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub id: ConnectionId,
    pub event: TransportEvent,
}

impl ConnectionEvent {
    pub fn new(id: ConnectionId, event: TransportEvent) -> Self {
        Self { id, event }
    }
}

/// An open byte-stream connection
pub trait Transport {
    /// Connection this transport's events are tagged with
    fn id(&self) -> ConnectionId;

    /// Send bytes to the peer as one write
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Close the connection. Further events are not delivered.
    fn close(&mut self);
}

/// Opens transports
pub trait Connector {
    type Transport: Transport;

    fn open(&mut self, uri: &ConnectUri) -> Result<Self::Transport, TransportError>;
}

/// Connection target: `telnet://host:port` or `telnets://host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectUri {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl ConnectUri {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            SECURE_SCHEME
        } else {
            SCHEME
        }
    }

    /// Parse a URI produced by `Display`
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let invalid = || TransportError::InvalidUri(uri.to_string());

        let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
        let secure = match scheme {
            SCHEME => false,
            SECURE_SCHEME => true,
            other => return Err(TransportError::Unsupported(other.to_string())),
        };

        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if host.is_empty() || port == 0 {
            return Err(invalid());
        }

        Ok(Self::new(host, port, secure))
    }
}

impl fmt::Display for ConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme(), self.host, self.port)
    }
}

/// Raw TCP connector.
///
/// Each opened transport runs a reader thread that forwards its events,
/// tagged with a fresh `ConnectionId`, to the channel given here.
pub struct TcpConnector {
    events: Sender<ConnectionEvent>,
    next_id: u64,
}

impl TcpConnector {
    pub fn new(events: Sender<ConnectionEvent>) -> Self {
        Self { events, next_id: 1 }
    }

    fn connect_stream(uri: &ConnectUri) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (uri.host.as_str(), uri.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        }))
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    /// Opening blocks for at most `CONNECT_TIMEOUT` per resolved address;
    /// everything after that is delivered through the event channel.
    fn open(&mut self, uri: &ConnectUri) -> Result<TcpTransport, TransportError> {
        if uri.secure {
            return Err(TransportError::Unsupported(uri.scheme().to_string()));
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        info!("connecting to {} ({})", uri, id);
        let connect_err = |source| TransportError::Connect {
            uri: uri.to_string(),
            source,
        };
        let stream = Self::connect_stream(uri).map_err(connect_err)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        let reader = stream.try_clone().map_err(connect_err)?;

        let running = Arc::new(AtomicBool::new(true));
        if self
            .events
            .send(ConnectionEvent::new(id, TransportEvent::Open))
            .is_err()
        {
            debug!("event receiver gone, open event for {} dropped", id);
        }
        spawn_reader(id, reader, self.events.clone(), running.clone());

        Ok(TcpTransport {
            id,
            stream: Some(stream),
            running,
        })
    }
}

fn spawn_reader(
    id: ConnectionId,
    mut stream: TcpStream,
    events: Sender<ConnectionEvent>,
    running: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        let mut buffer = vec![0u8; 4096];

        loop {
            let result = stream.read(&mut buffer);

            let event = match result {
                Ok(0) => TransportEvent::Close,
                Ok(n) => TransportEvent::Message(buffer[..n].to_vec()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => TransportEvent::Error(e.to_string()),
            };
            let done = !matches!(event, TransportEvent::Message(_));

            // Closed locally: stay silent
            if !running.load(Ordering::SeqCst) {
                break;
            }

            if events.send(ConnectionEvent::new(id, event)).is_err() || done {
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
        debug!("reader thread for {} finished", id);
    });
}

/// TCP stream plus the flag that silences its reader thread
pub struct TcpTransport {
    id: ConnectionId,
    stream: Option<TcpStream>,
    running: Arc<AtomicBool>,
}

impl Transport for TcpTransport {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        debug!("Sending {:?}", bytes);
        stream.write_all(bytes).map_err(TransportError::Send)?;
        stream.flush().map_err(TransportError::Send)
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                warn!("shutdown failed: {}", e);
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_uri_display() {
        assert_eq!(
            ConnectUri::new("example.org", 23, false).to_string(),
            "telnet://example.org:23"
        );
        assert_eq!(
            ConnectUri::new("example.org", 992, true).to_string(),
            "telnets://example.org:992"
        );
    }

    #[test]
    fn test_uri_parse() {
        let uri = ConnectUri::parse("telnets://10.0.0.1:2323").unwrap();
        assert_eq!(uri, ConnectUri::new("10.0.0.1", 2323, true));

        assert!(matches!(
            ConnectUri::parse("ws://host:80"),
            Err(TransportError::Unsupported(_))
        ));
        assert!(ConnectUri::parse("telnet://host").is_err());
        assert!(ConnectUri::parse("telnet://:23").is_err());
        assert!(ConnectUri::parse("telnet://host:0").is_err());
    }

    #[test]
    fn test_tcp_refuses_secure() {
        let (tx, _rx) = mpsc::channel();
        let mut connector = TcpConnector::new(tx);
        let result = connector.open(&ConnectUri::new("localhost", 992, true));
        assert!(matches!(result, Err(TransportError::Unsupported(_))));
    }

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            peer.write_all(&[255, 253, 24]).unwrap();
            let mut reply = [0u8; 3];
            peer.read_exact(&mut reply).unwrap();
            reply
        });

        let (tx, rx) = mpsc::channel();
        let mut connector = TcpConnector::new(tx);
        let mut transport = connector
            .open(&ConnectUri::new("127.0.0.1", port, false))
            .unwrap();

        let id = transport.id();
        let timeout = Duration::from_secs(5);
        assert_eq!(
            rx.recv_timeout(timeout).unwrap(),
            ConnectionEvent::new(id, TransportEvent::Open)
        );
        assert_eq!(
            rx.recv_timeout(timeout).unwrap(),
            ConnectionEvent::new(id, TransportEvent::Message(vec![255, 253, 24]))
        );

        transport.send(&[255, 251, 24]).unwrap();
        assert_eq!(server.join().unwrap(), [255, 251, 24]);

        transport.close();
        assert!(matches!(transport.send(b"x"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_each_open_gets_its_own_id() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (first, _) = listener.accept().unwrap();
            let (second, _) = listener.accept().unwrap();
            (first, second)
        });

        let (tx, rx) = mpsc::channel();
        let mut connector = TcpConnector::new(tx);
        let uri = ConnectUri::new("127.0.0.1", port, false);
        let mut first = connector.open(&uri).unwrap();
        let second = connector.open(&uri).unwrap();
        assert_ne!(first.id(), second.id());

        // Closing the first silences it; the peer hanging up must not
        // surface as an event for it
        first.close();
        let (peer_a, peer_b) = server.join().unwrap();
        drop(peer_a);

        let timeout = Duration::from_millis(200);
        let ids: Vec<ConnectionId> = std::iter::from_fn(|| rx.recv_timeout(timeout).ok())
            .filter(|e| e.event != TransportEvent::Open)
            .map(|e| e.id)
            .collect();
        assert!(!ids.contains(&first.id()));
        drop(peer_b);
    }
}

//! wstelnet - a telnet terminal session engine
//!
//! Bytes from the remote peer are split into terminal data and telnet
//! commands; the data is rendered and the commands are answered. Key
//! presses are encoded into the byte sequences a VT100 peer expects.
//!
//! Only the echo and terminal-type options are negotiated; every other
//! option the peer proposes is refused.

pub mod config;
pub mod core;
pub mod ui;

pub use crate::config::Config;
pub use crate::core::session::{KeyDisposition, Session, SessionError};
pub use crate::core::telnet::{Decoded, Decoder, OutboundQueue};
pub use crate::core::transport::{
    ConnectUri, ConnectionEvent, ConnectionId, Connector, TcpConnector, TcpTransport, Transport,
    TransportError, TransportEvent,
};
pub use crate::ui::{
    latin1_bytes, ConsoleRenderer, Key, KeyMapper, KeyPress, Modifiers, Renderer,
};

//! Core telnet session components.
//!
//! - **telnet**: Command decoder and outbound queue
//! - **transport**: Byte-stream transport abstraction and TCP connector
//! - **session**: Session controller tying transport, decoder and renderer together
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Transport (bytes to and from the peer)
//! ├── Decoder (telnet commands vs. terminal data)
//! ├── OutboundQueue (replies and keystrokes awaiting flush)
//! └── Renderer (decoded text, cursor, input capture)
//! ```

pub mod session;
pub mod telnet;
pub mod transport;

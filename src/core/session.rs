//! Session management
//!
//! Owns the outbound queue and wires transport events, the telnet decoder,
//! the key mapper and the renderer together. Everything runs on the thread
//! that delivers events; nothing here blocks waiting for the peer.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::telnet::{Decoder, OutboundQueue};
use super::transport::{
    ConnectUri, ConnectionEvent, ConnectionId, Connector, Transport, TransportError, TransportEvent,
};
use crate::ui::{Key, KeyMapper, KeyPress, Renderer};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("must set host and port")]
    MissingEndpoint,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What happened to a key event handed to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Handled by the session; the platform default action is suppressed
    Consumed,
    /// Input capture is not attached; the event belongs to someone else
    Ignored,
}

type Notify = Box<dyn FnMut()>;

/// A telnet terminal session
pub struct Session<C: Connector, R: Renderer> {
    connector: C,
    renderer: R,
    transport: Option<C::Transport>,
    queue: OutboundQueue,
    decoder: Decoder,
    /// Key handler attached to the renderer
    capture: bool,
    on_connect: Option<Notify>,
    on_disconnect: Option<Notify>,
}

impl<C: Connector, R: Renderer> Session<C, R> {
    /// Create a session reporting `terminal_type` during negotiation
    pub fn new(connector: C, renderer: R, terminal_type: &str) -> Self {
        Self {
            connector,
            renderer,
            transport: None,
            queue: OutboundQueue::new(),
            decoder: Decoder::new(terminal_type),
            capture: false,
            on_connect: None,
            on_disconnect: None,
        }
    }

    /// Called once the transport reports it is open
    pub fn on_connect(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_connect = Some(Box::new(callback));
        self
    }

    /// Called when a live transport is torn down
    pub fn on_disconnect(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_disconnect = Some(Box::new(callback));
        self
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Id of the live transport, if any
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.transport.as_ref().map(|transport| transport.id())
    }

    pub fn is_capturing(&self) -> bool {
        self.capture
    }

    /// Whether the peer echoes our input
    pub fn remote_echo(&self) -> bool {
        self.decoder.remote_echo()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Open a new transport to `host:port`, replacing any current one.
    ///
    /// A missing host or port is logged and leaves the session untouched.
    /// A transport that fails to open is treated like a transport error.
    pub fn connect(&mut self, host: &str, port: u16, secure: bool) -> Result<(), SessionError> {
        debug!(">> connect");
        if host.is_empty() || port == 0 {
            warn!("must set host and port");
            return Err(SessionError::MissingEndpoint);
        }

        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.queue.clear();
        self.decoder.reset();
        self.renderer.set_local_echo(true);

        let uri = ConnectUri::new(host, port, secure);
        info!("connecting to {}", uri);

        let result = match self.connector.open(&uri) {
            Ok(transport) => {
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to open {}: {}", uri, e);
                self.disconnect();
                Err(SessionError::Transport(e))
            }
        };
        debug!("<< connect");
        result
    }

    /// Close the transport and return the renderer to its idle state.
    ///
    /// Safe to call repeatedly; only the teardown of a live transport
    /// fires the disconnect notification.
    pub fn disconnect(&mut self) {
        debug!(">> disconnect");
        let was_live = match self.transport.take() {
            Some(mut transport) => {
                transport.close();
                true
            }
            None => false,
        };
        self.queue.clear();

        self.renderer.set_cursor(true);
        self.capture = false;
        self.renderer.set_input_capture(false);

        if was_live {
            info!("disconnected");
            if let Some(callback) = self.on_disconnect.as_mut() {
                callback();
            }
        }
        debug!("<< disconnect");
    }

    /// Dispatch a transport event.
    ///
    /// Events from any connection other than the live one are dropped,
    /// including those a replaced transport queued before it was closed.
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        let ConnectionEvent { id, event } = event;
        match self.connection_id() {
            Some(live) if live == id => {}
            Some(live) => {
                debug!("Dropping event {:?} from {} (live: {})", event, id, live);
                return;
            }
            None => {
                debug!("No transport, dropping event {:?} from {}", event, id);
                return;
            }
        }

        match event {
            TransportEvent::Open => {
                info!("transport open");
                self.renderer.set_cursor(true);
                self.capture = true;
                self.renderer.set_input_capture(true);
                if let Some(callback) = self.on_connect.as_mut() {
                    callback();
                }
            }
            TransportEvent::Message(bytes) => self.receive(&bytes),
            TransportEvent::Close => {
                info!("transport closed");
                self.disconnect();
            }
            TransportEvent::Error(e) => {
                info!("transport error: {}", e);
                self.disconnect();
            }
        }
    }

    /// Decode bytes from the peer: replies go out first, then text is rendered
    pub fn receive(&mut self, bytes: &[u8]) {
        let decoded = self.decoder.decode(bytes, &mut self.queue);
        if decoded.remote_echo {
            self.renderer.set_local_echo(false);
        }

        self.flush();
        if !self.is_connected() {
            debug!("Transport lost while replying, {} chars not rendered", decoded.text.len());
            return;
        }

        if !decoded.text.is_empty() {
            self.renderer.write(&decoded.text);
        }
    }

    /// Encode a key press and send it right away
    pub fn key_press(&mut self, press: &KeyPress) -> KeyDisposition {
        if !self.capture {
            return KeyDisposition::Ignored;
        }

        let bytes = KeyMapper::map_key(press);
        if !bytes.is_empty() {
            debug!(">> send_chr: {:?}", bytes);
            if !self.decoder.remote_echo() {
                let text: String = bytes.iter().map(|&b| char::from(b)).collect();
                self.renderer.write(&text);
            }
            self.queue.extend(&bytes);
            self.flush();
        }
        KeyDisposition::Consumed
    }

    /// Key releases never send anything
    pub fn key_release(&mut self, _key: Key) -> KeyDisposition {
        if self.capture {
            KeyDisposition::Consumed
        } else {
            KeyDisposition::Ignored
        }
    }

    /// Send everything queued as one write
    pub fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let bytes = self.queue.take();

        let Some(transport) = self.transport.as_mut() else {
            debug!("No transport, dropping {} queued bytes", bytes.len());
            return;
        };

        debug!("Sending {:?}", bytes);
        if let Err(e) = transport.send(&bytes) {
            warn!("{}", e);
            self.disconnect();
        }
    }
}

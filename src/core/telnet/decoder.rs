//! Telnet command decoder
//!
//! Classifies incoming bytes as terminal data or telnet commands and queues
//! the replies the peer expects. Parser state persists between calls, so a
//! command split across two transport deliveries decodes the same as one
//! delivered whole.

use tracing::{debug, info};

use super::queue::OutboundQueue;
use super::{
    command_name, DEFAULT_TERMINAL_TYPE, DM, DO, DONT, IAC, OPT_ECHO, OPT_TERMINAL_TYPE, SB, SE,
    TTYPE_IS, TTYPE_SEND, WILL, WONT,
};

/// Payload expected after `IAC SB TERMINAL-TYPE`
const TTYPE_REQUEST: [u8; 3] = [TTYPE_SEND, IAC, SE];

/// Bytes following a Data Mark that are skipped along with it
const DATA_MARK_TRAILER: u8 = 2;

/// Result of one decode pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Plain data bytes, one char per byte (Latin-1), in arrival order
    pub text: String,
    /// The peer offered to echo and we accepted during this pass
    pub remote_echo: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DecoderState {
    #[default]
    Data,
    /// Saw IAC, next byte is the command code
    Iac,
    /// Saw IAC and a code, next byte is the option value
    Command(u8),
    /// Inside `IAC SB 24`, matched this many bytes of `SEND IAC SE`
    TerminalTypeRequest(usize),
    /// Discarding the bytes that trail a Data Mark
    DataMark(u8),
}

/// Persistent telnet decoder state machine
#[derive(Debug, Clone)]
pub struct Decoder {
    state: DecoderState,
    /// Peer echoes our input; the only negotiated option we track
    remote_echo: bool,
    terminal_type: String,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINAL_TYPE)
    }
}

impl Decoder {
    /// Create a decoder that reports `terminal_type` when asked
    pub fn new(terminal_type: impl Into<String>) -> Self {
        Self {
            state: DecoderState::Data,
            remote_echo: false,
            terminal_type: terminal_type.into(),
        }
    }

    pub fn terminal_type(&self) -> &str {
        &self.terminal_type
    }

    /// Whether the peer currently echoes our input
    pub fn remote_echo(&self) -> bool {
        self.remote_echo
    }

    /// True when no partial command is pending
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Data
    }

    /// Return to initial negotiation state, dropping any partial command
    pub fn reset(&mut self) {
        self.state = DecoderState::Data;
        self.remote_echo = false;
    }

    /// Decode `input`, appending replies to `queue`.
    ///
    /// Every byte is consumed; an incomplete trailing command is kept as
    /// parser state for the next call.
    pub fn decode(&mut self, input: &[u8], queue: &mut OutboundQueue) -> Decoded {
        debug!("Received {} bytes: {:?}", input.len(), input);
        let mut out = Decoded::default();
        for &byte in input {
            self.step(byte, &mut out, queue);
        }
        out
    }

    fn step(&mut self, byte: u8, out: &mut Decoded, queue: &mut OutboundQueue) {
        match self.state {
            DecoderState::Data => match byte {
                IAC => self.state = DecoderState::Iac,
                DM => {
                    info!("Ignoring Data Mark (Synch)");
                    self.state = DecoderState::DataMark(DATA_MARK_TRAILER);
                }
                _ => out.text.push(char::from(byte)),
            },
            DecoderState::Iac => self.state = DecoderState::Command(byte),
            DecoderState::Command(code) => {
                self.state = DecoderState::Data;
                self.command(code, byte, out, queue);
            }
            DecoderState::TerminalTypeRequest(matched) => {
                self.terminal_type_request(matched, byte, out, queue);
            }
            DecoderState::DataMark(remaining) => {
                self.state = if remaining > 1 {
                    DecoderState::DataMark(remaining - 1)
                } else {
                    DecoderState::Data
                };
            }
        }
    }

    fn command(&mut self, code: u8, value: u8, out: &mut Decoded, queue: &mut OutboundQueue) {
        match code {
            DONT => debug!("Got Cmd DONT '{}', ignoring", value),
            DO => {
                debug!("Got Cmd DO '{}'", value);
                if value == OPT_TERMINAL_TYPE {
                    info!("Send WILL '{}' (TERM-TYPE)", value);
                    queue.extend(&[IAC, WILL, value]);
                } else {
                    debug!("Send WONT '{}'", value);
                    queue.extend(&[IAC, WONT, value]);
                }
            }
            WONT => debug!("Got Cmd WONT '{}', ignoring", value),
            WILL => {
                debug!("Got Cmd WILL '{}'", value);
                if value == OPT_ECHO {
                    self.remote_echo = true;
                    out.remote_echo = true;
                    info!("Send Cmd DO '{}' (echo)", value);
                    queue.extend(&[IAC, DO, value]);
                } else {
                    debug!("Send Cmd DONT '{}'", value);
                    queue.extend(&[IAC, DONT, value]);
                }
            }
            SB => {
                if value == OPT_TERMINAL_TYPE {
                    self.state = DecoderState::TerminalTypeRequest(0);
                } else {
                    info!("Ignoring SB {}", value);
                }
            }
            _ => info!(
                "Got Cmd {} ({}) '{}', ignoring",
                code,
                command_name(code),
                value
            ),
        }
    }

    fn terminal_type_request(
        &mut self,
        matched: usize,
        byte: u8,
        out: &mut Decoded,
        queue: &mut OutboundQueue,
    ) {
        if byte == TTYPE_REQUEST[matched] {
            if matched + 1 < TTYPE_REQUEST.len() {
                self.state = DecoderState::TerminalTypeRequest(matched + 1);
                return;
            }
            info!("Got IAC SB TERM-TYPE SEND(1) IAC SE");
            info!("Send IAC SB TERM-TYPE IS(0) '{}' IAC SE", self.terminal_type);
            queue.extend(&[IAC, SB, OPT_TERMINAL_TYPE, TTYPE_IS]);
            queue.push_str(&self.terminal_type);
            queue.extend(&[IAC, SE]);
            self.state = DecoderState::Data;
            return;
        }

        // Only `IAC SB 24` is consumed; the partial payload goes back
        // through the data path.
        info!(
            "Invalid terminal-type subnegotiation: {:?} then {}",
            &TTYPE_REQUEST[..matched],
            byte
        );
        self.state = DecoderState::Data;
        for &replay in TTYPE_REQUEST[..matched].iter().chain(std::iter::once(&byte)) {
            self.step(replay, out, queue);
        }
    }
}

//! Telnet protocol engine
//!
//! Splits an interleaved telnet byte stream into terminal data and
//! out-of-band commands, and collects the replies owed to the peer.
//!
//! - **decoder**: persistent byte-level state machine (`Decoder`)
//! - **queue**: ordered outbound byte buffer (`OutboundQueue`)

pub mod decoder;
pub mod queue;

pub use decoder::{Decoded, Decoder};
pub use queue::OutboundQueue;

/// Interpret As Command
pub const IAC: u8 = 255;
/// Refuse / stop performing an option
pub const DONT: u8 = 254;
/// Request that the peer perform an option
pub const DO: u8 = 253;
/// Refuse to perform an option
pub const WONT: u8 = 252;
/// Offer to perform an option
pub const WILL: u8 = 251;
/// Subnegotiation begin
pub const SB: u8 = 250;
/// Data Mark (Synch)
pub const DM: u8 = 242;
/// Subnegotiation end
pub const SE: u8 = 240;

/// Echo option (RFC 857)
pub const OPT_ECHO: u8 = 1;
/// Terminal-type option (RFC 1091)
pub const OPT_TERMINAL_TYPE: u8 = 24;

/// Terminal-type subnegotiation: peer asks for our type
pub const TTYPE_SEND: u8 = 1;
/// Terminal-type subnegotiation: our type follows
pub const TTYPE_IS: u8 = 0;

/// Terminal identity reported when none is configured
pub const DEFAULT_TERMINAL_TYPE: &str = "VT100";

/// Human-readable name of a command code, for logging.
pub fn command_name(code: u8) -> &'static str {
    match code {
        IAC => "IAC",
        DONT => "DONT",
        DO => "DO",
        WONT => "WONT",
        WILL => "WILL",
        SB => "SB",
        DM => "DM",
        SE => "SE",
        _ => "?",
    }
}

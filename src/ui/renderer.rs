//! Terminal renderer
//!
//! The session drives a `Renderer`; `ConsoleRenderer` is the crossterm
//! implementation used by the console host.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal,
};
use tracing::{debug, warn};

/// Bytes of decoded text, one per char.
///
/// Decoded text holds one char per received byte, so every char is at
/// most U+00FF and maps back to exactly the byte the peer sent.
pub fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}

/// Display that receives decoded terminal output
pub trait Renderer {
    /// Write decoded text (one char per received byte)
    fn write(&mut self, text: &str);

    /// Whether typed characters should be shown before the peer echoes them
    fn set_local_echo(&mut self, enabled: bool);

    fn set_cursor(&mut self, visible: bool);

    /// Attach or release keyboard capture for this display
    fn set_input_capture(&mut self, enabled: bool);
}

/// Renderer writing to the process console
pub struct ConsoleRenderer {
    out: io::Stdout,
    local_echo: bool,
    cursor_visible: bool,
    capturing: bool,
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            local_echo: true,
            cursor_visible: true,
            capturing: false,
        }
    }

    pub fn local_echo(&self) -> bool {
        self.local_echo
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn apply_capture(&mut self, enabled: bool) -> io::Result<()> {
        if enabled {
            terminal::enable_raw_mode()
        } else {
            terminal::disable_raw_mode()
        }
    }
}

impl Renderer for ConsoleRenderer {
    fn write(&mut self, text: &str) {
        let result = self
            .out
            .write_all(&latin1_bytes(text))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!("Failed to write to console: {}", e);
        }
    }

    fn set_local_echo(&mut self, enabled: bool) {
        debug!("local echo: {}", enabled);
        self.local_echo = enabled;
    }

    fn set_cursor(&mut self, visible: bool) {
        debug!("cursor visible: {}", visible);
        if visible == self.cursor_visible {
            return;
        }
        let result = if visible {
            execute!(self.out, Show)
        } else {
            execute!(self.out, Hide)
        };
        match result {
            Ok(()) => self.cursor_visible = visible,
            Err(e) => warn!("Failed to set cursor: {}", e),
        }
    }

    fn set_input_capture(&mut self, enabled: bool) {
        debug!("input capture: {}", enabled);
        if enabled == self.capturing {
            return;
        }
        match self.apply_capture(enabled) {
            Ok(()) => self.capturing = enabled,
            Err(e) => warn!("Failed to set input capture: {}", e),
        }
    }
}

impl Drop for ConsoleRenderer {
    fn drop(&mut self) {
        if self.capturing {
            let _ = terminal::disable_raw_mode();
        }
        if !self.cursor_visible {
            let _ = execute!(self.out, Show);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telnet::{Decoder, OutboundQueue};

    #[test]
    fn test_latin1_bytes_ascii() {
        assert_eq!(latin1_bytes("login: "), b"login: ".to_vec());
        assert!(latin1_bytes("").is_empty());
    }

    #[test]
    fn test_high_bytes_reach_console_unchanged() {
        // UTF-8 "é" from the peer must leave as the same two bytes
        let peer: Vec<u8> = vec![0xC3, 0xA9, b'!', 0x80, 0xFE];
        let mut decoder = Decoder::default();
        let mut queue = OutboundQueue::new();
        let decoded = decoder.decode(&peer, &mut queue);

        assert_eq!(latin1_bytes(&decoded.text), peer);
    }

    #[test]
    fn test_latin1_bytes_replaces_wide_chars() {
        assert_eq!(latin1_bytes("a\u{2603}"), vec![b'a', b'?']);
    }
}

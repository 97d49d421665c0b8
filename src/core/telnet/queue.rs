//! Outbound byte queue
//!
//! Replies and keystrokes accumulate here until the session flushes them
//! to the transport as one write.

use crate::ui::latin1_bytes;

/// Ordered buffer of bytes awaiting transmission
#[derive(Debug, Default, Clone)]
pub struct OutboundQueue {
    bytes: Vec<u8>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single byte
    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Append a run of bytes in order
    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Append the character codes of `text`.
    ///
    /// Characters outside Latin-1 have no single-byte code and are sent as `?`.
    pub fn push_str(&mut self, text: &str) {
        self.bytes.extend(latin1_bytes(text));
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Pending bytes, oldest first
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Drain everything queued so far, leaving the queue empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Drop pending bytes without sending them
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_drains_in_order() {
        let mut queue = OutboundQueue::new();
        queue.push(255);
        queue.extend(&[251, 24]);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.take(), vec![255, 251, 24]);
        assert!(queue.is_empty());
        assert!(queue.take().is_empty());
    }

    #[test]
    fn test_push_str() {
        let mut queue = OutboundQueue::new();
        queue.push_str("VT100");
        assert_eq!(queue.as_slice(), b"VT100");

        queue.clear();
        queue.push_str("\u{e9}\u{2603}");
        assert_eq!(queue.as_slice(), &[0xE9, b'?']);
    }
}

//! Key mapping for terminal input
//!
//! Converts key presses to the bytes a VT100 peer expects.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, ModifierKeyCode};
use tracing::info;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        result
    }
}

/// A key, independent of the input layer that produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Printable ASCII range, code below 128
    Char(u8),
    Enter,
    Backspace,
    Tab,
    Escape,
    Left,
    Up,
    Right,
    Down,
    Shift,
    Control,
    /// Any other named key, by keysym
    Other(u32),
}

// X11 keysyms for named keys
const XK_BACKSPACE: u32 = 0xFF08;
const XK_TAB: u32 = 0xFF09;
const XK_RETURN: u32 = 0xFF0D;
const XK_ESCAPE: u32 = 0xFF1B;
const XK_HOME: u32 = 0xFF50;
const XK_LEFT: u32 = 0xFF51;
const XK_UP: u32 = 0xFF52;
const XK_RIGHT: u32 = 0xFF53;
const XK_DOWN: u32 = 0xFF54;
const XK_PAGE_UP: u32 = 0xFF55;
const XK_PAGE_DOWN: u32 = 0xFF56;
const XK_END: u32 = 0xFF57;
const XK_INSERT: u32 = 0xFF63;
const XK_F1: u32 = 0xFFBE;
const XK_SHIFT_L: u32 = 0xFFE1;
const XK_SHIFT_R: u32 = 0xFFE2;
const XK_CONTROL_L: u32 = 0xFFE3;
const XK_CONTROL_R: u32 = 0xFFE4;
const XK_DELETE: u32 = 0xFFFF;

impl Key {
    /// Translate a keysym as reported by browser and X11 input layers
    pub fn from_keysym(keysym: u32) -> Self {
        match keysym {
            0..=127 => Key::Char(keysym as u8),
            XK_RETURN => Key::Enter,
            XK_BACKSPACE => Key::Backspace,
            XK_TAB => Key::Tab,
            XK_ESCAPE => Key::Escape,
            XK_LEFT => Key::Left,
            XK_UP => Key::Up,
            XK_RIGHT => Key::Right,
            XK_DOWN => Key::Down,
            XK_SHIFT_L | XK_SHIFT_R => Key::Shift,
            XK_CONTROL_L | XK_CONTROL_R => Key::Control,
            other => Key::Other(other),
        }
    }
}

/// A key-press with the modifiers held at the time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub mods: Modifiers,
}

impl KeyPress {
    pub fn new(key: Key, mods: Modifiers) -> Self {
        Self { key, mods }
    }

    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::empty())
    }

    pub fn ctrl(key: Key) -> Self {
        Self::new(key, Modifiers::CTRL)
    }
}

impl From<&KeyEvent> for KeyPress {
    fn from(event: &KeyEvent) -> Self {
        let key = match event.code {
            KeyCode::Char(ch) if ch.is_ascii() => Key::Char(ch as u8),
            KeyCode::Char(ch) => Key::Other(u32::from(ch)),
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Tab => Key::Tab,
            KeyCode::Esc => Key::Escape,
            KeyCode::Left => Key::Left,
            KeyCode::Up => Key::Up,
            KeyCode::Right => Key::Right,
            KeyCode::Down => Key::Down,
            KeyCode::Home => Key::Other(XK_HOME),
            KeyCode::End => Key::Other(XK_END),
            KeyCode::PageUp => Key::Other(XK_PAGE_UP),
            KeyCode::PageDown => Key::Other(XK_PAGE_DOWN),
            KeyCode::Insert => Key::Other(XK_INSERT),
            KeyCode::Delete => Key::Other(XK_DELETE),
            KeyCode::F(n) => Key::Other(XK_F1 + u32::from(n.saturating_sub(1))),
            KeyCode::Modifier(ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift) => {
                Key::Shift
            }
            KeyCode::Modifier(ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl) => {
                Key::Control
            }
            _ => Key::Other(0),
        };

        KeyPress::new(key, Modifiers::from(event.modifiers))
    }
}

/// Key mapper for converting key presses to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Map a key press to bytes, empty when the key sends nothing
    pub fn map_key(press: &KeyPress) -> Vec<u8> {
        Self::map(press).unwrap_or_default()
    }

    /// Map a key press to bytes for the peer
    pub fn map(press: &KeyPress) -> Option<Vec<u8>> {
        match press.key {
            Key::Char(code) => Self::map_char(code, press.mods).map(|b| vec![b]),

            // Modifiers are only read through the flags
            Key::Shift | Key::Control => None,

            Key::Enter => Some(vec![b'\n']),
            Key::Backspace => Some(vec![0x08]),
            Key::Tab => Some(vec![b'\t']),
            Key::Escape => Some(vec![0x1B]),

            Key::Left => Some(b"\x1b[D".to_vec()),
            Key::Up => Some(b"\x1b[A".to_vec()),
            Key::Right => Some(b"\x1b[C".to_vec()),
            Key::Down => Some(b"\x1b[B".to_vec()),

            Key::Other(keysym) => {
                info!("Unrecognized keysym {}", keysym);
                None
            }
        }
    }

    /// Map a printable code, folding to a control code when Ctrl is held
    fn map_char(code: u8, mods: Modifiers) -> Option<u8> {
        if code >= 0x80 {
            info!("Unrecognized keysym {}", code);
            return None;
        }
        if !mods.contains(Modifiers::CTRL) {
            return Some(code);
        }

        match code {
            // Ctrl+@ = NUL, Ctrl+A..Z = 1..26, Ctrl+[ \ ] ^ _ = 27..31
            b'@'..=b'_' => Some(code - 0x40),
            // Ctrl+a..z = 1..26
            b'a'..=b'z' => Some(code - 0x60),
            _ => {
                info!("Debug unknown control keysym: {}", code);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_keys() {
        // Normal character
        let press = KeyPress::plain(Key::Char(b'a'));
        assert_eq!(KeyMapper::map(&press), Some(b"a".to_vec()));

        // Shift is carried by the code itself
        let press = KeyPress::new(Key::Char(b'A'), Modifiers::SHIFT);
        assert_eq!(KeyMapper::map(&press), Some(b"A".to_vec()));

        // Ctrl+C
        let press = KeyPress::ctrl(Key::Char(b'c'));
        assert_eq!(KeyMapper::map(&press), Some(vec![0x03]));
    }

    #[test]
    fn test_control_folding() {
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'A'))), vec![1]);
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'a'))), vec![1]);
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'z'))), vec![26]);
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'Z'))), vec![26]);
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'@'))), vec![0]);
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'['))), vec![0x1B]);
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Char(b'_'))), vec![0x1F]);

        // Nothing to fold to
        assert_eq!(KeyMapper::map(&KeyPress::ctrl(Key::Char(b'1'))), None);
        assert_eq!(KeyMapper::map(&KeyPress::ctrl(Key::Char(b'`'))), None);
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(KeyMapper::map_key(&KeyPress::plain(Key::Enter)), b"\n".to_vec());
        assert_eq!(KeyMapper::map_key(&KeyPress::plain(Key::Backspace)), b"\x08".to_vec());
        assert_eq!(KeyMapper::map_key(&KeyPress::plain(Key::Tab)), b"\t".to_vec());
        assert_eq!(KeyMapper::map_key(&KeyPress::plain(Key::Escape)), b"\x1b".to_vec());
        assert!(KeyMapper::map(&KeyPress::plain(Key::Shift)).is_none());
        assert!(KeyMapper::map(&KeyPress::ctrl(Key::Control)).is_none());
        assert!(KeyMapper::map(&KeyPress::plain(Key::Other(XK_F1))).is_none());
    }

    #[test]
    fn test_arrow_keys() {
        assert_eq!(
            KeyMapper::map(&KeyPress::plain(Key::Left)),
            Some(vec![0x1B, 0x5B, 0x44])
        );
        assert_eq!(KeyMapper::map_key(&KeyPress::plain(Key::Up)), b"\x1b[A".to_vec());
        assert_eq!(KeyMapper::map_key(&KeyPress::plain(Key::Right)), b"\x1b[C".to_vec());
        // Modifiers do not change arrow sequences
        assert_eq!(KeyMapper::map_key(&KeyPress::ctrl(Key::Down)), b"\x1b[B".to_vec());
    }

    #[test]
    fn test_from_keysym() {
        assert_eq!(Key::from_keysym(65), Key::Char(b'A'));
        assert_eq!(Key::from_keysym(65293), Key::Enter);
        assert_eq!(Key::from_keysym(65288), Key::Backspace);
        assert_eq!(Key::from_keysym(65289), Key::Tab);
        assert_eq!(Key::from_keysym(65307), Key::Escape);
        assert_eq!(Key::from_keysym(65361), Key::Left);
        assert_eq!(Key::from_keysym(65362), Key::Up);
        assert_eq!(Key::from_keysym(65363), Key::Right);
        assert_eq!(Key::from_keysym(65364), Key::Down);
        assert_eq!(Key::from_keysym(65505), Key::Shift);
        assert_eq!(Key::from_keysym(65507), Key::Control);
        assert_eq!(Key::from_keysym(65470), Key::Other(65470));
    }

    #[test]
    fn test_from_crossterm_event() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let press = KeyPress::from(&event);
        assert_eq!(press, KeyPress::ctrl(Key::Char(b'c')));
        assert_eq!(KeyMapper::map_key(&press), vec![0x03]);

        let event = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(KeyPress::from(&event), KeyPress::plain(Key::Left));

        let event = KeyEvent::new(KeyCode::Char('\u{e9}'), KeyModifiers::NONE);
        assert_eq!(KeyPress::from(&event).key, Key::Other(0xE9));

        let event = KeyEvent::new(KeyCode::F(1), KeyModifiers::NONE);
        assert_eq!(KeyPress::from(&event).key, Key::Other(XK_F1));
    }
}

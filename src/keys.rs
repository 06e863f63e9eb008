//! Key identifiers and the note symbol table
//!
//! Keys are identified by Windows virtual-key codes, which is what the
//! system sink injects. Other sinks only use them as opaque ids.

use std::fmt;

use crate::error::ConfigError;

/// Default symbol layout: one key per semitone starting at the root note
pub const DEFAULT_SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyz0123456789.";

/// Virtual-key code of F1. Pitch bend and rest keys count up from here.
const VK_F1: u8 = 0x70;

/// A keyboard key, as a virtual-key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u8);

impl KeyId {
    /// The key typed for `c`, if it has an unshifted key of its own
    pub fn from_char(c: char) -> Option<Self> {
        let code = match c.to_ascii_lowercase() {
            c @ 'a'..='z' => c.to_ascii_uppercase() as u8,
            c @ '0'..='9' => c as u8,
            ';' => 0xBA,
            '=' => 0xBB,
            ',' => 0xBC,
            '-' => 0xBD,
            '.' => 0xBE,
            '/' => 0xBF,
            '`' => 0xC0,
            '[' => 0xDB,
            '\\' => 0xDC,
            ']' => 0xDD,
            '\'' => 0xDE,
            ' ' => 0x20,
            _ => return None,
        };
        Some(KeyId(code))
    }

    /// Virtual-key code
    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            c @ (0x30..=0x39 | 0x41..=0x5A) => write!(f, "{}", (c as char).to_ascii_lowercase()),
            c @ 0x70..=0x87 => write!(f, "F{}", c - VK_F1 + 1),
            0x20 => f.write_str("space"),
            0xBA => f.write_str(";"),
            0xBB => f.write_str("="),
            0xBC => f.write_str(","),
            0xBD => f.write_str("-"),
            0xBE => f.write_str("."),
            0xBF => f.write_str("/"),
            0xC0 => f.write_str("`"),
            0xDB => f.write_str("["),
            0xDC => f.write_str("\\"),
            0xDD => f.write_str("]"),
            0xDE => f.write_str("'"),
            c => write!(f, "vk:{:02X}", c),
        }
    }
}

/// One keystroke instruction for a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(KeyId),
    Release(KeyId),
}

impl KeyAction {
    pub fn is_press(self) -> bool {
        matches!(self, KeyAction::Press(_))
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press(key) => write!(f, "+{}", key),
            KeyAction::Release(key) => write!(f, "-{}", key),
        }
    }
}

/// Key for a pitch bend bucket or rest selection (0..=7 → F1..F8)
pub fn selector_key(select: u8) -> KeyId {
    KeyId(VK_F1 + select.min(7))
}

/// Ordered mapping from pitch offset (0..N above the root note) to key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    keys: Vec<KeyId>,
}

impl SymbolTable {
    /// Build a table from a character layout such as `"abc...789."`
    pub fn from_chars(layout: &str) -> Result<Self, ConfigError> {
        let keys = layout
            .chars()
            .map(|c| KeyId::from_char(c).ok_or(ConfigError::UnmappableSymbol(c)))
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Err(ConfigError::EmptySymbolTable);
        }

        Ok(Self { keys })
    }

    pub fn get(&self, offset: usize) -> Option<KeyId> {
        self.keys.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            keys: DEFAULT_SYMBOLS.chars().filter_map(KeyId::from_char).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_layout() {
        let table = SymbolTable::default();

        assert_eq!(table.len(), 37);
        assert_eq!(table.get(0), Some(KeyId(0x41)));
        assert_eq!(table.get(25), Some(KeyId(0x5A)));
        assert_eq!(table.get(26), Some(KeyId(0x30)));
        assert_eq!(table.get(36), Some(KeyId(0xBE)));
        assert_eq!(table.get(37), None);
    }

    #[test]
    fn test_from_chars_rejects_unknown() {
        assert_eq!(
            SymbolTable::from_chars("ab!"),
            Err(ConfigError::UnmappableSymbol('!'))
        );
        assert_eq!(SymbolTable::from_chars(""), Err(ConfigError::EmptySymbolTable));
    }

    #[test]
    fn test_selector_keys() {
        assert_eq!(selector_key(0), KeyId(0x70));
        assert_eq!(selector_key(7), KeyId(0x77));
        assert_eq!(selector_key(9), KeyId(0x77));
        assert_eq!(selector_key(3).to_string(), "F4");
    }

    #[test]
    fn test_display() {
        assert_eq!(KeyId(0x41).to_string(), "a");
        assert_eq!(KeyId(0x37).to_string(), "7");
        assert_eq!(KeyId(0xBE).to_string(), ".");
        assert_eq!(KeyAction::Press(KeyId(0x42)).to_string(), "+b");
        assert_eq!(KeyAction::Release(selector_key(0)).to_string(), "-F1");
    }
}

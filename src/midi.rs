//! MIDI message decoding
//!
//! Decodes raw status/data bytes into the flat `{kind, channel, data1, data2}`
//! shape the translator works on.

use std::fmt;

/// MIDI message kind, taken from the high nibble of the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// 0x8
    NoteOff,
    /// 0x9
    NoteOn,
    /// 0xA
    PolyphonicPressure,
    /// 0xB
    ControlChange,
    /// 0xC
    ProgramChange,
    /// 0xD
    ChannelPressure,
    /// 0xE
    PitchBend,
    /// 0xF. Some controllers put auxiliary button state in the low nibble.
    SystemRealTime,
}

impl MessageKind {
    /// Map a status nibble (`status >> 4`) to a kind
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x8 => Some(MessageKind::NoteOff),
            0x9 => Some(MessageKind::NoteOn),
            0xA => Some(MessageKind::PolyphonicPressure),
            0xB => Some(MessageKind::ControlChange),
            0xC => Some(MessageKind::ProgramChange),
            0xD => Some(MessageKind::ChannelPressure),
            0xE => Some(MessageKind::PitchBend),
            0xF => Some(MessageKind::SystemRealTime),
            _ => None,
        }
    }
}

/// A decoded MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMessage {
    pub kind: MessageKind,
    /// Low nibble of the status byte (0-15)
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
}

impl ChannelMessage {
    pub fn new(kind: MessageKind, channel: u8, data1: u8, data2: u8) -> Self {
        Self {
            kind,
            channel: channel & 0x0F,
            data1: data1 & 0x7F,
            data2: data2 & 0x7F,
        }
    }

    /// Parse a MIDI message from raw bytes
    ///
    /// Missing data bytes read as zero. A Note On with velocity 0 is a Note Off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        // Running status (data byte first) carries no kind of its own
        if status < 0x80 {
            return None;
        }

        let kind = MessageKind::from_nibble(status >> 4)?;
        let channel = status & 0x0F;
        let data1 = data.get(1).copied().unwrap_or(0) & 0x7F;
        let data2 = data.get(2).copied().unwrap_or(0) & 0x7F;

        let kind = match kind {
            MessageKind::NoteOn if data2 == 0 => MessageKind::NoteOff,
            other => other,
        };

        Some(Self {
            kind,
            channel,
            data1,
            data2,
        })
    }

    /// 14-bit pitch bend value (LSB in data1, MSB in data2)
    pub fn bend_value(&self) -> u16 {
        ((self.data2 as u16 & 0x7F) << 7) | (self.data1 as u16 & 0x7F)
    }
}

impl fmt::Display for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageKind::NoteOff => {
                write!(f, "NoteOff ch:{} n:{} v:{}", self.channel + 1, self.data1, self.data2)
            }
            MessageKind::NoteOn => {
                write!(f, "NoteOn ch:{} n:{} v:{}", self.channel + 1, self.data1, self.data2)
            }
            MessageKind::ControlChange => {
                write!(f, "CC ch:{} cc:{} v:{}", self.channel + 1, self.data1, self.data2)
            }
            MessageKind::PitchBend => {
                write!(f, "PitchBend ch:{} v:{}", self.channel + 1, self.bend_value())
            }
            MessageKind::SystemRealTime => write!(f, "System 0xF{:X}", self.channel),
            _ => write!(
                f,
                "{:?} ch:{} d1:{} d2:{}",
                self.kind,
                self.channel + 1,
                self.data1,
                self.data2
            ),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = ChannelMessage::parse(&[0x90, 60, 100]).unwrap();

        assert_eq!(msg, ChannelMessage::new(MessageKind::NoteOn, 0, 60, 100));
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = ChannelMessage::parse(&[0x93, 60, 0]).unwrap();

        assert_eq!(msg.kind, MessageKind::NoteOff);
        assert_eq!(msg.channel, 3);
        assert_eq!(msg.data1, 60);
    }

    #[test]
    fn test_control_change() {
        let msg = ChannelMessage::parse(&[0xB2, 1, 127]).unwrap();

        assert_eq!(msg.kind, MessageKind::ControlChange);
        assert_eq!(msg.channel, 2);
        assert_eq!(msg.data1, 1);
        assert_eq!(msg.data2, 127);
    }

    #[test]
    fn test_pitch_bend_center() {
        let msg = ChannelMessage::parse(&[0xE0, 0x00, 0x40]).unwrap();

        assert_eq!(msg.kind, MessageKind::PitchBend);
        assert_eq!(msg.bend_value(), 8192);
    }

    #[test]
    fn test_system_real_time_keeps_low_nibble() {
        let msg = ChannelMessage::parse(&[0xFC]).unwrap();

        assert_eq!(msg.kind, MessageKind::SystemRealTime);
        assert_eq!(msg.channel, 0xC);
        assert_eq!(msg.data1, 0);
        assert_eq!(msg.data2, 0);
    }

    #[test]
    fn test_short_and_running_status() {
        assert_eq!(ChannelMessage::parse(&[]), None);
        assert_eq!(ChannelMessage::parse(&[0x40, 0x10]), None);

        let msg = ChannelMessage::parse(&[0xC1, 5]).unwrap();
        assert_eq!(msg.kind, MessageKind::ProgramChange);
        assert_eq!(msg.data1, 5);
        assert_eq!(msg.data2, 0);
    }

    #[test]
    fn test_data_bytes_masked() {
        let msg = ChannelMessage::parse(&[0x80, 0xFF, 0x80]).unwrap();
        assert_eq!(msg.data1, 0x7F);
        assert_eq!(msg.data2, 0);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x3C, 0x7F]), "90 3C 7F");
    }
}

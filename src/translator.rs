//! MIDI to keystroke translation
//!
//! [`Translator`] turns one decoded message at a time into the ordered key
//! presses and releases for it. It never fails: out-of-range input is wrapped
//! or clamped, unknown messages are ignored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ConfigError;
use crate::keys::{selector_key, KeyAction, KeyId, SymbolTable};
use crate::midi::{ChannelMessage, MessageKind};

/// MIDI note number of middle C
pub const MIDDLE_C: i32 = 60;

/// Octave shift applied while the alternate-octave button is up
const ROCK_OCTAVE_SHIFT: i32 = 12;

/// What to do with a note that lands outside the playable window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteRange {
    /// Fold it back by whole periods, then clamp
    #[default]
    Wrap,
    /// Drop it
    Clamp,
}

/// User-adjustable translation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationSettings {
    /// Semitones added to every incoming note
    pub transpose: i32,
    /// Wrap modulus for out-of-window notes
    pub period: i32,
    /// Lowest playable note (inclusive), maps to the first symbol
    pub root_note: i32,
    /// Highest playable note (inclusive)
    pub max_note: i32,
    pub note_range: NoteRange,
    /// System Real-Time low nibble bit 2 selects the octave
    pub rock_octave_enabled: bool,
    pub pitch_bend_enabled: bool,
    /// Controller number that selects the rest key, if any
    pub modifier_cc: Option<u8>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            transpose: 0,
            period: 12,
            root_note: 48,
            max_note: 84,
            note_range: NoteRange::Wrap,
            rock_octave_enabled: false,
            pitch_bend_enabled: true,
            modifier_cc: Some(1),
        }
    }
}

impl TranslationSettings {
    /// Check the settings against a symbol table of `symbols` entries
    pub fn validate(&self, symbols: usize) -> Result<(), ConfigError> {
        if symbols == 0 {
            return Err(ConfigError::EmptySymbolTable);
        }
        if self.period <= 0 || self.period as usize >= symbols {
            return Err(ConfigError::PeriodOutOfRange {
                value: self.period,
                max: symbols - 1,
            });
        }
        if !(-127..=127).contains(&self.transpose) {
            return Err(ConfigError::TransposeOutOfRange(self.transpose));
        }
        if self.root_note > self.max_note {
            return Err(ConfigError::InvertedWindow {
                root: self.root_note,
                max: self.max_note,
            });
        }
        if self.root_note < 0 || self.max_note > 127 {
            return Err(ConfigError::WindowOutOfRange {
                root: self.root_note,
                max: self.max_note,
            });
        }
        if (self.max_note - self.root_note) as usize >= symbols {
            return Err(ConfigError::WindowTooWide {
                root: self.root_note,
                max: self.max_note,
                symbols,
            });
        }
        if let Some(cc) = self.modifier_cc {
            if cc > 127 {
                return Err(ConfigError::ControllerOutOfRange(cc));
            }
        }
        Ok(())
    }
}

/// Transpose that makes `middle_c` play as MIDI note 60
pub fn transpose_for_middle_c(middle_c: i32) -> Result<i32, ConfigError> {
    if !(0..=127).contains(&middle_c) {
        return Err(ConfigError::MiddleCOutOfRange(middle_c));
    }
    Ok(MIDDLE_C - middle_c)
}

/// Fold `note` into the playable window by whole periods, then clamp
pub fn wrap_note(note: i32, settings: &TranslationSettings) -> i32 {
    let mut note = note;
    if settings.period > 0 {
        while note < settings.root_note {
            note += settings.period;
        }
        while note > settings.max_note {
            note -= settings.period;
        }
    }
    note.clamp(settings.root_note, settings.max_note)
}

/// Apply the configured out-of-window policy
pub fn place_note(note: i32, settings: &TranslationSettings) -> Option<i32> {
    match settings.note_range {
        NoteRange::Wrap => Some(wrap_note(note, settings)),
        NoteRange::Clamp => {
            (settings.root_note..=settings.max_note).contains(&note).then_some(note)
        }
    }
}

/// Signed pitch bend in `[-0.5, 0.5)` from its 7-bit halves
pub fn normalize_bend(lsb: u8, msb: u8) -> f64 {
    let raw = (((msb & 0x7F) as i32) << 7) | (lsb & 0x7F) as i32;
    (raw - 8192) as f64 / 16384.0
}

/// Quantize a normalized bend into one of 8 buckets
///
/// 0 is the furthest positive deflection, 7 the furthest negative. `None`
/// means centered.
pub fn bend_bucket(value: f64) -> Option<u8> {
    if value > 0.0 {
        Some((4.0 - (value * 8.0).ceil()).clamp(0.0, 7.0) as u8)
    } else if value < 0.0 {
        Some((3.0 + (value * 8.0).floor().abs()).clamp(0.0, 7.0) as u8)
    } else {
        None
    }
}

/// Rest selection (0..=7) from a 7-bit controller value, 127 → 0
pub fn rest_selection(value: u8) -> u8 {
    let scaled = (value.min(127) as f64 / 127.0 * 7.0).round() as u8;
    7 - scaled
}

/// Per-stream translation state
#[derive(Debug)]
pub struct Translator {
    symbols: Arc<SymbolTable>,
    octave_shift: i32,
    last_bend: Option<KeyId>,
    held_modifier: Option<KeyId>,
    rest_selection: Option<u8>,
}

impl Translator {
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        Self {
            symbols,
            octave_shift: 0,
            last_bend: None,
            held_modifier: None,
            rest_selection: None,
        }
    }

    pub fn octave_shift(&self) -> i32 {
        self.octave_shift
    }

    pub fn last_bend(&self) -> Option<KeyId> {
        self.last_bend
    }

    pub fn held_modifier(&self) -> Option<KeyId> {
        self.held_modifier
    }

    pub fn rest_selection(&self) -> Option<u8> {
        self.rest_selection
    }

    /// Translate one message into key actions, in the order they must be sent
    pub fn translate(
        &mut self,
        settings: &TranslationSettings,
        message: &ChannelMessage,
    ) -> Vec<KeyAction> {
        let mut actions = Vec::with_capacity(2);

        // The rest key only lives until the next message of any kind
        if let Some(key) = self.held_modifier.take() {
            actions.push(KeyAction::Release(key));
        }

        match message.kind {
            MessageKind::NoteOn | MessageKind::NoteOff => {
                self.note(settings, message, &mut actions);
            }
            MessageKind::ControlChange if settings.modifier_cc == Some(message.data1) => {
                let rest = rest_selection(message.data2);
                let key = selector_key(rest);
                self.rest_selection = Some(rest);
                self.held_modifier = Some(key);
                actions.push(KeyAction::Press(key));
            }
            MessageKind::PitchBend if settings.pitch_bend_enabled => {
                self.bend(message, &mut actions);
            }
            MessageKind::SystemRealTime if settings.rock_octave_enabled => {
                self.octave_shift = if message.channel & 0x4 != 0 {
                    0
                } else {
                    ROCK_OCTAVE_SHIFT
                };
                trace!("Octave shift now {}", self.octave_shift);
            }
            _ => {}
        }

        actions
    }

    /// Releases for every key this translator still holds
    pub fn release_held(&mut self) -> Vec<KeyAction> {
        let mut actions = Vec::with_capacity(2);
        let modifier = self.held_modifier.take();
        if let Some(key) = modifier {
            actions.push(KeyAction::Release(key));
        }
        if let Some(key) = self.last_bend.take() {
            if modifier != Some(key) {
                actions.push(KeyAction::Release(key));
            }
        }
        actions
    }

    fn note(
        &mut self,
        settings: &TranslationSettings,
        message: &ChannelMessage,
        actions: &mut Vec<KeyAction>,
    ) {
        let note = message.data1 as i32 + settings.transpose + self.octave_shift;
        let Some(placed) = place_note(note, settings) else {
            trace!("Note {} outside {}..={}, dropped", note, settings.root_note, settings.max_note);
            return;
        };

        let Some(key) = self.symbols.get((placed - settings.root_note) as usize) else {
            trace!("Note {} has no symbol", placed);
            return;
        };

        if message.kind == MessageKind::NoteOn {
            actions.push(KeyAction::Press(key));
        } else {
            actions.push(KeyAction::Release(key));
        }
    }

    fn bend(&mut self, message: &ChannelMessage, actions: &mut Vec<KeyAction>) {
        let symbol = bend_bucket(normalize_bend(message.data1, message.data2)).map(selector_key);

        if symbol != self.last_bend {
            if let Some(previous) = self.last_bend.take() {
                actions.push(KeyAction::Release(previous));
            }
            if let Some(key) = symbol {
                actions.push(KeyAction::Press(key));
            }
            self.last_bend = symbol;
        }

        // Centered: back to the rest position
        if symbol.is_none() {
            if let Some(rest) = self.rest_selection {
                let key = selector_key(rest);
                self.held_modifier = Some(key);
                actions.push(KeyAction::Press(key));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyId;
    use proptest::prelude::*;

    fn translator() -> Translator {
        Translator::new(Arc::new(SymbolTable::default()))
    }

    fn note_on(note: u8) -> ChannelMessage {
        ChannelMessage::new(MessageKind::NoteOn, 0, note, 100)
    }

    fn note_off(note: u8) -> ChannelMessage {
        ChannelMessage::new(MessageKind::NoteOff, 0, note, 0)
    }

    fn bend(value: u16) -> ChannelMessage {
        ChannelMessage::new(MessageKind::PitchBend, 0, (value & 0x7F) as u8, (value >> 7) as u8)
    }

    fn cc(controller: u8, value: u8) -> ChannelMessage {
        ChannelMessage::new(MessageKind::ControlChange, 0, controller, value)
    }

    fn symbol(offset: usize) -> KeyId {
        SymbolTable::default().get(offset).unwrap()
    }

    #[test]
    fn test_note_in_window() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        assert_eq!(t.translate(&settings, &note_on(48)), vec![KeyAction::Press(symbol(0))]);
        assert_eq!(t.translate(&settings, &note_off(48)), vec![KeyAction::Release(symbol(0))]);
        assert_eq!(t.translate(&settings, &note_on(84)), vec![KeyAction::Press(symbol(36))]);
    }

    #[test]
    fn test_low_note_wraps_up() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        // 30 -> 42 -> 54, offset 6
        assert_eq!(wrap_note(30, &settings), 54);
        assert_eq!(t.translate(&settings, &note_on(30)), vec![KeyAction::Press(symbol(6))]);
    }

    #[test]
    fn test_high_note_wraps_down() {
        let settings = TranslationSettings::default();
        assert_eq!(wrap_note(100, &settings), 76);
        assert_eq!(wrap_note(127, &settings), 79);
    }

    #[test]
    fn test_transpose_applies() {
        let settings = TranslationSettings {
            transpose: transpose_for_middle_c(72).unwrap(),
            ..Default::default()
        };
        let mut t = translator();

        // 72 played as middle C: 72 - 12 = 60, offset 12
        assert_eq!(t.translate(&settings, &note_on(72)), vec![KeyAction::Press(symbol(12))]);
    }

    #[test]
    fn test_clamp_policy_discards() {
        let settings = TranslationSettings {
            note_range: NoteRange::Clamp,
            ..Default::default()
        };
        let mut t = translator();

        assert!(t.translate(&settings, &note_on(30)).is_empty());
        assert!(t.translate(&settings, &note_on(85)).is_empty());
        assert_eq!(t.translate(&settings, &note_on(60)), vec![KeyAction::Press(symbol(12))]);
    }

    #[test]
    fn test_modifier_released_before_next_note() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        let actions = t.translate(&settings, &cc(1, 127));
        assert_eq!(actions, vec![KeyAction::Press(selector_key(0))]);
        assert_eq!(t.rest_selection(), Some(0));
        assert_eq!(t.held_modifier(), Some(selector_key(0)));

        let actions = t.translate(&settings, &note_on(50));
        assert_eq!(
            actions,
            vec![KeyAction::Release(selector_key(0)), KeyAction::Press(symbol(2))]
        );
        assert_eq!(t.held_modifier(), None);
    }

    #[test]
    fn test_modifier_replaced_on_repeat_cc() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        t.translate(&settings, &cc(1, 0));
        assert_eq!(t.rest_selection(), Some(7));

        let actions = t.translate(&settings, &cc(1, 64));
        assert_eq!(
            actions,
            vec![KeyAction::Release(selector_key(7)), KeyAction::Press(selector_key(3))]
        );
    }

    #[test]
    fn test_other_controllers_ignored() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        assert!(t.translate(&settings, &cc(7, 100)).is_empty());

        let disabled = TranslationSettings {
            modifier_cc: None,
            ..Default::default()
        };
        assert!(t.translate(&disabled, &cc(1, 100)).is_empty());
    }

    #[test]
    fn test_rest_selection_values() {
        assert_eq!(rest_selection(127), 0);
        assert_eq!(rest_selection(0), 7);
        assert_eq!(rest_selection(64), 3);
        assert_eq!(rest_selection(73), 3);
    }

    #[test]
    fn test_bend_buckets() {
        assert_eq!(bend_bucket(-0.5), Some(7));
        assert_eq!(bend_bucket(0.0), None);
        assert_eq!(bend_bucket(0.4999), Some(0));
        assert_eq!(bend_bucket(0.01), Some(3));
        assert_eq!(bend_bucket(-0.01), Some(4));
        assert_eq!(bend_bucket(normalize_bend(0x7F, 0x7F)), Some(0));
        assert_eq!(bend_bucket(normalize_bend(0, 0)), Some(7));
        assert_eq!(normalize_bend(0x00, 0x40), 0.0);
    }

    #[test]
    fn test_bend_buckets_monotonic() {
        let mut previous = 7;
        for raw in 0u16..16384 {
            let value = normalize_bend((raw & 0x7F) as u8, (raw >> 7) as u8);
            if let Some(bucket) = bend_bucket(value) {
                assert!(bucket <= previous, "bucket rose at raw {}", raw);
                previous = bucket;
            }
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_bend_debounce() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        let actions = t.translate(&settings, &bend(16383));
        assert_eq!(actions, vec![KeyAction::Press(selector_key(0))]);

        // Same bucket: nothing new
        assert!(t.translate(&settings, &bend(16300)).is_empty());

        let actions = t.translate(&settings, &bend(0));
        assert_eq!(
            actions,
            vec![KeyAction::Release(selector_key(0)), KeyAction::Press(selector_key(7))]
        );
        assert_eq!(t.last_bend(), Some(selector_key(7)));
    }

    #[test]
    fn test_centered_bend_reasserts_rest() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        // CC 1 = 64 -> rest selection 3
        t.translate(&settings, &cc(1, 64));
        assert_eq!(t.rest_selection(), Some(3));

        let actions = t.translate(&settings, &bend(8192));
        assert_eq!(
            actions,
            vec![KeyAction::Release(selector_key(3)), KeyAction::Press(selector_key(3))]
        );
        assert_eq!(t.held_modifier(), Some(selector_key(3)));
        assert_eq!(t.last_bend(), None);
    }

    #[test]
    fn test_centered_bend_releases_direction() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        t.translate(&settings, &bend(0));
        let actions = t.translate(&settings, &bend(8192));
        // No rest selection yet, so only the release
        assert_eq!(actions, vec![KeyAction::Release(selector_key(7))]);
    }

    #[test]
    fn test_bend_disabled() {
        let settings = TranslationSettings {
            pitch_bend_enabled: false,
            ..Default::default()
        };
        let mut t = translator();
        assert!(t.translate(&settings, &bend(0)).is_empty());
    }

    #[test]
    fn test_rock_octave_toggle() {
        let settings = TranslationSettings {
            rock_octave_enabled: true,
            ..Default::default()
        };
        let mut t = translator();

        t.translate(&settings, &ChannelMessage::new(MessageKind::SystemRealTime, 0x8, 0, 0));
        assert_eq!(t.octave_shift(), 12);
        assert_eq!(t.translate(&settings, &note_on(48)), vec![KeyAction::Press(symbol(12))]);

        t.translate(&settings, &ChannelMessage::new(MessageKind::SystemRealTime, 0xC, 0, 0));
        assert_eq!(t.octave_shift(), 0);
    }

    #[test]
    fn test_rock_octave_ignored_when_disabled() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        t.translate(&settings, &ChannelMessage::new(MessageKind::SystemRealTime, 0x8, 0, 0));
        assert_eq!(t.octave_shift(), 0);
    }

    #[test]
    fn test_release_held() {
        let settings = TranslationSettings::default();
        let mut t = translator();

        t.translate(&settings, &bend(0));
        t.translate(&settings, &cc(1, 127));

        let actions = t.release_held();
        assert_eq!(
            actions,
            vec![KeyAction::Release(selector_key(0)), KeyAction::Release(selector_key(7))]
        );
        assert!(t.release_held().is_empty());
    }

    #[test]
    fn test_validate() {
        let symbols = SymbolTable::default().len();
        assert!(TranslationSettings::default().validate(symbols).is_ok());

        let bad_period = TranslationSettings { period: 0, ..Default::default() };
        assert!(matches!(
            bad_period.validate(symbols),
            Err(ConfigError::PeriodOutOfRange { value: 0, .. })
        ));

        let too_long = TranslationSettings { period: 37, ..Default::default() };
        assert!(too_long.validate(symbols).is_err());

        let inverted = TranslationSettings { root_note: 60, max_note: 50, ..Default::default() };
        assert!(matches!(inverted.validate(symbols), Err(ConfigError::InvertedWindow { .. })));

        let wide = TranslationSettings { root_note: 40, max_note: 90, ..Default::default() };
        assert!(matches!(wide.validate(symbols), Err(ConfigError::WindowTooWide { .. })));

        assert_eq!(transpose_for_middle_c(200), Err(ConfigError::MiddleCOutOfRange(200)));
    }

    proptest! {
        #[test]
        fn prop_wrap_stays_in_window(
            pitch in 0i32..128,
            transpose in -127i32..=127,
            octave in prop_oneof![Just(0i32), Just(12i32)],
            period in 1i32..37,
            root in 0i32..=91,
        ) {
            let settings = TranslationSettings {
                transpose,
                period,
                root_note: root,
                max_note: root + 36,
                ..Default::default()
            };
            let note = wrap_note(pitch + transpose + octave, &settings);
            prop_assert!(note >= settings.root_note && note <= settings.max_note);
        }
    }
}

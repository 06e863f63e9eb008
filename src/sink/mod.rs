//! Keystroke sinks
//!
//! A sink receives the engine's key actions in order. Calls must return
//! quickly; the engine thread makes them between polls.

pub mod console;
#[cfg(windows)]
pub mod system;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::keys::{KeyAction, KeyId};

pub use console::ConsoleSink;

/// Something that can press and release keys
pub trait KeySink: Send {
    /// Sink name for logs
    fn name(&self) -> &str;

    fn press(&mut self, key: KeyId);

    fn release(&mut self, key: KeyId);

    fn apply(&mut self, action: KeyAction) {
        match action {
            KeyAction::Press(key) => self.press(key),
            KeyAction::Release(key) => self.release(key),
        }
    }
}

impl KeySink for Box<dyn KeySink> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn press(&mut self, key: KeyId) {
        (**self).press(key)
    }

    fn release(&mut self, key: KeyId) {
        (**self).release(key)
    }
}

/// The sink that injects real keystrokes on this platform, if there is one
pub fn system_sink() -> Option<Box<dyn KeySink>> {
    #[cfg(windows)]
    {
        Some(Box::new(system::SystemSink::new()))
    }
    #[cfg(not(windows))]
    {
        None
    }
}

/// Keeps every action it receives. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    actions: Arc<Mutex<Vec<KeyAction>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn actions(&self) -> Vec<KeyAction> {
        self.actions.lock().clone()
    }

    /// Keys pressed more times than released
    pub fn held_keys(&self) -> Vec<KeyId> {
        let mut held: Vec<KeyId> = Vec::new();
        for action in self.actions.lock().iter() {
            match *action {
                KeyAction::Press(key) => {
                    if !held.contains(&key) {
                        held.push(key);
                    }
                }
                KeyAction::Release(key) => held.retain(|k| *k != key),
            }
        }
        held
    }
}

impl KeySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn press(&mut self, key: KeyId) {
        self.actions.lock().push(KeyAction::Press(key));
    }

    fn release(&mut self, key: KeyId) {
        self.actions.lock().push(KeyAction::Release(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_log() {
        let sink = RecordingSink::new();
        let mut writer: Box<dyn KeySink> = Box::new(sink.clone());

        writer.apply(KeyAction::Press(KeyId(0x41)));
        writer.apply(KeyAction::Press(KeyId(0x42)));
        writer.apply(KeyAction::Release(KeyId(0x41)));

        assert_eq!(sink.actions().len(), 3);
        assert_eq!(sink.held_keys(), vec![KeyId(0x42)]);
    }
}

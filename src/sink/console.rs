//! Console sink - logs keystrokes instead of sending them
//!
//! Used for dry runs and on platforms without a system sink.

use tracing::{debug, info};

use super::KeySink;
use crate::keys::KeyId;

/// Logs every key action through `tracing`
pub struct ConsoleSink {
    /// Actions sent so far
    count: u64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { count: 0 }
    }

    fn log(&mut self, direction: &str, key: KeyId) {
        self.count += 1;
        info!(
            "⌨️  [{}] {} {} [#{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            direction,
            key,
            self.count
        );
        debug!(key = key.code(), direction, count = self.count, "ConsoleSink action");
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn press(&mut self, key: KeyId) {
        self.log("down", key);
    }

    fn release(&mut self, key: KeyId) {
        self.log("up  ", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyAction;

    #[test]
    fn test_console_sink_counts() {
        let mut sink = ConsoleSink::new();
        sink.apply(KeyAction::Press(KeyId(0x41)));
        sink.apply(KeyAction::Release(KeyId(0x41)));
        assert_eq!(sink.count, 2);
    }
}

//! Windows keystroke injection

use windows::Win32::UI::Input::KeyboardAndMouse::{keybd_event, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP};

use super::KeySink;
use crate::keys::KeyId;

/// Sends virtual-key events to the foreground window
#[derive(Default)]
pub struct SystemSink;

impl SystemSink {
    pub fn new() -> Self {
        Self
    }
}

impl KeySink for SystemSink {
    fn name(&self) -> &str {
        "system"
    }

    fn press(&mut self, key: KeyId) {
        // SAFETY: keybd_event only queues an input event
        unsafe { keybd_event(key.code(), 0, KEYBD_EVENT_FLAGS(0), 0) }
    }

    fn release(&mut self, key: KeyId) {
        // SAFETY: as above
        unsafe { keybd_event(key.code(), 0, KEYEVENTF_KEYUP, 0) }
    }
}

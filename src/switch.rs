//! Device switch coordinator
//!
//! Single-slot mailbox between whoever picks the input device and the engine
//! thread. Requests overwrite each other (last writer wins); the requester
//! never waits for the switch to happen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::port::DeviceId;

/// How often a waiting engine re-checks its liveness flag
const WAIT_RECHECK: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Slot {
    pending: Option<DeviceId>,
    signaled: bool,
}

/// Pending device request plus the wake signal the engine waits on
#[derive(Debug, Default)]
pub struct DeviceSwitch {
    slot: Mutex<Slot>,
    wake: Condvar,
}

impl DeviceSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the engine to listen to `id`
    ///
    /// Not compared against the device currently open: asking for it again
    /// closes and reopens it.
    pub fn request(&self, id: DeviceId) {
        let mut slot = self.slot.lock();
        slot.pending = Some(id);
        slot.signaled = true;
        drop(slot);
        self.wake.notify_all();
    }

    /// Wake the engine without a request (shutdown)
    pub fn wake(&self) {
        self.slot.lock().signaled = true;
        self.wake.notify_all();
    }

    /// Clear the signal and consume the pending request, atomically
    pub fn take(&self) -> Option<DeviceId> {
        let mut slot = self.slot.lock();
        slot.signaled = false;
        slot.pending.take()
    }

    /// Whether a request or wake arrived since the last [`DeviceSwitch::take`]
    pub fn is_signaled(&self) -> bool {
        self.slot.lock().signaled
    }

    /// Block until signaled or until `live` goes false
    pub fn wait(&self, live: &AtomicBool) {
        let mut slot = self.slot.lock();
        while !slot.signaled && live.load(Ordering::Acquire) {
            self.wake.wait_for(&mut slot, WAIT_RECHECK);
        }
    }
}

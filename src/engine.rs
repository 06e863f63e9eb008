//! Translation engine
//!
//! A single worker thread owns the open input port, the translator state and
//! the keystroke sink. Everything else talks to it through [`Engine`]:
//! device requests go through the [`DeviceSwitch`] mailbox, setting changes
//! are validated and swapped in under a lock, and the worker reports back on
//! an event channel.
//!
//! # Lifecycle
//!
//! ```text
//! AwaitingFirstDevice -> SwitchingDevice -> Listening(d) -> SwitchingDevice -> Listening(d') ...
//!          \________________________\_______________\________> ShuttingDown
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::error::{ConfigError, EngineError, PortError};
use crate::keys::SymbolTable;
use crate::midi::{format_hex, ChannelMessage, MessageKind};
use crate::port::{Device, DeviceId, InputBackend, InputHandle};
use crate::sink::KeySink;
use crate::switch::DeviceSwitch;
use crate::translator::{transpose_for_middle_c, NoteRange, TranslationSettings, Translator};

/// Most queued messages played after a switch is requested
const BACKLOG_LIMIT: usize = 64;

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub settings: TranslationSettings,
    pub symbols: SymbolTable,
    /// Sleep between empty polls
    pub poll_interval: Duration,
    /// Hold after each note press so the target application registers it
    pub press_delay: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settings: TranslationSettings::default(),
            symbols: SymbolTable::default(),
            poll_interval: Duration::from_millis(1),
            press_delay: Duration::from_millis(30),
        }
    }
}

/// Where the worker is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// No device open, waiting for a request
    AwaitingFirstDevice,
    Listening(Device),
    /// Closing the old port and opening the requested one
    SwitchingDevice,
    ShuttingDown,
}

/// Notifications from the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Listening(Device),
    /// The request was dropped; the engine waits for the next one
    OpenFailed { device: DeviceId, error: PortError },
    /// An "already open" report was cleared by resetting the driver
    Recovered(DeviceId),
    Closed(Device),
    Stopped,
}

struct Shared {
    live: AtomicBool,
    switch: DeviceSwitch,
    settings: RwLock<TranslationSettings>,
    state: Mutex<EngineState>,
    symbols: Arc<SymbolTable>,
}

/// Handle to the running engine
///
/// Dropping it shuts the engine down.
pub struct Engine {
    shared: Arc<Shared>,
    events: Option<Receiver<EngineEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Validate the options and start the worker thread
    ///
    /// The worker idles until the first [`Engine::request_device`].
    pub fn spawn<B, S>(backend: B, sink: S, options: EngineOptions) -> Result<Self, EngineError>
    where
        B: InputBackend + 'static,
        S: KeySink + 'static,
    {
        if options.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval.into());
        }
        options.settings.validate(options.symbols.len())?;

        let symbols = Arc::new(options.symbols);
        let shared = Arc::new(Shared {
            live: AtomicBool::new(true),
            switch: DeviceSwitch::new(),
            settings: RwLock::new(options.settings),
            state: Mutex::new(EngineState::AwaitingFirstDevice),
            symbols: Arc::clone(&symbols),
        });

        let (event_tx, event_rx) = unbounded();
        let worker = Worker {
            shared: Arc::clone(&shared),
            backend,
            sink,
            translator: Translator::new(symbols),
            events: event_tx,
            poll_interval: options.poll_interval,
            press_delay: options.press_delay,
        };

        let handle = thread::Builder::new()
            .name("bardkeys-engine".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            events: Some(event_rx),
            worker: Some(handle),
        })
    }

    /// Listen to `id`, replacing whatever is open. Returns immediately.
    pub fn request_device(&self, id: DeviceId) {
        debug!("Device {} requested", id);
        self.shared.switch.request(id);
    }

    /// Take the event receiver (only one consumer gets events)
    pub fn take_event_receiver(&mut self) -> Option<Receiver<EngineEvent>> {
        self.events.take()
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.lock().clone()
    }

    /// The device currently being listened to
    pub fn current_device(&self) -> Option<Device> {
        match &*self.shared.state.lock() {
            EngineState::Listening(device) => Some(device.clone()),
            _ => None,
        }
    }

    /// Snapshot of the live settings
    pub fn settings(&self) -> TranslationSettings {
        *self.shared.settings.read()
    }

    /// Size of the symbol table the settings are checked against
    pub fn symbol_count(&self) -> usize {
        self.shared.symbols.len()
    }

    /// Replace all settings at once
    pub fn apply_settings(&self, settings: TranslationSettings) -> Result<(), ConfigError> {
        self.update(|s| *s = settings)
    }

    pub fn set_transpose(&self, transpose: i32) -> Result<(), ConfigError> {
        self.update(|s| s.transpose = transpose)
    }

    /// Treat MIDI note `middle_c` as middle C (note 60)
    pub fn set_middle_c(&self, middle_c: i32) -> Result<(), ConfigError> {
        let transpose = transpose_for_middle_c(middle_c)?;
        self.set_transpose(transpose)
    }

    pub fn set_period(&self, period: i32) -> Result<(), ConfigError> {
        self.update(|s| s.period = period)
    }

    pub fn set_note_window(&self, root_note: i32, max_note: i32) -> Result<(), ConfigError> {
        self.update(|s| {
            s.root_note = root_note;
            s.max_note = max_note;
        })
    }

    pub fn set_note_range(&self, note_range: NoteRange) -> Result<(), ConfigError> {
        self.update(|s| s.note_range = note_range)
    }

    pub fn set_rock_octave(&self, enabled: bool) -> Result<(), ConfigError> {
        self.update(|s| s.rock_octave_enabled = enabled)
    }

    pub fn set_pitch_bend(&self, enabled: bool) -> Result<(), ConfigError> {
        self.update(|s| s.pitch_bend_enabled = enabled)
    }

    pub fn set_modifier_cc(&self, controller: Option<u8>) -> Result<(), ConfigError> {
        self.update(|s| s.modifier_cc = controller)
    }

    /// Stop the worker, close the port and release the driver
    ///
    /// Blocks until the worker thread has exited.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn update(&self, change: impl FnOnce(&mut TranslationSettings)) -> Result<(), ConfigError> {
        let mut settings = self.shared.settings.write();
        let mut next = *settings;
        change(&mut next);
        next.validate(self.shared.symbols.len())?;

        if next != *settings {
            debug!("Settings updated: {:?}", next);
        }
        *settings = next;
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        info!("Stopping engine...");
        self.shared.live.store(false, Ordering::Release);
        self.shared.switch.wake();

        if worker.join().is_err() {
            error!("Engine thread panicked");
        }
        info!("Engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread
struct Worker<B, S> {
    shared: Arc<Shared>,
    backend: B,
    sink: S,
    translator: Translator,
    events: Sender<EngineEvent>,
    poll_interval: Duration,
    press_delay: Duration,
}

impl<B: InputBackend, S: KeySink> Worker<B, S> {
    fn run(mut self) {
        debug!("Engine thread started (sink: {})", self.sink.name());

        while self.live() {
            self.shared.switch.wait(&self.shared.live);
            if !self.live() {
                break;
            }

            // Shutdown wakes us without a request
            let Some(id) = self.shared.switch.take() else {
                continue;
            };

            self.set_state(EngineState::SwitchingDevice);
            match self.open(id) {
                Ok(handle) => self.listen(handle),
                Err(error) => {
                    warn!("Failed to open MIDI device {}: {}", id, error);
                    self.emit(EngineEvent::OpenFailed { device: id, error });
                    self.set_state(EngineState::AwaitingFirstDevice);
                }
            }
        }

        self.set_state(EngineState::ShuttingDown);
        self.emit(EngineEvent::Stopped);
        debug!("Engine thread exiting");
    }

    fn live(&self) -> bool {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Open `id`, resetting the driver once if it claims the device is still open
    fn open(&mut self, id: DeviceId) -> Result<Box<dyn InputHandle>, PortError> {
        match self.backend.open(id) {
            Err(PortError::AlreadyOpen(_)) => {
                warn!("Driver still holds device {}, resetting MIDI subsystem", id);
                self.backend.reset()?;
                let handle = self.backend.open(id)?;
                self.emit(EngineEvent::Recovered(id));
                Ok(handle)
            }
            other => other,
        }
    }

    fn listen(&mut self, mut handle: Box<dyn InputHandle>) {
        let device = handle.device().clone();
        info!("🎹 Listening to {}", device);
        self.set_state(EngineState::Listening(device.clone()));
        self.emit(EngineEvent::Listening(device.clone()));

        while self.live() && !self.shared.switch.is_signaled() {
            self.drain(handle.as_mut());
            thread::sleep(self.poll_interval);
        }

        // Whatever arrived before the switch still gets played, up to a limit
        self.drain_backlog(handle.as_mut());

        debug!(
            "Closing {}: octave shift {}, bend {:?}, rest {:?} (held {:?})",
            device,
            self.translator.octave_shift(),
            self.translator.last_bend(),
            self.translator.rest_selection(),
            self.translator.held_modifier()
        );
        for action in self.translator.release_held() {
            self.sink.apply(action);
        }

        self.set_state(EngineState::SwitchingDevice);
        handle.close();
        info!("Closed {}", device);
        self.emit(EngineEvent::Closed(device));
    }

    /// Play everything waiting, stopping early for a switch or shutdown
    fn drain(&mut self, handle: &mut dyn InputHandle) {
        while self.live() && !self.shared.switch.is_signaled() {
            let Some(raw) = handle.poll() else {
                break;
            };
            self.dispatch(&raw);
        }
    }

    fn drain_backlog(&mut self, handle: &mut dyn InputHandle) {
        let mut played = 0;
        while self.live() && played < BACKLOG_LIMIT {
            let Some(raw) = handle.poll() else {
                return;
            };
            self.dispatch(&raw);
            played += 1;
        }
        if played == BACKLOG_LIMIT {
            warn!("Input still busy after {} messages, dropping the rest", BACKLOG_LIMIT);
        }
    }

    fn dispatch(&mut self, raw: &[u8]) {
        let Some(message) = ChannelMessage::parse(raw) else {
            trace!("Skipping undecodable MIDI: {}", format_hex(raw));
            return;
        };
        trace!("MIDI in: {} => {}", format_hex(raw), message);

        let settings = *self.shared.settings.read();
        for action in self.translator.translate(&settings, &message) {
            debug!("Key {} ({})", action, message);
            self.sink.apply(action);

            if action.is_press()
                && message.kind == MessageKind::NoteOn
                && !self.press_delay.is_zero()
            {
                thread::sleep(self.press_delay);
            }
        }
    }

    fn set_state(&self, state: EngineState) {
        *self.shared.state.lock() = state;
    }

    fn emit(&self, event: EngineEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

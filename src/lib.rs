//! Bardkeys - play in-game instruments from a MIDI controller
//!
//! Listens to one MIDI input at a time and turns notes, pitch bends and a
//! modifier controller into keystrokes for the application in focus.

pub mod cli;
pub mod config;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod keys;
pub mod midi;
pub mod paths;
pub mod port;
pub mod sink;
pub mod switch;
pub mod translator;

pub use engine::{Engine, EngineEvent, EngineOptions, EngineState};
pub use error::{ConfigError, EngineError, PortError};
pub use keys::{KeyAction, KeyId, SymbolTable};
pub use midi::{ChannelMessage, MessageKind};
pub use port::{Device, DeviceId, InputBackend, InputHandle};
pub use sink::KeySink;
pub use translator::{NoteRange, TranslationSettings, Translator};

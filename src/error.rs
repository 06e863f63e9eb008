//! Error types

use thiserror::Error;

use crate::port::DeviceId;

/// Rejected configuration. Live settings are never touched when one of these
/// is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("period must be between 1 and {max} (got {value})")]
    PeriodOutOfRange { value: i32, max: usize },

    #[error("root note {root} is above max note {max}")]
    InvertedWindow { root: i32, max: i32 },

    #[error("note window {root}..={max} is wider than the {symbols} available symbols")]
    WindowTooWide { root: i32, max: i32, symbols: usize },

    #[error("note window {root}..={max} must lie within 0..=127")]
    WindowOutOfRange { root: i32, max: i32 },

    #[error("transpose must be between -127 and 127 (got {0})")]
    TransposeOutOfRange(i32),

    #[error("middle C must be between 0 and 127 (got {0})")]
    MiddleCOutOfRange(i32),

    #[error("modifier controller must be between 0 and 127 (got {0})")]
    ControllerOutOfRange(u8),

    #[error("symbol '{0}' has no key of its own")]
    UnmappableSymbol(char),

    #[error("symbol table is empty")]
    EmptySymbolTable,

    #[error("poll interval must be at least 1 ms")]
    ZeroPollInterval,
}

/// Errors reported by an input backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The driver still believes it holds this device
    #[error("device {0} is already open")]
    AlreadyOpen(DeviceId),

    #[error("device {0} not found")]
    NotFound(DeviceId),

    #[error("failed to initialize MIDI input: {0}")]
    Init(String),

    #[error("failed to connect to device {device}: {reason}")]
    Connect { device: DeviceId, reason: String },
}

/// Errors raised while starting the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no MIDI input devices found")]
    NoDevices,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

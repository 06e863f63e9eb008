//! Configuration management for bardkeys
//!
//! Handles loading, parsing, validation and hot-reloading of the YAML
//! configuration file. Every section is optional.

pub mod watcher;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::engine::EngineOptions;
use crate::error::ConfigError;
use crate::keys::{SymbolTable, DEFAULT_SYMBOLS};
use crate::port::{find_device, Device, DeviceId};
use crate::translator::{transpose_for_middle_c, NoteRange, TranslationSettings};

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub translation: TranslationConfig,
    pub keys: KeysConfig,
}

/// MIDI input configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Input to open at startup; the first device when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSelector>,
    pub poll_interval_ms: u64,
}

/// Device selection, by index or by name substring
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DeviceSelector {
    Index(usize),
    Name(String),
}

/// Note translation configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// MIDI note to treat as middle C; overrides `transpose` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_c: Option<i32>,
    pub transpose: i32,
    pub period: i32,
    pub root_note: i32,
    pub max_note: i32,
    pub note_range: NoteRange,
    pub rock_octave: bool,
    pub pitch_bend: bool,
    pub modifier_cc: Option<u8>,
}

/// Keystroke output configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeysConfig {
    /// One character per semitone above the root note
    pub symbols: String,
    pub press_delay_ms: u64,
    pub output: OutputKind,
}

/// Where keystrokes go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Log only
    #[default]
    Console,
    /// Inject into the foreground application
    System,
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty file is a valid, all-default config
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.midi.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        let symbols = self.keys.symbol_table()?;
        self.translation.to_settings()?.validate(symbols.len())
    }

    /// Engine options described by this config
    pub fn engine_options(&self) -> Result<EngineOptions, ConfigError> {
        self.validate()?;
        let symbols = self.keys.symbol_table()?;
        let settings = self.translation.to_settings()?;

        Ok(EngineOptions {
            settings,
            symbols,
            poll_interval: Duration::from_millis(self.midi.poll_interval_ms),
            press_delay: Duration::from_millis(self.keys.press_delay_ms),
        })
    }
}

impl DeviceSelector {
    /// Pick the matching device out of an enumeration
    pub fn resolve<'a>(&self, devices: &'a [Device]) -> Option<&'a Device> {
        match self {
            DeviceSelector::Index(index) => devices.iter().find(|d| d.id == DeviceId(*index)),
            DeviceSelector::Name(name) => find_device(devices, name),
        }
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSelector::Index(index) => write!(f, "#{}", index),
            DeviceSelector::Name(name) => write!(f, "'{}'", name),
        }
    }
}

impl TranslationConfig {
    /// Resolve into engine settings (not yet checked against a symbol table)
    pub fn to_settings(&self) -> Result<TranslationSettings, ConfigError> {
        let transpose = match self.middle_c {
            Some(middle_c) => transpose_for_middle_c(middle_c)?,
            None => self.transpose,
        };

        Ok(TranslationSettings {
            transpose,
            period: self.period,
            root_note: self.root_note,
            max_note: self.max_note,
            note_range: self.note_range,
            rock_octave_enabled: self.rock_octave,
            pitch_bend_enabled: self.pitch_bend,
            modifier_cc: self.modifier_cc,
        })
    }
}

impl KeysConfig {
    pub fn symbol_table(&self) -> Result<SymbolTable, ConfigError> {
        SymbolTable::from_chars(&self.symbols)
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            device: None,
            poll_interval_ms: 1,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        let defaults = TranslationSettings::default();
        Self {
            middle_c: None,
            transpose: defaults.transpose,
            period: defaults.period,
            root_note: defaults.root_note,
            max_note: defaults.max_note,
            note_range: defaults.note_range,
            rock_octave: defaults.rock_octave_enabled,
            pitch_bend: defaults.pitch_bend_enabled,
            modifier_cc: defaults.modifier_cc,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.to_string(),
            press_delay_ms: 30,
            output: OutputKind::Console,
        }
    }
}

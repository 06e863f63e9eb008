use std::fs;
use std::time::Duration;

use tempfile::TempDir;

use bardkeys::config::{AppConfig, DeviceSelector, OutputKind};
use bardkeys::NoteRange;

const SAMPLE: &str = r#"
midi:
  device: "Rock Band"
  poll_interval_ms: 2

translation:
  transpose: -5
  period: 7
  root_note: 60
  max_note: 72
  note_range: clamp
  rock_octave: true
  pitch_bend: false
  modifier_cc: 64

keys:
  symbols: "qwertyuiop[]as"
  press_delay_ms: 0
  output: system
"#;

#[tokio::test]
async fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, SAMPLE).unwrap();

    let config = AppConfig::load(&path).await.unwrap();
    assert_eq!(config.midi.device, Some(DeviceSelector::Name("Rock Band".into())));
    assert_eq!(config.keys.output, OutputKind::System);

    let options = config.engine_options().unwrap();
    assert_eq!(options.settings.transpose, -5);
    assert_eq!(options.settings.note_range, NoteRange::Clamp);
    assert!(!options.settings.pitch_bend_enabled);
    assert_eq!(options.settings.modifier_cc, Some(64));
    assert_eq!(options.symbols.len(), 14);
    assert_eq!(options.poll_interval, Duration::from_millis(2));
    assert_eq!(options.press_delay, Duration::ZERO);
}

#[tokio::test]
async fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.yaml");

    assert!(AppConfig::load(&path).await.is_err());
    assert_eq!(AppConfig::load_or_default(&path).await.unwrap(), AppConfig::default());
}

#[tokio::test]
async fn test_invalid_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "translation:\n  root_note: 90\n  max_note: 80\n").unwrap();

    let err = AppConfig::load(&path).await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("broken.yaml"), "{}", message);
    assert!(message.contains("root note 90"), "{}", message);
}

#[tokio::test]
async fn test_unmappable_symbol_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "keys:\n  symbols: \"abc!\"\n").unwrap();

    let err = AppConfig::load_or_default(&path).await.unwrap_err();
    assert!(format!("{:#}", err).contains("'!'"));
}

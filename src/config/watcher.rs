//! Configuration file watcher for hot-reload support

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Wait for editors to finish writing before reloading
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and yields each successfully reloaded config
///
/// Invalid edits are logged and skipped; the previous config stays in force.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Start watching `config_path`
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors which save by rename keep triggering reloads.
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = config_path.file_name().map(|n| n.to_os_string());

        let (tx, rx) = mpsc::channel(8);
        let reload_pending = Arc::new(AtomicBool::new(false));

        // notify callbacks run on their own OS thread, outside the runtime
        let runtime = tokio::runtime::Handle::current();

        let path = config_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Config watch error: {}", e);
                    return;
                }
            };

            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            let ours = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
            if !ours {
                return;
            }

            // One reload per burst of events
            if reload_pending.swap(true, Ordering::AcqRel) {
                return;
            }
            debug!("Config file changed: {:?}", event.paths);

            let path = path.clone();
            let tx = tx.clone();
            let reload_pending = Arc::clone(&reload_pending);
            runtime.spawn(async move {
                tokio::time::sleep(DEBOUNCE).await;
                reload_pending.store(false, Ordering::Release);

                match AppConfig::load(&path).await {
                    Ok(config) => {
                        info!("🔄 Configuration reloaded");
                        if tx.send(config).await.is_err() {
                            debug!("Config receiver dropped");
                        }
                    }
                    Err(e) => warn!("Failed to reload config (keeping old config): {:#}", e),
                }
            });
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", dir.display()))?;

        info!("Watching {} for changes", config_path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next valid config
    ///
    /// Returns None once the watcher has shut down.
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceSelector;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reload_on_modify() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "translation:\n  transpose: 0\n")?;

        let mut watcher = ConfigWatcher::new(&config_path)?;

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(
            &config_path,
            "midi:\n  device: keyboard\ntranslation:\n  transpose: 5\n",
        )?;

        // A partial write may surface first; wait for the final content
        let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match watcher.next_config().await {
                    Some(config) if config.translation.transpose == 5 => return Some(config),
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await?
        .context("watcher closed")?;

        assert_eq!(reloaded.translation.transpose, 5);
        assert_eq!(reloaded.midi.device, Some(DeviceSelector::Name("keyboard".into())));
        Ok(())
    }
}

//! Application path management for portable and installed modes.
//!
//! - **Development**: debug builds pick up `config.yaml` from the current
//!   working directory when one exists.
//! - **Portable mode**: a `.portable` marker next to the executable keeps
//!   the config and logs beside it.
//! - **Installed mode** (default): data lives under the platform data
//!   directory (`%APPDATA%\Bardkeys` on Windows).

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Bardkeys";

const CONFIG_FILE: &str = "config.yaml";

/// Where the config file and logs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config: PathBuf,
    pub logs_dir: PathBuf,
    /// Config next to the executable (or in the working directory)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the paths for this run.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] DEV mode, using {}", cwd.display());
                return Self::portable(&cwd);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] PORTABLE mode (.portable marker found)");
            return Self::portable(&exe_dir);
        }

        let base = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        Self {
            config: base.join(CONFIG_FILE),
            logs_dir: base.join("logs"),
            is_portable: false,
        }
    }

    /// Paths rooted at `dir`
    pub fn portable(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Paths for an explicitly chosen config file; logs go beside it
    pub fn with_config(config: PathBuf) -> Self {
        let base = config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            config,
            logs_dir: base.join("logs"),
            is_portable: true,
        }
    }

    /// Create the logs directory, and the config directory in installed mode
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir).with_context(|| {
                format!("Failed to create logs directory: {}", self.logs_dir.display())
            })?;
        }

        if !self.is_portable {
            if let Some(parent) = self.config.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        Ok(())
    }
}

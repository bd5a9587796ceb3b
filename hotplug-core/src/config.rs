//! Watch configuration, stored as TOML

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::scanner::Scanner;

/// Default polling interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default plugin directory, relative to the working directory
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Where to look for plugins and how often to check them for changes.
///
/// Stored as TOML, by default in `~/.config/hotplug/watch.toml`:
///
/// ```toml
/// plugin_dir = "plugins"
/// extension = "so"
/// poll_interval_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory to scan, resolved against the working directory
    pub plugin_dir: PathBuf,

    /// Library extension without the dot; platform default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Delay between polls
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
            extension: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WatchConfig {
    /// Default config file location; see [`hotplug_paths::config_dir`].
    pub fn default_path() -> PathBuf {
        hotplug_paths::watch_config_path()
    }

    /// Load from [`default_path`](Self::default_path).
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&Self::default_path())
    }

    /// Load config from a TOML file.
    ///
    /// Returns the default config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No watch config, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Scanner matching the configured extension.
    pub fn scanner(&self) -> Scanner {
        match &self.extension {
            Some(extension) => Scanner::with_extension(extension.clone()),
            None => Scanner::new(),
        }
    }
}

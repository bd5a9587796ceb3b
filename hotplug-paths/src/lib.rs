//! Where hotplug keeps its files.
//!
//! The watch config lives in one directory, resolved in this order:
//!
//! 1. `$HOTPLUG_CONFIG_DIR`, used verbatim (handy for isolated tests and CI)
//! 2. `$XDG_CONFIG_HOME/hotplug`
//! 3. `~/.config/hotplug`
//! 4. `.config/hotplug`, relative to the working directory

use std::path::PathBuf;

/// Overrides the config directory when set.
pub const CONFIG_DIR_ENV: &str = "HOTPLUG_CONFIG_DIR";

/// File name of the watch config inside [`config_dir`].
pub const WATCH_CONFIG_FILE: &str = "watch.toml";

/// Directory holding hotplug's configuration.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = non_empty_var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(xdg_config) = non_empty_var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config).join("hotplug");
    }
    dirs::home_dir()
        .map(|home| home.join(".config/hotplug"))
        .unwrap_or_else(|| PathBuf::from(".config/hotplug"))
}

/// Full path of the watch config file.
///
/// ```
/// let path = hotplug_paths::watch_config_path();
/// assert!(path.ends_with("watch.toml"));
/// ```
pub fn watch_config_path() -> PathBuf {
    config_dir().join(WATCH_CONFIG_FILE)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

//! Plugin handle error kinds

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text returned by [`describe_code`] for codes outside the known range.
pub const UNKNOWN_ERROR: &str = "Unknown plugin error";

/// Last error recorded on a [`Plugin`](super::Plugin) handle.
///
/// Handle operations report success through their return value and leave
/// the reason here, so a caller can check the `bool`/`Option` first and
/// ask for [`last_error`](super::Plugin::last_error) only for diagnostics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PluginErrorKind {
    /// The last operation that records errors succeeded
    #[default]
    #[error("No error")]
    None,
    /// No file path is recorded for the plugin
    #[error("No file path recorded for the plugin")]
    NoPath,
    /// The library failed to load
    #[error("Plugin library failed to load")]
    LoadFailed,
    /// No library is loaded
    #[error("No plugin library is loaded")]
    NoModuleLoaded,
    /// The library failed to reload
    #[error("Plugin library failed to reload")]
    ReloadFailed,
}

impl PluginErrorKind {
    /// Every kind, in code order.
    pub const ALL: [PluginErrorKind; 5] = [
        PluginErrorKind::None,
        PluginErrorKind::NoPath,
        PluginErrorKind::LoadFailed,
        PluginErrorKind::NoModuleLoaded,
        PluginErrorKind::ReloadFailed,
    ];

    /// Human readable description of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            PluginErrorKind::None => "No error",
            PluginErrorKind::NoPath => "No file path recorded for the plugin",
            PluginErrorKind::LoadFailed => "Plugin library failed to load",
            PluginErrorKind::NoModuleLoaded => "No plugin library is loaded",
            PluginErrorKind::ReloadFailed => "Plugin library failed to reload",
        }
    }

    /// Stable numeric code, suitable for logs and FFI boundaries.
    pub const fn code(self) -> u8 {
        match self {
            PluginErrorKind::None => 0,
            PluginErrorKind::NoPath => 1,
            PluginErrorKind::LoadFailed => 2,
            PluginErrorKind::NoModuleLoaded => 3,
            PluginErrorKind::ReloadFailed => 4,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PluginErrorKind::None),
            1 => Some(PluginErrorKind::NoPath),
            2 => Some(PluginErrorKind::LoadFailed),
            3 => Some(PluginErrorKind::NoModuleLoaded),
            4 => Some(PluginErrorKind::ReloadFailed),
            _ => None,
        }
    }

    pub const fn is_error(self) -> bool {
        !matches!(self, PluginErrorKind::None)
    }
}

/// Describe a raw error code, falling back to [`UNKNOWN_ERROR`].
pub fn describe_code(code: u8) -> &'static str {
    PluginErrorKind::from_code(code).map_or(UNKNOWN_ERROR, PluginErrorKind::as_str)
}

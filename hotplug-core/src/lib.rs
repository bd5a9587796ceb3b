//! hotplug-core: load, watch and hot-reload native plugins
//!
//! This crate provides:
//!
//! - **Plugin handles** - [`Plugin`] owns one shared library and can reload it
//!   in place when the file on disk changes
//! - **Discovery** - [`scanner::scan`] walks a directory tree for libraries
//!   with a given extension
//! - **Collections** - [`PluginSet`] ties the two together, keyed by file stem
//! - **Polling** - [`Watcher`] and [`sleep_ms`] pace a reload loop
//!
//! # Quick Start
//!
//! ```no_run
//! use hotplug_core::{PluginSet, WatchConfig, Watcher};
//!
//! let config = WatchConfig::load_default().unwrap_or_default();
//! let mut set = PluginSet::new(config.scanner());
//! set.load_dir(&config.plugin_dir, &mut ());
//!
//! Watcher::from_config(&config).run(&mut set, &mut (), |_reloaded| true);
//! ```
//!
//! Everything is synchronous. Handles carry no locks; share one across
//! threads only behind the caller's own synchronization.

pub mod config;
pub mod error;
pub mod plugins;
pub mod scanner;
pub mod watch;

pub use config::WatchConfig;
pub use error::ConfigError;
pub use plugins::{
    Callbacks, ModuleLoader, NativeLoader, Plugin, PluginErrorKind, PluginEvents, PluginInfo,
    PluginSet,
};
pub use scanner::{NATIVE_EXTENSION, Scanner, scan};
pub use watch::{Watcher, sleep_ms};

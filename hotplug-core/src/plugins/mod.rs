//! Plugin handles and collections
//!
//! - [`Plugin`]: owns one loaded module (load, change detection, reload, clear)
//! - [`PluginSet`]: plugins discovered in a directory, keyed by name
//! - [`PluginEvents`]: load/unload notifications, with a `reloading` flag
//! - [`ModuleLoader`]: the dynamic-loading capability ([`NativeLoader`] or [`MockLoader`])
//! - [`PluginErrorKind`]: the error recorded by the last handle operation
//!
//! # Example
//!
//! ```no_run
//! use hotplug_core::plugins::{Callbacks, Plugin};
//!
//! let mut events = Callbacks::new().loaded(|plugin: &Plugin, reloading| {
//!     println!("{:?} loaded (reloading: {reloading})", plugin.path());
//! });
//!
//! let mut plugin = Plugin::new();
//! if !plugin.load("plugins/libgame.so", &mut events) {
//!     eprintln!("{}", plugin.last_error());
//! }
//!
//! loop {
//!     if plugin.changed() && !plugin.reload(&mut events) {
//!         eprintln!("{}", plugin.last_error());
//!     }
//!     hotplug_core::sleep_ms(500);
//! }
//! ```

mod error;
mod handle;
mod loader;
mod set;

pub use error::{PluginErrorKind, UNKNOWN_ERROR, describe_code};
pub use handle::{Callbacks, Plugin, PluginEvents, PluginInfo};
pub use loader::{LoaderCall, MockLoadError, MockLoader, MockModule, ModuleLoader, NativeLoader};
pub use set::PluginSet;

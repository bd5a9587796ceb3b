//! Plugin - owns one loaded module and its reload lifecycle

use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PluginErrorKind;
use super::loader::{ModuleLoader, NativeLoader};

/// Lifecycle notifications fired by [`Plugin`].
///
/// `reloading` is `true` when the event is part of a hot swap, so one
/// implementation can skip one-time setup on the second and later loads.
/// Both methods default to doing nothing; `()` is the "no callbacks" value.
pub trait PluginEvents<L: ModuleLoader> {
    /// Fired after a module has been opened and recorded on the handle.
    fn on_load(&mut self, plugin: &Plugin<L>, reloading: bool) {
        let _ = (plugin, reloading);
    }

    /// Fired before the handle releases its module.
    fn on_unload(&mut self, plugin: &Plugin<L>, reloading: bool) {
        let _ = (plugin, reloading);
    }
}

impl<L: ModuleLoader> PluginEvents<L> for () {}

type EventFn<'a, L> = Box<dyn FnMut(&Plugin<L>, bool) + 'a>;

/// [`PluginEvents`] built from closures.
///
/// ```ignore
/// let mut events = Callbacks::new()
///     .loaded(|plugin, reloading| println!("loaded {:?} ({reloading})", plugin.path()))
///     .unloaded(|_, _| println!("unloading"));
/// plugin.load("plugins/libgame.so", &mut events);
/// ```
pub struct Callbacks<'a, L: ModuleLoader = NativeLoader> {
    on_load: Option<EventFn<'a, L>>,
    on_unload: Option<EventFn<'a, L>>,
}

impl<'a, L: ModuleLoader> Callbacks<'a, L> {
    pub fn new() -> Self {
        Self {
            on_load: None,
            on_unload: None,
        }
    }

    /// Closure run on every load event.
    pub fn loaded(mut self, f: impl FnMut(&Plugin<L>, bool) + 'a) -> Self {
        self.on_load = Some(Box::new(f));
        self
    }

    /// Closure run on every unload event.
    pub fn unloaded(mut self, f: impl FnMut(&Plugin<L>, bool) + 'a) -> Self {
        self.on_unload = Some(Box::new(f));
        self
    }
}

impl<L: ModuleLoader> Default for Callbacks<'_, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ModuleLoader> PluginEvents<L> for Callbacks<'_, L> {
    fn on_load(&mut self, plugin: &Plugin<L>, reloading: bool) {
        if let Some(f) = self.on_load.as_mut() {
            f(plugin, reloading);
        }
    }

    fn on_unload(&mut self, plugin: &Plugin<L>, reloading: bool) {
        if let Some(f) = self.on_unload.as_mut() {
            f(plugin, reloading);
        }
    }
}

/// Snapshot of a plugin handle for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Path the module was loaded from
    pub path: Option<PathBuf>,
    /// Whether a module is currently held
    pub loaded: bool,
    /// Last observed modification time of `path`
    pub last_write: Option<DateTime<Utc>>,
    /// Error recorded by the most recent operation
    pub error: PluginErrorKind,
}

/// One dynamically loaded module.
///
/// A handle starts empty, is populated by [`load`](Self::load), may be hot
/// swapped any number of times with [`reload`](Self::reload), and goes back
/// to empty on [`clear`](Self::clear). Fallible operations return `bool` or
/// `Option` and record the reason, readable through
/// [`error_kind`](Self::error_kind) and [`last_error`](Self::last_error).
///
/// Handles are not internally synchronized; callers sharing one across
/// threads must serialize access themselves.
pub struct Plugin<L: ModuleLoader = NativeLoader> {
    loader: L,
    module: Option<L::Module>,
    path: Option<PathBuf>,
    last_write: Option<SystemTime>,
    error: PluginErrorKind,
}

impl Plugin<NativeLoader> {
    /// Create an empty handle backed by the native loader.
    pub fn new() -> Self {
        Self::with_loader(NativeLoader)
    }
}

impl Default for Plugin<NativeLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ModuleLoader> Plugin<L> {
    /// Create an empty handle that opens modules through `loader`.
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            module: None,
            path: None,
            last_write: None,
            error: PluginErrorKind::None,
        }
    }

    /// Load the module at `path`.
    ///
    /// On failure the recorded path and timestamp are left as they were and
    /// the error becomes [`PluginErrorKind::LoadFailed`]. On success the
    /// previous module (if any) is released, `path` and its modification
    /// time are recorded, and `on_load(reloading = false)` fires.
    pub fn load<E>(&mut self, path: impl AsRef<Path>, events: &mut E) -> bool
    where
        E: PluginEvents<L> + ?Sized,
    {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            tracing::warn!("Refusing to load a plugin from an empty path");
            self.error = PluginErrorKind::LoadFailed;
            return false;
        }

        let module = match self.loader.open(path) {
            Ok(module) => module,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load plugin library");
                self.error = PluginErrorKind::LoadFailed;
                return false;
            }
        };

        if let Some(previous) = self.module.replace(module) {
            self.loader.close(previous);
        }
        self.path = Some(path.to_path_buf());
        if let Some(modified) = modified_time(path) {
            self.last_write = Some(modified);
        }

        tracing::debug!(path = %path.display(), "Plugin loaded");
        events.on_load(self, false);
        true
    }

    /// Check whether the file behind this plugin was modified since the
    /// last observation, and remember the new timestamp if so.
    ///
    /// Without a recorded path this sets [`PluginErrorKind::NoPath`] and
    /// reports no change. A failed metadata query also reports no change.
    pub fn changed(&mut self) -> bool {
        let Some(path) = self.path.as_deref() else {
            self.error = PluginErrorKind::NoPath;
            return false;
        };

        let Some(modified) = modified_time(path) else {
            return false;
        };
        if self.last_write == Some(modified) {
            return false;
        }

        tracing::debug!(path = %path.display(), "Plugin file changed on disk");
        self.last_write = Some(modified);
        true
    }

    /// Release the current module and load a fresh copy from the recorded path.
    ///
    /// `on_unload(reloading = true)` fires while the old module is still
    /// held; it is then released unconditionally. If the new load fails the
    /// handle is left with no module and [`PluginErrorKind::ReloadFailed`].
    /// The old module is never restored.
    pub fn reload<E>(&mut self, events: &mut E) -> bool
    where
        E: PluginEvents<L> + ?Sized,
    {
        let Some(path) = self.path.clone() else {
            self.error = PluginErrorKind::NoPath;
            return false;
        };

        if self.module.is_some() {
            events.on_unload(self, true);
            if let Some(module) = self.module.take() {
                self.loader.close(module);
            }
        }

        match self.loader.open(&path) {
            Ok(module) => {
                self.module = Some(module);
                if let Some(modified) = modified_time(&path) {
                    self.last_write = Some(modified);
                }
                tracing::info!(path = %path.display(), "Plugin reloaded");
                events.on_load(self, true);
                true
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to reload plugin library");
                self.error = PluginErrorKind::ReloadFailed;
                false
            }
        }
    }

    /// Reload only when [`changed`](Self::changed) reports a new timestamp.
    ///
    /// Returns `true` when a reload happened and succeeded.
    pub fn reload_if_changed<E>(&mut self, events: &mut E) -> bool
    where
        E: PluginEvents<L> + ?Sized,
    {
        self.changed() && self.reload(events)
    }

    /// Release everything and return to the empty state.
    ///
    /// `on_unload(reloading = false)` fires first, even when nothing is
    /// loaded. Calling this repeatedly is harmless.
    pub fn clear<E>(&mut self, events: &mut E)
    where
        E: PluginEvents<L> + ?Sized,
    {
        events.on_unload(self, false);

        self.path = None;
        if let Some(module) = self.module.take() {
            self.loader.close(module);
        }
        self.last_write = None;
        self.error = PluginErrorKind::None;
    }

    /// Resolve `name` in the loaded module.
    ///
    /// Without a module this records [`PluginErrorKind::NoModuleLoaded`] and
    /// returns `None`. Otherwise the error is reset before resolving, so a
    /// `None` result with no recorded error means the symbol is missing.
    /// The pointer is the raw symbol address; casting it to a function or
    /// data type is the caller's (unsafe) responsibility, and it must not be
    /// used after the module is reloaded or cleared.
    pub fn get_symbol(&mut self, name: &str) -> Option<NonNull<c_void>> {
        let Some(module) = self.module.as_ref() else {
            self.error = PluginErrorKind::NoModuleLoaded;
            return None;
        };
        self.error = PluginErrorKind::None;
        self.loader.symbol(module, name)
    }

    /// Description of the last recorded error.
    pub fn last_error(&self) -> &'static str {
        self.error.as_str()
    }

    pub fn error_kind(&self) -> PluginErrorKind {
        self.error
    }

    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    /// The loaded module, if any.
    pub fn module(&self) -> Option<&L::Module> {
        self.module.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn last_write(&self) -> Option<SystemTime> {
        self.last_write
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            path: self.path.clone(),
            loaded: self.is_loaded(),
            last_write: self.last_write.map(DateTime::<Utc>::from),
            error: self.error,
        }
    }
}

impl<L: ModuleLoader> Drop for Plugin<L> {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            self.loader.close(module);
        }
    }
}

impl<L: ModuleLoader> fmt::Debug for Plugin<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .field("last_write", &self.last_write)
            .field("error", &self.error)
            .finish()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    match std::fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => Some(modified),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Could not read plugin modification time");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::loader::{LoaderCall, MockLoader};
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records every event together with the handle state seen at that moment.
    #[derive(Default)]
    struct Recorder {
        events: Vec<(&'static str, bool, bool, usize)>,
    }

    impl PluginEvents<MockLoader> for Recorder {
        fn on_load(&mut self, plugin: &Plugin<MockLoader>, reloading: bool) {
            let closed = plugin.loader().close_count();
            self.events
                .push(("load", reloading, plugin.is_loaded(), closed));
        }

        fn on_unload(&mut self, plugin: &Plugin<MockLoader>, reloading: bool) {
            let closed = plugin.loader().close_count();
            self.events
                .push(("unload", reloading, plugin.is_loaded(), closed));
        }
    }

    fn library_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"\x7fELF").unwrap();
        path
    }

    fn bump_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn loaded_plugin(dir: &TempDir) -> (Plugin<MockLoader>, PathBuf) {
        let path = library_file(dir, "libdemo.so");
        let mut plugin = Plugin::with_loader(MockLoader::new());
        assert!(plugin.load(&path, &mut ()));
        (plugin, path)
    }

    #[test]
    fn test_new_plugin_is_empty() {
        let plugin = Plugin::new();
        assert!(!plugin.is_loaded());
        assert!(plugin.path().is_none());
        assert!(plugin.last_write().is_none());
        assert_eq!(plugin.error_kind(), PluginErrorKind::None);
    }

    #[test]
    fn test_load_records_path_and_mtime() {
        let dir = TempDir::new().unwrap();
        let path = library_file(&dir, "libdemo.so");
        bump_mtime(&path, 1_000);

        let mut plugin = Plugin::with_loader(MockLoader::new());
        assert!(plugin.load(&path, &mut ()));

        assert!(plugin.is_loaded());
        assert_eq!(plugin.path(), Some(path.as_path()));
        assert_eq!(
            plugin.last_write(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))
        );
        assert_eq!(plugin.last_error(), PluginErrorKind::None.as_str());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut plugin = Plugin::with_loader(MockLoader::new());

        assert!(!plugin.load(dir.path().join("nope.so"), &mut ()));
        assert_eq!(plugin.error_kind(), PluginErrorKind::LoadFailed);
        assert!(!plugin.is_loaded());
        assert!(plugin.path().is_none());
    }

    #[test]
    fn test_load_empty_path_fails() {
        let mut plugin = Plugin::with_loader(MockLoader::new());
        assert!(!plugin.load("", &mut ()));
        assert_eq!(plugin.error_kind(), PluginErrorKind::LoadFailed);
        assert!(plugin.loader().calls().is_empty());
    }

    #[test]
    fn test_native_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mut plugin = Plugin::new();
        assert!(!plugin.load(dir.path().join("nope.so"), &mut ()));
        assert_eq!(plugin.error_kind(), PluginErrorKind::LoadFailed);
    }

    #[test]
    fn test_failed_load_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        let before = plugin.last_write();

        assert!(!plugin.load(dir.path().join("other.so"), &mut ()));
        assert!(plugin.is_loaded());
        assert_eq!(plugin.path(), Some(path.as_path()));
        assert_eq!(plugin.last_write(), before);
    }

    #[test]
    fn test_load_over_loaded_module_releases_old_one() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, _) = loaded_plugin(&dir);
        let other = library_file(&dir, "libother.so");

        assert!(plugin.load(&other, &mut ()));
        assert_eq!(plugin.loader().open_count(), 1);
        assert_eq!(plugin.path(), Some(other.as_path()));
    }

    #[test]
    fn test_load_fires_on_load_after_state_is_populated() {
        let dir = TempDir::new().unwrap();
        let path = library_file(&dir, "libdemo.so");
        let mut plugin = Plugin::with_loader(MockLoader::new());

        let mut seen = Vec::new();
        let mut events = Callbacks::new().loaded(|plugin: &Plugin<MockLoader>, reloading| {
            seen.push((
                reloading,
                plugin.is_loaded(),
                plugin.path().map(Path::to_path_buf),
                plugin.last_write().is_some(),
            ));
        });
        assert!(plugin.load(&path, &mut events));
        drop(events);

        assert_eq!(seen, vec![(false, true, Some(path), true)]);
    }

    #[test]
    fn test_changed_without_path_sets_no_path() {
        let mut plugin = Plugin::with_loader(MockLoader::new());
        assert!(!plugin.changed());
        assert_eq!(plugin.error_kind(), PluginErrorKind::NoPath);
    }

    #[test]
    fn test_changed_reports_each_timestamp_once() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        assert!(!plugin.changed());

        bump_mtime(&path, 10);
        assert!(plugin.changed());
        assert!(!plugin.changed());

        bump_mtime(&path, 20);
        assert!(plugin.changed());
        assert_eq!(
            plugin.last_write(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(20))
        );
        assert!(!plugin.changed());
        assert!(plugin.is_loaded());
    }

    #[test]
    fn test_changed_with_deleted_file_reports_no_change() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        let before = plugin.last_write();
        std::fs::remove_file(&path).unwrap();

        assert!(!plugin.changed());
        assert_eq!(plugin.last_write(), before);
        assert_eq!(plugin.error_kind(), PluginErrorKind::None);
    }

    #[test]
    fn test_reload_without_path_sets_no_path() {
        let mut plugin = Plugin::with_loader(MockLoader::new());
        let mut recorder = Recorder::default();

        assert!(!plugin.reload(&mut recorder));
        assert_eq!(plugin.error_kind(), PluginErrorKind::NoPath);
        assert!(recorder.events.is_empty());
        assert!(!plugin.is_loaded());
        assert!(plugin.loader().calls().is_empty());
    }

    #[test]
    fn test_reload_event_order() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, _) = loaded_plugin(&dir);
        let mut recorder = Recorder::default();

        assert!(plugin.reload(&mut recorder));

        // unload sees the old module still held and nothing closed yet;
        // load sees the new module after exactly one close.
        assert_eq!(
            recorder.events,
            vec![("unload", true, true, 0), ("load", true, true, 1)]
        );
        assert_eq!(plugin.loader().open_count(), 1);
    }

    #[test]
    fn test_reload_opens_fresh_module() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);

        assert!(plugin.reload(&mut ()));
        assert_eq!(
            plugin.loader().calls(),
            vec![
                LoaderCall::Open {
                    path: path.clone(),
                    id: 1
                },
                LoaderCall::Close { id: 1 },
                LoaderCall::Open { path, id: 2 },
            ]
        );
        assert_eq!(plugin.module().map(|m| m.id), Some(2));
    }

    #[test]
    fn test_reload_refreshes_last_write_without_changed() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        bump_mtime(&path, 77);

        assert!(plugin.reload(&mut ()));
        assert_eq!(
            plugin.last_write(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(77))
        );
        assert!(!plugin.changed());
        assert_eq!(plugin.error_kind(), PluginErrorKind::None);
    }

    #[test]
    fn test_failed_reload_leaves_plugin_unloaded() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        plugin.loader().fail_on(&path);
        let mut recorder = Recorder::default();

        assert!(!plugin.reload(&mut recorder));
        assert_eq!(plugin.error_kind(), PluginErrorKind::ReloadFailed);
        assert!(!plugin.is_loaded());
        assert_eq!(plugin.path(), Some(path.as_path()));
        assert_eq!(recorder.events, vec![("unload", true, true, 0)]);
        assert_eq!(plugin.loader().open_count(), 0);
    }

    #[test]
    fn test_reload_after_failed_reload_recovers() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        plugin.loader().fail_on(&path);
        assert!(!plugin.reload(&mut ()));

        plugin.loader().succeed_on(&path);
        let mut recorder = Recorder::default();
        assert!(plugin.reload(&mut recorder));
        // nothing was held, so no unload event this time
        assert_eq!(recorder.events, vec![("load", true, true, 1)]);
    }

    #[test]
    fn test_reload_if_changed() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        bump_mtime(&path, 100);
        assert!(plugin.reload_if_changed(&mut ()));
        assert!(!plugin.reload_if_changed(&mut ()));
        assert_eq!(plugin.module().map(|m| m.id), Some(2));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, _) = loaded_plugin(&dir);
        let mut recorder = Recorder::default();

        plugin.clear(&mut recorder);
        let first = plugin.info();
        plugin.clear(&mut recorder);

        assert_eq!(plugin.info(), first);
        assert_eq!(
            first,
            PluginInfo {
                path: None,
                loaded: false,
                last_write: None,
                error: PluginErrorKind::None,
            }
        );
        // unload fires every time, even with nothing loaded
        assert_eq!(
            recorder.events,
            vec![("unload", false, true, 0), ("unload", false, false, 1)]
        );
        assert_eq!(plugin.loader().open_count(), 0);
    }

    #[test]
    fn test_cleared_plugin_can_load_again() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, path) = loaded_plugin(&dir);
        plugin.clear(&mut ());
        assert!(plugin.load(&path, &mut ()));
        assert!(plugin.is_loaded());
    }

    #[test]
    fn test_get_symbol_without_module() {
        let mut plugin = Plugin::with_loader(MockLoader::new());
        assert!(plugin.get_symbol("plugin_main").is_none());
        assert_eq!(plugin.error_kind(), PluginErrorKind::NoModuleLoaded);
    }

    #[test]
    fn test_get_symbol_clears_error_before_resolving() {
        let dir = TempDir::new().unwrap();
        let (mut plugin, _) = loaded_plugin(&dir);
        plugin.loader().define_symbol("plugin_main", 0xdead0);

        assert!(!plugin.load("", &mut ()));
        assert_eq!(plugin.error_kind(), PluginErrorKind::LoadFailed);

        assert!(plugin.get_symbol("missing").is_none());
        assert_eq!(plugin.error_kind(), PluginErrorKind::None);

        let found = plugin.get_symbol("plugin_main").unwrap();
        assert_eq!(found.as_ptr() as usize, 0xdead0);
    }

    #[test]
    fn test_drop_releases_module() {
        let dir = TempDir::new().unwrap();
        let (plugin, _) = loaded_plugin(&dir);
        let loader = plugin.loader().clone();
        drop(plugin);
        assert_eq!(loader.open_count(), 0);
    }

    #[test]
    fn test_info_reports_state() {
        let dir = TempDir::new().unwrap();
        let (plugin, path) = loaded_plugin(&dir);
        let info = plugin.info();
        assert!(info.loaded);
        assert_eq!(info.path, Some(path));
        assert!(info.last_write.is_some());
        assert!(format!("{plugin:?}").contains("loaded: true"));
    }

    #[test]
    fn test_dyn_events_are_accepted() {
        let dir = TempDir::new().unwrap();
        let path = library_file(&dir, "libdemo.so");
        let mut plugin = Plugin::with_loader(MockLoader::new());
        let mut recorder = Recorder::default();
        let events: &mut dyn PluginEvents<MockLoader> = &mut recorder;

        assert!(plugin.load(&path, events));
        assert_eq!(recorder.events, vec![("load", false, true, 0)]);
    }
}

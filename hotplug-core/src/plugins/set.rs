//! PluginSet - name-keyed collection of plugins discovered on disk

use std::collections::BTreeMap;
use std::path::Path;

use super::handle::{Plugin, PluginEvents};
use super::loader::{ModuleLoader, NativeLoader};
use crate::scanner::{Scanner, file_stem};

/// Plugins keyed by file stem (`libgame.so` is `libgame`).
///
/// Every plugin shares a clone of one loader. Loading and polling log
/// failures and carry on with the rest of the set.
pub struct PluginSet<L: ModuleLoader + Clone = NativeLoader> {
    loader: L,
    scanner: Scanner,
    plugins: BTreeMap<String, Plugin<L>>,
}

impl PluginSet<NativeLoader> {
    pub fn new(scanner: Scanner) -> Self {
        Self::with_loader(NativeLoader, scanner)
    }
}

impl<L: ModuleLoader + Clone> PluginSet<L> {
    pub fn with_loader(loader: L, scanner: Scanner) -> Self {
        Self {
            loader,
            scanner,
            plugins: BTreeMap::new(),
        }
    }

    /// Scan `root_dir` and load every match not already in the set.
    ///
    /// Returns `false` only if the directory could not be opened.
    pub fn load_dir<E>(&mut self, root_dir: impl AsRef<Path>, events: &mut E) -> bool
    where
        E: PluginEvents<L> + ?Sized,
    {
        let plugins = &mut self.plugins;
        let loader = &self.loader;

        self.scanner.scan(root_dir, |path, name| {
            let name = file_stem(name);
            if let Some(existing) = plugins.get(name) {
                tracing::warn!(
                    plugin = %name,
                    path = %path.display(),
                    existing = ?existing.path(),
                    "Plugin name already taken, skipping"
                );
                return;
            }

            let mut plugin = Plugin::with_loader(loader.clone());
            if plugin.load(path, &mut *events) {
                tracing::info!(plugin = %name, path = %path.display(), "Plugin loaded");
                plugins.insert(name.to_string(), plugin);
            } else {
                tracing::error!(plugin = %name, error = %plugin.last_error(), "Failed to load plugin");
            }
        })
    }

    /// Load a single plugin under `name`, replacing nothing.
    pub fn load<E>(&mut self, name: &str, path: impl AsRef<Path>, events: &mut E) -> bool
    where
        E: PluginEvents<L> + ?Sized,
    {
        if self.plugins.contains_key(name) {
            tracing::warn!(plugin = %name, "Plugin name already taken, skipping");
            return false;
        }

        let mut plugin = Plugin::with_loader(self.loader.clone());
        if !plugin.load(path, &mut *events) {
            return false;
        }
        self.plugins.insert(name.to_string(), plugin);
        true
    }

    /// Reload every plugin whose file changed since the last poll.
    ///
    /// Returns the names that were reloaded successfully. A plugin whose
    /// reload fails stays in the set, unloaded, and is retried on its next
    /// change.
    pub fn poll<E>(&mut self, events: &mut E) -> Vec<String>
    where
        E: PluginEvents<L> + ?Sized,
    {
        let mut reloaded = Vec::new();

        for (name, plugin) in &mut self.plugins {
            if !plugin.changed() {
                continue;
            }
            if plugin.reload(&mut *events) {
                reloaded.push(name.clone());
            } else {
                tracing::error!(plugin = %name, error = %plugin.last_error(), "Plugin reload failed");
            }
        }

        reloaded
    }

    /// Clear and remove one plugin. `false` if it was not in the set.
    pub fn unload<E>(&mut self, name: &str, events: &mut E) -> bool
    where
        E: PluginEvents<L> + ?Sized,
    {
        let Some(mut plugin) = self.plugins.remove(name) else {
            return false;
        };
        plugin.clear(&mut *events);
        tracing::debug!(plugin = %name, "Plugin unloaded");
        true
    }

    /// Clear and remove every plugin.
    pub fn clear<E>(&mut self, events: &mut E)
    where
        E: PluginEvents<L> + ?Sized,
    {
        for (_, mut plugin) in std::mem::take(&mut self.plugins) {
            plugin.clear(&mut *events);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Plugin<L>> {
        self.plugins.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Plugin<L>> {
        self.plugins.get_mut(name)
    }

    /// Plugin names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Plugin<L>)> {
        self.plugins.iter().map(|(name, plugin)| (name.as_str(), plugin))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }
}

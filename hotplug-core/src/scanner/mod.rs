//! Recursive discovery of plugin libraries
//!
//! [`scan`] walks a directory tree depth-first and hands every file with the
//! wanted extension to a callback. It loads nothing itself; callers usually
//! build a [`Plugin`](crate::Plugin) per match (see
//! [`PluginSet`](crate::PluginSet)).
//!
//! # Rules
//!
//! - A relative root is resolved against the current working directory;
//!   an absolute root is used as-is.
//! - Directories whose name starts with `.` are never entered.
//! - Subdirectories that cannot be opened are skipped silently.
//! - Extensions are compared exactly and case-sensitively, without the dot.

mod walk;

use std::path::{Path, PathBuf};

pub(crate) use walk::file_extension;

/// Extension of native dynamic libraries on this platform, without the dot
/// (`so`, `dylib` or `dll`).
pub const NATIVE_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

/// Scan `root_dir` for files ending in `extension`, or [`NATIVE_EXTENSION`]
/// when `None`.
///
/// A relative `root_dir` is resolved against the current working directory;
/// an absolute one is used as-is.
///
/// `on_match` receives the full path and the file name of each match.
/// Returns `false` only when the root itself cannot be resolved or opened;
/// finding nothing is still a successful scan.
pub fn scan<F>(root_dir: impl AsRef<Path>, extension: Option<&str>, mut on_match: F) -> bool
where
    F: FnMut(&Path, &str),
{
    let root_dir = root_dir.as_ref();
    if root_dir.as_os_str().is_empty() {
        tracing::warn!("Refusing to scan an empty plugin directory path");
        return false;
    }

    let current_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Unable to resolve the current directory");
            return false;
        }
    };
    let root = current_dir.join(root_dir);

    let dir = match std::fs::read_dir(&root) {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(dir = %root.display(), error = %e, "Unable to open plugin directory");
            return false;
        }
    };

    let extension = extension.unwrap_or(NATIVE_EXTENSION);
    tracing::debug!(dir = %root.display(), extension, "Scanning for plugins");
    walk::walk_dir(dir, extension, &mut on_match, &|path: &Path| std::fs::read_dir(path));
    true
}

/// A file found by [`Scanner::collect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Full path of the file
    pub path: PathBuf,
    /// File name including extension
    pub name: String,
}

impl Match {
    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.name)
    }
}

/// File name without the final `.ext`, matching what [`scan`] compares.
pub fn file_stem(name: &str) -> &str {
    let extension = file_extension(name);
    if extension.is_empty() && !name.ends_with('.') {
        name
    } else {
        &name[..name.len() - extension.len() - 1]
    }
}

/// Reusable scan settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scanner {
    extension: Option<String>,
}

impl Scanner {
    /// Scanner for native libraries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner for a custom extension (given without the dot).
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
        }
    }

    /// Extension this scanner matches.
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(NATIVE_EXTENSION)
    }

    pub fn scan<F>(&self, root_dir: impl AsRef<Path>, on_match: F) -> bool
    where
        F: FnMut(&Path, &str),
    {
        scan(root_dir, self.extension.as_deref(), on_match)
    }

    /// Gather every match, in walk order. `None` when the root cannot be opened.
    pub fn collect(&self, root_dir: impl AsRef<Path>) -> Option<Vec<Match>> {
        let mut found = Vec::new();
        let ok = self.scan(root_dir, |path, name| {
            found.push(Match {
                path: path.to_path_buf(),
                name: name.to_string(),
            });
        });
        ok.then_some(found)
    }
}

//! Dynamic loading capability used by plugin handles
//!
//! [`Plugin`](super::Plugin) never calls the platform loader directly. It goes
//! through a [`ModuleLoader`], which lets the native `libloading` backend be
//! swapped for [`MockLoader`] when no real shared library is at hand.

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use libloading::Library;
use thiserror::Error;

/// Open, resolve and close operations on native modules.
pub trait ModuleLoader {
    /// Owned handle to one opened module
    type Module;
    /// Why [`open`](Self::open) failed; only ever logged
    type Error: fmt::Display;

    /// Open the module at `path`.
    fn open(&self, path: &Path) -> Result<Self::Module, Self::Error>;

    /// Resolve `name` in `module`, returning its address.
    fn symbol(&self, module: &Self::Module, name: &str) -> Option<NonNull<c_void>>;

    /// Release `module`. Must not fail.
    fn close(&self, module: Self::Module);
}

/// Loader backed by the operating system's dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl ModuleLoader for NativeLoader {
    type Module = Library;
    type Error = libloading::Error;

    #[cfg(unix)]
    fn open(&self, path: &Path) -> Result<Library, libloading::Error> {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_LAZY};

        // SAFETY: loading runs the library's initializers. The caller chose
        // this path and is trusting the plugin to be well behaved.
        let library = unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_GLOBAL)? };
        Ok(library.into())
    }

    #[cfg(not(unix))]
    fn open(&self, path: &Path) -> Result<Library, libloading::Error> {
        // SAFETY: see the unix variant above.
        unsafe { Library::new(path) }
    }

    fn symbol(&self, module: &Library, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is read as a plain address and never called
        // here. Interpreting it is up to the caller.
        let symbol = unsafe { module.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }

    fn close(&self, module: Library) {
        if let Err(e) = module.close() {
            tracing::debug!(error = %e, "Closing plugin library reported an error");
        }
    }
}

/// A call observed by [`MockLoader`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCall {
    Open { path: PathBuf, id: u64 },
    OpenFailed { path: PathBuf },
    Symbol { id: u64, name: String },
    Close { id: u64 },
}

/// Module handed out by [`MockLoader`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockModule {
    pub id: u64,
    pub path: PathBuf,
}

/// Error returned by [`MockLoader::open`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("mock loader refused {}", path.display())]
pub struct MockLoadError {
    pub path: PathBuf,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    failing: HashSet<PathBuf>,
    symbols: HashMap<String, usize>,
    open: HashSet<u64>,
    calls: Vec<LoaderCall>,
}

/// In-memory loader for tests and dry runs.
///
/// Opening succeeds whenever the file exists on disk and the path was not
/// marked with [`fail_on`](Self::fail_on). Clones share state, so a test can
/// keep one clone for assertions while a plugin owns another.
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    state: Arc<Mutex<MockState>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every future open of `path` fail.
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.state().failing.insert(path.into());
    }

    /// Undo [`fail_on`](Self::fail_on).
    pub fn succeed_on(&self, path: &Path) {
        self.state().failing.remove(path);
    }

    /// Export `name` at `address` from every module.
    pub fn define_symbol(&self, name: &str, address: usize) {
        self.state().symbols.insert(name.to_string(), address);
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<LoaderCall> {
        self.state().calls.clone()
    }

    /// Number of modules opened and not yet closed.
    pub fn open_count(&self) -> usize {
        self.state().open.len()
    }

    pub fn close_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, LoaderCall::Close { .. }))
            .count()
    }
}

impl ModuleLoader for MockLoader {
    type Module = MockModule;
    type Error = MockLoadError;

    fn open(&self, path: &Path) -> Result<MockModule, MockLoadError> {
        let mut state = self.state();
        if state.failing.contains(path) || !path.is_file() {
            state.calls.push(LoaderCall::OpenFailed {
                path: path.to_path_buf(),
            });
            return Err(MockLoadError {
                path: path.to_path_buf(),
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.open.insert(id);
        state.calls.push(LoaderCall::Open {
            path: path.to_path_buf(),
            id,
        });
        Ok(MockModule {
            id,
            path: path.to_path_buf(),
        })
    }

    fn symbol(&self, module: &MockModule, name: &str) -> Option<NonNull<c_void>> {
        let mut state = self.state();
        state.calls.push(LoaderCall::Symbol {
            id: module.id,
            name: name.to_string(),
        });
        let address = state.symbols.get(name).copied()?;
        NonNull::new(address as *mut c_void)
    }

    fn close(&self, module: MockModule) {
        let mut state = self.state();
        state.open.remove(&module.id);
        state.calls.push(LoaderCall::Close { id: module.id });
    }
}

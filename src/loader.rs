//! Loading extracted payloads into the current process.

use crate::error::LoadError;
use log::{debug, info};
use std::path::Path;
use std::sync::Mutex;

/// Capability to map a native library into the current process.
#[cfg_attr(test, mockall::automock)]
pub trait NativeLoader: Send + Sync {
    /// Load the library at an absolute path. Once loaded it stays resident.
    fn load(&self, path: &Path) -> Result<(), LoadError>;
}

impl<T: NativeLoader + ?Sized> NativeLoader for &T {
    fn load(&self, path: &Path) -> Result<(), LoadError> {
        (**self).load(path)
    }
}

/// Loads libraries with the platform's dynamic loader.
///
/// Handles are kept for the life of the loader and never closed, so a
/// `static` loader keeps its libraries resident until process exit.
#[derive(Debug, Default)]
pub struct SystemLoader {
    libraries: Mutex<Vec<libloading::Library>>,
}

impl SystemLoader {
    pub const fn new() -> Self {
        Self {
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Number of libraries loaded through this loader.
    pub fn loaded(&self) -> usize {
        self.libraries.lock().map(|libs| libs.len()).unwrap_or(0)
    }
}

impl NativeLoader for SystemLoader {
    #[tracing::instrument(skip(self))]
    fn load(&self, path: &Path) -> Result<(), LoadError> {
        info!("Loading {}", path.display());

        // SAFETY: loading runs the library's initialization routines. The
        // payloads are the ones this crate extracted for the resolved platform,
        // and callers run the bootstrap before touching the APIs they provide.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|e| LoadError(e.to_string()))?;

        let mut libraries = self
            .libraries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        libraries.push(library);
        debug!("{} libraries resident", libraries.len());
        Ok(())
    }
}

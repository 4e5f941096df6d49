//! Cross-process exclusion over one cache directory.
//!
//! The lock is an advisory exclusive lock on a marker file inside the cache
//! directory. Acquisition polls with a fixed interval and a bounded number of
//! retries; the returned [`CacheLock`] releases on drop, so every exit path
//! (success, error, panic unwinding) gives the lock back. If the holder dies
//! the OS drops the lock with its file handle.

use crate::error::BootstrapError;
use fs4::FileExt;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the marker file inside the cache directory.
pub const LOCK_FILE_NAME: &str = "lock";

/// Retries after the first failed attempt.
pub const DEFAULT_LOCK_RETRIES: u32 = 20;

/// Sleep between attempts.
pub const DEFAULT_LOCK_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub retries: u32,
    pub interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_LOCK_RETRIES,
            interval: DEFAULT_LOCK_INTERVAL,
        }
    }
}

impl LockPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Total time spent sleeping before giving up.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.retries
    }
}

/// Exclusive ownership of one cache directory. Dropping it releases the lock.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock on the marker file at `path`, creating it if absent.
    ///
    /// Fails with [`BootstrapError::LockTimeout`] once the retry budget is
    /// spent, and with [`BootstrapError::Interrupted`] as soon as `cancel`
    /// completes during a wait.
    #[tracing::instrument(skip(policy, cancel))]
    pub async fn acquire<C>(
        path: &Path,
        policy: &LockPolicy,
        cancel: C,
    ) -> Result<Self, BootstrapError>
    where
        C: Future<Output = ()>,
    {
        let lock_file_error = |source| BootstrapError::LockFile {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(lock_file_error)?;

        tokio::pin!(cancel);

        let attempts = policy.max_attempts();
        for attempt in 1..=attempts {
            if try_lock(&file).map_err(lock_file_error)? {
                debug!("Acquired file lock {} (attempt {})", path.display(), attempt);
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if attempt == attempts {
                break;
            }

            info!(
                "Waiting for the file lock {} (attempt {}/{}, retrying in {:?})",
                path.display(),
                attempt,
                attempts,
                policy.interval
            );

            tokio::select! {
                biased;
                _ = &mut cancel => {
                    warn!("Interrupted while waiting for the file lock {}", path.display());
                    return Err(BootstrapError::Interrupted);
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }

        Err(BootstrapError::LockTimeout {
            path: path.to_path_buf(),
            attempts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release explicitly. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!("Released file lock {}", self.path.display()),
            Err(e) => warn!("Failed to release file lock {}: {}", self.path.display(), e),
        }
    }
}

/// Non-blocking exclusive lock. `Ok(false)` means another handle holds it.
fn try_lock(file: &File) -> io::Result<bool> {
    match file.try_lock_exclusive() {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    {
        err.raw_os_error() == Some(33)
    }
    #[cfg(not(windows))]
    {
        false
    }
}

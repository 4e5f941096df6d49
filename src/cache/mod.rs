//! Cache directory management
//!
//! Payloads are materialized under
//! `<root>/<namespace>/<loader version>/<arch>/<variant>/`. The path is a pure
//! function of its inputs, so processes launched with the same loader and
//! variant share one directory (and one lock) instead of extracting twice.

mod lock;

pub use lock::{CacheLock, LOCK_FILE_NAME, LockPolicy};

use crate::error::BootstrapError;
use crate::platform::PlatformKey;
use crate::runtime::Runtime;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Default application namespace under the cache root.
pub const DEFAULT_NAMESPACE: &str = "mesa-loader";

/// Whether extracted payloads outlive the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheRetention {
    /// Shared deterministic directory, reused by every later run.
    #[default]
    Persistent,
    /// Private per-process directory, removed when the host drains its cleanup context.
    ///
    /// Drain only after the loader holding the libraries has been dropped:
    /// Windows refuses to delete a DLL that is still mapped.
    RemoveOnExit,
}

/// A resolved (and created) cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheDirectory {
    pub path: PathBuf,
    pub platform: PlatformKey,
    pub loader_version: String,
}

impl CacheDirectory {
    /// Compute the directory path without touching the file system.
    pub fn compose(
        root: &Path,
        namespace: &str,
        loader_version: &str,
        platform: PlatformKey,
        variant: &str,
        retention: CacheRetention,
    ) -> Self {
        let leaf = match retention {
            CacheRetention::Persistent => variant.to_string(),
            CacheRetention::RemoveOnExit => format!("{}-{}", variant, std::process::id()),
        };

        Self {
            path: root
                .join(namespace)
                .join(loader_version)
                .join(platform.arch.as_str())
                .join(leaf),
            platform,
            loader_version: loader_version.to_string(),
        }
    }

    /// Compose the path against `root` (or the runtime's temp dir) and create it.
    ///
    /// Creation is idempotent and needs no lock: concurrent creators of the
    /// same tree all succeed.
    #[tracing::instrument(skip(runtime, root))]
    pub fn ensure<R: Runtime>(
        runtime: &R,
        root: Option<&Path>,
        namespace: &str,
        loader_version: &str,
        platform: PlatformKey,
        variant: &str,
        retention: CacheRetention,
    ) -> Result<Self, BootstrapError> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => runtime.temp_dir(),
        };
        let composed = Self::compose(
            &root,
            namespace,
            loader_version,
            platform,
            variant,
            retention,
        );

        let path = runtime
            .absolute(&composed.path)
            .map_err(|source| BootstrapError::CacheDirectory {
                path: composed.path.clone(),
                source,
            })?;

        runtime
            .create_dir_all(&path)
            .map_err(|source| BootstrapError::CacheDirectory {
                path: path.clone(),
                source,
            })?;

        debug!("Cache directory ready: {}", path.display());
        Ok(Self { path, ..composed })
    }

    pub fn payload_path(&self, payload: &str) -> PathBuf {
        self.path.join(payload)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn x64() -> PlatformKey {
        PlatformKey {
            os: Os::Windows,
            arch: Arch::X64,
        }
    }

    fn persistent(version: &str, platform: PlatformKey, variant: &str) -> CacheDirectory {
        CacheDirectory::compose(
            Path::new("/tmp"),
            "ns",
            version,
            platform,
            variant,
            CacheRetention::Persistent,
        )
    }

    #[test]
    fn test_compose_is_deterministic() {
        let a = persistent("1.0", x64(), "llvmpipe");
        let b = persistent("1.0", x64(), "llvmpipe");

        assert_eq!(a, b);
        assert_eq!(a.path, PathBuf::from("/tmp/ns/1.0/x64/llvmpipe"));
        assert_eq!(a.lock_path(), PathBuf::from("/tmp/ns/1.0/x64/llvmpipe/lock"));
        assert_eq!(
            a.payload_path("opengl32.dll"),
            PathBuf::from("/tmp/ns/1.0/x64/llvmpipe/opengl32.dll")
        );
    }

    #[test]
    fn test_compose_varies_with_inputs() {
        let base = persistent("1.0", x64(), "llvmpipe");
        let other_version = persistent("1.1", x64(), "llvmpipe");
        let other_variant = persistent("1.0", x64(), "d3d12");
        let other_arch = persistent(
            "1.0",
            PlatformKey {
                os: Os::Windows,
                arch: Arch::X86,
            },
            "llvmpipe",
        );

        assert_ne!(base.path, other_version.path);
        assert_ne!(base.path, other_variant.path);
        assert_ne!(base.path, other_arch.path);
    }

    #[test]
    fn test_remove_on_exit_is_process_private() {
        let dir = CacheDirectory::compose(
            Path::new("/tmp"),
            "ns",
            "1.0",
            x64(),
            "llvmpipe",
            CacheRetention::RemoveOnExit,
        );
        let expected = format!("llvmpipe-{}", std::process::id());
        assert!(dir.path.ends_with(expected));
    }

    #[test]
    fn test_ensure_defaults_to_temp_dir() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_temp_dir()
            .returning(|| PathBuf::from("/var/tmp"));
        runtime.expect_absolute().returning(|p| Ok(p.to_path_buf()));
        runtime
            .expect_create_dir_all()
            .with(eq(PathBuf::from("/var/tmp/mesa-loader/0.1.0/x64/d3d12")))
            .times(1)
            .returning(|_| Ok(()));

        let dir = CacheDirectory::ensure(
            &runtime,
            None,
            DEFAULT_NAMESPACE,
            "0.1.0",
            x64(),
            "d3d12",
            CacheRetention::Persistent,
        )
        .unwrap();
        assert_eq!(dir.path, PathBuf::from("/var/tmp/mesa-loader/0.1.0/x64/d3d12"));
    }

    #[test]
    fn test_ensure_creation_failure() {
        let mut runtime = MockRuntime::new();
        runtime.expect_absolute().returning(|p| Ok(p.to_path_buf()));
        runtime
            .expect_create_dir_all()
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let err = CacheDirectory::ensure(
            &runtime,
            Some(Path::new("/readonly")),
            DEFAULT_NAMESPACE,
            "0.1.0",
            x64(),
            "llvmpipe",
            CacheRetention::Persistent,
        )
        .unwrap_err();
        assert!(matches!(err, BootstrapError::CacheDirectory { .. }));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let root = tempdir().unwrap();
        let runtime = RealRuntime::default();

        let first = CacheDirectory::ensure(
            &runtime,
            Some(root.path()),
            DEFAULT_NAMESPACE,
            "0.1.0",
            x64(),
            "llvmpipe",
            CacheRetention::Persistent,
        )
        .unwrap();
        let second = CacheDirectory::ensure(
            &runtime,
            Some(root.path()),
            DEFAULT_NAMESPACE,
            "0.1.0",
            x64(),
            "llvmpipe",
            CacheRetention::Persistent,
        )
        .unwrap();

        assert_eq!(first, second);
        assert!(first.path.is_dir());
        assert!(first.path.starts_with(root.path()));
    }
}

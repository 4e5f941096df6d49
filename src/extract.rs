//! Payload extraction into the cache directory.
//!
//! Staleness is judged by size alone: a cached file whose size equals the
//! embedded source is reused without reading either. Content is never hashed.

use crate::cache::{CacheDirectory, CacheLock};
use crate::error::PayloadError;
use crate::resource::{ResourceSource, payload_resource_name};
use crate::runtime::Runtime;
use anyhow::{Context, anyhow};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix of the temporary file a payload is written to before the rename.
const PARTIAL_SUFFIX: &str = ".partial";

/// What extraction did for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum Extraction {
    /// The cached copy was missing or stale and has been rewritten.
    Extracted { bytes: u64 },
    /// The cached copy already had the right size.
    Fresh,
}

/// A payload materialized in the cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedPayload {
    pub id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub extraction: Extraction,
}

/// Ensure the cached copy of `payload` is fresh, rewriting it if needed.
///
/// Takes the held [`CacheLock`] so only the lock holder can mutate the cache.
/// The new content goes to `<payload>.partial` first and is renamed into
/// place, so the final name never refers to a half-written file.
#[tracing::instrument(skip(runtime, source, cache, _lock))]
pub fn extract_payload<R, S>(
    runtime: &R,
    source: &S,
    cache: &CacheDirectory,
    variant: &str,
    payload: &str,
    _lock: &CacheLock,
) -> Result<CachedPayload, PayloadError>
where
    R: Runtime + ?Sized,
    S: ResourceSource + ?Sized,
{
    let resource_name = payload_resource_name(cache.platform.arch, variant, payload);
    let mut resource = source
        .open(&resource_name)
        .ok_or_else(|| PayloadError::ResourceNotFound {
            payload: payload.to_string(),
            resource: resource_name.clone(),
        })?;

    let target = cache.payload_path(payload);

    if runtime.file_size(&target) == Some(resource.size) {
        debug!("{} is up to date ({} bytes)", target.display(), resource.size);
        return Ok(CachedPayload {
            id: payload.to_string(),
            path: target,
            size_bytes: resource.size,
            extraction: Extraction::Fresh,
        });
    }

    info!("Extract {} to {}", payload, cache.path.display());

    let partial = partial_path(&target);
    let written = write_through(runtime, &mut resource.reader, &partial, &target, resource.size);
    let bytes = match written {
        Ok(bytes) => bytes,
        Err(source) => {
            discard_partial(runtime, &partial);
            return Err(PayloadError::ExtractionIo {
                payload: payload.to_string(),
                path: target,
                source,
            });
        }
    };

    Ok(CachedPayload {
        id: payload.to_string(),
        path: target,
        size_bytes: bytes,
        extraction: Extraction::Extracted { bytes },
    })
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

fn write_through<R: Runtime + ?Sized>(
    runtime: &R,
    reader: &mut (dyn std::io::Read + Send),
    partial: &Path,
    target: &Path,
    expected: u64,
) -> anyhow::Result<u64> {
    let bytes = {
        let mut writer = runtime
            .create_file(partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let bytes = std::io::copy(reader, &mut writer)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", partial.display()))?;
        bytes
    };

    if bytes != expected {
        return Err(anyhow!(
            "Resource ended early: expected {} bytes, copied {}",
            expected,
            bytes
        ));
    }

    runtime
        .rename(partial, target)
        .with_context(|| format!("Failed to move {} into place", partial.display()))?;
    Ok(bytes)
}

fn discard_partial<R: Runtime + ?Sized>(runtime: &R, partial: &Path) {
    if runtime.exists(partial) {
        if let Err(e) = runtime.remove_file(partial) {
            warn!("Failed to remove {}: {:#}", partial.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheRetention, LockPolicy};
    use crate::platform::{Arch, Os, PlatformKey};
    use crate::resource::MemorySource;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn platform() -> PlatformKey {
        PlatformKey {
            os: Os::Windows,
            arch: Arch::X64,
        }
    }

    fn cache_in(root: &TempDir) -> CacheDirectory {
        CacheDirectory::ensure(
            &RealRuntime::default(),
            Some(root.path()),
            "ns",
            "1.0",
            platform(),
            "llvmpipe",
            CacheRetention::Persistent,
        )
        .unwrap()
    }

    async fn lock(cache: &CacheDirectory) -> CacheLock {
        CacheLock::acquire(&cache.lock_path(), &LockPolicy::default(), std::future::pending())
            .await
            .unwrap()
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with("x64/llvmpipe/a.bin", vec![1u8; 100])
            .with("x64/llvmpipe/b.bin", vec![2u8; 200])
    }

    #[tokio::test]
    async fn test_extracts_missing_payload() {
        let root = tempdir().unwrap();
        let cache = cache_in(&root);
        let lock = lock(&cache).await;

        let cached =
            extract_payload(&RealRuntime::default(), &source(), &cache, "llvmpipe", "a.bin", &lock)
                .unwrap();

        assert_eq!(cached.extraction, Extraction::Extracted { bytes: 100 });
        assert_eq!(cached.path, cache.path.join("a.bin"));
        assert_eq!(fs::read(&cached.path).unwrap(), vec![1u8; 100]);
        assert!(!cache.path.join("a.bin.partial").exists());
    }

    #[tokio::test]
    async fn test_same_size_is_fresh_and_untouched() {
        let root = tempdir().unwrap();
        let cache = cache_in(&root);
        let lock = lock(&cache).await;

        // Same size, different content: size is the only staleness signal
        fs::write(cache.path.join("a.bin"), vec![9u8; 100]).unwrap();

        let cached =
            extract_payload(&RealRuntime::default(), &source(), &cache, "llvmpipe", "a.bin", &lock)
                .unwrap();

        assert_eq!(cached.extraction, Extraction::Fresh);
        assert_eq!(fs::read(&cached.path).unwrap(), vec![9u8; 100]);
    }

    #[tokio::test]
    async fn test_size_mismatch_rewrites() {
        let root = tempdir().unwrap();
        let cache = cache_in(&root);
        let lock = lock(&cache).await;

        fs::write(cache.path.join("b.bin"), b"truncated").unwrap();

        let cached =
            extract_payload(&RealRuntime::default(), &source(), &cache, "llvmpipe", "b.bin", &lock)
                .unwrap();

        assert_eq!(cached.extraction, Extraction::Extracted { bytes: 200 });
        assert_eq!(fs::metadata(&cached.path).unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_missing_resource() {
        let root = tempdir().unwrap();
        let cache = cache_in(&root);
        let lock = lock(&cache).await;

        let err = extract_payload(
            &RealRuntime::default(),
            &source(),
            &cache,
            "llvmpipe",
            "c.bin",
            &lock,
        )
        .unwrap_err();

        match err {
            PayloadError::ResourceNotFound { payload, resource } => {
                assert_eq!(payload, "c.bin");
                assert_eq!(resource, "x64/llvmpipe/c.bin");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!cache.path.join("c.bin").exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_extraction_error() {
        let root = tempdir().unwrap();
        let cache = cache_in(&root);
        let lock = lock(&cache).await;

        let mut runtime = MockRuntime::new();
        runtime.expect_file_size().returning(|_| None);
        runtime
            .expect_create_file()
            .returning(|_| Err(anyhow::anyhow!("disk full")));
        runtime.expect_exists().returning(|_| false);

        let err = extract_payload(&runtime, &source(), &cache, "llvmpipe", "a.bin", &lock)
            .unwrap_err();

        match err {
            PayloadError::ExtractionIo { payload, path, source } => {
                assert_eq!(payload, "a.bin");
                assert_eq!(path, cache.path.join("a.bin"));
                assert!(format!("{:#}", source).contains("disk full"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_rename_discards_partial() {
        let root = tempdir().unwrap();
        let cache = cache_in(&root);
        let lock = lock(&cache).await;

        let mut runtime = MockRuntime::new();
        runtime.expect_file_size().returning(|_| Some(1));
        runtime
            .expect_create_file()
            .returning(|_| Ok(Box::new(std::io::sink())));
        runtime
            .expect_rename()
            .returning(|_, _| Err(anyhow::anyhow!("sharing violation")));
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_remove_file()
            .withf(|p| p.to_string_lossy().ends_with("a.bin.partial"))
            .times(1)
            .returning(|_| Ok(()));

        let err = extract_payload(&runtime, &source(), &cache, "llvmpipe", "a.bin", &lock)
            .unwrap_err();
        assert!(matches!(err, PayloadError::ExtractionIo { .. }));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/cache/opengl32.dll")),
            PathBuf::from("/cache/opengl32.dll.partial")
        );
    }
}

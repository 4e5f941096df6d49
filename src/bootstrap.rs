//! Bootstrap orchestration
//!
//! Platform -> variant -> version -> cache directory -> lock -> extract (each
//! payload) -> release -> load (each payload). This is the only place that
//! decides whether an error ends the run: [`BootstrapError`]s propagate,
//! [`PayloadError`]s are logged, recorded and skipped past.

use crate::cache::{CacheDirectory, CacheLock, CacheRetention, DEFAULT_NAMESPACE, LockPolicy};
use crate::cleanup::{self, SharedCleanupContext};
use crate::error::{BootstrapError, PayloadError};
use crate::extract::{CachedPayload, extract_payload};
use crate::loader::{NativeLoader, SystemLoader};
use crate::platform::PlatformKey;
use crate::report::{BootstrapReport, ExtractionStatus, LoadStatus, PayloadFailure, PayloadReport};
use crate::resource::ResourceSource;
use crate::runtime::{RealRuntime, Runtime};
use crate::variant::VariantCatalog;
use crate::version::VersionDescriptor;
use log::{debug, error, info};
use std::future::Future;
use std::path::PathBuf;

/// Environment variable overriding the cache root.
pub const CACHE_ROOT_ENV: &str = "MESABOOT_CACHE_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Directory under the cache root that holds everything this loader writes
    pub namespace: String,
    /// Defaults to the system temp directory
    pub cache_root: Option<PathBuf>,
    pub lock: LockPolicy,
    pub retention: CacheRetention,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            cache_root: None,
            lock: LockPolicy::default(),
            retention: CacheRetention::default(),
        }
    }
}

impl BootstrapConfig {
    /// Defaults, with the cache root taken from [`CACHE_ROOT_ENV`] when set.
    pub fn from_env<R: Runtime + ?Sized>(runtime: &R) -> Self {
        let cache_root = runtime
            .env_var(CACHE_ROOT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            cache_root,
            ..Self::default()
        }
    }
}

pub struct Bootstrapper<R, S, L> {
    runtime: R,
    source: S,
    loader: L,
    catalog: VariantCatalog,
    config: BootstrapConfig,
    cleanup: SharedCleanupContext,
}

impl<R, S, L> Bootstrapper<R, S, L>
where
    R: Runtime,
    S: ResourceSource,
    L: NativeLoader,
{
    pub fn new(runtime: R, source: S, loader: L, config: BootstrapConfig) -> Self {
        Self {
            runtime,
            source,
            loader,
            catalog: VariantCatalog::builtin(),
            config,
            cleanup: cleanup::new_shared(),
        }
    }

    pub fn with_catalog(mut self, catalog: VariantCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Paths registered for removal when [`CacheRetention::RemoveOnExit`] is configured.
    /// The host drains it with [`cleanup::cleanup_shared`] before exiting.
    pub fn cleanup_context(&self) -> SharedCleanupContext {
        SharedCleanupContext::clone(&self.cleanup)
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Run the bootstrap for `requested` (or the default variant).
    ///
    /// `cancel` is raced against every lock wait; if it completes first the
    /// run fails with [`BootstrapError::Interrupted`].
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run<C>(
        &self,
        requested: Option<&str>,
        cancel: C,
    ) -> Result<BootstrapReport, BootstrapError>
    where
        C: Future<Output = ()>,
    {
        let platform = PlatformKey::detect(&self.runtime)?;
        let variant = self.catalog.resolve(requested)?;
        let versions = VersionDescriptor::load(&self.source)?;

        info!(
            "Product Version: {}",
            versions.product_version.as_deref().unwrap_or("unknown")
        );
        info!("Loader Version: {}", versions.loader_version);

        let cache = CacheDirectory::ensure(
            &self.runtime,
            self.config.cache_root.as_deref(),
            &self.config.namespace,
            &versions.loader_version,
            platform,
            &variant.name,
            self.config.retention,
        )?;

        if self.config.retention == CacheRetention::RemoveOnExit {
            self.cleanup
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .add(cache.path.clone());
        }

        let extracted: Vec<Result<CachedPayload, PayloadError>> = {
            let lock = CacheLock::acquire(&cache.lock_path(), &self.config.lock, cancel).await?;
            let results = variant
                .payloads
                .iter()
                .map(|payload| {
                    extract_payload(
                        &self.runtime,
                        &self.source,
                        &cache,
                        &variant.name,
                        payload,
                        &lock,
                    )
                })
                .collect();
            lock.release();
            results
        };

        let payloads = variant
            .payloads
            .iter()
            .zip(extracted)
            .map(|(id, result)| self.load_payload(id, &cache, result))
            .collect();

        let report = BootstrapReport {
            platform,
            variant,
            versions,
            cache_dir: cache.path,
            retention: self.config.retention,
            payloads,
        };

        debug!(
            "Bootstrap of {} finished: {} extracted, {} failures",
            report.variant.name,
            report.extracted_count(),
            report.failures().count()
        );
        Ok(report)
    }

    /// Run unless `slot` already holds a report.
    ///
    /// With a filled slot, a request for the same variant returns the stored
    /// report without touching the cache; any other variant fails with
    /// [`BootstrapError::VariantAlreadyLoaded`]. Only a successful run fills the slot.
    pub async fn run_once<C>(
        &self,
        slot: &mut Option<BootstrapReport>,
        requested: Option<&str>,
        cancel: C,
    ) -> Result<BootstrapReport, BootstrapError>
    where
        C: Future<Output = ()>,
    {
        if let Some(report) = slot.as_ref() {
            let requested = self.catalog.resolve(requested)?;
            if requested.name == report.variant.name {
                debug!("Variant {} already loaded", requested.name);
                return Ok(report.clone());
            }
            return Err(BootstrapError::VariantAlreadyLoaded {
                loaded: report.variant.name.clone(),
                requested: requested.name,
            });
        }

        let report = self.run(requested, cancel).await?;
        *slot = Some(report.clone());
        Ok(report)
    }

    fn load_payload(
        &self,
        id: &str,
        cache: &CacheDirectory,
        extracted: Result<CachedPayload, PayloadError>,
    ) -> PayloadReport {
        let cached = match extracted {
            Ok(cached) => cached,
            Err(e) => {
                error!("{}", e);
                return PayloadReport {
                    id: id.to_string(),
                    path: cache.payload_path(id),
                    extraction: ExtractionStatus::Failed {
                        error: PayloadFailure::from(&e),
                    },
                    load: LoadStatus::Skipped,
                };
            }
        };

        let load = match self.loader.load(&cached.path) {
            Ok(()) => LoadStatus::Loaded,
            Err(source) => {
                let e = PayloadError::Load {
                    payload: id.to_string(),
                    path: cached.path.clone(),
                    source,
                };
                error!("{}", e);
                LoadStatus::Failed {
                    error: PayloadFailure::from(&e),
                }
            }
        };

        PayloadReport {
            id: cached.id,
            path: cached.path,
            extraction: cached.extraction.into(),
            load,
        }
    }
}

static SYSTEM_LOADER: SystemLoader = SystemLoader::new();
static PROCESS_REPORT: tokio::sync::Mutex<Option<BootstrapReport>> =
    tokio::sync::Mutex::const_new(None);

/// Process-wide entry point for async hosts. See [`bootstrap`].
pub async fn bootstrap_async<S: ResourceSource>(
    source: S,
    variant: Option<&str>,
) -> Result<BootstrapReport, BootstrapError> {
    let mut loaded = PROCESS_REPORT.lock().await;

    let runtime = RealRuntime::default();
    let config = BootstrapConfig::from_env(&runtime);
    let bootstrapper = Bootstrapper::new(runtime, source, &SYSTEM_LOADER, config);

    bootstrapper
        .run_once(&mut loaded, variant, interrupt_signal())
        .await
}

/// Extract and load the payloads of `variant` (default when `None`) from
/// `source` into this process.
///
/// Call once at startup, before anything uses the native APIs. A process can
/// only hold one variant: repeating the call with the same variant returns the
/// first report, a different variant fails with
/// [`BootstrapError::VariantAlreadyLoaded`]. Ctrl-C during the lock wait
/// aborts with [`BootstrapError::Interrupted`].
///
/// Must not be called from inside an async runtime; use [`bootstrap_async`] there.
pub fn bootstrap<S: ResourceSource>(
    source: S,
    variant: Option<&str>,
) -> Result<BootstrapReport, BootstrapError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BootstrapError::AsyncRuntime)?;
    rt.block_on(bootstrap_async(source, variant))
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
pub async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

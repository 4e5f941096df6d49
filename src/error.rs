//! Error taxonomy for the bootstrap.
//!
//! [`BootstrapError`] aborts a run. [`PayloadError`] is scoped to one payload:
//! it is recorded in the report and the run moves on to the next payload.

use serde::Serialize;
use std::path::PathBuf;

/// Errors that end a bootstrap run.
#[derive(Debug)]
pub enum BootstrapError {
    /// OS family or architecture not recognized
    UnsupportedPlatform { os: String, arch: String },
    /// A required key is absent from the version descriptor
    MissingVersionMetadata { key: String },
    /// Requested variant has no catalog entry
    UnknownVariant(String),
    /// A variant catalog that could never load anything
    InvalidCatalog(String),
    /// The cache lock stayed contended for the whole retry budget
    LockTimeout { path: PathBuf, attempts: u32 },
    /// The lock wait was cancelled by an external signal
    Interrupted,
    /// This process already loaded a different variant
    VariantAlreadyLoaded { loaded: String, requested: String },
    /// The cache directory could not be created
    CacheDirectory { path: PathBuf, source: anyhow::Error },
    /// The marker file could not be opened or locked for a reason other than contention
    LockFile { path: PathBuf, source: std::io::Error },
    /// The async runtime driving the lock wait could not be started
    AsyncRuntime(std::io::Error),
}

impl BootstrapError {
    /// Whether a later run may succeed without any configuration change.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Interrupted)
    }
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapError::UnsupportedPlatform { os, arch } => {
                write!(f, "Unsupported platform: os '{}', arch '{}'", os, arch)
            }
            BootstrapError::MissingVersionMetadata { key } => {
                write!(f, "Missing '{}' property in version descriptor", key)
            }
            BootstrapError::UnknownVariant(name) => {
                write!(f, "Unknown variant: {}", name)
            }
            BootstrapError::InvalidCatalog(reason) => {
                write!(f, "Invalid variant catalog: {}", reason)
            }
            BootstrapError::LockTimeout { path, attempts } => {
                write!(
                    f,
                    "Could not get file lock {} after {} attempts. Another process may still be extracting; try again later.",
                    path.display(),
                    attempts
                )
            }
            BootstrapError::Interrupted => write!(f, "Interrupted while waiting for the file lock"),
            BootstrapError::VariantAlreadyLoaded { loaded, requested } => {
                write!(
                    f,
                    "Variant '{}' is already loaded in this process; cannot load '{}'",
                    loaded, requested
                )
            }
            BootstrapError::CacheDirectory { path, source } => {
                write!(
                    f,
                    "Failed to create cache directory {}: {}",
                    path.display(),
                    source
                )
            }
            BootstrapError::LockFile { path, source } => {
                write!(f, "Failed to get file lock {}: {}", path.display(), source)
            }
            BootstrapError::AsyncRuntime(source) => {
                write!(f, "Failed to start async runtime: {}", source)
            }
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::CacheDirectory { source, .. } => Some(&**source),
            BootstrapError::LockFile { source, .. } => Some(source),
            BootstrapError::AsyncRuntime(source) => Some(source),
            _ => None,
        }
    }
}

/// Errors confined to a single payload.
#[derive(Debug)]
pub enum PayloadError {
    /// The payload is not present in the resource source
    ResourceNotFound { payload: String, resource: String },
    /// Copying the payload into the cache failed
    ExtractionIo {
        payload: String,
        path: PathBuf,
        source: anyhow::Error,
    },
    /// The platform refused to load the materialized file
    Load {
        payload: String,
        path: PathBuf,
        source: LoadError,
    },
}

/// Discriminant of [`PayloadError`], kept in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadErrorKind {
    ResourceNotFound,
    ExtractionIo,
    Load,
}

impl PayloadError {
    pub fn kind(&self) -> PayloadErrorKind {
        match self {
            PayloadError::ResourceNotFound { .. } => PayloadErrorKind::ResourceNotFound,
            PayloadError::ExtractionIo { .. } => PayloadErrorKind::ExtractionIo,
            PayloadError::Load { .. } => PayloadErrorKind::Load,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            PayloadError::ResourceNotFound { payload, .. }
            | PayloadError::ExtractionIo { payload, .. }
            | PayloadError::Load { payload, .. } => payload,
        }
    }
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadError::ResourceNotFound { payload, resource } => {
                write!(f, "{} not found in resources (looked for {})", payload, resource)
            }
            PayloadError::ExtractionIo {
                payload,
                path,
                source,
            } => {
                write!(
                    f,
                    "Failed to extract {} to {}: {:#}",
                    payload,
                    path.display(),
                    source
                )
            }
            PayloadError::Load {
                payload,
                path,
                source,
            } => {
                write!(f, "Failed to load {} from {}: {}", payload, path.display(), source)
            }
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PayloadError::ResourceNotFound { .. } => None,
            PayloadError::ExtractionIo { source, .. } => Some(&**source),
            PayloadError::Load { source, .. } => Some(source),
        }
    }
}

/// The platform rejected a library (corrupt file, wrong architecture,
/// missing transitive dependency).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError(pub String);

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for LoadError {}

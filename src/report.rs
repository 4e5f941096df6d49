//! Outcome of a bootstrap run.

use crate::cache::CacheRetention;
use crate::error::{PayloadError, PayloadErrorKind};
use crate::extract::Extraction;
use crate::platform::PlatformKey;
use crate::variant::Variant;
use crate::version::VersionDescriptor;
use serde::Serialize;
use std::path::PathBuf;

/// A per-payload failure as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadFailure {
    pub kind: PayloadErrorKind,
    pub message: String,
}

impl From<&PayloadError> for PayloadFailure {
    fn from(e: &PayloadError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum ExtractionStatus {
    Extracted { bytes: u64 },
    Fresh,
    Failed { error: PayloadFailure },
}

impl From<Extraction> for ExtractionStatus {
    fn from(e: Extraction) -> Self {
        match e {
            Extraction::Extracted { bytes } => ExtractionStatus::Extracted { bytes },
            Extraction::Fresh => ExtractionStatus::Fresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum LoadStatus {
    Loaded,
    Failed { error: PayloadFailure },
    /// Not attempted because extraction failed
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadReport {
    pub id: String,
    pub path: PathBuf,
    pub extraction: ExtractionStatus,
    pub load: LoadStatus,
}

impl PayloadReport {
    pub fn is_loaded(&self) -> bool {
        self.load == LoadStatus::Loaded
    }

    /// The first failure recorded for this payload, if any.
    pub fn failure(&self) -> Option<&PayloadFailure> {
        match (&self.extraction, &self.load) {
            (ExtractionStatus::Failed { error }, _) => Some(error),
            (_, LoadStatus::Failed { error }) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub platform: PlatformKey,
    pub variant: Variant,
    pub versions: VersionDescriptor,
    pub cache_dir: PathBuf,
    pub retention: CacheRetention,
    pub payloads: Vec<PayloadReport>,
}

impl BootstrapReport {
    pub fn payload(&self, id: &str) -> Option<&PayloadReport> {
        self.payloads.iter().find(|p| p.id == id)
    }

    pub fn all_loaded(&self) -> bool {
        self.payloads.iter().all(PayloadReport::is_loaded)
    }

    /// Number of payloads actually copied during this run.
    pub fn extracted_count(&self) -> usize {
        self.payloads
            .iter()
            .filter(|p| matches!(p.extraction, ExtractionStatus::Extracted { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PayloadFailure)> {
        self.payloads
            .iter()
            .filter_map(|p| p.failure().map(|f| (p.id.as_str(), f)))
    }
}

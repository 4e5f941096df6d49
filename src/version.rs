//! Version descriptor
//!
//! A small `key=value` resource produced by the packaging step. The loader
//! version namespaces the cache directory, so it is mandatory.

use crate::error::BootstrapError;
use crate::resource::{ResourceSource, VERSION_RESOURCE};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;

pub const LOADER_VERSION_KEY: &str = "loader.version";
pub const PRODUCT_VERSION_KEY: &str = "product.version";
/// Older packages recorded the product version under this key.
const LEGACY_PRODUCT_VERSION_KEY: &str = "mesa.version";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDescriptor {
    pub product_version: Option<String>,
    pub loader_version: String,
}

impl VersionDescriptor {
    /// Build from parsed properties. Fails if the loader version is absent or blank.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, BootstrapError> {
        let loader_version = properties
            .get(LOADER_VERSION_KEY)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| BootstrapError::MissingVersionMetadata {
                key: LOADER_VERSION_KEY.to_string(),
            })?;

        let product_version = properties
            .get(PRODUCT_VERSION_KEY)
            .or_else(|| properties.get(LEGACY_PRODUCT_VERSION_KEY))
            .filter(|v| !v.is_empty())
            .cloned();

        Ok(Self {
            product_version,
            loader_version,
        })
    }

    /// Read the descriptor from a resource source.
    ///
    /// An unreadable or absent resource is treated as empty, which then fails
    /// on the missing loader version.
    #[tracing::instrument(skip(source))]
    pub fn load<S: ResourceSource + ?Sized>(source: &S) -> Result<Self, BootstrapError> {
        let mut content = String::new();
        match source.open(VERSION_RESOURCE) {
            Some(mut resource) => {
                if let Err(e) = resource.reader.read_to_string(&mut content) {
                    warn!("Failed to read {}: {}", VERSION_RESOURCE, e);
                    content.clear();
                }
            }
            None => debug!("{} not found in resources", VERSION_RESOURCE),
        }

        Self::from_properties(&parse_properties(&content))
    }
}

/// Parse `key=value` / `key: value` lines. `#` and `!` start comment lines;
/// the first occurrence of a key wins over later ones.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let (key, value) = match line.find(['=', ':']) {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };

        properties
            .entry(key.trim().to_string())
            .or_insert_with(|| value.trim().to_string());
    }

    properties
}

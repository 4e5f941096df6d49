//! Embedded resource lookup
//!
//! The packaging step that embeds payloads is external to the bootstrap. The
//! core only needs to open a resource by its relative name, so it goes through
//! the [`ResourceSource`] trait. Names use `/` separators and follow the
//! `<arch>/<variant>/<payload>` convention (see [`payload_resource_name`]).

mod dir;
mod memory;

use crate::platform::Arch;
use std::io::Read;

pub use dir::DirSource;
pub use memory::MemorySource;

/// Name of the version descriptor at the resource root.
pub const VERSION_RESOURCE: &str = "version.properties";

/// An opened resource: its exact size and a reader over its bytes.
pub struct Resource {
    pub size: u64,
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("size", &self.size).finish()
    }
}

/// Read-only store of embedded resources.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceSource: Send + Sync {
    /// Open a resource by relative name, or `None` if the package does not contain it.
    fn open(&self, name: &str) -> Option<Resource>;
}

/// Resource name of a payload for one architecture and variant.
pub fn payload_resource_name(arch: Arch, variant: &str, payload: &str) -> String {
    format!("{}/{}/{}", arch.as_str(), variant, payload)
}

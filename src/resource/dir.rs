use log::debug;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use super::{Resource, ResourceSource};

/// Resources laid out as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a `/`-separated resource name to a path under the root.
    /// Names that would escape the root are rejected.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || name.is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ResourceSource for DirSource {
    #[tracing::instrument(skip(self))]
    fn open(&self, name: &str) -> Option<Resource> {
        let path = self.resolve(name)?;
        let file = File::open(&path).ok()?;
        let metadata = file.metadata().ok()?;
        if !metadata.is_file() {
            return None;
        }

        debug!("Opened resource {} ({} bytes)", path.display(), metadata.len());
        Some(Resource {
            size: metadata.len(),
            reader: Box::new(file),
        })
    }
}

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Cursor;

use super::{Resource, ResourceSource};

/// Resources held in memory.
///
/// Hosts that compile payloads into their binary build one from a static
/// table:
///
/// ```
/// use mesaboot::resource::MemorySource;
///
/// static PAYLOADS: &[(&str, &[u8])] = &[
///     ("version.properties", b"loader.version=1.0.0\n"),
///     // ("x64/llvmpipe/opengl32.dll", include_bytes!("../payloads/x64/llvmpipe/opengl32.dll")),
/// ];
///
/// let source = MemorySource::from_static(PAYLOADS);
/// assert!(source.contains("version.properties"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: BTreeMap<String, Cow<'static, [u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_static(table: &'static [(&'static str, &'static [u8])]) -> Self {
        let entries = table
            .iter()
            .map(|(name, bytes)| (name.to_string(), Cow::Borrowed(*bytes)))
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), Cow::Owned(bytes.into()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl ResourceSource for MemorySource {
    fn open(&self, name: &str) -> Option<Resource> {
        let bytes = self.entries.get(name)?;
        Some(Resource {
            size: bytes.len() as u64,
            reader: Box::new(Cursor::new(bytes.clone())),
        })
    }
}

//! Variant catalog: which payloads each variant needs, in load order.

use crate::error::BootstrapError;
use log::debug;
use serde::Serialize;

/// Variant used when none is requested.
pub const DEFAULT_VARIANT: &str = "llvmpipe";

/// A resolved variant and the payloads it requires, in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub name: String,
    pub payloads: Vec<String>,
}

/// Static table of variant name -> ordered payload list.
#[derive(Debug, Clone)]
pub struct VariantCatalog {
    default: &'static str,
    entries: Vec<(&'static str, &'static [&'static str])>,
}

impl VariantCatalog {
    /// Build a catalog.
    ///
    /// Fails if a variant has no payloads or `default` is not one of the entries.
    pub fn new(
        default: &'static str,
        entries: Vec<(&'static str, &'static [&'static str])>,
    ) -> Result<Self, BootstrapError> {
        if let Some((name, _)) = entries.iter().find(|(_, payloads)| payloads.is_empty()) {
            return Err(BootstrapError::InvalidCatalog(format!(
                "variant '{}' has no payloads",
                name
            )));
        }
        if !entries.iter().any(|(name, _)| *name == default) {
            return Err(BootstrapError::InvalidCatalog(format!(
                "default variant '{}' is not in the catalog",
                default
            )));
        }
        Ok(Self { default, entries })
    }

    /// The catalog of Mesa rendering backends shipped with this loader.
    pub fn builtin() -> Self {
        Self {
            default: DEFAULT_VARIANT,
            entries: vec![
                ("llvmpipe", &["opengl32.dll"] as &[&str]),
                // dxil.dll must be resident before the d3d12 driver initializes
                ("d3d12", &["dxil.dll", "opengl32.dll"] as &[&str]),
            ],
        }
    }

    pub fn default_variant(&self) -> &'static str {
        self.default
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// Resolve a requested name; empty or absent selects the default variant.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Variant, BootstrapError> {
        let name = match requested.map(str::trim) {
            None | Some("") => self.default.to_string(),
            Some(name) => name.to_lowercase(),
        };

        let payloads = self
            .entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, payloads)| payloads.iter().map(|p| p.to_string()).collect())
            .ok_or_else(|| BootstrapError::UnknownVariant(name.clone()))?;

        debug!("Variant {} requires {:?}", name, payloads);
        Ok(Variant { name, payloads })
    }
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_resolve_to_default() {
        let catalog = VariantCatalog::builtin();

        let absent = catalog.resolve(None).unwrap();
        let empty = catalog.resolve(Some("")).unwrap();
        let blank = catalog.resolve(Some("  ")).unwrap();

        assert_eq!(absent.name, DEFAULT_VARIANT);
        assert_eq!(absent, empty);
        assert_eq!(absent, blank);
        assert_eq!(absent.payloads, vec!["opengl32.dll"]);
    }

    #[test]
    fn test_d3d12_loads_dxil_first() {
        let variant = VariantCatalog::builtin().resolve(Some("d3d12")).unwrap();
        assert_eq!(variant.payloads, vec!["dxil.dll", "opengl32.dll"]);
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let variant = VariantCatalog::builtin().resolve(Some("LLVMPipe")).unwrap();
        assert_eq!(variant.name, "llvmpipe");
    }

    #[test]
    fn test_unknown_variant() {
        let catalog = VariantCatalog::builtin();
        for name in ["foo", "zink", "llvmpipe2", "d3d"] {
            let err = catalog.resolve(Some(name)).unwrap_err();
            assert!(matches!(err, BootstrapError::UnknownVariant(ref n) if n == name));
        }
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = VariantCatalog::builtin();
        let rebuilt = VariantCatalog::new(builtin.default, builtin.entries.clone()).unwrap();
        assert_eq!(rebuilt.names().collect::<Vec<_>>(), vec!["llvmpipe", "d3d12"]);
    }

    #[test]
    fn test_empty_payload_list_is_rejected() {
        let err = VariantCatalog::new("x", vec![("x", &[] as &[&str])]).unwrap_err();
        match err {
            BootstrapError::InvalidCatalog(reason) => assert!(reason.contains("'x'")),
            other => panic!("unexpected error: {}", other),
        }

        let err = VariantCatalog::new(
            "base",
            vec![("base", &["a.bin"] as &[&str]), ("extra", &[] as &[&str])],
        )
        .unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidCatalog(_)));
    }

    #[test]
    fn test_default_must_be_in_catalog() {
        let err =
            VariantCatalog::new("missing", vec![("base", &["a.bin"] as &[&str])]).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidCatalog(ref r) if r.contains("missing")));
    }

    #[test]
    fn test_custom_catalog() {
        let catalog =
            VariantCatalog::new("base", vec![("base", &["a.bin", "b.bin"] as &[&str])]).unwrap();
        assert_eq!(catalog.default_variant(), "base");
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["base"]);
        assert_eq!(catalog.resolve(None).unwrap().payloads, vec!["a.bin", "b.bin"]);
    }
}

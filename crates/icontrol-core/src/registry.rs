// ── Metadata registry ──
//
// Endpoint contracts loaded from JSON catalogs embedded at compile time.
// Adding an endpoint means adding a catalog entry, not code.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::hooks;
use crate::meta::Metadata;
use crate::version::DeviceVersion;

/// Type name of the tree root.
pub const ROOT_TYPE: &str = "ManagementRoot";

/// Embedded catalog files (compiled into the binary).
const BUILTIN_CATALOGS: &[&str] = &[
    include_str!("../catalog/root.json"),
    include_str!("../catalog/ltm.json"),
    include_str!("../catalog/sys.json"),
    include_str!("../catalog/asm.json"),
];

/// Lookup table of every known endpoint type.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: BTreeMap<String, Arc<Metadata>>,
}

impl Registry {
    /// Registry over the embedded catalogs.
    pub fn builtin() -> Result<Self, CoreError> {
        let mut registry = Self::default();
        for content in BUILTIN_CATALOGS {
            registry.merge_json(content)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Registry over a single catalog document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let mut registry = Self::default();
        registry.merge_json(json)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Add (or override) entries from another catalog document.
    ///
    /// Entries that reference each other across documents are fine as long
    /// as the merged result is consistent. On error the registry is left
    /// untouched.
    pub fn extend_json(&mut self, json: &str) -> Result<(), CoreError> {
        let mut merged = self.clone();
        merged.merge_json(json)?;
        merged.validate()?;
        *self = merged;
        Ok(())
    }

    fn merge_json(&mut self, json: &str) -> Result<(), CoreError> {
        let entries: BTreeMap<String, Metadata> =
            serde_json::from_str(json).map_err(|e| CoreError::Catalog {
                message: e.to_string(),
            })?;
        for (type_name, mut meta) in entries {
            meta.type_name.clone_from(&type_name);
            self.types.insert(type_name, Arc::new(meta));
        }
        Ok(())
    }

    /// Check cross references: children, registry targets, validators, and
    /// attribute names unique within each parent.
    pub fn validate(&self) -> Result<(), CoreError> {
        for meta in self.types.values() {
            let mut seen = BTreeSet::new();
            for child in &meta.allowed_lazy_attributes {
                let child_meta = self.types.get(child).ok_or_else(|| CoreError::Catalog {
                    message: format!("{} exposes unknown type '{child}'", meta.type_name),
                })?;
                if !seen.insert(child_meta.attribute_name()) {
                    return Err(CoreError::Catalog {
                        message: format!(
                            "{} exposes attribute '{}' twice",
                            meta.type_name,
                            child_meta.attribute_name()
                        ),
                    });
                }
            }
            for target in meta.attribute_registry.values() {
                if !self.types.contains_key(target) {
                    return Err(CoreError::Catalog {
                        message: format!("{} registers unknown type '{target}'", meta.type_name),
                    });
                }
            }
            if let Some(name) = meta.validators.iter().find(|v| hooks::lookup(v).is_none()) {
                return Err(CoreError::Catalog {
                    message: format!("{} names unknown validator '{name}'", meta.type_name),
                });
            }
        }
        Ok(())
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn get(&self, type_name: &str) -> Result<Arc<Metadata>, CoreError> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownType {
                type_name: type_name.to_owned(),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ── Pre-flight checks ────────────────────────────────────────────

    pub fn validate_creation(
        &self,
        type_name: &str,
        params: &Map<String, Value>,
    ) -> Result<(), CoreError> {
        self.get(type_name)?.validate_creation(params)
    }

    pub fn validate_load(
        &self,
        type_name: &str,
        params: &Map<String, Value>,
    ) -> Result<(), CoreError> {
        self.get(type_name)?.validate_load(params)
    }

    /// Concrete metadata for one item of a (possibly polymorphic) collection.
    pub fn resolve_child_type(
        &self,
        collection: &str,
        kind: &str,
    ) -> Result<Arc<Metadata>, CoreError> {
        let meta = self.get(collection)?;
        let child = meta.resolve_child_type(kind)?;
        self.get(child)
    }

    pub fn check_version(&self, type_name: &str, device: &DeviceVersion) -> Result<(), CoreError> {
        self.get(type_name)?.check_version(Some(device))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::meta::ContainerKind;

    #[test]
    fn builtin_catalog_loads() {
        let registry = Registry::builtin().unwrap();
        assert!(registry.contains(ROOT_TYPE));
        assert!(registry.len() > 20);
        assert_eq!(registry.get("Pool").unwrap().kind, ContainerKind::Resource);
        assert_eq!(registry.get("Pool").unwrap().type_name, "Pool");
    }

    #[test]
    fn builtin_header_contract() {
        let registry = Registry::builtin().unwrap();
        let header = registry.get("Header").unwrap();
        assert_eq!(
            header.required_json_kind.as_deref(),
            Some("tm:asm:policies:headers:headerstate")
        );
        assert_eq!(header.validators, vec!["lowercase_name".to_owned()]);
        assert!(header.is_id_keyed());
    }

    #[test]
    fn resolve_child_type_goes_through_collection() {
        let registry = Registry::builtin().unwrap();
        let pool = registry
            .resolve_child_type("Pools", "tm:ltm:pool:poolstate")
            .unwrap();
        assert_eq!(pool.type_name, "Pool");
        assert!(matches!(
            registry.resolve_child_type("Pools", "tm:ltm:node:nodestate"),
            Err(CoreError::UnrecognizedKind { .. })
        ));
    }

    #[test]
    fn validate_creation_by_type_name() {
        let registry = Registry::builtin().unwrap();
        let err = registry
            .validate_creation("Node", &Map::new())
            .unwrap_err();
        match err {
            CoreError::MissingRequiredCreationParameter { missing, .. } => {
                assert_eq!(missing, vec!["address".to_owned(), "name".to_owned()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            registry.validate_load("Nope", &Map::new()),
            Err(CoreError::UnknownType { .. })
        ));
    }

    #[test]
    fn dangling_child_is_rejected() {
        let doc = json!({
            "Things": { "kind": "collection", "allowed_lazy_attributes": ["Thing"] }
        });
        assert!(matches!(
            Registry::from_json(&doc.to_string()),
            Err(CoreError::Catalog { .. })
        ));
    }

    #[test]
    fn unknown_validator_is_rejected() {
        let doc = json!({
            "Thing": { "kind": "resource", "validators": ["shout"] }
        });
        assert!(matches!(
            Registry::from_json(&doc.to_string()),
            Err(CoreError::Catalog { .. })
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let doc = json!({ "Thing": { "kind": "resource", "colour": "red" } });
        assert!(Registry::from_json(&doc.to_string()).is_err());
    }

    #[test]
    fn extend_adds_types() {
        let mut registry = Registry::builtin().unwrap();
        let doc = json!({
            "Gtm": { "kind": "organizing_collection" }
        });
        registry.extend_json(&doc.to_string()).unwrap();
        assert!(registry.contains("Gtm"));
    }

    #[test]
    fn failed_extend_leaves_registry_untouched() {
        let mut registry = Registry::builtin().unwrap();
        let before = registry.len();
        let doc = json!({
            "Gtm": { "kind": "organizing_collection", "allowed_lazy_attributes": ["Nope"] }
        });
        assert!(matches!(
            registry.extend_json(&doc.to_string()),
            Err(CoreError::Catalog { .. })
        ));
        assert!(!registry.contains("Gtm"));
        assert_eq!(registry.len(), before);
        registry.validate().unwrap();

        let doc = json!({ "Gtm": { "kind": "organizing_collection" } });
        registry.extend_json(&doc.to_string()).unwrap();
        assert!(registry.contains("Gtm"));
    }

    #[test]
    fn cipher_is_gated_at_thirteen() {
        let registry = Registry::builtin().unwrap();
        let old: DeviceVersion = "12.1.2".parse().unwrap();
        assert!(registry.check_version("Cipher", &old).is_err());
        let new: DeviceVersion = "13.1.0".parse().unwrap();
        assert!(registry.check_version("Cipher", &new).is_ok());
    }
}

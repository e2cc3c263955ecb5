// ── Per-type metadata ──
//
// The declarative contract of one endpoint type: which kind string the
// device must echo, which parameters create/load need, which children it
// exposes, and which verbs it accepts. Loaded from the JSON catalog.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::CoreError;
use crate::hooks;
use crate::uri::{self, Identity};
use crate::version::DeviceVersion;

/// Variant tag for what a node is in the resource tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContainerKind {
    /// Pure namespace; only exposes children.
    OrganizingCollection,
    /// Enumerable set of member resources.
    Collection,
    /// Named entity with full CRUD.
    Resource,
    /// Singleton endpoint without name or partition.
    UnnamedResource,
}

/// Operations a caller can attempt on a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verb {
    Create,
    Load,
    Refresh,
    Update,
    Modify,
    Delete,
    Exists,
    GetCollection,
    Stats,
    Navigate,
}

impl Verb {
    /// Verbs listed as alternatives in unsupported-method errors.
    const CRUD: [Self; 6] = [
        Self::Create,
        Self::Load,
        Self::Refresh,
        Self::Update,
        Self::Modify,
        Self::Delete,
    ];
}

/// HTTP verb used by `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
}

/// Declarative contract of one endpoint type.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    /// Set from the catalog key, never from the entry body.
    #[serde(skip)]
    pub type_name: String,

    pub kind: ContainerKind,

    /// Kind string the device must echo on every reply for this type.
    #[serde(default)]
    pub required_json_kind: Option<String>,

    #[serde(default)]
    pub required_creation_parameters: Option<BTreeSet<String>>,

    #[serde(default)]
    pub required_load_parameters: Option<BTreeSet<String>>,

    /// Child type names, in the order the device documents them.
    #[serde(default)]
    pub allowed_lazy_attributes: Vec<String>,

    /// Wire kind → type name, for polymorphic collection items.
    #[serde(default)]
    pub attribute_registry: BTreeMap<String, String>,

    #[serde(default)]
    pub minimum_version: Option<DeviceVersion>,

    #[serde(default)]
    pub object_has_stats: bool,

    /// Verbs this type rejects on top of its container-kind defaults.
    #[serde(default)]
    pub unsupported: BTreeSet<Verb>,

    #[serde(default)]
    pub update_method: UpdateMethod,

    /// Hook names resolved through [`hooks::lookup`].
    #[serde(default)]
    pub validators: Vec<String>,

    /// Path token override for names that do not format regularly.
    #[serde(default)]
    pub uri_token: Option<String>,

    /// Lazy-attribute name override, for types whose catalog key is
    /// qualified to stay unique (`Asm_Policy` is exposed as `policy`).
    #[serde(default)]
    pub attribute: Option<String>,
}

impl Metadata {
    /// Name under which a parent exposes this type.
    pub fn attribute_name(&self) -> String {
        self.attribute
            .clone()
            .unwrap_or_else(|| uri::attribute_name(&self.type_name))
    }

    /// `true` when instances are addressed by a device-generated id.
    pub fn is_id_keyed(&self) -> bool {
        self.load_parameters().contains("id")
    }

    /// Path token this type contributes to its URI.
    pub fn uri_token(&self) -> String {
        if let Some(ref token) = self.uri_token {
            return token.clone();
        }
        match self.kind {
            ContainerKind::Collection => uri::collection_segment(&self.type_name),
            _ => uri::format_resource_name(&self.type_name),
        }
    }

    /// Parameters `create` must receive. Named resources default to `name`.
    pub fn creation_parameters(&self) -> BTreeSet<String> {
        self.required_creation_parameters
            .clone()
            .unwrap_or_else(|| self.default_identity_parameters())
    }

    /// Parameters `load`/`exists` must receive. Named resources default to `name`.
    pub fn load_parameters(&self) -> BTreeSet<String> {
        self.required_load_parameters
            .clone()
            .unwrap_or_else(|| self.default_identity_parameters())
    }

    fn default_identity_parameters(&self) -> BTreeSet<String> {
        match self.kind {
            ContainerKind::Resource => BTreeSet::from(["name".to_owned()]),
            _ => BTreeSet::new(),
        }
    }

    // ── Verb support ─────────────────────────────────────────────────

    pub fn supports(&self, verb: Verb) -> bool {
        if verb == Verb::Navigate {
            return true;
        }
        if self.unsupported.contains(&verb) {
            return false;
        }
        match self.kind {
            ContainerKind::OrganizingCollection => false,
            ContainerKind::Collection => {
                matches!(verb, Verb::GetCollection | Verb::Load | Verb::Exists)
            }
            ContainerKind::Resource => match verb {
                Verb::GetCollection => false,
                Verb::Stats => self.object_has_stats,
                _ => true,
            },
            ContainerKind::UnnamedResource => match verb {
                Verb::Load | Verb::Refresh | Verb::Update | Verb::Modify => true,
                Verb::Stats => self.object_has_stats,
                _ => false,
            },
        }
    }

    /// CRUD verbs this type accepts, in canonical order.
    pub fn supported_verbs(&self) -> Vec<Verb> {
        Verb::CRUD
            .into_iter()
            .filter(|v| self.supports(*v))
            .collect()
    }

    pub fn ensure_supported(&self, verb: Verb) -> Result<(), CoreError> {
        if self.supports(verb) {
            return Ok(());
        }
        Err(CoreError::UnsupportedMethod {
            type_name: self.type_name.clone(),
            verb,
            supported: self.supported_verbs(),
        })
    }

    // ── Parameter validation ─────────────────────────────────────────

    /// Fail with every absent required creation parameter, not just the first.
    pub fn validate_creation(&self, params: &Map<String, Value>) -> Result<(), CoreError> {
        let missing = missing_keys(&self.creation_parameters(), params);
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::MissingRequiredCreationParameter {
            type_name: self.type_name.clone(),
            missing,
        })
    }

    pub fn validate_load(&self, params: &Map<String, Value>) -> Result<(), CoreError> {
        let missing = missing_keys(&self.load_parameters(), params);
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::MissingRequiredLoadParameter {
            type_name: self.type_name.clone(),
            missing,
        })
    }

    /// Run this type's validator hooks against an identity.
    pub fn run_validators(&self, verb: Verb, identity: &Identity) -> Result<(), CoreError> {
        for name in &self.validators {
            let hook = hooks::lookup(name).ok_or_else(|| CoreError::Catalog {
                message: format!("{} names unknown validator '{name}'", self.type_name),
            })?;
            hook(verb, identity).map_err(|reason| CoreError::InvalidIdentity {
                type_name: self.type_name.clone(),
                verb,
                reason,
            })?;
        }
        Ok(())
    }

    // ── Kind handling ────────────────────────────────────────────────

    /// Type name registered for a polymorphic item's `kind`.
    pub fn resolve_child_type(&self, kind: &str) -> Result<&str, CoreError> {
        self.attribute_registry
            .get(kind)
            .map(String::as_str)
            .ok_or_else(|| CoreError::UnrecognizedKind {
                type_name: self.type_name.clone(),
                kind: kind.to_owned(),
            })
    }

    /// Compare an echoed kind against `required_json_kind`.
    pub fn check_kind(&self, verb: Verb, received: Option<&Value>) -> Result<(), CoreError> {
        let Some(ref expected) = self.required_json_kind else {
            return Ok(());
        };
        let received = received.and_then(Value::as_str).unwrap_or_default();
        if received == expected {
            return Ok(());
        }
        Err(CoreError::KindMismatch {
            type_name: self.type_name.clone(),
            verb,
            expected: expected.clone(),
            received: received.to_owned(),
        })
    }

    // ── Version gating ───────────────────────────────────────────────

    pub fn check_version(&self, device: Option<&DeviceVersion>) -> Result<(), CoreError> {
        match (&self.minimum_version, device) {
            (Some(minimum), Some(device)) if device < minimum => {
                Err(CoreError::UnsupportedVersion {
                    type_name: self.type_name.clone(),
                    minimum: minimum.clone(),
                    device: device.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn missing_keys(required: &BTreeSet<String>, params: &Map<String, Value>) -> Vec<String> {
    required
        .iter()
        .filter(|key| params.get(key.as_str()).is_none_or(Value::is_null))
        .cloned()
        .collect()
}

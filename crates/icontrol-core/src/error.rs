// ── Core error types ──
//
// Three families: local validation (raised before any request),
// remote rejection (the device answered non-2xx, message kept verbatim),
// and hydration consistency (the device echoed an unexpected kind).
// Every variant names the resource type and, where one applies, the verb.

use thiserror::Error;

use crate::meta::Verb;
use crate::version::DeviceVersion;

/// Unified error type for the resource runtime.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Local validation ─────────────────────────────────────────────
    #[error("Missing required creation parameter(s) for {type_name}: {}", .missing.join(", "))]
    MissingRequiredCreationParameter {
        type_name: String,
        missing: Vec<String>,
    },

    #[error("Missing required load parameter(s) for {type_name}: {}", .missing.join(", "))]
    MissingRequiredLoadParameter {
        type_name: String,
        missing: Vec<String>,
    },

    #[error("Invalid parameters for {type_name} {verb}: {reason}")]
    InvalidParameters {
        type_name: String,
        verb: Verb,
        reason: String,
    },

    #[error("Invalid identity for {type_name} {verb}: {reason}")]
    InvalidIdentity {
        type_name: String,
        verb: Verb,
        reason: String,
    },

    #[error("{type_name} does not support the {verb} method{}", supported_hint(.supported))]
    UnsupportedMethod {
        type_name: String,
        verb: Verb,
        supported: Vec<Verb>,
    },

    #[error("'{attribute}' is not an attribute of {type_name}")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },

    #[error("Unknown resource type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("{type_name} has no registered type for kind '{kind}'")]
    UnrecognizedKind { type_name: String, kind: String },

    #[error("{type_name} requires device version {minimum} or newer (device runs {device})")]
    UnsupportedVersion {
        type_name: String,
        minimum: DeviceVersion,
        device: DeviceVersion,
    },

    // ── Node lifecycle ───────────────────────────────────────────────
    #[error("{type_name} was deleted; {verb} is no longer possible on this node")]
    Deleted { type_name: String, verb: Verb },

    #[error("{type_name} is not bound to a device entity; {verb} needs a prior create or load")]
    Unbound { type_name: String, verb: Verb },

    #[error("{type_name} is already bound to {uri}; {verb} needs a node fresh from navigation")]
    AlreadyBound {
        type_name: String,
        verb: Verb,
        uri: String,
    },

    // ── Hydration consistency ────────────────────────────────────────
    #[error("{type_name} {verb} returned kind '{received}', expected '{expected}'")]
    KindMismatch {
        type_name: String,
        verb: Verb,
        expected: String,
        received: String,
    },

    #[error("Unexpected response to {type_name} {verb}: {message}")]
    InvalidResponse {
        type_name: String,
        verb: Verb,
        message: String,
    },

    // ── Remote rejection ─────────────────────────────────────────────
    #[error("{type_name} {verb} rejected by device (HTTP {status}): {message}")]
    Remote {
        type_name: String,
        verb: Verb,
        status: u16,
        /// Device-supplied message, verbatim.
        message: String,
        body: String,
    },

    #[error("{type_name} {verb} failed: {source}")]
    Transport {
        type_name: String,
        verb: Verb,
        #[source]
        source: icontrol_api::Error,
    },

    // ── Setup ────────────────────────────────────────────────────────
    #[error("Invalid URI for {type_name}: {source}")]
    Uri {
        type_name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid resource catalog: {message}")]
    Catalog { message: String },
}

fn supported_hint(supported: &[Verb]) -> String {
    match supported {
        [] => String::new(),
        [only] => format!(", only {only} is supported"),
        [init @ .., last] => {
            let init: Vec<String> = init.iter().map(ToString::to_string).collect();
            format!(", only {} and {last} are supported", init.join(", "))
        }
    }
}

impl CoreError {
    /// Wrap a transport failure with the resource type and verb.
    ///
    /// Non-2xx answers become [`CoreError::Remote`] with the device's
    /// status and text untouched; everything else stays a transport error.
    pub fn from_api(type_name: &str, verb: Verb, err: icontrol_api::Error) -> Self {
        match err {
            icontrol_api::Error::Http {
                status,
                message,
                body,
            } => Self::Remote {
                type_name: type_name.to_owned(),
                verb,
                status,
                message,
                body,
            },
            other => Self::Transport {
                type_name: type_name.to_owned(),
                verb,
                source: other,
            },
        }
    }

    /// `true` for errors raised before any request went out.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            Self::Remote { .. }
                | Self::Transport { .. }
                | Self::KindMismatch { .. }
                | Self::InvalidResponse { .. }
        )
    }

    /// HTTP status of a remote rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_method_names_alternatives() {
        let err = CoreError::UnsupportedMethod {
            type_name: "Logical_Disk".into(),
            verb: Verb::Update,
            supported: vec![Verb::Load, Verb::Refresh],
        };
        assert_eq!(
            err.to_string(),
            "Logical_Disk does not support the update method, only load and refresh are supported"
        );
    }

    #[test]
    fn unsupported_method_without_alternatives() {
        let err = CoreError::UnsupportedMethod {
            type_name: "Ltm".into(),
            verb: Verb::Create,
            supported: Vec::new(),
        };
        assert_eq!(err.to_string(), "Ltm does not support the create method");
    }

    #[test]
    fn missing_parameters_lists_every_field() {
        let err = CoreError::MissingRequiredCreationParameter {
            type_name: "Member".into(),
            missing: vec!["name".into(), "partition".into()],
        };
        assert!(err.to_string().ends_with("Member: name, partition"));
        assert!(err.is_local());
    }

    #[test]
    fn http_errors_become_remote_rejections() {
        let err = CoreError::from_api(
            "Pool",
            Verb::Load,
            icontrol_api::Error::Http {
                status: 404,
                message: "01020036:3: The requested Pool (/Common/gone) was not found.".into(),
                body: String::new(),
            },
        );
        assert!(err.is_not_found());
        assert!(!err.is_local());
        assert!(err.to_string().contains("Pool load rejected by device (HTTP 404)"));
    }
}

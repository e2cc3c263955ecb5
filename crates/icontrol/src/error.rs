//! CLI error types with miette diagnostics.
//!
//! Maps runtime, transport and config errors into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use icontrol_config::ConfigError;
use icontrol_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the device at {url}")]
    #[diagnostic(
        code(icontrol::connection_failed),
        help(
            "Check that the management address is reachable.\n\
             Self-signed certificates need --insecure (-k) or ca_cert in the profile."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(icontrol::auth_failed),
        help(
            "Verify the username and password.\n\
             Store a password with: icontrol config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(icontrol::no_credentials),
        help("Pass --username and --password, or set ICONTROL_USERNAME / ICONTROL_PASSWORD.")
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(icontrol::not_found),
        help("Run: icontrol list <collection> to see what exists")
    )]
    NotFound { message: String },

    #[error("{message}")]
    #[diagnostic(code(icontrol::conflict))]
    Conflict { message: String },

    #[error(transparent)]
    #[diagnostic(
        code(icontrol::unsupported),
        help("Run: icontrol describe <path> to see the supported verbs")
    )]
    Unsupported(CoreError),

    #[error(transparent)]
    #[diagnostic(code(icontrol::invalid_request))]
    InvalidRequest(CoreError),

    // ── Device ───────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(icontrol::device_error))]
    Device(CoreError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(icontrol::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No device configured")]
    #[diagnostic(
        code(icontrol::no_config),
        help(
            "Pass --host, set ICONTROL_HOST, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(icontrol::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(icontrol::json), help("Check the JSON document and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Output rendering failed: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Unsupported(_) => exit_code::UNSUPPORTED,
            Self::Validation { .. }
            | Self::InvalidRequest(_)
            | Self::NoConfig { .. }
            | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if matches!(
            err,
            CoreError::UnsupportedMethod { .. } | CoreError::UnsupportedVersion { .. }
        ) {
            return Self::Unsupported(err);
        }
        if let CoreError::Transport { source, .. } = err {
            return source.into();
        }
        match err.status() {
            Some(404) => Self::NotFound {
                message: err.to_string(),
            },
            Some(409) => Self::Conflict {
                message: err.to_string(),
            },
            Some(401) => Self::AuthFailed {
                profile: "current".into(),
                message: err.to_string(),
            },
            _ if err.is_local() => Self::InvalidRequest(err),
            _ => Self::Device(err),
        }
    }
}

impl From<icontrol_api::Error> for CliError {
    fn from(err: icontrol_api::Error) -> Self {
        let url = match &err {
            icontrol_api::Error::Authentication { message } => {
                return Self::AuthFailed {
                    profile: "current".into(),
                    message: message.clone(),
                };
            }
            icontrol_api::Error::Transport(e) => {
                e.url().map_or_else(|| "(unknown)".into(), ToString::to_string)
            }
            _ => "(request)".into(),
        };
        Self::ConnectionFailed {
            url,
            source: Box::new(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use icontrol_core::Verb;

    use super::*;

    #[test]
    fn remote_not_found_maps_to_exit_code_4() {
        let err: CliError = CoreError::Remote {
            type_name: "Pool".into(),
            verb: Verb::Load,
            status: 404,
            message: "01020036:3: The requested Pool (/Common/web) was not found.".into(),
            body: String::new(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(err.to_string().contains("/Common/web"));
    }

    #[test]
    fn local_validation_is_a_usage_error() {
        let err: CliError = CoreError::MissingRequiredCreationParameter {
            type_name: "Node".into(),
            missing: vec!["address".into()],
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn unsupported_verb_keeps_its_message() {
        let err: CliError = CoreError::UnsupportedMethod {
            type_name: "Logical_Disk".into(),
            verb: Verb::Create,
            supported: vec![Verb::Load, Verb::Refresh],
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::UNSUPPORTED);
        assert!(err.to_string().contains("only load and refresh are supported"));
    }
}

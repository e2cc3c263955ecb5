//! Configuration for iControl REST tools.
//!
//! TOML profiles, password resolution (env + keyring + plaintext) and
//! translation to an `icontrol_api` transport setup. The CLI layers its
//! flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use icontrol_api::auth::DEFAULT_LOGIN_PROVIDER;
use icontrol_api::{Credentials, RetryPolicy, TlsMode, TransportConfig};

/// Keyring service name; entries are keyed `{profile}/password`.
pub const KEYRING_SERVICE: &str = "icontrol";

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "ICONTROL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.to_owned(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Retries for idempotent requests on transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_retries() -> u32 {
    2
}

/// A named device profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Management address, a bare host (`10.0.0.5`) or a URL.
    pub host: String,

    /// HTTPS port when `host` is bare.
    pub port: Option<u16>,

    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Exchange the password for an auth token at connect time.
    #[serde(default)]
    pub token_auth: bool,

    /// Login provider for token auth (defaults to `tmos`).
    pub login_provider: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override the global insecure setting.
    pub insecure: Option<bool>,

    /// Override the global timeout (seconds).
    pub timeout: Option<u64>,

    /// Pin the REST API version (`ver=` query parameter).
    pub api_version: Option<String>,
}

impl Profile {
    /// Management base URL built from `host` and `port`.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::Validation {
            field: "host".into(),
            reason,
        };
        if self.host.trim().is_empty() {
            return Err(invalid("host is empty".into()));
        }

        let raw = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("https://{}", self.host)
        };
        let mut url = Url::parse(&raw).map_err(|e| invalid(format!("{raw}: {e}")))?;
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|()| invalid(format!("{raw}: cannot carry a port")))?;
        }
        Ok(url)
    }
}

// ── Connection settings ─────────────────────────────────────────────

/// Everything needed to open a session against one device.
#[derive(Debug, Clone)]
pub struct Connection {
    pub base_url: Url,
    pub credentials: Credentials,
    pub transport: TransportConfig,
    /// Swap the credentials for a token via `HttpTransport::login`.
    pub token_auth: bool,
    pub login_provider: String,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "icontrol", "icontrol").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("icontrol");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` plus `ICONTROL_*` environment overrides.
///
/// A missing file is not an error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML at the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password: `password_env` → keyring → plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let keyring_err = |e: keyring::Error| ConfigError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    };
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(keyring_err)
}

/// Resolve basic credentials for a profile.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password = resolve_password(profile, profile_name)?;
    Ok(Credentials::Basic { username, password })
}

/// Build a [`Connection`] from a profile and the global defaults.
pub fn profile_to_connection(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<Connection, ConfigError> {
    let base_url = profile.base_url()?;
    let credentials = resolve_credentials(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let retry = RetryPolicy {
        max_retries: defaults.retries,
        ..RetryPolicy::default()
    };

    Ok(Connection {
        base_url,
        credentials,
        transport: TransportConfig {
            tls,
            timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
            retry,
            api_version: profile.api_version.clone(),
        },
        token_auth: profile.token_auth,
        login_provider: profile
            .login_provider
            .clone()
            .unwrap_or_else(|| DEFAULT_LOGIN_PROVIDER.to_owned()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile(host: &str) -> Profile {
        Profile {
            host: host.into(),
            username: Some("admin".into()),
            password: Some("plain".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.defaults.retries, 2);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "lab"

[defaults]
timeout = 10

[profiles.lab]
host = "10.0.0.5"
port = 8443
username = "admin"
password = "secret"
token_auth = true
api_version = "13.1.0"
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (name, lab) = cfg.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(lab.port, Some(8443));
        assert!(lab.token_auth);
        assert_eq!(cfg.defaults.timeout, 10);
        assert!(matches!(
            cfg.profile(Some("prod")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("default".into(), profile("bigip.lab"));
        save_config_to(&cfg, &path).unwrap();

        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.profiles["default"].host, "bigip.lab");
    }

    #[test]
    fn base_url_from_bare_host_and_port() {
        let mut p = profile("10.0.0.5");
        assert_eq!(p.base_url().unwrap().as_str(), "https://10.0.0.5/");
        p.port = Some(8443);
        assert_eq!(p.base_url().unwrap().as_str(), "https://10.0.0.5:8443/");
        assert_eq!(
            profile("http://127.0.0.1:9000").base_url().unwrap().as_str(),
            "http://127.0.0.1:9000/"
        );
        assert!(profile(" ").base_url().is_err());
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        // PATH is always set, so no process-global env mutation is needed.
        let mut p = profile("10.0.0.5");
        p.password_env = Some("PATH".into());
        let expected = std::env::var("PATH").unwrap();
        let resolved = resolve_password(&p, "icontrol-test-no-keyring-entry").unwrap();
        assert_eq!(resolved.expose_secret(), expected);
    }

    #[test]
    fn missing_username_is_reported() {
        let mut p = profile("10.0.0.5");
        p.username = None;
        assert!(matches!(
            resolve_credentials(&p, "lab"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn connection_applies_profile_overrides() {
        let mut p = profile("10.0.0.5");
        p.timeout = Some(5);
        p.api_version = Some("12.1.0".into());
        p.insecure = Some(true);

        let conn = profile_to_connection(&p, "icontrol-test-no-keyring-entry", &Defaults::default())
            .unwrap();
        assert_eq!(conn.transport.timeout, Duration::from_secs(5));
        assert_eq!(conn.transport.api_version.as_deref(), Some("12.1.0"));
        assert!(matches!(conn.transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(conn.transport.retry.max_retries, 2);
        assert_eq!(conn.login_provider, "tmos");
        assert!(!conn.token_auth);
    }

    #[test]
    fn custom_ca_used_when_not_insecure() {
        let mut p = profile("10.0.0.5");
        p.ca_cert = Some(PathBuf::from("/etc/ssl/bigip.pem"));
        let conn = profile_to_connection(&p, "icontrol-test-no-keyring-entry", &Defaults::default())
            .unwrap();
        assert!(matches!(conn.transport.tls, TlsMode::CustomCa(_)));
    }
}

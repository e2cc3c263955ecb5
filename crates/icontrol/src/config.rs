//! CLI configuration: thin wrapper around `icontrol_config`.
//!
//! Adds the `GlobalOpts` flag overrides (--host, --username, ...) on top of
//! the selected profile.

use secrecy::SecretString;

use icontrol_api::Credentials;
use icontrol_config::{Connection, Profile, profile_to_connection};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use icontrol_config::{Config, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the connection settings: profile values overridden by flags.
pub fn resolve_connection(global: &GlobalOpts, config: &Config) -> Result<Connection, CliError> {
    let profile_name = active_profile_name(global, config);
    let mut profile = config
        .profiles
        .get(&profile_name)
        .cloned()
        .unwrap_or_default();
    apply_overrides(&mut profile, global);

    if profile.host.trim().is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let mut connection = profile_to_connection(&profile, &profile_name, &config.defaults)?;

    // A password given on the command line beats the keyring.
    if let (Some(flag), Credentials::Basic { password, .. }) =
        (global.password.as_ref(), &mut connection.credentials)
    {
        *password = SecretString::from(flag.clone());
    }
    Ok(connection)
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
        // A host given on the command line carries its own port, if any.
        profile.port = None;
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if profile.password.is_none() {
        profile.password.clone_from(&global.password);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    if global.token_auth {
        profile.token_auth = true;
    }
    if global.api_version.is_some() {
        profile.api_version.clone_from(&global.api_version);
    }
}

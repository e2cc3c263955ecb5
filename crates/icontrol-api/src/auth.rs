use secrecy::SecretString;

/// Credentials for authenticating against the management API.
///
/// Each variant carries the secret material needed for its auth flow.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// HTTP basic auth on every request.
    Basic {
        username: String,
        password: SecretString,
    },

    /// Token issued by `/mgmt/shared/authn/login`, sent as `X-F5-Auth-Token`.
    Token { token: SecretString },

    /// No credentials attached (pre-authenticated proxies, tests).
    None,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Login provider used when exchanging a password for a token.
pub const DEFAULT_LOGIN_PROVIDER: &str = "tmos";

/// Header carrying the auth token on token-authenticated sessions.
pub const TOKEN_HEADER: &str = "X-F5-Auth-Token";

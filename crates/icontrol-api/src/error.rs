use thiserror::Error;

/// Top-level error type for the `icontrol-api` crate.
///
/// Covers every failure the transport can surface: authentication,
/// connection, TLS, non-2xx device responses, and undecodable bodies.
/// `icontrol-core` wraps these with resource and verb context.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the device rejected the supplied credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Device ──────────────────────────────────────────────────────
    /// Non-2xx response. `message` is the device's own text, verbatim.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Returns `true` if the device answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The HTTP status code, when the device answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Authentication { .. } => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> Error {
        Error::Http {
            status,
            message: "boom".into(),
            body: String::new(),
        }
    }

    #[test]
    fn not_found_is_plain_http_404() {
        assert!(http(404).is_not_found());
        assert!(!http(400).is_not_found());
        assert_eq!(http(409).status(), Some(409));
    }

    #[test]
    fn gateway_errors_are_transient() {
        assert!(http(503).is_transient());
        assert!(http(502).is_transient());
        assert!(!http(500).is_transient());
        assert!(!http(404).is_transient());
    }

    #[test]
    fn display_keeps_device_message() {
        assert_eq!(http(400).to_string(), "HTTP 400: boom");
    }
}

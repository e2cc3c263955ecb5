// Async HTTP transport for the iControl REST API.
//
// Base path: /mgmt/
// Auth: HTTP basic or X-F5-Auth-Token

use std::fmt;
use std::sync::RwLock;

use futures_util::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{Credentials, TOKEN_HEADER};
use crate::error::Error;
use crate::transport::TransportConfig;

// ── Error response shape from the device ─────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

// ── Request / reply ──────────────────────────────────────────────────

/// HTTP verbs the management API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Verbs that can be replayed without changing the outcome.
    pub fn is_idempotent(self) -> bool {
        matches!(self, Self::Get | Self::Put | Self::Delete)
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// One HTTP exchange, as issued by the resource runtime.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A successful (2xx) device reply. Empty bodies decode to `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

// ── Transport capability ─────────────────────────────────────────────

/// The transport capability the resource runtime is built against.
///
/// Implementations own authentication, retry and timeout policy. Any
/// non-2xx answer must surface as [`Error::Http`] carrying the status and
/// the device's body so callers can match on them.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> BoxFuture<'_, Result<Reply, Error>>;

    fn get(&self, url: Url, query: Vec<(String, String)>) -> BoxFuture<'_, Result<Reply, Error>> {
        self.execute(Request::new(Method::Get, url).with_query(query))
    }

    fn post(&self, url: Url, body: Value) -> BoxFuture<'_, Result<Reply, Error>> {
        self.execute(Request::new(Method::Post, url).with_body(body))
    }

    fn put(&self, url: Url, body: Value) -> BoxFuture<'_, Result<Reply, Error>> {
        self.execute(Request::new(Method::Put, url).with_body(body))
    }

    fn patch(&self, url: Url, body: Value) -> BoxFuture<'_, Result<Reply, Error>> {
        self.execute(Request::new(Method::Patch, url).with_body(body))
    }

    fn delete(&self, url: Url) -> BoxFuture<'_, Result<Reply, Error>> {
        self.execute(Request::new(Method::Delete, url))
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// reqwest-backed [`Transport`] for a single management endpoint.
///
/// One instance is shared read-only by every resource node of a session;
/// the pooled connection inside `reqwest::Client` is reused across calls.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    config: TransportConfig,
    /// Swapped to `Credentials::Token` after a successful [`login`](Self::login).
    credentials: RwLock<Credentials>,
}

impl HttpTransport {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a transport from a base URL (e.g. `https://10.0.0.5`),
    /// credentials and transport config.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        config: TransportConfig,
    ) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self::with_client(http, base_url, credentials, config))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
        config: TransportConfig,
    ) -> Self {
        Self {
            http,
            base_url,
            config,
            credentials: RwLock::new(credentials),
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    // ── Token auth ───────────────────────────────────────────────────

    /// Exchange username/password for an auth token.
    ///
    /// `POST /mgmt/shared/authn/login`. On success every subsequent request
    /// carries `X-F5-Auth-Token` instead of basic auth.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        login_provider: &str,
    ) -> Result<(), Error> {
        let url = join_path(&self.base_url, "mgmt/shared/authn/login")?;
        debug!(%url, login_provider, "requesting auth token");

        let resp = self
            .http
            .post(url)
            .json(&json!({
                "username": username,
                "password": password.expose_secret(),
                "loginProviderName": login_provider,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let body: Value = resp.json().await?;
        let token = body
            .pointer("/token/token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no token".into(),
            })?;

        *self.credentials.write().expect("credentials lock poisoned") = Credentials::Token {
            token: SecretString::from(token.to_owned()),
        };
        debug!("token login successful");
        Ok(())
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.credentials.read().expect("credentials lock poisoned");
        match &*guard {
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
            Credentials::Token { token } => builder.header(TOKEN_HEADER, token.expose_secret()),
            Credentials::None => builder,
        }
    }

    // ── Request execution ────────────────────────────────────────────

    async fn execute_with_retry(&self, request: Request) -> Result<Reply, Error> {
        let retries = if request.method.is_idempotent() {
            self.config.retry.max_retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Err(e) if attempt < retries && e.is_transient() => {
                    attempt += 1;
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        ?delay,
                        "transient failure on {} {}, retrying",
                        request.method,
                        request.url
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once(&self, request: &Request) -> Result<Reply, Error> {
        debug!("{} {}", request.method, request.url);

        let mut query = request.query.clone();
        if let Some(ref ver) = self.config.api_version {
            if !query.iter().any(|(k, _)| k == "ver") {
                query.push(("ver".into(), ver.clone()));
            }
        }

        let mut builder = self
            .http
            .request(request.method.as_reqwest(), request.url.clone());
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        builder = self.apply_auth(builder);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        handle_response(resp).await
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request) -> BoxFuture<'_, Result<Reply, Error>> {
        Box::pin(self.execute_with_retry(request))
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response(resp: reqwest::Response) -> Result<Reply, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(parse_error(status, resp).await);
    }

    let body = resp.text().await?;
    trace!(status = status.as_u16(), bytes = body.len(), "response received");
    if body.trim().is_empty() {
        return Ok(Reply {
            status: status.as_u16(),
            body: Value::Null,
        });
    }

    let value = serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })?;
    Ok(Reply {
        status: status.as_u16(),
        body: value,
    })
}

async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorResponse>(&raw)
        .ok()
        .and_then(|err| err.message)
        .unwrap_or_else(|| {
            if raw.is_empty() {
                status.to_string()
            } else {
                raw.clone()
            }
        });

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::Authentication { message };
    }

    Error::Http {
        status: status.as_u16(),
        message,
        body: raw,
    }
}

// ── Device version discovery ─────────────────────────────────────────

/// Read the device software version once per session.
///
/// `GET /mgmt/tm/sys/` echoes a `selfLink` of the form
/// `https://localhost/mgmt/tm/sys?ver=13.1.0`; the `ver` query parameter
/// is the running version. Returns `None` when the device omits it.
pub async fn fetch_device_version(
    transport: &dyn Transport,
    base_url: &Url,
) -> Result<Option<String>, Error> {
    let url = join_path(base_url, "mgmt/tm/sys/")?;
    let reply = transport.get(url, Vec::new()).await?;

    let Some(link) = reply.body.get("selfLink").and_then(Value::as_str) else {
        return Ok(None);
    };
    let link = Url::parse(link)?;
    let version = link
        .query_pairs()
        .find(|(k, _)| k == "ver")
        .map(|(_, v)| v.into_owned());
    debug!(?version, "device version discovered");
    Ok(version)
}

fn join_path(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_verbs() {
        assert!(Method::Get.is_idempotent());
        assert!(Method::Put.is_idempotent());
        assert!(Method::Delete.is_idempotent());
        assert!(!Method::Post.is_idempotent());
        assert!(!Method::Patch.is_idempotent());
    }

    #[test]
    fn join_path_ignores_trailing_slash() -> Result<(), Error> {
        let with = Url::parse("https://10.0.0.5/")?;
        let without = Url::parse("https://10.0.0.5")?;
        assert_eq!(join_path(&with, "mgmt/tm/")?, join_path(&without, "mgmt/tm/")?);
        assert_eq!(
            join_path(&without, "mgmt/tm/")?.as_str(),
            "https://10.0.0.5/mgmt/tm/"
        );
        Ok(())
    }
}

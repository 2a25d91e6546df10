// src/transport/mod.rs

//! Transport contract for talking to the ledger server
//!
//! Everything above this layer sees the server through [`Transport`]: a
//! streamed GET, a JSON PUT and a form POST. Each call takes the stored
//! [`Connection`] of a profile and optional one-shot credentials used when
//! testing a connection before it is saved.

pub mod http;

use std::io::Read;
use thiserror::Error;

pub use http::{HttpSettings, HttpTransport};

/// Streamed response body
pub type ResponseBody = Box<dyn Read + Send>;

/// Failures reported by a transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// HTTP 401
    #[error("authentication required")]
    NotAuthenticated,

    /// HTTP 404
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP 400 or 405: the server does not understand this request shape
    #[error("request not supported (HTTP {status}): {body}")]
    Unsupported { status: u16, body: String },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (DNS, refused, TLS, reset)
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, path: &str, body: String) -> Self {
        match status {
            401 => Self::NotAuthenticated,
            404 => Self::NotFound(path.to_string()),
            400 | 405 => Self::Unsupported { status, body },
            _ => Self::Http { status, message: body },
        }
    }
}

/// HTTP Basic credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// One-shot credentials overriding whatever a profile has stored
pub type TemporaryAuth = Credentials;

/// Where and how to reach one ledger server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub url: String,
    pub credentials: Option<Credentials>,
}

impl Connection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Absolute URL of `path` relative to the server root
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Credentials to send: one-shot ones win over stored ones
    pub fn effective_credentials<'a>(&'a self, auth: Option<&'a TemporaryAuth>) -> Option<&'a Credentials> {
        auth.or(self.credentials.as_ref())
    }
}

/// Result of a form POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResponse {
    pub status: u16,
    pub body: String,
    /// `name=value` pairs from `Set-Cookie` headers
    pub cookies: Vec<(String, String)>,
}

impl FormResponse {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Server access used by fetchers, the version detector and the sender
pub trait Transport: Send + Sync {
    /// GET `path`, returning the body as a stream
    fn get(
        &self,
        conn: &Connection,
        path: &str,
        auth: Option<&TemporaryAuth>,
    ) -> std::result::Result<ResponseBody, TransportError>;

    /// PUT a JSON document to `path`
    fn put_json(
        &self,
        conn: &Connection,
        path: &str,
        body: &[u8],
        auth: Option<&TemporaryAuth>,
    ) -> std::result::Result<(), TransportError>;

    /// POST an url-encoded form without following redirects
    ///
    /// 2xx and 3xx statuses are returned as a [`FormResponse`]; everything
    /// else is an error.
    fn post_form(
        &self,
        conn: &Connection,
        path: &str,
        fields: &[(String, String)],
        cookies: &[(String, String)],
        auth: Option<&TemporaryAuth>,
    ) -> std::result::Result<FormResponse, TransportError>;
}

/// Extract `name=value` from a `Set-Cookie` header value
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.trim().to_string()))
}

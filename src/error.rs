// src/error.rs

//! Error types for ledger-mirror
//!
//! Fetchers, parsers and the reconciler all raise this raw error type. The
//! sync orchestrator classifies it into [`crate::sync::SyncError`] exactly
//! once, before anything reaches a caller.

use crate::transport::TransportError;
use serde_json::error::Category;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Raw failures raised by the library
#[derive(Error, Debug)]
pub enum Error {
    /// The transport reported a failure (HTTP status, connection, timeout)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed payload: JSON that does not fit the wire schema, an
    /// unparseable date or amount
    #[error("parse error: {0}")]
    ParseError(String),

    /// None of the enumerated JSON API versions was accepted by the server
    #[error("no supported API version: {0}")]
    ApiNotSupported(String),

    /// A version tag that has no gateway (auto, html)
    #[error("unsupported API version tag: {0}")]
    UnsupportedVersion(String),

    /// The server rejected submitted data
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation was cancelled cooperatively
    #[error("operation cancelled")]
    Cancelled,

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON that is malformed or does not fit the wire schema
    #[error("JSON error: {0}")]
    Json(serde_json::Error),

    /// IO error while reading a response body or a local file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing prerequisite (unsaved profile, uninitialised database, ...)
    #[error("initialization error: {0}")]
    InitError(String),

    /// Record lookup failed
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a parse error with a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// True when this error means "try another API version"
    ///
    /// Only a rejected request or a payload of the wrong shape qualifies.
    /// Malformed or truncated bytes and bad values inside a well-formed
    /// payload fail the same way under every generation.
    pub fn is_version_mismatch(&self) -> bool {
        match self {
            Self::ApiNotSupported(_) | Self::Transport(TransportError::Unsupported { .. }) => true,
            Self::Json(e) => e.classify() == Category::Data,
            _ => false,
        }
    }
}

/// Read failures surfacing through the JSON reader stay I/O errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(std::io::Error::from(err))
        } else {
            Self::Json(err)
        }
    }
}

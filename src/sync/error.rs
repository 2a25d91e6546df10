// src/sync/error.rs

//! Sync failure taxonomy
//!
//! Everything below the syncer raises [`crate::Error`]. [`SyncError::from_error`]
//! is the single place where those raw failures are classified before they
//! reach a caller.

use crate::error::Error;
use crate::transport::TransportError;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// Retry policy class for a failed sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    /// Only worth retrying with new credentials
    ReauthRequired,
}

/// Field-less discriminant of [`SyncError`], for matching and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SyncErrorKind {
    Network,
    Timeout,
    Authentication,
    Server,
    Validation,
    Parse,
    ApiVersion,
    Cancelled,
    Unknown,
}

/// Classified sync failure as seen by callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failed")]
    Authentication,

    #[error("server error (HTTP {code}): {message}")]
    Server { code: u16, message: String },

    /// The server rejected data we sent
    #[error("rejected by server: {0}")]
    Validation(String),

    #[error("malformed server response: {0}")]
    Parse(String),

    /// No API version the server accepts
    #[error("unsupported server API: {0}")]
    ApiVersion(String),

    #[error("sync cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(String),
}

impl SyncError {
    /// Classify a raw library error
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Transport(transport) => match transport {
                TransportError::NotAuthenticated => Self::Authentication,
                TransportError::NotFound(path) => Self::Server {
                    code: 404,
                    message: format!("{path} not found"),
                },
                TransportError::Unsupported { status, body } => {
                    Self::ApiVersion(format!("HTTP {status}: {body}"))
                }
                TransportError::Http { status, message } => Self::Server {
                    code: *status,
                    message: message.clone(),
                },
                TransportError::Timeout => Self::Timeout,
                TransportError::Network(msg) => Self::Network(msg.clone()),
            },
            Error::ParseError(msg) => Self::Parse(msg.clone()),
            Error::Json(e) => Self::Parse(e.to_string()),
            Error::ApiNotSupported(msg) | Error::UnsupportedVersion(msg) => {
                Self::ApiVersion(msg.clone())
            }
            Error::Validation(msg) => Self::Validation(msg.clone()),
            Error::Cancelled => Self::Cancelled,
            Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => Self::Timeout,
            Error::Io(e) => Self::Network(e.to_string()),
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Network(_) => SyncErrorKind::Network,
            Self::Timeout => SyncErrorKind::Timeout,
            Self::Authentication => SyncErrorKind::Authentication,
            Self::Server { .. } => SyncErrorKind::Server,
            Self::Validation(_) => SyncErrorKind::Validation,
            Self::Parse(_) => SyncErrorKind::Parse,
            Self::ApiVersion(_) => SyncErrorKind::ApiVersion,
            Self::Cancelled => SyncErrorKind::Cancelled,
            Self::Unknown(_) => SyncErrorKind::Unknown,
        }
    }

    /// Whether repeating the same sync may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Server { code, .. } => *code >= 500,
            _ => false,
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Authentication => RetryClass::ReauthRequired,
            e if e.is_retryable() => RetryClass::Retryable,
            _ => RetryClass::Permanent,
        }
    }
}

impl From<Error> for SyncError {
    fn from(err: Error) -> Self {
        Self::from_error(&err)
    }
}

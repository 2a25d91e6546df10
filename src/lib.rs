// src/lib.rs

//! Ledger Mirror
//!
//! Offline mirror of a remote plain-text accounting server (hledger-web).
//! Accounts and transactions are pulled into a local SQLite store and new
//! transactions are pushed back.
//!
//! # Architecture
//!
//! - Transport: blocking HTTP behind the [`transport::Transport`] trait
//! - Gateways: one wire format per JSON API generation, plus the legacy
//!   HTML journal scraper
//! - Sync: full snapshot fetch, then a generation-tagged reconcile in a
//!   single database transaction
//! - Database-first: all mirrored state lives in SQLite

pub mod cancel;
pub mod config;
pub mod db;
mod error;
pub mod fetch;
pub mod gateway;
pub mod hash;
pub mod ledger;
pub mod legacy;
pub mod progress;
pub mod send;
pub mod sync;
pub mod transport;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};
pub use fetch::{RemoteSnapshot, SnapshotSource, fetch_snapshot};
pub use gateway::{ApiVersion, Gateway, ServerVersion, detect_version};
pub use ledger::{
    Amount, CommoditySide, CurrencySettings, LedgerAccount, LedgerTransaction, Quantity,
    TransactionLine,
};
pub use progress::{
    ChannelProgress, LogProgress, ProgressSink, SilentProgress, SyncProgress,
    SyncSummary,
};
pub use send::{SendRoute, TransactionSender};
pub use sync::{RetryClass, SyncError, SyncErrorKind, Syncer};
pub use transport::{Connection, Credentials, HttpSettings, HttpTransport, Transport, TransportError};

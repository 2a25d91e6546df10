// src/sync/mod.rs

//! Mirroring a server into the local store

pub mod error;
pub mod reconcile;
pub mod syncer;

pub use error::{RetryClass, SyncError, SyncErrorKind};
pub use reconcile::{ReconcileSummary, append_transaction, reconcile};
pub use syncer::Syncer;

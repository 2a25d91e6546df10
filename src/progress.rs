// src/progress.rs

//! Sync progress events and sinks
//!
//! A sync reports its phases as [`SyncProgress`] events. Every run ends with
//! exactly one terminal event, [`SyncProgress::Finished`] or
//! [`SyncProgress::Failed`].
//!
//! Sinks implement [`ProgressSink`]:
//! - `LogProgress`: logs to tracing
//! - `SilentProgress`: records only the last event
//! - `ChannelProgress`: forwards events over an mpsc channel
//!
//! The command line front end adds an indicatif progress bar on top.

use crate::fetch::SnapshotSource;
use crate::sync::SyncError;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of a successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub source: SnapshotSource,
    pub accounts: usize,
    pub transactions: usize,
    /// Transactions that were already stored unchanged
    pub unchanged: usize,
    pub duration: Duration,
}

/// One step of a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    Starting,
    /// Account list is being fetched; no total is known yet
    FetchingAccounts,
    /// `total` is 0 when the expected number of postings is unknown
    FetchingTransactions { processed: u64, total: u64 },
    Saving,
    Finished(SyncSummary),
    Failed(SyncError),
}

impl SyncProgress {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Failed(_))
    }
}

/// Receiver of sync progress
///
/// Implementations must be thread-safe; a sync may run on a worker thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: SyncProgress);
}

impl<S: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<S> {
    fn report(&self, event: SyncProgress) {
        (**self).report(event)
    }
}

/// Sink that keeps only the most recent event
#[derive(Debug, Default)]
pub struct SilentProgress {
    last: Mutex<Option<SyncProgress>>,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_event(&self) -> Option<SyncProgress> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressSink for SilentProgress {
    fn report(&self, event: SyncProgress) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(event);
        }
    }
}

/// Logging progress sink
///
/// Transaction progress is logged about ten times per fetch to avoid spam.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    last_decile: AtomicU64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_decile: AtomicU64::new(0),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, event: SyncProgress) {
        match event {
            SyncProgress::Starting => {
                self.last_decile.store(0, Ordering::Relaxed);
                info!("{}: starting sync", self.name);
            }
            SyncProgress::FetchingAccounts => info!("{}: fetching accounts", self.name),
            SyncProgress::FetchingTransactions { processed, total } => {
                if total == 0 {
                    return;
                }
                let decile = (processed.min(total) * 10) / total;
                if decile > self.last_decile.swap(decile, Ordering::Relaxed) {
                    info!(
                        "{}: {}% of postings ({}/{})",
                        self.name,
                        decile * 10,
                        processed,
                        total
                    );
                }
            }
            SyncProgress::Saving => info!("{}: saving", self.name),
            SyncProgress::Finished(summary) => info!(
                "{}: synced {} accounts and {} transactions in {:.1}s",
                self.name,
                summary.accounts,
                summary.transactions,
                summary.duration.as_secs_f64()
            ),
            SyncProgress::Failed(err) => warn!("{}: sync failed: {}", self.name, err),
        }
    }
}

/// Sink forwarding every event over a channel
///
/// A disconnected receiver is ignored; the sync still runs to completion.
#[derive(Debug)]
pub struct ChannelProgress {
    sender: Mutex<Sender<SyncProgress>>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<SyncProgress>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: SyncProgress) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(event);
        }
    }
}

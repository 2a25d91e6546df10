// src/sync/syncer.rs

//! Sync orchestration
//!
//! Fetch the full snapshot (JSON, falling back to the journal page), then
//! reconcile it in one transaction. The network part completes before the
//! write transaction opens, so no lock is held across I/O.

use super::error::SyncError;
use super::reconcile::reconcile;
use crate::cancel::CancelToken;
use crate::db::models::Profile;
use crate::error::Result;
use crate::fetch::fetch_snapshot;
use crate::progress::{ChannelProgress, ProgressSink, SyncProgress, SyncSummary};
use crate::transport::Transport;
use rusqlite::Connection;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;
use tracing::{debug, warn};

/// Runs syncs for profiles against one transport
///
/// Callers keep at most one sync per profile running at a time.
#[derive(Clone)]
pub struct Syncer {
    transport: Arc<dyn Transport>,
    cancel: CancelToken,
}

impl Syncer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels syncs run by this syncer
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Sync one profile, blocking until done
    ///
    /// The sink sees `Starting`, the fetch and save phases, then exactly one
    /// of `Finished` or `Failed`.
    pub fn sync(
        &self,
        conn: &mut Connection,
        profile: &Profile,
        sink: &dyn ProgressSink,
    ) -> std::result::Result<SyncSummary, SyncError> {
        let started = Instant::now();
        sink.report(SyncProgress::Starting);

        match self.run(conn, profile, sink, started) {
            Ok(summary) => {
                sink.report(SyncProgress::Finished(summary.clone()));
                Ok(summary)
            }
            Err(e) => {
                let err = SyncError::from_error(&e);
                debug!("Sync of '{}' failed: {:?}", profile.name, e);
                sink.report(SyncProgress::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Sync on a background thread, returning the progress stream
    ///
    /// The stream ends after its terminal event.
    pub fn spawn(self, mut conn: Connection, profile: Profile) -> Receiver<SyncProgress> {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let sink = ChannelProgress::new(tx);
            let _ = self.sync(&mut conn, &profile, &sink);
        });
        rx
    }

    fn run(
        &self,
        conn: &mut Connection,
        profile: &Profile,
        sink: &dyn ProgressSink,
        started: Instant,
    ) -> Result<SyncSummary> {
        let profile_id = profile.require_id()?;
        let server = profile.connection();

        sink.report(SyncProgress::FetchingAccounts);
        let snapshot = fetch_snapshot(
            &*self.transport,
            &server,
            profile.api_version,
            &self.cancel,
            |processed, total| sink.report(SyncProgress::FetchingTransactions { processed, total }),
        )?;

        self.cancel.check()?;
        sink.report(SyncProgress::Saving);
        let stored = reconcile(
            conn,
            profile_id,
            &snapshot.accounts,
            &snapshot.transactions,
            &self.cancel,
        )?;

        if let Err(e) = Profile::touch_last_sync(conn, profile_id) {
            warn!("Could not record sync time for '{}': {}", profile.name, e);
        }

        Ok(SyncSummary {
            source: snapshot.source,
            accounts: stored.accounts,
            transactions: stored.transactions,
            unchanged: stored.unchanged,
            duration: started.elapsed(),
        })
    }
}

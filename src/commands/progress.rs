// src/commands/progress.rs
//! Terminal progress display for syncs
//!
//! Shows a spinner while the account list is fetched, then a bar over the
//! expected number of postings. When the server gives no posting count the
//! bar stays a spinner with a running count.

use indicatif::{ProgressBar, ProgressStyle};
use ledger_mirror::{ProgressSink, SyncProgress};
use std::time::Duration;

/// indicatif-backed progress sink for `sync`
pub struct SyncProgressBar {
    bar: ProgressBar,
    profile: String,
}

impl SyncProgressBar {
    pub fn new(profile: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            profile: profile.to_string(),
        }
    }

    fn show_postings(&self, processed: u64, total: u64) {
        if total == 0 {
            self.bar.set_message(format!("{}: {} postings", self.profile, processed));
            return;
        }
        if self.bar.length() != Some(total) {
            self.bar.set_style(bar_style());
            self.bar.set_length(total);
            self.bar.set_message(format!("{}: postings", self.profile));
        }
        self.bar.set_position(processed.min(total));
    }
}

impl ProgressSink for SyncProgressBar {
    fn report(&self, event: SyncProgress) {
        match event {
            SyncProgress::Starting => {
                self.bar.set_message(format!("{}: connecting", self.profile));
            }
            SyncProgress::FetchingAccounts => {
                self.bar.set_message(format!("{}: fetching accounts", self.profile));
            }
            SyncProgress::FetchingTransactions { processed, total } => {
                self.show_postings(processed, total);
            }
            SyncProgress::Saving => {
                self.bar.set_style(spinner_style());
                self.bar.set_message(format!("{}: saving", self.profile));
            }
            SyncProgress::Finished(summary) => {
                self.bar.finish_with_message(format!(
                    "{}: {} accounts, {} transactions ({} unchanged) in {:.1}s",
                    self.profile,
                    summary.accounts,
                    summary.transactions,
                    summary.unchanged,
                    summary.duration.as_secs_f64()
                ));
            }
            SyncProgress::Failed(err) => {
                self.bar
                    .abandon_with_message(format!("{}: [FAILED: {}]", self.profile, err));
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .expect("Invalid spinner template")
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.green/dim}] {pos}/{len} ({percent}%)")
        .expect("Invalid progress bar template")
        .progress_chars("##-")
}

// src/commands/sync.rs

//! Sync and version detection commands

use super::progress::SyncProgressBar;
use anyhow::{Context, Result};
use ledger_mirror::db::models::Profile;
use ledger_mirror::{
    Config, Connection, HttpTransport, LogProgress, ProgressSink, Syncer, detect_version,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn cmd_sync(db_path: &Path, config: &Config, profile_name: &str, quiet: bool) -> Result<()> {
    let mut conn = ledger_mirror::db::open(db_path)?;
    let profile = Profile::get_by_name(&conn, profile_name)?;

    let transport = HttpTransport::new(config.http_settings())
        .context("Failed to create HTTP client")?;
    let syncer = Syncer::new(Arc::new(transport));

    let sink: Box<dyn ProgressSink> = if quiet {
        Box::new(LogProgress::new(profile_name))
    } else {
        Box::new(SyncProgressBar::new(profile_name))
    };

    let summary = syncer
        .sync(&mut conn, &profile, sink.as_ref())
        .with_context(|| format!("Sync of '{}' failed", profile_name))?;

    info!(
        "Synced '{}' from {:?}: {} accounts, {} transactions",
        profile_name, summary.source, summary.accounts, summary.transactions
    );
    Ok(())
}

pub fn cmd_detect(
    config: &Config,
    url: &str,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<()> {
    let transport = HttpTransport::new(config.http_settings())
        .context("Failed to create HTTP client")?;
    let server = match user {
        Some(user) => Connection::new(url.to_string())
            .with_credentials(user.to_string(), password.unwrap_or_default().to_string()),
        None => Connection::new(url.to_string()),
    };

    let version = detect_version(&transport, &server, None)
        .with_context(|| format!("Failed to detect the version of {}", url))?;

    println!("Server version: {}", version);
    match version.suitable_api_version() {
        Some(api) => println!("API to use: {}", api),
        None => println!("API to use: html (no JSON API)"),
    }
    Ok(())
}

// src/fetch/mod.rs

//! Fetching a full remote snapshot
//!
//! The JSON fetchers drive one [`Gateway`] at a time against the transport.
//! In `auto` mode the version reported by the server is tried first, then
//! every other known JSON generation, newest first. A request the server
//! rejects moves on to the next generation; so does a payload of the wrong
//! shape, but only while the server's version is unknown. Running out of
//! generations surfaces as [`Error::ApiNotSupported`].
//!
//! The legacy journal scanner is used only for servers without a JSON API:
//! a 404 on the version or data endpoints, or an `html` profile. A JSON
//! server whose payload cannot be read never falls back, since its journal
//! page scans as an empty ledger.

pub mod accounts;
pub mod transactions;

pub use accounts::{ACCOUNTS_PATH, AccountSnapshot, fetch_accounts};
pub use transactions::{TRANSACTIONS_PATH, fetch_transactions};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::gateway::detect::detect_version;
use crate::gateway::{ApiVersion, Gateway};
use crate::ledger::{LedgerAccount, LedgerTransaction};
use crate::legacy;
use crate::transport::{Connection, Transport, TransportError};
use tracing::{debug, info, warn};

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Json(ApiVersion),
    LegacyHtml,
}

/// Complete server state for one sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub source: SnapshotSource,
    pub accounts: Vec<LedgerAccount>,
    pub transactions: Vec<LedgerTransaction>,
}

/// What is known about the server's JSON generation before fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// The server reported its version or the profile names one
    Reported,
    /// Version detection was inconclusive
    Unknown,
}

impl Detection {
    /// Whether a failed attempt should move on to the next generation
    pub fn moves_on(self, err: &Error) -> bool {
        match err {
            Error::Transport(TransportError::Unsupported { .. }) => true,
            e => self == Self::Unknown && e.is_version_mismatch(),
        }
    }
}

/// JSON versions to try, in order
///
/// An explicit version is tried alone. `auto` starts with the detected
/// version, if any, followed by the rest newest first. `html` has none.
pub fn candidate_versions(configured: ApiVersion, detected: Option<ApiVersion>) -> Vec<ApiVersion> {
    match configured {
        ApiVersion::Html => Vec::new(),
        ApiVersion::Auto => {
            let mut versions: Vec<ApiVersion> = detected.into_iter().collect();
            versions.extend(
                ApiVersion::JSON_VERSIONS
                    .iter()
                    .copied()
                    .filter(|v| Some(*v) != detected),
            );
            versions
        }
        explicit => vec![explicit],
    }
}

/// Fetch accounts then transactions through the first accepted JSON version
///
/// `on_progress(processed_postings, expected_postings)` is forwarded from the
/// transaction fetch of each attempt.
pub fn fetch_json_snapshot<T, P>(
    transport: &T,
    conn: &Connection,
    versions: &[ApiVersion],
    detection: Detection,
    cancel: &CancelToken,
    mut on_progress: P,
) -> Result<RemoteSnapshot>
where
    T: Transport + ?Sized,
    P: FnMut(u64, u64),
{
    for &version in versions {
        let gateway = Gateway::for_version(version)?;

        let accounts = match fetch_accounts(transport, conn, gateway, cancel) {
            Ok(accounts) => accounts,
            Err(e) if detection.moves_on(&e) => {
                debug!("Accounts not readable as API {}: {}", version, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let transactions = match fetch_transactions(
            transport,
            conn,
            gateway,
            accounts.expected_postings,
            cancel,
            &mut on_progress,
        ) {
            Ok(transactions) => transactions,
            Err(e) if detection.moves_on(&e) => {
                debug!("Transactions not readable as API {}: {}", version, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        info!(
            "Fetched {} accounts and {} transactions using API {}",
            accounts.accounts.len(),
            transactions.len(),
            version
        );
        return Ok(RemoteSnapshot {
            source: SnapshotSource::Json(version),
            accounts: accounts.accounts,
            transactions,
        });
    }

    let tried = versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::ApiNotSupported(if tried.is_empty() {
        "no JSON API version to try".to_string()
    } else {
        format!("tried {tried}")
    }))
}

/// Whether a failed JSON fetch should be retried through the journal page
///
/// Only a missing endpoint qualifies; a JSON server that rejects every
/// generation reports that instead.
pub fn should_fall_back(err: &Error) -> bool {
    matches!(err, Error::Transport(TransportError::NotFound(_)))
}

fn specificity(err: &Error) -> u8 {
    match err {
        e if e.is_version_mismatch() => 2,
        Error::Transport(TransportError::NotFound(_)) => 1,
        _ => 0,
    }
}

/// Pick the error to report when both the JSON and the legacy path failed
///
/// Version problems beat not-found, which beats everything else; on a tie
/// the JSON error is kept. Cancellation always wins.
pub fn most_specific_error(json_err: Error, legacy_err: Error) -> Error {
    if matches!(legacy_err, Error::Cancelled) {
        return legacy_err;
    }
    if specificity(&legacy_err) > specificity(&json_err) {
        legacy_err
    } else {
        json_err
    }
}

/// Fetch everything the server has for a profile
pub fn fetch_snapshot<T, P>(
    transport: &T,
    conn: &Connection,
    configured: ApiVersion,
    cancel: &CancelToken,
    mut on_progress: P,
) -> Result<RemoteSnapshot>
where
    T: Transport + ?Sized,
    P: FnMut(u64, u64),
{
    let (versions, detection) = match configured {
        ApiVersion::Html => return fetch_legacy_snapshot(transport, conn, cancel, on_progress),
        ApiVersion::Auto => match detect_version(transport, conn, None) {
            Ok(server) => match server.suitable_api_version() {
                Some(detected) => (
                    candidate_versions(configured, Some(detected)),
                    Detection::Reported,
                ),
                None => {
                    info!("Server {} has no usable JSON API, reading the journal page", server);
                    return fetch_legacy_snapshot(transport, conn, cancel, on_progress);
                }
            },
            Err(e) if e.is_version_mismatch() || matches!(e, Error::ParseError(_)) => {
                debug!("Version detection inconclusive: {}", e);
                (candidate_versions(configured, None), Detection::Unknown)
            }
            Err(e) => return Err(e),
        },
        explicit => (candidate_versions(explicit, None), Detection::Reported),
    };

    match fetch_json_snapshot(transport, conn, &versions, detection, cancel, &mut on_progress) {
        Ok(snapshot) => Ok(snapshot),
        Err(json_err) if should_fall_back(&json_err) => {
            warn!("JSON API unavailable ({}), falling back to the journal page", json_err);
            fetch_legacy_snapshot(transport, conn, cancel, &mut on_progress)
                .map_err(|legacy_err| most_specific_error(json_err, legacy_err))
        }
        Err(e) => Err(e),
    }
}

fn fetch_legacy_snapshot<T, P>(
    transport: &T,
    conn: &Connection,
    cancel: &CancelToken,
    on_progress: P,
) -> Result<RemoteSnapshot>
where
    T: Transport + ?Sized,
    P: FnMut(u64, u64),
{
    let snapshot = legacy::fetch_journal(transport, conn, 0, cancel, on_progress)?;
    Ok(RemoteSnapshot {
        source: SnapshotSource::LegacyHtml,
        accounts: snapshot.accounts,
        transactions: snapshot.transactions,
    })
}

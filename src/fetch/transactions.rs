// src/fetch/transactions.rs

//! `GET transactions`

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::ledger::{LedgerTransaction, sort_newest_first};
use crate::transport::{Connection, Transport};
use tracing::debug;

pub const TRANSACTIONS_PATH: &str = "transactions";

/// Fetch all transactions, newest first
///
/// `on_progress(processed_postings, expected_postings)` fires after every
/// transaction.
pub fn fetch_transactions<T, P>(
    transport: &T,
    conn: &Connection,
    gateway: Gateway,
    expected_postings: u64,
    cancel: &CancelToken,
    mut on_progress: P,
) -> Result<Vec<LedgerTransaction>>
where
    T: Transport + ?Sized,
    P: FnMut(u64, u64),
{
    cancel.check()?;
    let body = transport.get(conn, TRANSACTIONS_PATH, None)?;

    let mut transactions = Vec::new();
    let mut processed = 0u64;
    gateway.parse_transactions(body, cancel, |tx| {
        processed += tx.lines.len() as u64;
        on_progress(processed, expected_postings);
        transactions.push(tx);
        Ok(())
    })?;

    sort_newest_first(&mut transactions);
    debug!(
        "Fetched {} transactions ({} postings) via {}",
        transactions.len(),
        processed,
        gateway.version()
    );
    Ok(transactions)
}

// src/fetch/accounts.rs

//! `GET accounts`

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::ledger::{LedgerAccount, ensure_parent_accounts};
use crate::transport::{Connection, Transport};
use std::collections::HashSet;
use tracing::debug;

pub const ACCOUNTS_PATH: &str = "accounts";

/// Accounts as returned by one fetch, parents included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub accounts: Vec<LedgerAccount>,
    /// Sum of the per-account posting counts, used to size progress
    pub expected_postings: u64,
}

pub fn fetch_accounts<T>(
    transport: &T,
    conn: &Connection,
    gateway: Gateway,
    cancel: &CancelToken,
) -> Result<AccountSnapshot>
where
    T: Transport + ?Sized,
{
    cancel.check()?;
    let body = transport.get(conn, ACCOUNTS_PATH, None)?;

    let mut seen = HashSet::new();
    let mut snapshot = AccountSnapshot::default();
    gateway.parse_accounts(body, cancel, |account| {
        if !seen.insert(account.name.clone()) {
            return Err(Error::parse(format!("duplicate account {:?}", account.name)));
        }
        snapshot.expected_postings += account.num_postings;
        snapshot.accounts.push(account);
        Ok(())
    })?;

    let synthesized = ensure_parent_accounts(&mut snapshot.accounts);
    debug!(
        "Fetched {} accounts ({} parents synthesized, {} postings expected) via {}",
        snapshot.accounts.len(),
        synthesized,
        snapshot.expected_postings,
        gateway.version()
    );
    Ok(snapshot)
}

// src/db/models/mod.rs

//! Data models for the local store
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod account;
mod profile;
mod transaction;

pub use account::{AccountRow, AccountValue, AccountWithAmounts, list_accounts_with_amounts};
pub use profile::Profile;
pub use transaction::{
    DB_DATE_FORMAT, TransactionLineRow, TransactionRow, list_transactions_with_lines,
};

use crate::error::Result;
use rusqlite::Connection;

/// Highest sync generation stored for a profile, 0 before the first sync
pub fn current_generation(conn: &Connection, profile_id: i64) -> Result<i64> {
    let generation = conn.query_row(
        "SELECT MAX(
             COALESCE((SELECT MAX(generation) FROM accounts WHERE profile_id = ?1), 0),
             COALESCE((SELECT MAX(generation) FROM transactions WHERE profile_id = ?1), 0))",
        [profile_id],
        |row| row.get(0),
    )?;
    Ok(generation)
}

// src/ledger/mod.rs

//! Unified domain model
//!
//! Every wire format (the JSON API generations and the legacy HTML journal)
//! converges on these types. Quantities are exact decimals; accounts carry
//! per-commodity balances; transactions carry ordered postings.

pub mod account;
pub mod amount;
pub mod quantity;
pub mod transaction;

pub use account::{
    ACCOUNT_DELIMITER, DeclarationInfo, LedgerAccount, ancestors, ensure_parent_accounts,
    is_parent_of, level_of, parent_name,
};
pub use amount::{Amount, AmountStyle, CommoditySide, CurrencySettings};
pub use quantity::Quantity;
pub use transaction::{LedgerTransaction, TransactionLine, sort_newest_first};

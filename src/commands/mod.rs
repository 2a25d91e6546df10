// src/commands/mod.rs
//! Command handlers for the ledger-mirror CLI

mod add;
mod profile;
pub mod progress;
mod query;
mod sync;

// Re-export all command handlers
pub use add::{NewTransaction, cmd_add};
pub use profile::{
    NewProfile, cmd_init, cmd_profile_add, cmd_profile_list, cmd_profile_remove,
    cmd_profile_set_version,
};
pub use query::{cmd_accounts, cmd_expand, cmd_transactions};
pub use sync::{cmd_detect, cmd_sync};

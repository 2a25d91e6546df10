// src/cli/mod.rs
//! CLI definitions for ledger-mirror
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Commands:
//! - `init` - Create the local database
//! - `profile` - Manage server profiles
//! - `detect` - Ask a server which API it speaks
//! - `sync` - Mirror a profile's server into the local database
//! - `accounts` / `transactions` - Browse the mirrored data
//! - `expand` - Toggle the stored display state of an account
//! - `add` - Send a new transaction

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod profile;

pub use profile::ProfileCommands;

#[derive(Parser)]
#[command(name = "ledger-mirror")]
#[command(version)]
#[command(about = "Offline mirror of a plain-text ledger server", long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the local database
    Init,

    /// Profile management
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Detect the server version and the API generation to use
    Detect {
        /// Server URL
        url: String,

        /// User name for HTTP Basic authentication
        #[arg(long)]
        user: Option<String>,

        /// Password for HTTP Basic authentication
        #[arg(long, requires = "user")]
        password: Option<String>,
    },

    /// Fetch accounts and transactions from the server
    Sync {
        /// Profile name
        profile: String,

        /// Print progress to the log instead of drawing a progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// List mirrored accounts with their balances
    Accounts {
        /// Profile name
        profile: String,

        /// Hide accounts whose balances are all zero
        #[arg(long)]
        hide_zero: bool,
    },

    /// List mirrored transactions, newest first
    Transactions {
        /// Profile name
        profile: String,

        /// Only transactions touching this account or its sub-accounts
        #[arg(short, long)]
        account: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Set the stored expansion state of an account
    Expand {
        /// Profile name
        profile: String,

        /// Full account name, e.g. Assets:Bank
        account: String,

        /// Collapse instead of expand
        #[arg(long)]
        collapse: bool,

        /// Toggle the amounts list instead of the sub-account tree
        #[arg(long)]
        amounts: bool,
    },

    /// Send a new transaction to the server
    ///
    /// Each --line is ACCOUNT=AMOUNT, the amount optionally followed or
    /// preceded by a commodity: `--line Expenses:Food=12.50EUR`.
    /// A line without `=AMOUNT` is balanced by the server.
    Add {
        /// Profile name
        profile: String,

        /// Transaction description
        #[arg(long)]
        description: String,

        /// Transaction date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,

        /// Posting as ACCOUNT=AMOUNT[COMMODITY]; repeat for each line
        #[arg(short, long = "line", required = true)]
        lines: Vec<String>,

        /// Log the request instead of sending it
        #[arg(long)]
        simulate: bool,
    },
}

// src/cli/profile.rs
//! Profile management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Add a server profile
    Add {
        /// Profile name
        name: String,

        /// Server URL, e.g. https://ledger.example.com/
        url: String,

        /// User name for HTTP Basic authentication
        #[arg(long)]
        user: Option<String>,

        /// Password for HTTP Basic authentication
        #[arg(long, requires = "user")]
        password: Option<String>,

        /// API to use: auto, html, v1_32, v1_40, v1_50
        #[arg(long, default_value = "auto")]
        api_version: String,

        /// Write the commodity left or right of new amounts
        /// (default: from the config file)
        #[arg(long)]
        commodity_side: Option<String>,
    },

    /// List profiles
    List,

    /// Change the API version of a profile
    SetVersion {
        /// Profile name
        name: String,

        /// auto, html, v1_32, v1_40 or v1_50
        api_version: String,
    },

    /// Remove a profile and all of its mirrored data
    Remove {
        /// Profile name
        name: String,
    },
}

// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use ledger_mirror::Config;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, ProfileCommands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;

    // RUST_LOG wins over the config file
    let default_filter = config.log_filter.as_deref().unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let db_path = cli.db_path.clone().unwrap_or_else(|| config.database_path());

    match cli.command {
        Some(Commands::Init) => commands::cmd_init(&db_path),

        Some(Commands::Profile(profile_cmd)) => match profile_cmd {
            ProfileCommands::Add {
                name,
                url,
                user,
                password,
                api_version,
                commodity_side,
            } => commands::cmd_profile_add(
                &db_path,
                &config,
                commands::NewProfile {
                    name: &name,
                    url: &url,
                    user: user.as_deref(),
                    password: password.as_deref(),
                    api_version: &api_version,
                    commodity_side: commodity_side.as_deref(),
                },
            ),
            ProfileCommands::List => commands::cmd_profile_list(&db_path),
            ProfileCommands::SetVersion { name, api_version } => {
                commands::cmd_profile_set_version(&db_path, &name, &api_version)
            }
            ProfileCommands::Remove { name } => commands::cmd_profile_remove(&db_path, &name),
        },

        Some(Commands::Detect {
            url,
            user,
            password,
        }) => commands::cmd_detect(&config, &url, user.as_deref(), password.as_deref()),

        Some(Commands::Sync { profile, quiet }) => {
            commands::cmd_sync(&db_path, &config, &profile, quiet)
        }

        Some(Commands::Accounts { profile, hide_zero }) => {
            commands::cmd_accounts(&db_path, &profile, hide_zero)
        }

        Some(Commands::Transactions {
            profile,
            account,
            limit,
        }) => commands::cmd_transactions(&db_path, &profile, account.as_deref(), limit),

        Some(Commands::Expand {
            profile,
            account,
            collapse,
            amounts,
        }) => commands::cmd_expand(&db_path, &profile, &account, collapse, amounts),

        Some(Commands::Add {
            profile,
            description,
            date,
            lines,
            simulate,
        }) => commands::cmd_add(
            &db_path,
            &config,
            commands::NewTransaction {
                profile: &profile,
                description: &description,
                date: date.as_deref(),
                lines: &lines,
                simulate,
            },
        ),

        None => {
            println!("ledger-mirror {}", env!("CARGO_PKG_VERSION"));
            println!("Run 'ledger-mirror --help' for usage information.");
            Ok(())
        }
    }
}

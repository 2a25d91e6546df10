// src/commands/profile.rs

//! Database initialization and profile management commands

use anyhow::{Context, Result};
use ledger_mirror::db::models::Profile;
use ledger_mirror::{ApiVersion, CommoditySide, Config};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Create the database file and schema
pub fn cmd_init(db_path: &Path) -> Result<()> {
    info!("Initializing database at: {}", db_path.display());
    ledger_mirror::db::init(db_path)
        .with_context(|| format!("Failed to initialize {}", db_path.display()))?;
    println!("Database initialized successfully at: {}", db_path.display());
    Ok(())
}

pub struct NewProfile<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub user: Option<&'a str>,
    pub password: Option<&'a str>,
    pub api_version: &'a str,
    pub commodity_side: Option<&'a str>,
}

pub fn cmd_profile_add(db_path: &Path, config: &Config, new: NewProfile<'_>) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;

    if Profile::find_by_name(&conn, new.name)?.is_some() {
        anyhow::bail!("Profile '{}' already exists", new.name);
    }

    let api_version = parse_api_version(new.api_version)?;
    let display = config.currency_settings();

    let mut profile = Profile::new(new.name.to_string(), new.url.to_string());
    if let Some(user) = new.user {
        profile = profile.with_auth(user.to_string(), new.password.unwrap_or_default().to_string());
    }
    profile.api_version = api_version;
    profile.commodity_side = match new.commodity_side {
        Some(side) => CommoditySide::from_str(side)
            .map_err(|_| anyhow::anyhow!("Invalid commodity side '{}': use left or right", side))?,
        None => display.side,
    };
    profile.commodity_spaced = display.spaced;

    let id = profile.insert(&conn)?;
    info!("Added profile '{}' (id={})", profile.name, id);
    println!("Added profile '{}' -> {} (API: {})", profile.name, profile.url, profile.api_version);
    Ok(())
}

pub fn cmd_profile_list(db_path: &Path) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;
    let profiles = Profile::list_all(&conn)?;

    if profiles.is_empty() {
        println!("No profiles defined.");
        println!("\nUse 'ledger-mirror profile add <name> <url>' to add one.");
        return Ok(());
    }

    println!("Profiles ({}):", profiles.len());
    for profile in &profiles {
        let auth = match (&profile.auth_enabled, &profile.auth_user) {
            (true, Some(user)) => format!(" as {}", user),
            _ => String::new(),
        };
        let synced = profile.last_sync.as_deref().unwrap_or("never");
        println!(
            "  {} - {}{} [API: {}, last sync: {}]",
            profile.name, profile.url, auth, profile.api_version, synced
        );
    }
    Ok(())
}

pub fn cmd_profile_set_version(db_path: &Path, name: &str, api_version: &str) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;
    let mut profile = Profile::get_by_name(&conn, name)?;
    profile.api_version = parse_api_version(api_version)?;
    profile.update(&conn)?;
    println!("Profile '{}' now uses API {}", profile.name, profile.api_version);
    Ok(())
}

/// Remove a profile together with everything mirrored for it
pub fn cmd_profile_remove(db_path: &Path, name: &str) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;
    let profile = Profile::get_by_name(&conn, name)?;
    Profile::delete(&conn, profile.require_id()?)?;
    info!("Removed profile '{}'", name);
    println!("Removed profile '{}' and its mirrored data", name);
    Ok(())
}

fn parse_api_version(text: &str) -> Result<ApiVersion> {
    ApiVersion::from_str(text).map_err(|_| {
        anyhow::anyhow!(
            "Unknown API version '{}': use auto, html, v1_32, v1_40 or v1_50",
            text
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_version() {
        assert_eq!(parse_api_version("auto").unwrap(), ApiVersion::Auto);
        assert_eq!(parse_api_version("html").unwrap(), ApiVersion::Html);
        assert_eq!(parse_api_version("v1_40").unwrap(), ApiVersion::V1_40);
        assert!(parse_api_version("2.0").is_err());
    }
}

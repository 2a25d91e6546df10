// src/commands/query.rs

//! Browsing mirrored accounts and transactions

use anyhow::Result;
use ledger_mirror::db::models::{
    AccountRow, Profile, list_accounts_with_amounts, list_transactions_with_lines,
};
use ledger_mirror::ledger::level_of;
use std::path::Path;

pub fn cmd_accounts(db_path: &Path, profile_name: &str, hide_zero: bool) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;
    let profile = Profile::get_by_name(&conn, profile_name)?;
    let accounts = list_accounts_with_amounts(&conn, profile.require_id()?, hide_zero)?;

    if accounts.is_empty() {
        println!("No accounts for '{}'.", profile_name);
        println!("\nUse 'ledger-mirror sync {}' to fetch them.", profile_name);
        return Ok(());
    }

    // Children of a collapsed account are hidden
    let mut collapsed: Option<String> = None;
    for entry in &accounts {
        let name = &entry.account.name;
        if let Some(prefix) = &collapsed {
            if name.starts_with(prefix.as_str()) {
                continue;
            }
            collapsed = None;
        }
        if !entry.account.expanded {
            collapsed = Some(format!("{}:", name));
        }

        let indent = "  ".repeat(level_of(name));
        let marker = if entry.account.expanded { " " } else { "+" };
        let amounts: Vec<String> = entry.amounts.iter().map(|a| a.to_string()).collect();
        if entry.account.amounts_expanded || amounts.len() <= 1 {
            println!("{}{}{}  {}", indent, marker, name, amounts.join(", "));
        } else {
            println!("{}{}{}  ({} commodities)", indent, marker, name, amounts.len());
        }
    }
    Ok(())
}

pub fn cmd_transactions(
    db_path: &Path,
    profile_name: &str,
    account: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;
    let profile = Profile::get_by_name(&conn, profile_name)?;
    let transactions = list_transactions_with_lines(&conn, profile.require_id()?, account)?;

    if transactions.is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    for tx in transactions.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{} {}  (#{})", tx.date, tx.description, tx.ledger_id);
        if let Some(comment) = &tx.comment {
            println!("    ; {}", comment);
        }
        for line in &tx.lines {
            match line.amount {
                Some(quantity) => {
                    println!("    {:<40} {} {}", line.account_name, quantity, line.currency)
                }
                None => println!("    {}", line.account_name),
            }
        }
    }
    Ok(())
}

pub fn cmd_expand(
    db_path: &Path,
    profile_name: &str,
    account: &str,
    collapse: bool,
    amounts: bool,
) -> Result<()> {
    let conn = ledger_mirror::db::open(db_path)?;
    let profile = Profile::get_by_name(&conn, profile_name)?;
    let row = AccountRow::find_by_name(&conn, profile.require_id()?, account)?
        .ok_or_else(|| anyhow::anyhow!("Account '{}' not found in '{}'", account, profile_name))?;
    let id = row
        .id
        .ok_or_else(|| anyhow::anyhow!("Account '{}' has no id", account))?;

    if amounts {
        AccountRow::set_amounts_expanded(&conn, id, !collapse)?;
    } else {
        AccountRow::set_expanded(&conn, id, !collapse)?;
    }
    println!(
        "{} {}{}",
        if collapse { "Collapsed" } else { "Expanded" },
        account,
        if amounts { " amounts" } else { "" }
    );
    Ok(())
}

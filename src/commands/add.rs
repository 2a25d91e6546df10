// src/commands/add.rs

//! Sending a new transaction from the command line

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use ledger_mirror::db::models::Profile;
use ledger_mirror::{
    CancelToken, Config, HttpTransport, LedgerTransaction, Quantity, SendRoute, TransactionLine,
    TransactionSender,
};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// `[PRE]amount[POST]` with an optional commodity on either side
static LINE_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\d\s+\-.]*)\s*([+-]?\d+(?:\.\d+)?)\s*([^\d\s]*)$").unwrap()
});

pub struct NewTransaction<'a> {
    pub profile: &'a str,
    pub description: &'a str,
    pub date: Option<&'a str>,
    pub lines: &'a [String],
    pub simulate: bool,
}

pub fn cmd_add(db_path: &Path, config: &Config, new: NewTransaction<'_>) -> Result<()> {
    let mut conn = ledger_mirror::db::open(db_path)?;
    let profile = Profile::get_by_name(&conn, new.profile)?;

    let date = match new.date {
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", text))?,
        None => Local::now().date_naive(),
    };

    let mut tx = LedgerTransaction::new(0, date, new.description);
    for arg in new.lines {
        tx.add_line(parse_line_arg(arg)?);
    }
    validate_lines(&tx)?;

    let transport = HttpTransport::new(config.http_settings())
        .context("Failed to create HTTP client")?;
    let sender = TransactionSender::new(Arc::new(transport)).with_simulate(new.simulate);

    let (route, stored) = sender
        .send_and_store(&mut conn, &profile, &tx, &CancelToken::new())
        .with_context(|| format!("Failed to send the transaction to '{}'", new.profile))?;

    match route {
        SendRoute::Json(version) => {
            println!("Sent using API {} (local #{})", version, stored.ledger_id)
        }
        SendRoute::LegacyForm => {
            println!("Sent through the web form (local #{})", stored.ledger_id)
        }
        SendRoute::Simulated => println!("Simulated, nothing was sent"),
    }
    Ok(())
}

/// At least two lines, at most one without an amount, and without an open
/// line every currency must sum to zero
fn validate_lines(tx: &LedgerTransaction) -> Result<()> {
    if tx.lines.len() < 2 {
        anyhow::bail!("A transaction needs at least two lines");
    }
    match tx.lines.iter().filter(|line| line.amount.is_none()).count() {
        0 => {
            let unbalanced: Vec<String> = tx
                .totals()?
                .into_iter()
                .filter(|(_, total)| !total.is_zero())
                .map(|(currency, total)| format!("{} {}", total, currency))
                .collect();
            if !unbalanced.is_empty() {
                anyhow::bail!(
                    "Lines do not balance (off by {}); leave one amount out to balance it",
                    unbalanced.join(", ")
                );
            }
        }
        1 => {}
        _ => anyhow::bail!("At most one line may omit its amount"),
    }
    Ok(())
}

/// Parse `ACCOUNT[=AMOUNT]` where AMOUNT may carry a commodity on either side
fn parse_line_arg(arg: &str) -> Result<TransactionLine> {
    let (account, amount) = match arg.split_once('=') {
        Some((account, amount)) => (account.trim(), Some(amount.trim())),
        None => (arg.trim(), None),
    };
    if account.is_empty() {
        anyhow::bail!("Missing account name in '{}'", arg);
    }

    let Some(amount) = amount.filter(|a| !a.is_empty()) else {
        return Ok(TransactionLine::new(account, None, ""));
    };

    let caps = LINE_AMOUNT_RE
        .captures(amount)
        .ok_or_else(|| anyhow::anyhow!("Invalid amount '{}' in '{}'", amount, arg))?;
    let prefix = caps.get(1).map_or("", |m| m.as_str());
    let suffix = caps.get(3).map_or("", |m| m.as_str());
    if !prefix.is_empty() && !suffix.is_empty() {
        anyhow::bail!("Amount '{}' has a commodity on both sides", amount);
    }

    let quantity = Quantity::from_decimal_str(&caps[2])
        .with_context(|| format!("Invalid amount '{}'", amount))?;
    let currency = if prefix.is_empty() { suffix } else { prefix };
    Ok(TransactionLine::new(account, Some(quantity), currency))
}

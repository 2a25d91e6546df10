// src/legacy/mod.rs

//! Legacy HTML journal scanner
//!
//! Servers without a JSON API still render a human-oriented journal page.
//! This module scrapes accounts and transactions out of it with a single
//! pass, line-oriented state machine:
//!
//! ```text
//! ExpectingAccount <-> ExpectingAccountAmount
//!        |  "<h2>General Journal</h2>"
//!        v
//! ExpectingTransaction -> ExpectingDescription -> TransactionDetails
//!        ^                                              | blank line
//!        +----------------------------------------------+
//! ```
//!
//! `id="addmodal"` ends the scan. Comment lines are skipped in every state.
//! It is a compatibility shim kept behind the same snapshot shape as the
//! JSON fetchers, so it can be removed on its own.

mod posting;

pub use posting::{normalize_number, parse_posting_line};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::ledger::{Amount, LedgerAccount, LedgerTransaction, Quantity, ensure_parent_accounts};
use crate::transport::{Connection, Transport};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Journal page path
pub const JOURNAL_PATH: &str = "journal";

/// Heading separating the account list from the journal
const GENERAL_JOURNAL_MARKER: &str = "<h2>General Journal</h2>";

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*;").unwrap());
static TRANSACTION_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<tr class="title" id="transaction-(\d+)"><td class="date"[^"]*>([\d.-]+)</td>"#)
        .unwrap()
});
static TRANSACTION_DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<tr class="posting" title="(\S+)\s(.+)"#).unwrap());
static END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bid="addmodal""#).unwrap());
static ACCOUNT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/register\?q=inacct%3A([a-zA-Z0-9%]+)""#).unwrap());
static ACCOUNT_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="[^"]*\bamount\b[^"]*">\s*([-+]?[\d.,]+)(?:\s+(\S+))?</span>"#)
        .unwrap()
});

/// Everything scraped from one journal page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySnapshot {
    pub accounts: Vec<LedgerAccount>,
    pub transactions: Vec<LedgerTransaction>,
}

enum ScanState {
    ExpectingAccount,
    ExpectingAccountAmount,
    ExpectingTransaction,
    ExpectingDescription { ledger_id: i64 },
    TransactionDetails(LedgerTransaction),
}

/// Parse a date as printed by the journal page
fn parse_journal_date(text: &str) -> Result<NaiveDate> {
    ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(|| Error::parse(format!("invalid journal date {text:?}")))
}

/// Scanner state carried across lines
struct JournalScanner<'a, P> {
    cancel: &'a CancelToken,
    expected_postings: u64,
    on_progress: P,
    state: ScanState,
    accounts: Vec<LedgerAccount>,
    known_names: HashSet<String>,
    pending_amounts: HashMap<String, Vec<Amount>>,
    amounts_flushed: bool,
    last_account: Option<String>,
    transactions: Vec<LedgerTransaction>,
    seen_transactions: u64,
}

impl<'a, P> JournalScanner<'a, P>
where
    P: FnMut(u64, u64),
{
    fn new(cancel: &'a CancelToken, expected_postings: u64, on_progress: P) -> Self {
        Self {
            cancel,
            expected_postings,
            on_progress,
            state: ScanState::ExpectingAccount,
            accounts: Vec::new(),
            known_names: HashSet::new(),
            pending_amounts: HashMap::new(),
            amounts_flushed: false,
            last_account: None,
            transactions: Vec::new(),
            seen_transactions: 0,
        }
    }

    /// Feed one line; returns `false` once the end marker was seen
    fn line(&mut self, line: &str) -> Result<bool> {
        if COMMENT_RE.is_match(line) {
            return Ok(true);
        }

        match std::mem::replace(&mut self.state, ScanState::ExpectingAccount) {
            ScanState::ExpectingAccount => {
                self.state = ScanState::ExpectingAccount;
                if line == GENERAL_JOURNAL_MARKER {
                    self.flush_amounts()?;
                    self.state = ScanState::ExpectingTransaction;
                } else if let Some(name) = Self::account_name(line) {
                    if self.known_names.insert(name.clone()) {
                        self.accounts.push(LedgerAccount::new(name.clone()));
                        self.pending_amounts.insert(name.clone(), Vec::new());
                        self.last_account = Some(name);
                        self.state = ScanState::ExpectingAccountAmount;
                    }
                }
            }

            ScanState::ExpectingAccountAmount => {
                let mut matched = false;
                for caps in ACCOUNT_VALUE_RE.captures_iter(line) {
                    self.cancel.check()?;
                    matched = true;
                    let value = normalize_number(&caps[1]);
                    let currency = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                    let quantity = Quantity::from_decimal_str(&value)?;
                    if let Some(name) = &self.last_account {
                        self.pending_amounts
                            .entry(name.clone())
                            .or_default()
                            .push(Amount::new(currency, quantity));
                    }
                }
                self.state = if matched {
                    ScanState::ExpectingAccount
                } else {
                    ScanState::ExpectingAccountAmount
                };
            }

            ScanState::ExpectingTransaction => {
                self.state = ScanState::ExpectingTransaction;
                if line.starts_with(' ') {
                    return Ok(true);
                }
                if let Some(caps) = TRANSACTION_START_RE.captures(line) {
                    let ledger_id = caps[1]
                        .parse::<i64>()
                        .map_err(|e| Error::parse(format!("bad transaction id: {e}")))?;
                    self.seen_transactions += 1;
                    (self.on_progress)(self.seen_transactions, self.expected_postings);
                    self.state = ScanState::ExpectingDescription { ledger_id };
                }
                if END_RE.is_match(line) {
                    return Ok(false);
                }
            }

            ScanState::ExpectingDescription { ledger_id } => {
                self.state = ScanState::ExpectingDescription { ledger_id };
                if line.starts_with(' ') {
                    return Ok(true);
                }
                if let Some(caps) = TRANSACTION_DESCRIPTION_RE.captures(line) {
                    let raw_date = &caps[1];
                    let date_text = match raw_date.find('=') {
                        Some(pos) => &raw_date[pos + 1..],
                        None => raw_date,
                    };
                    let date = parse_journal_date(date_text)?;
                    self.state = ScanState::TransactionDetails(LedgerTransaction::new(
                        ledger_id, date, &caps[2],
                    ));
                }
            }

            ScanState::TransactionDetails(mut tx) => {
                if line.is_empty() {
                    self.transactions.push(tx);
                    self.state = ScanState::ExpectingTransaction;
                } else {
                    match parse_posting_line(line) {
                        Some(posting) => tx.add_line(posting),
                        None => debug!("Skipping unparseable posting line: {:?}", line),
                    }
                    self.state = ScanState::TransactionDetails(tx);
                }
            }
        }

        Ok(true)
    }

    fn account_name(line: &str) -> Option<String> {
        let caps = ACCOUNT_NAME_RE.captures(line)?;
        let decoded = urlencoding::decode(&caps[1]).ok()?;
        Some(decoded.replace('"', ""))
    }

    /// Move buffered per-account amounts onto their accounts
    fn flush_amounts(&mut self) -> Result<()> {
        if self.amounts_flushed {
            return Ok(());
        }
        self.amounts_flushed = true;
        for account in &mut self.accounts {
            if let Some(amounts) = self.pending_amounts.remove(&account.name) {
                for amount in amounts {
                    account.add_amount(amount)?;
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<LegacySnapshot> {
        if let ScanState::TransactionDetails(tx) =
            std::mem::replace(&mut self.state, ScanState::ExpectingTransaction)
        {
            self.transactions.push(tx);
        }
        self.flush_amounts()?;
        let synthesized = ensure_parent_accounts(&mut self.accounts);
        debug!("Synthesized {} parent accounts", synthesized);

        Ok(LegacySnapshot {
            accounts: self.accounts,
            transactions: self.transactions,
        })
    }
}

/// Scan a journal page
///
/// `on_progress(seen, expected)` fires once per transaction start; an
/// `expected_postings` of 0 means the total is unknown. A page with none of
/// the expected markers yields an empty snapshot rather than an error.
pub fn parse_journal<R, P>(
    reader: R,
    expected_postings: u64,
    cancel: &CancelToken,
    on_progress: P,
) -> Result<LegacySnapshot>
where
    R: BufRead,
    P: FnMut(u64, u64),
{
    let mut reader = reader;
    let mut scanner = JournalScanner::new(cancel, expected_postings, on_progress);
    let mut buf = Vec::new();

    loop {
        cancel.check()?;
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if !scanner.line(line)? {
            break;
        }
    }

    scanner.finish()
}

/// Fetch and scan the journal page of a server
pub fn fetch_journal<T, P>(
    transport: &T,
    conn: &Connection,
    expected_postings: u64,
    cancel: &CancelToken,
    on_progress: P,
) -> Result<LegacySnapshot>
where
    T: Transport + ?Sized,
    P: FnMut(u64, u64),
{
    cancel.check()?;
    let body = transport.get(conn, JOURNAL_PATH, None)?;
    let snapshot = parse_journal(BufReader::new(body), expected_postings, cancel, on_progress)?;
    info!(
        "Scraped {} accounts and {} transactions from the journal page",
        snapshot.accounts.len(),
        snapshot.transactions.len()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> LegacySnapshot {
        parse_journal(html.as_bytes(), 0, &CancelToken::new(), |_, _| {}).unwrap()
    }

    #[test]
    fn test_empty_page_is_not_an_error() {
        let snapshot = scan("<html><body><p>nothing here</p></body></html>\n");
        assert!(snapshot.accounts.is_empty());
        assert!(snapshot.transactions.is_empty());
    }

    #[test]
    fn test_account_amounts_flushed_at_marker() {
        let html = concat!(
            "<a href=\"/register?q=inacct%3AAssets%3ACash\">Cash</a>\n",
            "<span class=\"positive amount\">1.234,50 EUR</span>\n",
            "<h2>General Journal</h2>\n",
        );
        let snapshot = scan(html);
        let cash = snapshot
            .accounts
            .iter()
            .find(|a| a.name == "Assets:Cash")
            .unwrap();
        assert_eq!(cash.balance("EUR"), Quantity::new(123450, 2));
        assert!(snapshot.accounts.iter().any(|a| a.name == "Assets"));
    }

    #[test]
    fn test_duplicate_account_links_are_ignored() {
        let html = concat!(
            "<a href=\"/register?q=inacct%3AExpenses\">x</a>\n",
            "<span class=\"amount\">5</span>\n",
            "<a href=\"/register?q=inacct%3AExpenses\">x</a>\n",
            "<h2>General Journal</h2>\n",
        );
        let snapshot = scan(html);
        assert_eq!(snapshot.accounts.len(), 1);
        assert_eq!(snapshot.accounts[0].balance(""), Quantity::new(5, 0));
    }

    #[test]
    fn test_secondary_date_wins() {
        let html = concat!(
            "<h2>General Journal</h2>\n",
            "<tr class=\"title\" id=\"transaction-4\"><td class=\"date\">2024-01-01</td>\n",
            "<tr class=\"posting\" title=\"2024-01-01=2024-01-09 Rent\n",
            "    Expenses:Rent    $500.00\n",
            "    Assets:Bank\n",
            "\n",
        );
        let snapshot = scan(html);
        assert_eq!(snapshot.transactions.len(), 1);
        let tx = &snapshot.transactions[0];
        assert_eq!(tx.ledger_id, 4);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(tx.description, "Rent");
        // the open posting has no amount and does not match the posting pattern
        assert_eq!(tx.lines.len(), 1);
    }

    #[test]
    fn test_end_marker_stops_scan() {
        let html = concat!(
            "<h2>General Journal</h2>\n",
            "<div id=\"addmodal\">\n",
            "<tr class=\"title\" id=\"transaction-1\"><td class=\"date\">2024-01-01</td>\n",
            "<tr class=\"posting\" title=\"2024-01-01 Late\n",
            "    a    1\n",
            "\n",
        );
        assert!(scan(html).transactions.is_empty());
    }

    #[test]
    fn test_progress_reports_per_transaction() {
        let html = concat!(
            "<h2>General Journal</h2>\n",
            "<tr class=\"title\" id=\"transaction-1\"><td class=\"date\">2024-01-01</td>\n",
            "<tr class=\"posting\" title=\"2024-01-01 One\n",
            "    a    1\n",
            "\n",
            "<tr class=\"title\" id=\"transaction-2\"><td class=\"date\">2024-01-02</td>\n",
            "<tr class=\"posting\" title=\"2024-01-02 Two\n",
            "    a    2\n",
            "\n",
        );
        let mut events = Vec::new();
        parse_journal(html.as_bytes(), 9, &CancelToken::new(), |seen, total| {
            events.push((seen, total))
        })
        .unwrap();
        assert_eq!(events, vec![(1, 9), (2, 9)]);

        let mut unknown = Vec::new();
        parse_journal(html.as_bytes(), 0, &CancelToken::new(), |seen, total| {
            unknown.push((seen, total))
        })
        .unwrap();
        assert_eq!(unknown, vec![(1, 0), (2, 0)]);
    }

    #[test]
    fn test_cancelled_before_first_line() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = parse_journal("<h2>General Journal</h2>\n".as_bytes(), 0, &cancel, |_, _| {});
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}

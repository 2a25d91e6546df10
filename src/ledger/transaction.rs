// src/ledger/transaction.rs

//! Transactions and their postings

use super::quantity::Quantity;
use crate::hash::ContentHasher;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Version prefix of the canonical form fed to the content hash
const HASH_FORMAT: &str = "ver1";

/// Date format used inside the canonical hash form
const HASH_DATE_FORMAT: &str = "%Y/%m/%d";

/// One account+amount entry of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLine {
    pub account_name: String,
    /// `None` leaves the amount to the server's balancer
    pub amount: Option<Quantity>,
    pub currency: String,
    pub comment: Option<String>,
}

impl TransactionLine {
    pub fn new(account_name: impl Into<String>, amount: Option<Quantity>, currency: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            amount,
            currency: currency.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        let trimmed = comment.trim();
        self.comment = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        self
    }
}

/// A transaction as reported by (or sent to) the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    /// Server-assigned sequence number
    pub ledger_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub comment: Option<String>,
    pub lines: Vec<TransactionLine>,
}

impl LedgerTransaction {
    pub fn new(ledger_id: i64, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            ledger_id,
            date,
            description: description.into(),
            comment: None,
            lines: Vec::new(),
        }
    }

    pub fn add_line(&mut self, line: TransactionLine) {
        self.lines.push(line);
    }

    /// Fingerprint of everything the server controls, scoped to a profile
    pub fn content_hash(&self, profile_id: i64) -> String {
        let mut hasher = ContentHasher::new(HASH_FORMAT);
        hasher
            .field(&profile_id.to_string())
            .field(&self.ledger_id.to_string())
            .field(&self.description)
            .field(self.comment.as_deref().unwrap_or(""))
            .field(&self.date.format(HASH_DATE_FORMAT).to_string());

        for line in &self.lines {
            let amount = line.amount.map(|q| q.to_string()).unwrap_or_default();
            hasher
                .field(&line.account_name)
                .field(&line.currency)
                .field(&amount)
                .field(line.comment.as_deref().unwrap_or(""));
        }

        hasher.finalize()
    }

    /// True if any line's account equals or descends from `prefix`
    pub fn touches_account(&self, prefix: &str) -> bool {
        self.lines.iter().any(|l| {
            l.account_name == prefix || super::account::is_parent_of(prefix, &l.account_name)
        })
    }

    /// Sum of line amounts per currency; lines without an amount are skipped
    pub fn totals(&self) -> crate::Result<Vec<(String, Quantity)>> {
        let mut totals: Vec<(String, Quantity)> = Vec::new();
        for line in &self.lines {
            let Some(amount) = line.amount else { continue };
            match totals.iter_mut().find(|(c, _)| *c == line.currency) {
                Some((_, total)) => *total = total.try_add(amount)?,
                None => totals.push((line.currency.clone(), amount)),
            }
        }
        Ok(totals)
    }
}

/// Newest first: by date, then by ledger id, both descending
pub fn newest_first(a: &LedgerTransaction, b: &LedgerTransaction) -> Ordering {
    b.date.cmp(&a.date).then_with(|| b.ledger_id.cmp(&a.ledger_id))
}

pub fn sort_newest_first(transactions: &mut [LedgerTransaction]) {
    transactions.sort_by(newest_first);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> LedgerTransaction {
        let mut tx = LedgerTransaction::new(3, date(2024, 3, 1), "Groceries");
        tx.add_line(TransactionLine::new("Expenses:Food", Some(Quantity::new(1250, 2)), "USD"));
        tx.add_line(TransactionLine::new("Assets:Cash", None, "USD"));
        tx
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let tx = sample();
        let h1 = tx.content_hash(1);
        assert_eq!(h1, tx.clone().content_hash(1));
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_hash_depends_on_content_and_profile() {
        let tx = sample();
        let base = tx.content_hash(1);
        assert_ne!(base, tx.content_hash(2));

        let mut changed = tx.clone();
        changed.lines[0].amount = Some(Quantity::new(1251, 2));
        assert_ne!(base, changed.content_hash(1));

        let mut changed = tx.clone();
        changed.description.push('!');
        assert_ne!(base, changed.content_hash(1));
    }

    #[test]
    fn test_hash_separates_line_comment_from_next_account() {
        let build = |comment: &str, next_account: &str| {
            let mut tx = LedgerTransaction::new(1, date(2024, 3, 1), "Split");
            tx.add_line(
                TransactionLine::new("Expenses:Food", Some(Quantity::new(100, 2)), "EUR")
                    .with_comment(comment),
            );
            tx.add_line(TransactionLine::new(next_account, None, "EUR"));
            tx
        };
        assert_ne!(
            build("xAssets", "Cash").content_hash(1),
            build("x", "AssetsCash").content_hash(1)
        );
    }

    #[test]
    fn test_line_comment_is_trimmed() {
        let line = TransactionLine::new("a", None, "").with_comment("  note  ");
        assert_eq!(line.comment.as_deref(), Some("note"));
        let line = TransactionLine::new("a", None, "").with_comment("   ");
        assert_eq!(line.comment, None);
    }

    #[test]
    fn test_sort_newest_first() {
        let mut list = vec![
            LedgerTransaction::new(1, date(2024, 1, 1), "a"),
            LedgerTransaction::new(3, date(2024, 2, 1), "c"),
            LedgerTransaction::new(2, date(2024, 2, 1), "b"),
        ];
        sort_newest_first(&mut list);
        let ids: Vec<i64> = list.iter().map(|t| t.ledger_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_touches_account() {
        let tx = sample();
        assert!(tx.touches_account("Expenses"));
        assert!(tx.touches_account("Assets:Cash"));
        assert!(!tx.touches_account("Assets:Bank"));
        assert!(!tx.touches_account("Exp"));
    }

    #[test]
    fn test_totals_skip_open_lines() {
        let totals = sample().totals().unwrap();
        assert_eq!(totals, vec![("USD".to_string(), Quantity::new(1250, 2))]);
    }
}

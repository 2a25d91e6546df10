// src/legacy/posting.rs

//! Posting lines and locale-dependent numbers from the journal page

use crate::ledger::{Quantity, TransactionLine};
use regex::Regex;
use std::sync::LazyLock;

static POSTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s+([!*]\s+)?(\S[\S\s]+\S)\s\s+(?:([^\d\s+\-]+)\s*)?([-+]?\d[\d,.]*)(?:\s*([^\d\s+\-]+)\s*$)?",
    )
    .unwrap()
});
static DECIMAL_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\d\d?$").unwrap());
static DECIMAL_POINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.\d\d?$").unwrap());

/// Normalize a rendered number to plain `[-]digits[.digits]`
///
/// One or two digits after the last `,` make it the decimal mark (`1.234,5`);
/// the same after `.` make that the mark (`1,234.50`). Anything else is read
/// as an integer with grouping characters (`1,000`).
pub fn normalize_number(text: &str) -> String {
    let text = text.trim();
    if DECIMAL_COMMA_RE.is_match(text) {
        text.replace(['.', ' '], "").replace(',', ".")
    } else if DECIMAL_POINT_RE.is_match(text) {
        text.replace([',', ' '], "")
    } else {
        text.replace([',', '.', ' '], "")
    }
}

/// Parse one indented posting line
///
/// Returns `None` for lines that do not look like a posting, including
/// postings with a commodity on both sides of the number.
pub fn parse_posting_line(line: &str) -> Option<TransactionLine> {
    let caps = POSTING_RE.captures(line)?;
    let account = caps.get(2)?.as_str();
    let prefix = caps.get(3).map(|m| m.as_str());
    let postfix = caps.get(5).map(|m| m.as_str());

    let currency = match (prefix, postfix) {
        (Some(_), Some(_)) => return None,
        (Some(c), None) | (None, Some(c)) => c,
        (None, None) => "",
    };

    let quantity = Quantity::from_decimal_str(&normalize_number(caps.get(4)?.as_str())).ok()?;
    Some(TransactionLine::new(account, Some(quantity), currency))
}

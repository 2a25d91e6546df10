// src/ledger/account.rs

//! Ledger accounts and the parent-account invariant
//!
//! Account names are colon-delimited paths (`Assets:Bank:Checking`). Every
//! account whose name contains a colon must have its parent present in the
//! same snapshot; [`ensure_parent_accounts`] synthesizes the missing ones.

use super::amount::Amount;
use super::quantity::Quantity;
use crate::error::Result;
use std::collections::HashSet;

/// Separator between account name segments
pub const ACCOUNT_DELIMITER: char = ':';

/// Where the server says an account was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationInfo {
    pub file: String,
    pub line: u32,
}

/// An account as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAccount {
    pub name: String,
    /// One entry per commodity, in first-seen order
    pub amounts: Vec<Amount>,
    pub declaration: Option<DeclarationInfo>,
    /// Postings the server counted for this account (0 when unknown)
    pub num_postings: u64,
}

impl LedgerAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amounts: Vec::new(),
            declaration: None,
            num_postings: 0,
        }
    }

    pub fn level(&self) -> usize {
        level_of(&self.name)
    }

    pub fn parent_name(&self) -> Option<&str> {
        parent_name(&self.name)
    }

    /// Add to the balance of `amount.commodity`, merging same-commodity entries
    ///
    /// The first style seen for a commodity is kept.
    pub fn add_amount(&mut self, amount: Amount) -> Result<()> {
        match self
            .amounts
            .iter_mut()
            .find(|a| a.commodity == amount.commodity)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.try_add(amount.quantity)?;
            }
            None => self.amounts.push(amount),
        }
        Ok(())
    }

    /// Balance in one commodity, zero if absent
    pub fn balance(&self, commodity: &str) -> Quantity {
        self.amounts
            .iter()
            .find(|a| a.commodity == commodity)
            .map(|a| a.quantity)
            .unwrap_or(Quantity::ZERO)
    }
}

/// Text before the last delimiter, or `None` for a root account
pub fn parent_name(name: &str) -> Option<&str> {
    match name.rfind(ACCOUNT_DELIMITER) {
        Some(pos) if pos > 0 => Some(&name[..pos]),
        _ => None,
    }
}

/// Nesting depth: the number of delimiters in the name
pub fn level_of(name: &str) -> usize {
    name.matches(ACCOUNT_DELIMITER).count()
}

/// True if `candidate` is a strict ancestor of `name`
pub fn is_parent_of(candidate: &str, name: &str) -> bool {
    name.len() > candidate.len()
        && name.starts_with(candidate)
        && name[candidate.len()..].starts_with(ACCOUNT_DELIMITER)
}

/// Iterator over all ancestors of `name`, nearest first
pub fn ancestors(name: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent_name(name), |n| parent_name(*n))
}

/// Synthesize zero-amount parents for every account missing one
///
/// Walks up from each account until it reaches a root or an already-known
/// name; the known-name set keeps each ancestor synthesized at most once.
/// Returns how many accounts were added. Running it again adds nothing.
pub fn ensure_parent_accounts(accounts: &mut Vec<LedgerAccount>) -> usize {
    let mut known: HashSet<String> = accounts.iter().map(|a| a.name.clone()).collect();
    let mut synthesized = Vec::new();

    for account in accounts.iter() {
        for ancestor in ancestors(&account.name) {
            if !known.insert(ancestor.to_string()) {
                break;
            }
            synthesized.push(LedgerAccount::new(ancestor));
        }
    }

    let added = synthesized.len();
    accounts.extend(synthesized);
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(accounts: &[LedgerAccount]) -> Vec<String> {
        let mut names: Vec<String> = accounts.iter().map(|a| a.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_parent_name() {
        assert_eq!(parent_name("Assets:Bank:Checking"), Some("Assets:Bank"));
        assert_eq!(parent_name("Assets:Bank"), Some("Assets"));
        assert_eq!(parent_name("Assets"), None);
        assert_eq!(parent_name(":Assets"), None);
    }

    #[test]
    fn test_leading_delimiter_synthesizes_no_empty_parent() {
        let mut accounts = vec![LedgerAccount::new(":a:b")];
        assert_eq!(ensure_parent_accounts(&mut accounts), 1);
        let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
        assert!(names.contains(&":a"));
        assert!(!names.contains(&""));
    }

    #[test]
    fn test_level() {
        assert_eq!(level_of("Assets"), 0);
        assert_eq!(level_of("Assets:Bank:Checking"), 2);
    }

    #[test]
    fn test_is_parent_of() {
        assert!(is_parent_of("Assets", "Assets:Bank"));
        assert!(is_parent_of("Assets", "Assets:Bank:Checking"));
        assert!(!is_parent_of("Assets", "AssetsX:Bank"));
        assert!(!is_parent_of("Assets", "Assets"));
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let list: Vec<&str> = ancestors("a:b:c:d").collect();
        assert_eq!(list, vec!["a:b:c", "a:b", "a"]);
        assert_eq!(ancestors("root").count(), 0);
    }

    #[test]
    fn test_synthesizes_missing_parents() {
        let mut accounts = vec![
            LedgerAccount::new("Assets:Bank:Checking"),
            LedgerAccount::new("Expenses:Food"),
            LedgerAccount::new("Expenses"),
        ];
        let added = ensure_parent_accounts(&mut accounts);
        assert_eq!(added, 2);
        assert_eq!(
            names(&accounts),
            vec!["Assets", "Assets:Bank", "Assets:Bank:Checking", "Expenses", "Expenses:Food"]
        );

        let synthesized = accounts.iter().find(|a| a.name == "Assets:Bank").unwrap();
        assert!(synthesized.amounts.is_empty());
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let mut accounts = vec![
            LedgerAccount::new("a:b:c"),
            LedgerAccount::new("a:x"),
            LedgerAccount::new("z:y"),
        ];
        ensure_parent_accounts(&mut accounts);
        let first = names(&accounts);

        assert_eq!(ensure_parent_accounts(&mut accounts), 0);
        assert_eq!(names(&accounts), first);
    }

    #[test]
    fn test_add_amount_merges_commodities() {
        let mut acc = LedgerAccount::new("Assets");
        acc.add_amount(Amount::new("USD", Quantity::new(150, 2))).unwrap();
        acc.add_amount(Amount::new("EUR", Quantity::new(3, 0))).unwrap();
        acc.add_amount(Amount::new("USD", Quantity::new(25, 1))).unwrap();

        assert_eq!(acc.amounts.len(), 2);
        assert_eq!(acc.balance("USD"), Quantity::new(400, 2));
        assert_eq!(acc.balance("EUR"), Quantity::new(3, 0));
        assert_eq!(acc.balance("GBP"), Quantity::ZERO);
    }
}

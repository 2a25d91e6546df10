// src/sync/reconcile.rs

//! Generation-stamped reconciliation
//!
//! A sync writes the whole remote snapshot under a new generation `G+1`,
//! then deletes every row of the profile that still carries another
//! generation. All of it happens in one SQLite transaction: an error or a
//! cancellation drops the transaction and the store is left exactly as it
//! was, previous generation included.

use crate::cancel::CancelToken;
use crate::db;
use crate::db::models::{
    AccountRow, AccountValue, TransactionLineRow, TransactionRow, current_generation,
};
use crate::error::Result;
use crate::ledger::{LedgerAccount, LedgerTransaction, ancestors};
use rusqlite::Connection;
use tracing::{debug, info};

/// What one reconciliation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub generation: i64,
    pub accounts: usize,
    pub transactions: usize,
    /// Transactions whose content hash matched and were only re-stamped
    pub unchanged: usize,
    pub purged_accounts: usize,
    pub purged_transactions: usize,
}

/// Make the stored state of `profile_id` match the snapshot exactly
pub fn reconcile(
    conn: &mut Connection,
    profile_id: i64,
    accounts: &[LedgerAccount],
    transactions: &[LedgerTransaction],
    cancel: &CancelToken,
) -> Result<ReconcileSummary> {
    cancel.check()?;

    db::transaction(conn, |tx| {
        let generation = current_generation(tx, profile_id)? + 1;
        debug!("Reconciling profile {} at generation {}", profile_id, generation);

        let mut summary = ReconcileSummary {
            generation,
            ..Default::default()
        };

        for account in accounts {
            cancel.check()?;
            save_account(tx, profile_id, account, generation)?;
            summary.accounts += 1;
        }

        for transaction in transactions {
            cancel.check()?;
            if save_transaction(tx, profile_id, transaction, generation)? {
                summary.unchanged += 1;
            }
            summary.transactions += 1;
        }

        cancel.check()?;
        TransactionLineRow::purge_stale(tx, profile_id, generation)?;
        summary.purged_transactions = TransactionRow::purge_stale(tx, profile_id, generation)?;
        AccountValue::purge_stale(tx, profile_id, generation)?;
        summary.purged_accounts = AccountRow::purge_stale(tx, profile_id, generation)?;
        debug!(
            "Purged {} accounts and {} transactions older than generation {}",
            summary.purged_accounts, summary.purged_transactions, generation
        );

        Ok(summary)
    })
    .inspect(|summary| {
        info!(
            "Stored {} accounts and {} transactions ({} unchanged) for profile {}",
            summary.accounts, summary.transactions, summary.unchanged, profile_id
        );
    })
}

/// Upsert one account and its balances; UI flags survive the upsert
fn save_account(
    conn: &Connection,
    profile_id: i64,
    account: &LedgerAccount,
    generation: i64,
) -> Result<()> {
    let account_id = AccountRow::upsert(conn, profile_id, &account.name, generation)?;
    for amount in &account.amounts {
        AccountValue::upsert(conn, account_id, &amount.commodity, amount.quantity, generation)?;
    }
    Ok(())
}

/// Insert or update one transaction; returns `true` when it was unchanged
fn save_transaction(
    conn: &Connection,
    profile_id: i64,
    transaction: &LedgerTransaction,
    generation: i64,
) -> Result<bool> {
    let mut incoming = TransactionRow::from_ledger(profile_id, transaction, generation);

    let existing = TransactionRow::find_by_ledger_id(conn, profile_id, transaction.ledger_id)?
        .and_then(|row| row.id.map(|id| (id, row.data_hash)));

    let transaction_id = match existing {
        Some((id, hash)) if hash == incoming.data_hash => {
            TransactionRow::touch_generation(conn, id, generation)?;
            return Ok(true);
        }
        Some((id, _)) => {
            incoming.id = Some(id);
            incoming.update(conn)?;
            id
        }
        None => incoming.insert(conn)?,
    };

    save_lines(conn, transaction_id, transaction, generation)?;
    Ok(false)
}

fn save_lines(
    conn: &Connection,
    transaction_id: i64,
    transaction: &LedgerTransaction,
    generation: i64,
) -> Result<()> {
    let mut order_no = 0;
    for line in &transaction.lines {
        order_no += 1;
        TransactionLineRow::upsert(conn, transaction_id, order_no, line, generation)?;
    }
    TransactionLineRow::delete_after(conn, transaction_id, order_no)?;
    Ok(())
}

/// Store a transaction that was just posted to the server
///
/// It gets the next free ledger id and the current generation, so the next
/// sync either confirms it or replaces it. Every line's amount is added to
/// the balance of its account and all of that account's ancestors, creating
/// missing rows on the way. Returns the stored transaction.
pub fn append_transaction(
    conn: &mut Connection,
    profile_id: i64,
    transaction: &LedgerTransaction,
) -> Result<LedgerTransaction> {
    db::transaction(conn, |tx| {
        let generation = current_generation(tx, profile_id)?;
        let ledger_id = TransactionRow::max_ledger_id(tx, profile_id)? + 1;

        let mut stored = transaction.clone();
        stored.ledger_id = ledger_id;

        let mut row = TransactionRow::from_ledger(profile_id, &stored, generation);
        let transaction_id = row.insert(tx)?;
        save_lines(tx, transaction_id, &stored, generation)?;

        for line in &stored.lines {
            let chain = std::iter::once(line.account_name.as_str()).chain(ancestors(&line.account_name));
            for name in chain {
                let account_id = match AccountRow::find_by_name(tx, profile_id, name)? {
                    Some(AccountRow { id: Some(id), .. }) => id,
                    _ => AccountRow::upsert(tx, profile_id, name, generation)?,
                };
                if let Some(amount) = line.amount {
                    AccountValue::add_to(tx, account_id, &line.currency, amount, generation)?;
                }
            }
        }

        debug!(
            "Appended transaction {} with {} lines to profile {}",
            ledger_id,
            stored.lines.len(),
            profile_id
        );
        Ok(stored)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Profile, list_accounts_with_amounts, list_transactions_with_lines};
    use crate::ledger::{Amount, Quantity, TransactionLine};
    use chrono::NaiveDate;

    fn setup() -> (Connection, i64) {
        let conn = db::open_in_memory().unwrap();
        let mut profile = Profile::new("p".to_string(), "http://x".to_string());
        let id = profile.insert(&conn).unwrap();
        (conn, id)
    }

    fn account(name: &str, value: i64) -> LedgerAccount {
        let mut account = LedgerAccount::new(name);
        account
            .add_amount(Amount::new("EUR", Quantity::new(value, 2)))
            .unwrap();
        account
    }

    fn transaction(ledger_id: i64, description: &str) -> LedgerTransaction {
        let mut tx = LedgerTransaction::new(
            ledger_id,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            description,
        );
        tx.add_line(TransactionLine::new("Expenses:Food", Some(Quantity::new(500, 2)), "EUR"));
        tx.add_line(TransactionLine::new("Assets:Cash", Some(Quantity::new(-500, 2)), "EUR"));
        tx
    }

    #[test]
    fn test_generations_advance() {
        let (mut conn, profile_id) = setup();
        let cancel = CancelToken::new();
        let first = reconcile(&mut conn, profile_id, &[account("A", 1)], &[], &cancel).unwrap();
        let second = reconcile(&mut conn, profile_id, &[account("A", 1)], &[], &cancel).unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);
    }

    #[test]
    fn test_changed_transaction_keeps_row_id() {
        let (mut conn, profile_id) = setup();
        let cancel = CancelToken::new();
        reconcile(&mut conn, profile_id, &[], &[transaction(1, "Lunch")], &cancel).unwrap();
        let before = TransactionRow::find_by_ledger_id(&conn, profile_id, 1)
            .unwrap()
            .unwrap();

        let mut changed = transaction(1, "Dinner");
        changed.lines.pop();
        let summary = reconcile(&mut conn, profile_id, &[], &[changed.clone()], &cancel).unwrap();
        assert_eq!(summary.unchanged, 0);

        let after = TransactionRow::find_by_ledger_id(&conn, profile_id, 1)
            .unwrap()
            .unwrap();
        assert_eq!(before.id, after.id);
        assert_eq!(after.description, "Dinner");
        let stored = list_transactions_with_lines(&conn, profile_id, None).unwrap();
        assert_eq!(stored, vec![changed]);
    }

    #[test]
    fn test_cancelled_reconcile_writes_nothing() {
        let (mut conn, profile_id) = setup();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = reconcile(&mut conn, profile_id, &[account("A", 1)], &[], &cancel);
        assert!(matches!(result, Err(crate::Error::Cancelled)));
        assert!(list_accounts_with_amounts(&conn, profile_id, false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_append_updates_ancestor_balances() {
        let (mut conn, profile_id) = setup();
        let cancel = CancelToken::new();
        reconcile(
            &mut conn,
            profile_id,
            &[account("Expenses", 1000)],
            &[transaction(41, "Seed")],
            &cancel,
        )
        .unwrap();

        let stored = append_transaction(&mut conn, profile_id, &transaction(0, "Coffee")).unwrap();
        assert_eq!(stored.ledger_id, 42);

        let accounts = list_accounts_with_amounts(&conn, profile_id, false).unwrap();
        let balance = |name: &str| {
            accounts
                .iter()
                .find(|a| a.account.name == name)
                .map(|a| a.amounts[0].quantity)
                .unwrap()
        };
        assert!(balance("Expenses").value_eq(&Quantity::new(1500, 2)));
        assert!(balance("Expenses:Food").value_eq(&Quantity::new(500, 2)));
        assert!(balance("Assets").value_eq(&Quantity::new(-500, 2)));

        // appended rows carry the current generation and survive until the next sync
        let row = TransactionRow::find_by_ledger_id(&conn, profile_id, 42)
            .unwrap()
            .unwrap();
        assert_eq!(row.generation, 1);
    }
}

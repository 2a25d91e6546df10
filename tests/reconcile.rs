// tests/reconcile.rs

//! Reconciliation tests: purging, UI state, content hash short-circuit,
//! rollback on cancel, profile isolation and teardown.

mod common;

use chrono::NaiveDate;
use common::{create_profile, setup_test_db};
use ledger_mirror::db::models::{
    AccountRow, Profile, TransactionLineRow, TransactionRow, list_accounts_with_amounts,
    list_transactions_with_lines,
};
use ledger_mirror::ledger::Amount;
use ledger_mirror::sync::{append_transaction, reconcile};
use ledger_mirror::{CancelToken, Error, LedgerAccount, LedgerTransaction, Quantity, TransactionLine};

fn account(name: &str, mantissa: i64) -> LedgerAccount {
    let mut account = LedgerAccount::new(name.to_string());
    account
        .add_amount(Amount::new("EUR", Quantity::new(mantissa, 2)))
        .unwrap();
    account
}

fn transaction(id: i64, day: u32, description: &str, lines: &[(&str, i64)]) -> LedgerTransaction {
    let mut tx = LedgerTransaction::new(
        id,
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
        description,
    );
    for (name, mantissa) in lines {
        tx.add_line(TransactionLine::new(*name, Some(Quantity::new(*mantissa, 2)), "EUR"));
    }
    tx
}

fn account_names(conn: &rusqlite::Connection, profile_id: i64) -> Vec<String> {
    AccountRow::list_for_profile(conn, profile_id)
        .unwrap()
        .into_iter()
        .map(|row| row.name)
        .collect()
}

#[test]
fn test_accounts_missing_from_snapshot_are_purged() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();
    let cancel = CancelToken::new();

    let first = vec![account("A", 100), account("A:B", 60), account("A:C", 40)];
    reconcile(&mut conn, profile_id, &first, &[], &cancel).unwrap();
    assert_eq!(account_names(&conn, profile_id), vec!["A", "A:B", "A:C"]);

    let second = vec![account("A", 60), account("A:B", 60)];
    let summary = reconcile(&mut conn, profile_id, &second, &[], &cancel).unwrap();

    assert_eq!(summary.purged_accounts, 1);
    assert_eq!(account_names(&conn, profile_id), vec!["A", "A:B"]);

    let accounts = list_accounts_with_amounts(&conn, profile_id, false).unwrap();
    assert_eq!(accounts[0].amounts[0].quantity, Quantity::new(60, 2));
}

#[test]
fn test_ui_flags_survive_resync() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();
    let cancel = CancelToken::new();
    let snapshot = vec![account("Assets", 10), account("Assets:Bank", 10)];

    reconcile(&mut conn, profile_id, &snapshot, &[], &cancel).unwrap();
    let bank = AccountRow::find_by_name(&conn, profile_id, "Assets:Bank")
        .unwrap()
        .unwrap();
    AccountRow::set_expanded(&conn, bank.id.unwrap(), false).unwrap();
    AccountRow::set_amounts_expanded(&conn, bank.id.unwrap(), true).unwrap();

    reconcile(&mut conn, profile_id, &snapshot, &[], &cancel).unwrap();
    let after = AccountRow::find_by_name(&conn, profile_id, "Assets:Bank")
        .unwrap()
        .unwrap();
    assert_eq!(after.id, bank.id);
    assert!(!after.expanded);
    assert!(after.amounts_expanded);
}

#[test]
fn test_unchanged_transactions_are_only_restamped() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();
    let cancel = CancelToken::new();
    let txs = vec![
        transaction(2, 2, "Rent", &[("Expenses:Rent", 50000), ("Assets:Bank", -50000)]),
        transaction(1, 1, "Coffee", &[("Expenses:Food", 350), ("Assets:Cash", -350)]),
    ];

    let first = reconcile(&mut conn, profile_id, &[], &txs, &cancel).unwrap();
    assert_eq!(first.unchanged, 0);
    let rent_id = TransactionRow::find_by_ledger_id(&conn, profile_id, 2)
        .unwrap()
        .unwrap()
        .id;

    let mut changed = txs.clone();
    changed[1].description = "Espresso".to_string();
    let second = reconcile(&mut conn, profile_id, &[], &changed, &cancel).unwrap();

    assert_eq!(second.unchanged, 1);
    assert_eq!(second.purged_transactions, 0);

    let rent = TransactionRow::find_by_ledger_id(&conn, profile_id, 2)
        .unwrap()
        .unwrap();
    assert_eq!(rent.id, rent_id);
    assert_eq!(rent.generation, second.generation);
    for line in TransactionLineRow::list_for_transaction(&conn, rent.id.unwrap()).unwrap() {
        assert_eq!(line.generation, second.generation);
    }

    let stored = list_transactions_with_lines(&conn, profile_id, None).unwrap();
    assert_eq!(stored[1].description, "Espresso");
}

#[test]
fn test_shrinking_transaction_drops_trailing_lines() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();
    let cancel = CancelToken::new();

    let split = transaction(
        1,
        1,
        "Shopping",
        &[("Expenses:Food", 300), ("Expenses:Home", 200), ("Assets:Cash", -500)],
    );
    reconcile(&mut conn, profile_id, &[], &[split], &cancel).unwrap();

    let merged = transaction(1, 1, "Shopping", &[("Expenses:Food", 500), ("Assets:Cash", -500)]);
    reconcile(&mut conn, profile_id, &[], &[merged.clone()], &cancel).unwrap();

    let stored = list_transactions_with_lines(&conn, profile_id, None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].lines, merged.lines);
}

#[test]
fn test_cancelled_reconcile_keeps_previous_generation() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();

    let snapshot = vec![account("A", 100)];
    let txs = vec![transaction(1, 1, "Old", &[("A", 100)])];
    reconcile(&mut conn, profile_id, &snapshot, &txs, &CancelToken::new()).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = reconcile(
        &mut conn,
        profile_id,
        &[account("B", 1)],
        &[transaction(2, 2, "New", &[("B", 1)])],
        &cancel,
    );

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(account_names(&conn, profile_id), vec!["A"]);
    let stored = list_transactions_with_lines(&conn, profile_id, None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].description, "Old");
}

#[test]
fn test_profiles_are_isolated() {
    let (_temp, mut conn) = setup_test_db();
    let home = create_profile(&conn, "home").id.unwrap();
    let work = create_profile(&conn, "work").id.unwrap();
    let cancel = CancelToken::new();

    reconcile(&mut conn, home, &[account("Assets", 1)], &[], &cancel).unwrap();
    reconcile(&mut conn, work, &[account("Income", 1)], &[], &cancel).unwrap();
    reconcile(&mut conn, work, &[account("Expenses", 1)], &[], &cancel).unwrap();

    assert_eq!(account_names(&conn, home), vec!["Assets"]);
    assert_eq!(account_names(&conn, work), vec!["Expenses"]);
}

#[test]
fn test_profile_teardown_cascades() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();
    reconcile(
        &mut conn,
        profile_id,
        &[account("A", 100)],
        &[transaction(1, 1, "Tx", &[("A", 100)])],
        &CancelToken::new(),
    )
    .unwrap();

    Profile::delete(&conn, profile_id).unwrap();

    assert!(account_names(&conn, profile_id).is_empty());
    assert!(TransactionRow::list_for_profile(&conn, profile_id).unwrap().is_empty());
    let orphan_lines: i64 = conn
        .query_row("SELECT COUNT(*) FROM transaction_lines", [], |row| row.get(0))
        .unwrap();
    assert_eq!(orphan_lines, 0);
}

#[test]
fn test_appended_transaction_shows_up_before_next_sync() {
    let (_temp, mut conn) = setup_test_db();
    let profile_id = create_profile(&conn, "home").id.unwrap();
    reconcile(
        &mut conn,
        profile_id,
        &[account("Expenses", 100), account("Expenses:Food", 100)],
        &[transaction(7, 1, "Old", &[("Expenses:Food", 100)])],
        &CancelToken::new(),
    )
    .unwrap();

    let new_tx = transaction(0, 3, "Lunch", &[("Expenses:Food:Out", 1200), ("Assets:Cash", -1200)]);
    let stored = append_transaction(&mut conn, profile_id, &new_tx).unwrap();
    assert_eq!(stored.ledger_id, 8);

    let accounts = list_accounts_with_amounts(&conn, profile_id, false).unwrap();
    let balance = |name: &str| {
        accounts
            .iter()
            .find(|a| a.account.name == name)
            .map(|a| a.amounts[0].quantity)
            .unwrap()
    };
    assert_eq!(balance("Expenses"), Quantity::new(1300, 2));
    assert_eq!(balance("Expenses:Food"), Quantity::new(1300, 2));
    assert_eq!(balance("Expenses:Food:Out"), Quantity::new(1200, 2));
    assert_eq!(balance("Assets"), Quantity::new(-1200, 2));

    let listed = list_transactions_with_lines(&conn, profile_id, Some("Expenses:Food")).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].description, "Lunch");
}

// src/db/models/transaction.rs

//! TransactionRow and TransactionLineRow models - the mirrored journal

use crate::error::{Error, Result};
use crate::ledger::{LedgerTransaction, Quantity, TransactionLine};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Storage format of transaction dates
pub const DB_DATE_FORMAT: &str = "%Y-%m-%d";

const TRANSACTION_COLUMNS: &str =
    "id, profile_id, ledger_id, date, description, comment, data_hash, generation";

const LINE_COLUMNS: &str =
    "id, transaction_id, order_no, account_name, currency, mantissa, scale, comment, generation";

fn date_from_sql(idx: usize, text: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DB_DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// One mirrored transaction header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    pub id: Option<i64>,
    pub profile_id: i64,
    pub ledger_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub comment: Option<String>,
    pub data_hash: String,
    pub generation: i64,
}

impl TransactionRow {
    /// Header row for a domain transaction, hashed for `profile_id`
    pub fn from_ledger(profile_id: i64, tx: &LedgerTransaction, generation: i64) -> Self {
        Self {
            id: None,
            profile_id,
            ledger_id: tx.ledger_id,
            date: tx.date,
            description: tx.description.clone(),
            comment: tx.comment.clone(),
            data_hash: tx.content_hash(profile_id),
            generation,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO transactions (profile_id, ledger_id, date, description, comment,
                                       data_hash, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.profile_id,
                self.ledger_id,
                self.date.format(DB_DATE_FORMAT).to_string(),
                &self.description,
                &self.comment,
                &self.data_hash,
                self.generation,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Rewrite every column of an existing row
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update transaction without ID".to_string()))?;

        conn.execute(
            "UPDATE transactions SET ledger_id = ?1, date = ?2, description = ?3, comment = ?4,
             data_hash = ?5, generation = ?6 WHERE id = ?7",
            params![
                self.ledger_id,
                self.date.format(DB_DATE_FORMAT).to_string(),
                &self.description,
                &self.comment,
                &self.data_hash,
                self.generation,
                id,
            ],
        )?;

        Ok(())
    }

    /// Stamp an unchanged transaction and its lines with a new generation
    pub fn touch_generation(conn: &Connection, id: i64, generation: i64) -> Result<()> {
        conn.execute(
            "UPDATE transactions SET generation = ?1 WHERE id = ?2",
            params![generation, id],
        )?;
        conn.execute(
            "UPDATE transaction_lines SET generation = ?1 WHERE transaction_id = ?2",
            params![generation, id],
        )?;
        Ok(())
    }

    pub fn find_by_ledger_id(
        conn: &Connection,
        profile_id: i64,
        ledger_id: i64,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE profile_id = ?1 AND ledger_id = ?2"
        ))?;
        let row = stmt
            .query_row(params![profile_id, ledger_id], Self::from_row)
            .optional()?;
        Ok(row)
    }

    /// Transactions of a profile, newest first
    pub fn list_for_profile(conn: &Connection, profile_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE profile_id = ?1
             ORDER BY date DESC, ledger_id DESC"
        ))?;
        let rows = stmt
            .query_map([profile_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Highest server ledger id stored for a profile, 0 when empty
    pub fn max_ledger_id(conn: &Connection, profile_id: i64) -> Result<i64> {
        let max = conn.query_row(
            "SELECT COALESCE(MAX(ledger_id), 0) FROM transactions WHERE profile_id = ?1",
            [profile_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    /// Delete a profile's transactions not touched by `generation`
    pub fn purge_stale(conn: &Connection, profile_id: i64, generation: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE profile_id = ?1 AND generation <> ?2",
            params![profile_id, generation],
        )?;
        Ok(deleted)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let date: String = row.get(3)?;
        Ok(Self {
            id: Some(row.get(0)?),
            profile_id: row.get(1)?,
            ledger_id: row.get(2)?,
            date: date_from_sql(3, &date)?,
            description: row.get(4)?,
            comment: row.get(5)?,
            data_hash: row.get(6)?,
            generation: row.get(7)?,
        })
    }
}

/// One posting of a mirrored transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLineRow {
    pub id: Option<i64>,
    pub transaction_id: i64,
    /// 1-based position within the transaction
    pub order_no: i64,
    pub account_name: String,
    pub currency: String,
    pub amount: Option<Quantity>,
    pub comment: Option<String>,
    pub generation: i64,
}

impl TransactionLineRow {
    /// Insert or overwrite the line at `order_no`
    pub fn upsert(
        conn: &Connection,
        transaction_id: i64,
        order_no: i64,
        line: &TransactionLine,
        generation: i64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO transaction_lines (transaction_id, order_no, account_name, currency,
                                            mantissa, scale, comment, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(transaction_id, order_no) DO UPDATE
                 SET account_name = excluded.account_name, currency = excluded.currency,
                     mantissa = excluded.mantissa, scale = excluded.scale,
                     comment = excluded.comment, generation = excluded.generation",
            params![
                transaction_id,
                order_no,
                &line.account_name,
                &line.currency,
                line.amount.map(|q| q.mantissa),
                line.amount.map(|q| q.scale),
                &line.comment,
                generation,
            ],
        )?;
        Ok(())
    }

    /// Remove lines past the last one still present
    pub fn delete_after(conn: &Connection, transaction_id: i64, last_order_no: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM transaction_lines WHERE transaction_id = ?1 AND order_no > ?2",
            params![transaction_id, last_order_no],
        )?;
        Ok(deleted)
    }

    pub fn list_for_transaction(conn: &Connection, transaction_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {LINE_COLUMNS} FROM transaction_lines WHERE transaction_id = ?1 ORDER BY order_no"
        ))?;
        let lines = stmt
            .query_map([transaction_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    /// Delete a profile's lines not touched by `generation`
    pub fn purge_stale(conn: &Connection, profile_id: i64, generation: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM transaction_lines WHERE generation <> ?2
               AND transaction_id IN (SELECT id FROM transactions WHERE profile_id = ?1)",
            params![profile_id, generation],
        )?;
        Ok(deleted)
    }

    pub fn to_line(&self) -> TransactionLine {
        TransactionLine {
            account_name: self.account_name.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            comment: self.comment.clone(),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let mantissa: Option<i64> = row.get(5)?;
        let scale: Option<u32> = row.get(6)?;
        Ok(Self {
            id: Some(row.get(0)?),
            transaction_id: row.get(1)?,
            order_no: row.get(2)?,
            account_name: row.get(3)?,
            currency: row.get(4)?,
            amount: mantissa.map(|m| Quantity::new(m, scale.unwrap_or(0))),
            comment: row.get(7)?,
            generation: row.get(8)?,
        })
    }
}

/// Stored transactions of a profile as domain values, newest first
///
/// With `account`, only transactions with a line on that account or one
/// of its sub-accounts are returned.
pub fn list_transactions_with_lines(
    conn: &Connection,
    profile_id: i64,
    account: Option<&str>,
) -> Result<Vec<LedgerTransaction>> {
    let mut result = Vec::new();
    for row in TransactionRow::list_for_profile(conn, profile_id)? {
        let Some(id) = row.id else { continue };
        let mut tx = LedgerTransaction::new(row.ledger_id, row.date, row.description);
        tx.comment = row.comment;
        tx.lines = TransactionLineRow::list_for_transaction(conn, id)?
            .iter()
            .map(TransactionLineRow::to_line)
            .collect();

        if account.is_some_and(|prefix| !tx.touches_account(prefix)) {
            continue;
        }
        result.push(tx);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::Profile;

    fn setup() -> (Connection, i64) {
        let conn = db::open_in_memory().unwrap();
        let mut profile = Profile::new("p".to_string(), "http://x".to_string());
        let id = profile.insert(&conn).unwrap();
        (conn, id)
    }

    fn sample(ledger_id: i64, day: u32, account: &str) -> LedgerTransaction {
        let mut tx = LedgerTransaction::new(
            ledger_id,
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            format!("tx {ledger_id}"),
        );
        tx.add_line(TransactionLine::new(account, Some(Quantity::new(1000, 2)), "EUR"));
        tx.add_line(TransactionLine::new("Assets:Bank", None, ""));
        tx
    }

    fn store(conn: &Connection, profile_id: i64, tx: &LedgerTransaction) -> i64 {
        let mut row = TransactionRow::from_ledger(profile_id, tx, 1);
        let id = row.insert(conn).unwrap();
        for (i, line) in tx.lines.iter().enumerate() {
            TransactionLineRow::upsert(conn, id, i as i64 + 1, line, 1).unwrap();
        }
        id
    }

    #[test]
    fn test_round_trip_through_rows() {
        let (conn, profile_id) = setup();
        let tx = sample(7, 2, "Expenses:Food");
        store(&conn, profile_id, &tx);

        let loaded = list_transactions_with_lines(&conn, profile_id, None).unwrap();
        assert_eq!(loaded, vec![tx]);
        assert_eq!(TransactionRow::max_ledger_id(&conn, profile_id).unwrap(), 7);
    }

    #[test]
    fn test_account_filter_and_order() {
        let (conn, profile_id) = setup();
        store(&conn, profile_id, &sample(1, 1, "Expenses:Food"));
        store(&conn, profile_id, &sample(2, 5, "Expenses:Rent"));
        store(&conn, profile_id, &sample(3, 3, "Income"));

        let all = list_transactions_with_lines(&conn, profile_id, None).unwrap();
        let ids: Vec<i64> = all.iter().map(|t| t.ledger_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let expenses = list_transactions_with_lines(&conn, profile_id, Some("Expenses")).unwrap();
        assert_eq!(expenses.len(), 2);
        let food = list_transactions_with_lines(&conn, profile_id, Some("Expenses:Food")).unwrap();
        assert_eq!(food.len(), 1);
        assert!(list_transactions_with_lines(&conn, profile_id, Some("Expenses:Fo"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_after_trims_lines() {
        let (conn, profile_id) = setup();
        let id = store(&conn, profile_id, &sample(1, 1, "Expenses"));
        assert_eq!(TransactionLineRow::delete_after(&conn, id, 1).unwrap(), 1);
        assert_eq!(TransactionLineRow::list_for_transaction(&conn, id).unwrap().len(), 1);
    }

    #[test]
    fn test_touch_generation() {
        let (conn, profile_id) = setup();
        let id = store(&conn, profile_id, &sample(1, 1, "Expenses"));
        TransactionRow::touch_generation(&conn, id, 5).unwrap();

        assert_eq!(TransactionRow::purge_stale(&conn, profile_id, 5).unwrap(), 0);
        assert_eq!(TransactionLineRow::purge_stale(&conn, profile_id, 5).unwrap(), 0);
        let row = TransactionRow::find_by_ledger_id(&conn, profile_id, 1)
            .unwrap()
            .unwrap();
        assert_eq!(row.generation, 5);
    }
}

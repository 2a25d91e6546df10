// src/db/models/account.rs

//! AccountRow and AccountValue models - the mirrored account tree

use crate::error::{Error, Result};
use crate::ledger::{Amount, Quantity, level_of};
use rusqlite::{Connection, OptionalExtension, Row, params};

const ACCOUNT_COLUMNS: &str =
    "id, profile_id, name, level, expanded, amounts_expanded, generation";

/// One mirrored account of a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub id: Option<i64>,
    pub profile_id: i64,
    pub name: String,
    pub level: i32,
    /// UI state: children visible
    pub expanded: bool,
    /// UI state: all commodity amounts visible
    pub amounts_expanded: bool,
    pub generation: i64,
}

impl AccountRow {
    pub fn new(profile_id: i64, name: String) -> Self {
        let level = level_of(&name) as i32;
        Self {
            id: None,
            profile_id,
            name,
            level,
            expanded: true,
            amounts_expanded: false,
            generation: 0,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO accounts (profile_id, name, level, expanded, amounts_expanded, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.profile_id,
                &self.name,
                self.level,
                self.expanded as i32,
                self.amounts_expanded as i32,
                self.generation,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Insert or refresh an account for a sync generation
    ///
    /// An existing row keeps its id and UI flags; only level and generation
    /// are rewritten.
    pub fn upsert(
        conn: &Connection,
        profile_id: i64,
        name: &str,
        generation: i64,
    ) -> Result<i64> {
        let id = conn.query_row(
            "INSERT INTO accounts (profile_id, name, level, generation)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(profile_id, name) DO UPDATE
                 SET level = excluded.level, generation = excluded.generation
             RETURNING id",
            params![profile_id, name, level_of(name) as i32, generation],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
        ))?;
        let account = stmt.query_row([id], Self::from_row).optional()?;
        Ok(account)
    }

    pub fn find_by_name(conn: &Connection, profile_id: i64, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE profile_id = ?1 AND name = ?2"
        ))?;
        let account = stmt
            .query_row(params![profile_id, name], Self::from_row)
            .optional()?;
        Ok(account)
    }

    /// List a profile's accounts ordered by name
    pub fn list_for_profile(conn: &Connection, profile_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE profile_id = ?1 ORDER BY name"
        ))?;
        let accounts = stmt
            .query_map([profile_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn set_expanded(conn: &Connection, id: i64, expanded: bool) -> Result<()> {
        let changed = conn.execute(
            "UPDATE accounts SET expanded = ?1 WHERE id = ?2",
            params![expanded as i32, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("account {id}")));
        }
        Ok(())
    }

    pub fn set_amounts_expanded(conn: &Connection, id: i64, expanded: bool) -> Result<()> {
        let changed = conn.execute(
            "UPDATE accounts SET amounts_expanded = ?1 WHERE id = ?2",
            params![expanded as i32, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("account {id}")));
        }
        Ok(())
    }

    /// Delete a profile's accounts not touched by `generation`
    ///
    /// Their values go with them through the cascade.
    pub fn purge_stale(conn: &Connection, profile_id: i64, generation: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM accounts WHERE profile_id = ?1 AND generation <> ?2",
            params![profile_id, generation],
        )?;
        Ok(deleted)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            profile_id: row.get(1)?,
            name: row.get(2)?,
            level: row.get(3)?,
            expanded: row.get::<_, i32>(4)? != 0,
            amounts_expanded: row.get::<_, i32>(5)? != 0,
            generation: row.get(6)?,
        })
    }
}

/// Balance of one account in one commodity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountValue {
    pub id: Option<i64>,
    pub account_id: i64,
    pub currency: String,
    pub quantity: Quantity,
    pub generation: i64,
}

impl AccountValue {
    /// Insert or overwrite the balance of (account, currency)
    pub fn upsert(
        conn: &Connection,
        account_id: i64,
        currency: &str,
        quantity: Quantity,
        generation: i64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO account_values (account_id, currency, mantissa, scale, generation)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(account_id, currency) DO UPDATE
                 SET mantissa = excluded.mantissa, scale = excluded.scale,
                     generation = excluded.generation",
            params![
                account_id,
                currency,
                quantity.mantissa,
                quantity.scale,
                generation
            ],
        )?;
        Ok(())
    }

    pub fn find(conn: &Connection, account_id: i64, currency: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, account_id, currency, mantissa, scale, generation
             FROM account_values WHERE account_id = ?1 AND currency = ?2",
        )?;
        let value = stmt
            .query_row(params![account_id, currency], Self::from_row)
            .optional()?;
        Ok(value)
    }

    /// Add `delta` to the stored balance, creating it at zero if missing
    pub fn add_to(
        conn: &Connection,
        account_id: i64,
        currency: &str,
        delta: Quantity,
        generation: i64,
    ) -> Result<Quantity> {
        let current = Self::find(conn, account_id, currency)?
            .map(|v| v.quantity)
            .unwrap_or(Quantity::ZERO);
        let total = current.try_add(delta)?;
        Self::upsert(conn, account_id, currency, total, generation)?;
        Ok(total)
    }

    pub fn list_for_account(conn: &Connection, account_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, account_id, currency, mantissa, scale, generation
             FROM account_values WHERE account_id = ?1 ORDER BY currency",
        )?;
        let values = stmt
            .query_map([account_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// Delete a profile's values not touched by `generation`
    pub fn purge_stale(conn: &Connection, profile_id: i64, generation: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM account_values WHERE generation <> ?2
               AND account_id IN (SELECT id FROM accounts WHERE profile_id = ?1)",
            params![profile_id, generation],
        )?;
        Ok(deleted)
    }

    pub fn to_amount(&self) -> Amount {
        Amount::new(self.currency.clone(), self.quantity)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            account_id: row.get(1)?,
            currency: row.get(2)?,
            quantity: Quantity::new(row.get(3)?, row.get(4)?),
            generation: row.get(5)?,
        })
    }
}

/// An account together with its balances, as shown to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWithAmounts {
    pub account: AccountRow,
    pub amounts: Vec<Amount>,
}

impl AccountWithAmounts {
    pub fn is_zero(&self) -> bool {
        self.amounts.iter().all(|a| a.quantity.is_zero())
    }
}

/// Accounts of a profile with their balances, ordered by name
///
/// With `hide_zero`, accounts whose every balance is zero are left out.
pub fn list_accounts_with_amounts(
    conn: &Connection,
    profile_id: i64,
    hide_zero: bool,
) -> Result<Vec<AccountWithAmounts>> {
    let mut result = Vec::new();
    for account in AccountRow::list_for_profile(conn, profile_id)? {
        let Some(id) = account.id else { continue };
        let amounts = AccountValue::list_for_account(conn, id)?
            .iter()
            .map(AccountValue::to_amount)
            .collect();
        let entry = AccountWithAmounts { account, amounts };
        if hide_zero && entry.is_zero() {
            continue;
        }
        result.push(entry);
    }
    Ok(result)
}

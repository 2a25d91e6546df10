// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Tables, in dependency order:
//! - profiles: configured servers
//! - accounts / account_values: mirrored account tree with per-commodity balances
//! - transactions / transaction_lines: mirrored journal
//!
//! Every mirrored row carries the `generation` of the sync that last wrote it.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Initial schema - profiles and the mirrored ledger
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL,
            auth_enabled INTEGER NOT NULL DEFAULT 0,
            auth_user TEXT,
            auth_password TEXT,
            api_version INTEGER NOT NULL DEFAULT 0,
            commodity_side TEXT NOT NULL DEFAULT 'left' CHECK(commodity_side IN ('left', 'right')),
            commodity_spaced INTEGER NOT NULL DEFAULT 1,
            last_sync TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            level INTEGER NOT NULL,
            expanded INTEGER NOT NULL DEFAULT 1,
            amounts_expanded INTEGER NOT NULL DEFAULT 0,
            generation INTEGER NOT NULL DEFAULT 0,
            UNIQUE(profile_id, name),
            FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_accounts_generation ON accounts(profile_id, generation);

        CREATE TABLE account_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT '',
            mantissa INTEGER NOT NULL,
            scale INTEGER NOT NULL,
            generation INTEGER NOT NULL DEFAULT 0,
            UNIQUE(account_id, currency),
            FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
        );

        CREATE TABLE transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            ledger_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            comment TEXT,
            data_hash TEXT NOT NULL,
            generation INTEGER NOT NULL DEFAULT 0,
            UNIQUE(profile_id, ledger_id),
            FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_transactions_generation ON transactions(profile_id, generation);

        CREATE TABLE transaction_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL,
            order_no INTEGER NOT NULL,
            account_name TEXT NOT NULL,
            currency TEXT NOT NULL DEFAULT '',
            mantissa INTEGER,
            scale INTEGER,
            comment TEXT,
            generation INTEGER NOT NULL DEFAULT 0,
            UNIQUE(transaction_id, order_no),
            FOREIGN KEY (transaction_id) REFERENCES transactions(id) ON DELETE CASCADE
        );
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Version 2 - indexes for the read API
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE INDEX idx_transactions_date ON transactions(profile_id, date DESC, ledger_id DESC);
        CREATE INDEX idx_transaction_lines_account ON transaction_lines(account_name);
        ",
    )?;

    info!("Schema version 2 applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        set_schema_version(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "profiles",
            "accounts",
            "account_values",
            "transactions",
            "transaction_lines",
            "schema_version",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_profile_cascade() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO profiles (uuid, name, url) VALUES ('u1', 'home', 'http://localhost')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO accounts (profile_id, name, level) VALUES (1, 'Assets', 0)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM profiles WHERE id = 1", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_foreign_key_constraints() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO transactions (profile_id, ledger_id, date, description, data_hash)
             VALUES (999, 1, '2024-01-01', 'x', 'h')",
            [],
        );
        assert!(result.is_err());
    }
}

// src/db/models/profile.rs

//! Profile model - a configured ledger server

use crate::error::{Error, Result};
use crate::gateway::ApiVersion;
use crate::ledger::{CommoditySide, CurrencySettings};
use crate::transport;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

const PROFILE_COLUMNS: &str = "id, uuid, name, url, auth_enabled, auth_user, auth_password, \
     api_version, commodity_side, commodity_spaced, last_sync, created_at";

/// Profile represents one ledger server and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub url: String,
    pub auth_enabled: bool,
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,
    pub api_version: ApiVersion,
    pub commodity_side: CommoditySide,
    pub commodity_spaced: bool,
    pub last_sync: Option<String>,
    pub created_at: Option<String>,
}

impl Profile {
    /// Create a new Profile with a fresh UUID and automatic version selection
    pub fn new(name: String, url: String) -> Self {
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            url,
            auth_enabled: false,
            auth_user: None,
            auth_password: None,
            api_version: ApiVersion::Auto,
            commodity_side: CommoditySide::Left,
            commodity_spaced: true,
            last_sync: None,
            created_at: None,
        }
    }

    pub fn with_auth(mut self, user: String, password: String) -> Self {
        self.auth_enabled = true;
        self.auth_user = Some(user);
        self.auth_password = Some(password);
        self
    }

    /// Transport connection for this profile
    ///
    /// Credentials are attached only when authentication is enabled.
    pub fn connection(&self) -> transport::Connection {
        let conn = transport::Connection::new(self.url.clone());
        match (self.auth_enabled, &self.auth_user) {
            (true, Some(user)) => {
                conn.with_credentials(user.clone(), self.auth_password.clone().unwrap_or_default())
            }
            _ => conn,
        }
    }

    pub fn currency_settings(&self) -> CurrencySettings {
        CurrencySettings::new(self.commodity_side, self.commodity_spaced)
    }

    /// Saved row id, or an error for a profile that was never inserted
    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("Profile '{}' has not been saved", self.name)))
    }

    /// Insert this profile into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO profiles (uuid, name, url, auth_enabled, auth_user, auth_password,
                                   api_version, commodity_side, commodity_spaced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &self.uuid,
                &self.name,
                &self.url,
                self.auth_enabled as i32,
                &self.auth_user,
                &self.auth_password,
                self.api_version.code(),
                self.commodity_side.to_string(),
                self.commodity_spaced as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"
        ))?;
        let profile = stmt.query_row([id], Self::from_row).optional()?;
        Ok(profile)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE name = ?1"
        ))?;
        let profile = stmt.query_row([name], Self::from_row).optional()?;
        Ok(profile)
    }

    /// Find a profile by name, failing if it does not exist
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Self> {
        Self::find_by_name(conn, name)?
            .ok_or_else(|| Error::NotFound(format!("profile '{name}'")))
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY name"
        ))?;
        let profiles = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update profile without ID".to_string()))?;

        conn.execute(
            "UPDATE profiles SET name = ?1, url = ?2, auth_enabled = ?3, auth_user = ?4,
             auth_password = ?5, api_version = ?6, commodity_side = ?7, commodity_spaced = ?8,
             last_sync = ?9 WHERE id = ?10",
            params![
                &self.name,
                &self.url,
                self.auth_enabled as i32,
                &self.auth_user,
                &self.auth_password,
                self.api_version.code(),
                self.commodity_side.to_string(),
                self.commodity_spaced as i32,
                &self.last_sync,
                id,
            ],
        )?;

        Ok(())
    }

    /// Record a successful sync at the current time
    pub fn touch_last_sync(conn: &Connection, id: i64) -> Result<String> {
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE profiles SET last_sync = ?1 WHERE id = ?2",
            params![&now, id],
        )?;
        Ok(now)
    }

    /// Delete a profile and, through the cascade, everything mirrored for it
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let side: String = row.get(8)?;
        Ok(Self {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            name: row.get(2)?,
            url: row.get(3)?,
            auth_enabled: row.get::<_, i32>(4)? != 0,
            auth_user: row.get(5)?,
            auth_password: row.get(6)?,
            api_version: ApiVersion::from_code(row.get(7)?),
            commodity_side: CommoditySide::from_str(&side).unwrap_or_default(),
            commodity_spaced: row.get::<_, i32>(9)? != 0,
            last_sync: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

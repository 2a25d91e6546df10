// src/send.rs

//! Posting new transactions to the server
//!
//! JSON servers take a `PUT add`. In `auto` mode each JSON generation is
//! tried newest first; a 400/405 means "not this generation". When none
//! accepts, the web form of the journal page is emulated instead: the server
//! answers a stale form with 200 and a fresh `_token`, which is retried once,
//! and a saved transaction with a 303 redirect.
//!
//! After the server accepted it, the transaction is appended to the local
//! store so it shows up before the next sync.

use crate::cancel::CancelToken;
use crate::db::models::Profile;
use crate::error::{Error, Result};
use crate::gateway::{ApiVersion, Gateway};
use crate::ledger::{CurrencySettings, LedgerTransaction, Quantity};
use crate::sync::append_transaction;
use crate::transport::{Connection, Transport, TransportError};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Path both the JSON API and the web form post to
pub const ADD_PATH: &str = "add";

const FORM_ID: &str = "identify-add";
const SESSION_COOKIE: &str = "_SESSION";
const FORM_DATE_FORMAT: &str = "%Y/%m/%d";

/// Form posts before giving up: the first one plus one retry with a fresh token
const FORM_ATTEMPTS: u32 = 2;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input type="hidden" name="_token" value="([^"]+)">"#).unwrap()
});

/// How a transaction reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRoute {
    Json(ApiVersion),
    LegacyForm,
    /// Nothing was sent
    Simulated,
}

/// Sends transactions for a profile
pub struct TransactionSender {
    transport: Arc<dyn Transport>,
    simulate: bool,
}

impl TransactionSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            simulate: false,
        }
    }

    /// Log requests instead of sending them
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Send `tx` to the profile's server
    pub fn send(
        &self,
        profile: &Profile,
        tx: &LedgerTransaction,
        cancel: &CancelToken,
    ) -> Result<SendRoute> {
        let server = profile.connection();
        let settings = profile.currency_settings();

        match profile.api_version {
            ApiVersion::Html => self.send_form(&server, tx, cancel),
            ApiVersion::Auto => {
                for version in ApiVersion::JSON_VERSIONS {
                    cancel.check()?;
                    debug!("Trying to send using API {}", version);
                    match self.send_json(&server, version, tx, settings) {
                        Ok(route) => return Ok(route),
                        Err(Error::Transport(TransportError::Unsupported { status, body })) => {
                            debug!("API {} not supported (HTTP {}): {}", version, status, body);
                        }
                        Err(e) => return Err(e),
                    }
                }
                warn!("No JSON API accepted the transaction, trying the web form");
                self.send_form(&server, tx, cancel)
            }
            version => {
                cancel.check()?;
                self.send_json(&server, version, tx, settings)
                    .map_err(|e| match e {
                        Error::Transport(TransportError::Unsupported { body, .. }) => {
                            Error::Validation(body)
                        }
                        other => other,
                    })
            }
        }
    }

    /// Send, then append the accepted transaction to the local store
    pub fn send_and_store(
        &self,
        conn: &mut rusqlite::Connection,
        profile: &Profile,
        tx: &LedgerTransaction,
        cancel: &CancelToken,
    ) -> Result<(SendRoute, LedgerTransaction)> {
        let profile_id = profile.require_id()?;
        let route = self.send(profile, tx, cancel)?;
        if route == SendRoute::Simulated {
            return Ok((route, tx.clone()));
        }
        let stored = append_transaction(conn, profile_id, tx)?;
        info!(
            "Stored new transaction {} locally for '{}'",
            stored.ledger_id, profile.name
        );
        Ok((route, stored))
    }

    fn send_json(
        &self,
        server: &Connection,
        version: ApiVersion,
        tx: &LedgerTransaction,
        settings: CurrencySettings,
    ) -> Result<SendRoute> {
        let gateway = Gateway::for_version(version)?;
        let body = gateway.serialize_transaction(tx, settings)?;

        if self.simulate {
            info!(
                "Simulating PUT {} using API {}: {}",
                server.url_for(ADD_PATH),
                version,
                String::from_utf8_lossy(&body)
            );
            return Ok(SendRoute::Simulated);
        }

        self.transport.put_json(server, ADD_PATH, &body, None)?;
        info!("Transaction sent using API {}", version);
        Ok(SendRoute::Json(version))
    }

    fn send_form(
        &self,
        server: &Connection,
        tx: &LedgerTransaction,
        cancel: &CancelToken,
    ) -> Result<SendRoute> {
        let mut token: Option<String> = None;
        let mut session: Option<String> = None;

        for attempt in 1..=FORM_ATTEMPTS {
            cancel.check()?;
            let fields = form_fields(tx, token.as_deref());

            if self.simulate {
                info!("Simulating POST {} with {:?}", server.url_for(ADD_PATH), fields);
                return Ok(SendRoute::Simulated);
            }

            let cookies: Vec<(String, String)> = session
                .iter()
                .map(|s| (SESSION_COOKIE.to_string(), s.clone()))
                .collect();
            let response = self
                .transport
                .post_form(server, ADD_PATH, &fields, &cookies, None)?;

            match response.status {
                303 => {
                    info!("Transaction sent through the web form");
                    return Ok(SendRoute::LegacyForm);
                }
                200 => {
                    match response.cookie(SESSION_COOKIE) {
                        Some(value) => session = Some(value.to_string()),
                        None => warn!("Form response carries no {} cookie", SESSION_COOKIE),
                    }
                    let fresh = TOKEN_RE
                        .captures(&response.body)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string())
                        .ok_or_else(|| Error::parse("form response has no _token"))?;
                    debug!("Form attempt {} needs a fresh token", attempt);
                    token = Some(fresh);
                }
                status => {
                    return Err(TransportError::Http {
                        status,
                        message: format!("unexpected form response {status}"),
                    }
                    .into());
                }
            }
        }

        Err(Error::Validation(format!(
            "web form rejected the transaction after {FORM_ATTEMPTS} tries"
        )))
    }
}

/// Form amount with two decimals, like the web form itself renders it
fn form_amount(quantity: Quantity) -> String {
    match quantity.rescale(2) {
        Some(exact) => exact.to_string(),
        None => format!("{:.2}", quantity.to_approx()),
    }
}

/// Fields of the journal page's add form
pub fn form_fields(tx: &LedgerTransaction, token: Option<&str>) -> Vec<(String, String)> {
    let mut fields = vec![("_formid".to_string(), FORM_ID.to_string())];
    if let Some(token) = token {
        fields.push(("_token".to_string(), token.to_string()));
    }
    fields.push(("date".to_string(), tx.date.format(FORM_DATE_FORMAT).to_string()));
    fields.push(("description".to_string(), tx.description.clone()));

    for line in &tx.lines {
        fields.push(("account".to_string(), line.account_name.clone()));
        fields.push((
            "amount".to_string(),
            line.amount.map(form_amount).unwrap_or_default(),
        ));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionLine;
    use chrono::NaiveDate;

    #[test]
    fn test_form_fields() {
        let mut tx = LedgerTransaction::new(
            0,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            "Groceries",
        );
        tx.add_line(TransactionLine::new("Expenses:Food", Some(Quantity::new(125, 1)), "$"));
        tx.add_line(TransactionLine::new("Assets:Cash", None, ""));

        let fields = form_fields(&tx, Some("abc"));
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("_formid", "identify-add"),
                ("_token", "abc"),
                ("date", "2024/01/05"),
                ("description", "Groceries"),
                ("account", "Expenses:Food"),
                ("amount", "12.50"),
                ("account", "Assets:Cash"),
                ("amount", ""),
            ]
        );
    }

    #[test]
    fn test_form_amount_rounds_long_fractions() {
        assert_eq!(form_amount(Quantity::new(7, 0)), "7.00");
        assert_eq!(form_amount(Quantity::new(-12346, 3)), "-12.35");
    }
}

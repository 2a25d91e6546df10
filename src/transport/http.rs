// src/transport/http.rs

//! Blocking HTTP transport built on reqwest
//!
//! Connection failures are retried a few times with a fixed delay; HTTP
//! status failures are never retried here and are classified into
//! [`TransportError`] for the layers above.

use super::{
    Connection, FormResponse, ResponseBody, TemporaryAuth, Transport, TransportError,
    parse_set_cookie,
};
use crate::error::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts when the connection itself fails
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Tunables for [`HttpTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub connect_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: HTTP_TIMEOUT,
            connect_retries: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            user_agent: concat!("ledger-mirror/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Transport talking to a real server over HTTP(S) with Basic auth
pub struct HttpTransport {
    client: Client,
    /// Form posts must see the 303 themselves, so this one never follows redirects
    form_client: Client,
    settings: HttpSettings,
}

impl HttpTransport {
    pub fn new(settings: HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        let form_client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            form_client,
            settings,
        })
    }

    fn authorize(
        builder: RequestBuilder,
        conn: &Connection,
        auth: Option<&TemporaryAuth>,
    ) -> RequestBuilder {
        match conn.effective_credentials(auth) {
            Some(creds) => builder.basic_auth(&creds.user, Some(&creds.password)),
            None => builder,
        }
    }

    /// Send, retrying only connection failures
    fn send_with_retry<F>(&self, url: &str, build: F) -> std::result::Result<Response, TransportError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.settings.connect_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build().send() {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < max_attempts => {
                    warn!(
                        "Connection to {} failed (attempt {}/{}): {}",
                        url, attempt, max_attempts, e
                    );
                    std::thread::sleep(self.settings.retry_delay);
                }
                Err(e) => return Err(map_reqwest_error(e)),
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Turn a non-success response into the matching error
fn check_status(response: Response, path: &str) -> std::result::Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(TransportError::from_status(status.as_u16(), path, body))
}

impl Transport for HttpTransport {
    fn get(
        &self,
        conn: &Connection,
        path: &str,
        auth: Option<&TemporaryAuth>,
    ) -> std::result::Result<ResponseBody, TransportError> {
        let url = conn.url_for(path);
        debug!("GET {}", url);
        let response = self.send_with_retry(&url, || {
            Self::authorize(self.client.get(&url), conn, auth)
        })?;
        let response = check_status(response, path)?;
        Ok(Box::new(response))
    }

    fn put_json(
        &self,
        conn: &Connection,
        path: &str,
        body: &[u8],
        auth: Option<&TemporaryAuth>,
    ) -> std::result::Result<(), TransportError> {
        let url = conn.url_for(path);
        debug!("PUT {} ({} bytes)", url, body.len());
        let response = self.send_with_retry(&url, || {
            Self::authorize(
                self.client
                    .put(&url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_vec()),
                conn,
                auth,
            )
        })?;
        check_status(response, path)?;
        Ok(())
    }

    fn post_form(
        &self,
        conn: &Connection,
        path: &str,
        fields: &[(String, String)],
        cookies: &[(String, String)],
        auth: Option<&TemporaryAuth>,
    ) -> std::result::Result<FormResponse, TransportError> {
        let url = conn.url_for(path);
        debug!("POST {} ({} fields)", url, fields.len());
        let cookie_header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        let response = self.send_with_retry(&url, || {
            let mut builder = self.form_client.post(&url).form(fields);
            if !cookie_header.is_empty() {
                builder = builder.header(COOKIE, cookie_header.as_str());
            }
            Self::authorize(builder, conn, auth)
        })?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), path, body));
        }

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = response.text().map_err(map_reqwest_error)?;

        Ok(FormResponse {
            status: status.as_u16(),
            body,
            cookies,
        })
    }
}

// src/config.rs
//! Configuration file parsing
//!
//! TOML file with the following sections, every field optional:
//! - [database] - Location of the local store
//! - [http] - Timeouts, connection retries, user agent
//! - [display] - How outgoing amounts place the commodity symbol
//! - `log_filter` - Default tracing filter when `RUST_LOG` is unset

use crate::error::{Error, Result};
use crate::ledger::{CommoditySide, CurrencySettings};
use crate::transport::HttpSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const APP_DIR: &str = "ledger-mirror";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "mirror.db";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub display: DisplaySection,

    /// tracing `EnvFilter` directive, e.g. `"info"` or `"ledger_mirror=debug"`
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    /// Defaults to `mirror.db` in the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_retries: default_connect_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DisplaySection {
    /// `"left"` or `"right"`
    #[serde(default)]
    pub commodity_side: CommoditySide,

    #[serde(default = "default_true")]
    pub commodity_spaced: bool,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            commodity_side: CommoditySide::Left,
            commodity_spaced: true,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load from `path`, or from the default location when `None`
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Database location, falling back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join(DATABASE_FILE)
        })
    }

    pub fn http_settings(&self) -> HttpSettings {
        let mut settings = HttpSettings {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_retries: self.http.connect_retries,
            retry_delay: Duration::from_millis(self.http.retry_delay_ms),
            ..HttpSettings::default()
        };
        if let Some(agent) = &self.http.user_agent {
            settings.user_agent = agent.clone();
        }
        settings
    }

    /// Settings applied to amounts of newly created profiles
    pub fn currency_settings(&self) -> CurrencySettings {
        CurrencySettings::new(self.display.commodity_side, self.display.commodity_spaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
log_filter = "ledger_mirror=debug"

[database]
path = "/tmp/mirror.db"

[http]
timeout_secs = 5
connect_retries = 1
user_agent = "tester"

[display]
commodity_side = "right"
commodity_spaced = false
"#;
        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/mirror.db"));
        assert_eq!(config.log_filter.as_deref(), Some("ledger_mirror=debug"));

        let http = config.http_settings();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.connect_retries, 1);
        assert_eq!(http.retry_delay, Duration::from_millis(1000));
        assert_eq!(http.user_agent, "tester");

        assert_eq!(
            config.currency_settings(),
            CurrencySettings::new(CommoditySide::Right, false)
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.display.commodity_spaced);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            Config::parse("[http]\ntimeout = 5\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}

// src/gateway/detect.rs

//! Server version detection
//!
//! `GET version` returns the server version as a JSON string (`"1.32"`) or,
//! on some builds, unquoted. Servers too old to have the endpoint answer 404
//! and only offer the HTML journal.

use super::ApiVersion;
use crate::error::{Error, Result};
use crate::transport::{Connection, TemporaryAuth, Transport, TransportError};
use regex::Regex;
use std::fmt;
use std::io::Read;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Version endpoint path
const VERSION_PATH: &str = "version";

/// Version strings are tiny; anything larger is not a version
const MAX_VERSION_BODY: u64 = 256;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"?(\d+)\.(\d+)(?:\.(\d+))?"?$"#).unwrap());

/// What the server says about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerVersion {
    /// No version endpoint: a server from before the JSON API
    PreJson,
    Release {
        major: u32,
        minor: u32,
        patch: Option<u32>,
    },
}

impl ServerVersion {
    /// Parse the first line of the version response
    pub fn parse(text: &str) -> Option<Self> {
        let line = text.lines().next()?.trim();
        let caps = VERSION_RE.captures(line)?;
        // quotes must be balanced
        if line.starts_with('"') != line.ends_with('"') {
            return None;
        }
        Some(Self::Release {
            major: caps.get(1)?.as_str().parse().ok()?,
            minor: caps.get(2)?.as_str().parse().ok()?,
            patch: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        })
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        match self {
            Self::PreJson => false,
            Self::Release {
                major: have_major,
                minor: have_minor,
                ..
            } => (*have_major, *have_minor) >= (major, minor),
        }
    }

    /// Newest JSON generation this server understands, `None` for HTML only
    pub fn suitable_api_version(&self) -> Option<ApiVersion> {
        if self.at_least(1, 50) {
            Some(ApiVersion::V1_50)
        } else if self.at_least(1, 40) {
            Some(ApiVersion::V1_40)
        } else if self.at_least(1, 32) {
            Some(ApiVersion::V1_32)
        } else {
            None
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreJson => f.write_str("pre-1.19"),
            Self::Release {
                major,
                minor,
                patch: Some(patch),
            } => write!(f, "{major}.{minor}.{patch}"),
            Self::Release { major, minor, .. } => write!(f, "{major}.{minor}"),
        }
    }
}

/// Ask the server for its version
pub fn detect_version<T>(
    transport: &T,
    conn: &Connection,
    auth: Option<&TemporaryAuth>,
) -> Result<ServerVersion>
where
    T: Transport + ?Sized,
{
    debug!("Detecting server version at {}", conn.url);
    let body = match transport.get(conn, VERSION_PATH, auth) {
        Ok(body) => body,
        Err(TransportError::NotFound(_)) => {
            info!("Version endpoint not found, assuming a pre-JSON server");
            return Ok(ServerVersion::PreJson);
        }
        Err(e) => return Err(e.into()),
    };

    let mut text = String::new();
    body.take(MAX_VERSION_BODY).read_to_string(&mut text)?;

    match ServerVersion::parse(&text) {
        Some(version) => {
            info!("Detected server version {}", version);
            Ok(version)
        }
        None => {
            warn!("Version string format not recognized: {:?}", text.trim());
            Err(Error::parse(format!("unrecognized version string {:?}", text.trim())))
        }
    }
}

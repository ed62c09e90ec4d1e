//! Store endpoint descriptor
//!
//! Accepted forms:
//! - `host:port`
//! - `host` (port 6379)
//! - `redis://[password@]host[:port][/database]`

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Default store host
pub const DEFAULT_HOST: &str = "localhost";

/// Default store port
pub const DEFAULT_PORT: u16 = 6379;

/// Placeholder shown instead of the AUTH password
const REDACTED: &str = "***";

/// Where the networked store lives
///
/// Displays as `host:port`. `Debug` masks the password; only [`to_url`]
/// and serialization carry it.
///
/// [`to_url`]: StoreEndpoint::to_url
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreEndpoint {
    host: String,
    port: u16,
    database: u8,
    password: Option<String>,
}

impl StoreEndpoint {
    /// Create endpoint for host and port
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            database: 0,
            password: None,
        }
    }

    /// With database index
    #[inline]
    #[must_use]
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// With AUTH password
    #[inline]
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Host name
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database index
    #[inline]
    #[must_use]
    pub fn database(&self) -> u8 {
        self.database
    }

    /// AUTH password, if any
    #[inline]
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// `host:port`
    #[inline]
    #[must_use]
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Lossless `redis://` form
    #[must_use]
    pub fn to_url(&self) -> String {
        self.url_with(self.password.as_deref())
    }

    /// `redis://` form with the password masked, for logs and operator output
    #[must_use]
    pub fn redacted_url(&self) -> String {
        self.url_with(self.password.as_ref().map(|_| REDACTED))
    }

    fn url_with(&self, password: Option<&str>) -> String {
        let mut url = String::from("redis://");
        if let Some(password) = password {
            url.push_str(password);
            url.push('@');
        }
        url.push_str(&self.server());
        if self.database != 0 {
            url.push('/');
            url.push_str(&self.database.to_string());
        }
        url
    }
}

impl Default for StoreEndpoint {
    /// `localhost:6379`, database 0
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Debug for StoreEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl Display for StoreEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for StoreEndpoint {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid_endpoint(input, "empty"));
        }

        let (rest, is_url) = match trimmed.strip_prefix("redis://") {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };

        let (password, rest) = match rest.rsplit_once('@') {
            Some((password, rest)) if is_url => (Some(password.to_string()), rest),
            Some(_) => {
                return Err(ConfigError::invalid_endpoint(
                    input,
                    "credentials require the redis:// form",
                ))
            }
            None => (None, rest),
        };

        let (host_port, database) = match rest.split_once('/') {
            Some((host_port, db)) if is_url => (host_port, Some(db)),
            Some(_) => {
                return Err(ConfigError::invalid_endpoint(
                    input,
                    "database requires the redis:// form",
                ))
            }
            None => (rest, None),
        };

        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::invalid_endpoint(input, format!("invalid port '{port}'")))?;
                (host, port)
            }
            None => (host_port, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ConfigError::invalid_endpoint(input, "missing host"));
        }

        let database = match database {
            Some(db) if !db.is_empty() => db
                .parse::<u8>()
                .map_err(|_| ConfigError::invalid_endpoint(input, format!("invalid database '{db}'")))?,
            _ => 0,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            database,
            password,
        })
    }
}

impl TryFrom<String> for StoreEndpoint {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoreEndpoint> for String {
    fn from(endpoint: StoreEndpoint) -> Self {
        endpoint.to_url()
    }
}

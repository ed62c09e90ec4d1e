//! Store endpoint precedence cascade
//!
//! [`EndpointResolver`] walks an ordered list of [`EndpointSource`]s and stops
//! at the first one that yields an endpoint. The built-in default always
//! yields, so resolution only fails on a malformed source.

use crate::endpoint::StoreEndpoint;
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where a resolved endpoint came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOrigin {
    /// Set in code or on the command line
    Explicit,
    /// Entry for the running environment in a config file
    ConfigFile(PathBuf),
    /// Built-in `localhost:6379`
    Default,
}

/// Endpoint together with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Endpoint to connect to
    pub endpoint: StoreEndpoint,
    /// Which source produced it
    pub origin: EndpointOrigin,
}

/// One step of the cascade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSource {
    /// Fixed endpoint
    Explicit(StoreEndpoint),
    /// Environment-keyed YAML map (`production: internal.local:6379`)
    ConfigFile {
        /// File to read
        path: PathBuf,
        /// Key to look up
        environment: String,
    },
    /// `localhost:6379`
    Default,
}

/// Value of one environment entry in `redis.yml`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvironmentEntry {
    Url(String),
    Detailed {
        host: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        database: Option<u8>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl EndpointSource {
    /// Endpoint from this source, if it has one
    ///
    /// # Errors
    /// `ConfigError` if the config file exists but cannot be read or parsed,
    /// or if its entry is not a valid endpoint.
    pub fn resolve(&self) -> Result<Option<ResolvedEndpoint>, ConfigError> {
        match self {
            Self::Explicit(endpoint) => Ok(Some(ResolvedEndpoint {
                endpoint: endpoint.clone(),
                origin: EndpointOrigin::Explicit,
            })),
            Self::ConfigFile { path, environment } => {
                Ok(read_environment_entry(path, environment)?.map(|endpoint| ResolvedEndpoint {
                    endpoint,
                    origin: EndpointOrigin::ConfigFile(path.clone()),
                }))
            }
            Self::Default => Ok(Some(ResolvedEndpoint {
                endpoint: StoreEndpoint::default(),
                origin: EndpointOrigin::Default,
            })),
        }
    }
}

/// Ordered endpoint cascade, first hit wins
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    sources: Vec<EndpointSource>,
}

impl EndpointResolver {
    /// Create empty resolver (resolves to the default)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard cascade: explicit > config file entry > default
    #[must_use]
    pub fn standard(
        explicit: Option<StoreEndpoint>,
        config_file: impl Into<PathBuf>,
        environment: impl Into<String>,
    ) -> Self {
        let mut resolver = Self::new();
        if let Some(endpoint) = explicit {
            resolver = resolver.with_source(EndpointSource::Explicit(endpoint));
        }
        resolver
            .with_source(EndpointSource::ConfigFile {
                path: config_file.into(),
                environment: environment.into(),
            })
            .with_source(EndpointSource::Default)
    }

    /// Append a source (lower precedence than those already present)
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: EndpointSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Sources in precedence order
    #[inline]
    #[must_use]
    pub fn sources(&self) -> &[EndpointSource] {
        &self.sources
    }

    /// Walk the cascade
    ///
    /// Falls back to the default endpoint when no source yields one.
    ///
    /// # Errors
    /// The first `ConfigError` raised by a source.
    pub fn resolve(&self) -> Result<ResolvedEndpoint, ConfigError> {
        for source in &self.sources {
            if let Some(resolved) = source.resolve()? {
                tracing::debug!("Store endpoint {} from {:?}", resolved.endpoint, resolved.origin);
                return Ok(resolved);
            }
        }
        Ok(ResolvedEndpoint {
            endpoint: StoreEndpoint::default(),
            origin: EndpointOrigin::Default,
        })
    }
}

fn read_environment_entry(
    path: &Path,
    environment: &str,
) -> Result<Option<StoreEndpoint>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::io_error(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }

    let mut entries: BTreeMap<String, EnvironmentEntry> =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(entry) = entries.remove(environment) else {
        tracing::debug!("No {} entry in {}", environment, path.display());
        return Ok(None);
    };

    let endpoint: StoreEndpoint = match entry {
        EnvironmentEntry::Url(url) => url.parse()?,
        EnvironmentEntry::Detailed {
            host,
            port,
            database,
            password,
        } => {
            let mut endpoint = StoreEndpoint::new(host, port.unwrap_or(crate::endpoint::DEFAULT_PORT))
                .with_database(database.unwrap_or(0));
            if let Some(password) = password {
                endpoint = endpoint.with_password(password);
            }
            endpoint
        }
    };
    Ok(Some(endpoint))
}

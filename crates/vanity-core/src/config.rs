//! Playground configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vanity_config::{
    default_config_file, resolve_load_path, ConfigError, EndpointResolver, StoreEndpoint,
};

/// Environment used when `VANITY_ENV` is not set
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default Redis key prefix
pub const DEFAULT_NAMESPACE: &str = vanity_redis::DEFAULT_NAMESPACE;

/// Default connect and per-command timeout
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

/// Process root, environment, load path and store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Process root relative paths are resolved against
    pub root: PathBuf,
    /// Running environment, selects the `redis.yml` entry
    pub environment: String,
    /// Experiments directory (`None` → `<root>/experiments`)
    pub load_path: Option<PathBuf>,
    /// Explicit store endpoint, wins over everything else
    pub store: Option<StoreEndpoint>,
    /// Per-environment endpoint file (`None` → `<root>/config/redis.yml`)
    pub config_file: Option<PathBuf>,
    /// Key prefix on the networked store
    pub namespace: String,
    /// Use the in-memory store
    pub test_mode: bool,
    /// Connect and per-command timeout in milliseconds
    pub command_timeout_ms: u64,
}

impl PlaygroundConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration from `VANITY_*` environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `VANITY_ROOT` | `root` |
    /// | `VANITY_ENV` | `environment` |
    /// | `VANITY_LOAD_PATH` | `load_path` |
    /// | `VANITY_REDIS` | `store` |
    /// | `VANITY_TEST` | `test_mode` (`1`, `true`, `yes`) |
    ///
    /// # Errors
    /// `ConfigError::InvalidEndpoint` if `VANITY_REDIS` is not an endpoint.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from any variable lookup
    ///
    /// # Errors
    /// `ConfigError::InvalidEndpoint` if `VANITY_REDIS` is not an endpoint.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(root) = lookup("VANITY_ROOT").filter(|v| !v.is_empty()) {
            config.root = PathBuf::from(root);
        }
        if let Some(environment) = lookup("VANITY_ENV").filter(|v| !v.is_empty()) {
            config.environment = environment;
        }
        if let Some(load_path) = lookup("VANITY_LOAD_PATH").filter(|v| !v.is_empty()) {
            config.load_path = Some(PathBuf::from(load_path));
        }
        if let Some(store) = lookup("VANITY_REDIS").filter(|v| !v.is_empty()) {
            config.store = Some(store.parse()?);
        }
        if let Some(flag) = lookup("VANITY_TEST") {
            config.test_mode = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(config)
    }

    /// With process root
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// With environment
    #[inline]
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// With load path
    #[inline]
    #[must_use]
    pub fn with_load_path(mut self, load_path: impl Into<PathBuf>) -> Self {
        self.load_path = Some(load_path.into());
        self
    }

    /// With explicit store endpoint
    #[inline]
    #[must_use]
    pub fn with_store(mut self, endpoint: StoreEndpoint) -> Self {
        self.store = Some(endpoint);
        self
    }

    /// With endpoint config file
    #[inline]
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// With key prefix
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// With test mode
    #[inline]
    #[must_use]
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// With command timeout
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Experiments directory after resolution against the root
    #[inline]
    #[must_use]
    pub fn resolved_load_path(&self) -> PathBuf {
        resolve_load_path(&self.root, self.load_path.as_deref())
    }

    /// Endpoint file after resolution against the root
    #[must_use]
    pub fn resolved_config_file(&self) -> PathBuf {
        match &self.config_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
            None => default_config_file(&self.root),
        }
    }

    /// Endpoint cascade: explicit > config file entry > default
    #[must_use]
    pub fn endpoint_resolver(&self) -> EndpointResolver {
        EndpointResolver::standard(
            self.store.clone(),
            self.resolved_config_file(),
            self.environment.clone(),
        )
    }

    /// Command timeout
    #[inline]
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Process root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            load_path: None,
            store: None,
            config_file: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            test_mode: false,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }
}

//! Error types for experiments and stores
//!
//! - [`StoreError`]: backend failures (connectivity, timeouts, protocol)
//! - [`ExperimentError`]: invalid definitions and lookups within an experiment

/// Errors raised by a [`Store`](crate::Store) backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection to the backing store failed
    #[error("cannot reach store at {endpoint}: {source}")]
    Connectivity {
        /// Endpoint that was contacted
        endpoint: String,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Store did not answer in time
    #[error("store at {endpoint} did not respond within {after_ms}ms")]
    Timeout {
        /// Endpoint that was contacted
        endpoint: String,
        /// Elapsed budget in milliseconds
        after_ms: u64,
    },

    /// Malformed reply from the store
    #[error("store protocol error: {0}")]
    Protocol(String),

    /// Store rejected the command
    #[error("store rejected command: {0}")]
    Server(String),
}

impl StoreError {
    /// Create connectivity error for endpoint
    pub fn connectivity(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connectivity {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Whether the store could not be reached at all
    #[inline]
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Timeout { .. })
    }
}

/// Errors raised while defining or operating on an experiment
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    /// Definition failed validation
    #[error("invalid experiment definition '{id}': {reason}")]
    InvalidDefinition {
        /// Experiment id as given
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Alternative does not belong to the experiment
    #[error("experiment '{experiment}' has no alternative {alternative}")]
    UnknownAlternative {
        /// Experiment id
        experiment: String,
        /// Alternative as given
        alternative: String,
    },

    /// Metric is not tracked by the experiment
    #[error("experiment '{experiment}' does not track metric '{metric}'")]
    UnknownMetric {
        /// Experiment id
        experiment: String,
        /// Metric id as given
        metric: String,
    },

    /// Backing store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExperimentError {
    /// Create invalid definition error
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

//! Error types for the playground

use vanity_config::ConfigError;
use vanity_experiment::{ExperimentError, StoreError};

/// Main playground error type
#[derive(Debug, thiserror::Error)]
pub enum VanityError {
    /// No experiment registered under this name
    #[error("experiment '{0}' not found")]
    NotFound(String),

    /// No metric registered under this name
    #[error("metric '{0}' not found")]
    MetricNotFound(String),

    /// Definition or experiment operation failed
    #[error(transparent)]
    Experiment(#[from] ExperimentError),

    /// Backing store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be read
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Process-wide playground requested before installation
    #[error("no playground installed")]
    NotInstalled,
}

impl VanityError {
    /// Whether a lookup by name failed
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::MetricNotFound(_))
    }

    /// Whether retrying later may succeed
    ///
    /// Only store connectivity failures qualify.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) | Self::Experiment(ExperimentError::Store(e)) => e.is_connectivity(),
            _ => false,
        }
    }

    /// Underlying store error, if any
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) | Self::Experiment(ExperimentError::Store(e)) => Some(e),
            _ => None,
        }
    }
}

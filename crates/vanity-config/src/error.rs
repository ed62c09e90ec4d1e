//! Configuration errors

use std::path::PathBuf;

/// Errors while reading configuration
///
/// Absent files and absent environment entries are not errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Endpoint string could not be parsed
    #[error("invalid store endpoint '{input}': {reason}")]
    InvalidEndpoint {
        /// Input as given
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// File exists but could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File or directory
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// File is not valid YAML for its purpose
    #[error("invalid yaml in {path}: {source}")]
    Yaml {
        /// Offending file
        path: PathBuf,
        /// Parser failure
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML parsed but the content is unusable
    #[error("invalid definition in {path}: {message}")]
    InvalidDefinition {
        /// Offending file
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },
}

impl ConfigError {
    /// Create invalid endpoint error
    pub fn invalid_endpoint(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

//! YAML experiment and metric definitions
//!
//! Layout under the load path:
//!
//! ```text
//! experiments/
//! ├── pie_or_cake.yml      # one ExperimentDefinition per file
//! └── metrics/
//!     └── sugar_high.yml   # one MetricDefinition per file
//! ```
//!
//! A file without an `id` takes its file stem as id.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::io::ErrorKind;
use std::path::Path;
use vanity_experiment::{ExperimentDefinition, MetricDefinition};

/// Subdirectory of the load path holding metric definitions
pub const METRICS_DIR: &str = "metrics";

/// Everything read from a load path
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    /// Experiment definitions, ordered by file name
    pub experiments: Vec<ExperimentDefinition>,
    /// Metric definitions, ordered by file name
    pub metrics: Vec<MetricDefinition>,
}

impl DefinitionSet {
    /// Whether nothing was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.metrics.is_empty()
    }
}

/// Read all definitions under `load_path`
///
/// A missing directory yields an empty set.
///
/// # Errors
/// - `ConfigError::Io` if a directory or file cannot be read
/// - `ConfigError::Yaml` if a file is not a valid definition
pub async fn load_definitions(load_path: &Path) -> Result<DefinitionSet, ConfigError> {
    let experiments = load_dir::<ExperimentDefinition>(load_path).await?;
    let metrics = load_dir::<MetricDefinition>(&load_path.join(METRICS_DIR)).await?;
    tracing::info!(
        "Loaded {} experiments and {} metrics from {}",
        experiments.len(),
        metrics.len(),
        load_path.display()
    );
    Ok(DefinitionSet {
        experiments,
        metrics,
    })
}

async fn load_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, ConfigError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::io_error(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConfigError::io_error(dir, e))?
    {
        let path = entry.path();
        if is_yaml(&path) {
            files.push(path);
        }
    }
    files.sort();

    let mut definitions = Vec::with_capacity(files.len());
    for path in files {
        definitions.push(parse_file(&path).await?);
    }
    Ok(definitions)
}

async fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::io_error(path, e))?;

    let mut document: Value = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Mapping(map) = &mut document else {
        return Err(ConfigError::InvalidDefinition {
            path: path.to_path_buf(),
            message: "expected a mapping".to_string(),
        });
    };
    let id_key = Value::String("id".to_string());
    if !map.contains_key(&id_key) {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            map.insert(id_key, Value::String(stem.to_string()));
        }
    }

    serde_yaml::from_value(document).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn is_yaml(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml" | "yaml")
        )
}

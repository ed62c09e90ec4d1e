//! Metric definitions

use serde::{Deserialize, Serialize};

/// A named conversion metric experiments can track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique key
    pub id: String,
    /// Display name (derived from the id when absent)
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

impl MetricDefinition {
    /// Create metric with id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
        }
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Display name, falling back to a title derived from the id
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| crate::experiment::titleize(&self.id))
    }
}

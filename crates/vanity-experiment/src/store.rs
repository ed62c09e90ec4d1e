//! Pluggable assignment and metric storage
//!
//! The engine never touches a backend directly: every assignment, participant
//! set and conversion counter goes through [`Store`]. Backends must make
//! [`Store::assign_if_absent`] atomic so two concurrent first visits cannot
//! end up on different alternatives.

use crate::error::StoreError;
use crate::identity::Identity;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// Backend family, observable for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// In-process test double
    Memory,
    /// Networked Redis server
    Redis,
}

impl StoreKind {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an insert-if-absent assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Alternative index now stored for the visitor
    pub alternative: usize,
    /// Whether this call created the assignment
    pub created: bool,
}

/// Raw per-alternative counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeCounts {
    /// Alternative index
    pub alternative: usize,
    /// Distinct visitors assigned
    pub participants: u64,
    /// Distinct visitors that converted
    pub converted: u64,
    /// Total conversions recorded
    pub conversions: u64,
}

/// Key/value backend holding assignments and metrics
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Backend family
    fn kind(&self) -> StoreKind;

    /// Human-readable location (`memory` or `host:port`)
    fn describe(&self) -> String;

    /// Stored assignment for a visitor, if any
    async fn assignment(
        &self,
        experiment: &str,
        identity: &Identity,
    ) -> Result<Option<usize>, StoreError>;

    /// Store `alternative` unless an assignment already exists
    ///
    /// Must be atomic per `(experiment, identity)`. Returns whichever index
    /// ends up stored.
    async fn assign_if_absent(
        &self,
        experiment: &str,
        identity: &Identity,
        alternative: usize,
    ) -> Result<Assignment, StoreError>;

    /// Overwrite the visitor's assignment
    async fn set_assignment(
        &self,
        experiment: &str,
        identity: &Identity,
        alternative: usize,
    ) -> Result<(), StoreError>;

    /// Add visitor to an alternative's participant set
    async fn add_participant(
        &self,
        experiment: &str,
        alternative: usize,
        identity: &Identity,
    ) -> Result<(), StoreError>;

    /// Record `count` conversions for a visitor on an alternative
    async fn add_conversion(
        &self,
        experiment: &str,
        alternative: usize,
        identity: &Identity,
        count: u64,
    ) -> Result<(), StoreError>;

    /// Counters for one alternative
    async fn alternative_counts(
        &self,
        experiment: &str,
        alternative: usize,
    ) -> Result<AlternativeCounts, StoreError>;

    /// Increment a metric's counter for a day
    async fn track_metric(&self, metric: &str, date: NaiveDate, count: u64)
        -> Result<(), StoreError>;

    /// Metric total for a day
    async fn metric_total(&self, metric: &str, date: NaiveDate) -> Result<u64, StoreError>;

    /// Remove every assignment and counter of an experiment
    async fn destroy_experiment(&self, experiment: &str) -> Result<(), StoreError>;

    /// Remove everything this store holds
    async fn flush(&self) -> Result<(), StoreError>;
}

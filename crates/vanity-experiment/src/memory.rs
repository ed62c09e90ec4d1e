//! In-memory store used in test mode
//!
//! Concurrent maps from `dashmap`; the entry API gives atomic
//! insert-if-absent per key.

use crate::error::StoreError;
use crate::identity::Identity;
use crate::store::{AlternativeCounts, Assignment, Store, StoreKind};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

type AlternativeKey = (String, usize);

/// Deterministic in-process [`Store`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    assignments: DashMap<(String, Identity), usize>,
    participants: DashMap<AlternativeKey, HashSet<Identity>>,
    converted: DashMap<AlternativeKey, HashSet<Identity>>,
    conversions: DashMap<AlternativeKey, u64>,
    metrics: DashMap<(String, NaiveDate), u64>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assignments across all experiments
    #[inline]
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn assignment(
        &self,
        experiment: &str,
        identity: &Identity,
    ) -> Result<Option<usize>, StoreError> {
        Ok(self
            .assignments
            .get(&(experiment.to_string(), identity.clone()))
            .map(|entry| *entry.value()))
    }

    async fn assign_if_absent(
        &self,
        experiment: &str,
        identity: &Identity,
        alternative: usize,
    ) -> Result<Assignment, StoreError> {
        let assignment = match self
            .assignments
            .entry((experiment.to_string(), identity.clone()))
        {
            Entry::Occupied(existing) => Assignment {
                alternative: *existing.get(),
                created: false,
            },
            Entry::Vacant(slot) => {
                slot.insert(alternative);
                Assignment {
                    alternative,
                    created: true,
                }
            }
        };
        Ok(assignment)
    }

    async fn set_assignment(
        &self,
        experiment: &str,
        identity: &Identity,
        alternative: usize,
    ) -> Result<(), StoreError> {
        self.assignments
            .insert((experiment.to_string(), identity.clone()), alternative);
        Ok(())
    }

    async fn add_participant(
        &self,
        experiment: &str,
        alternative: usize,
        identity: &Identity,
    ) -> Result<(), StoreError> {
        self.participants
            .entry((experiment.to_string(), alternative))
            .or_default()
            .insert(identity.clone());
        Ok(())
    }

    async fn add_conversion(
        &self,
        experiment: &str,
        alternative: usize,
        identity: &Identity,
        count: u64,
    ) -> Result<(), StoreError> {
        let key = (experiment.to_string(), alternative);
        self.converted
            .entry(key.clone())
            .or_default()
            .insert(identity.clone());
        *self.conversions.entry(key).or_default() += count;
        Ok(())
    }

    async fn alternative_counts(
        &self,
        experiment: &str,
        alternative: usize,
    ) -> Result<AlternativeCounts, StoreError> {
        let key = (experiment.to_string(), alternative);
        Ok(AlternativeCounts {
            alternative,
            participants: self.participants.get(&key).map_or(0, |s| s.len() as u64),
            converted: self.converted.get(&key).map_or(0, |s| s.len() as u64),
            conversions: self.conversions.get(&key).map_or(0, |c| *c),
        })
    }

    async fn track_metric(
        &self,
        metric: &str,
        date: NaiveDate,
        count: u64,
    ) -> Result<(), StoreError> {
        *self.metrics.entry((metric.to_string(), date)).or_default() += count;
        Ok(())
    }

    async fn metric_total(&self, metric: &str, date: NaiveDate) -> Result<u64, StoreError> {
        Ok(self
            .metrics
            .get(&(metric.to_string(), date))
            .map_or(0, |total| *total))
    }

    async fn destroy_experiment(&self, experiment: &str) -> Result<(), StoreError> {
        self.assignments.retain(|(id, _), _| id != experiment);
        self.participants.retain(|(id, _), _| id != experiment);
        self.converted.retain(|(id, _), _| id != experiment);
        self.conversions.retain(|(id, _), _| id != experiment);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.assignments.clear();
        self.participants.clear();
        self.converted.clear();
        self.conversions.clear();
        self.metrics.clear();
        Ok(())
    }
}

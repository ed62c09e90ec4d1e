//! Experiment bound to a playground's active store

use crate::error::VanityError;
use crate::playground::Playground;
use std::sync::Arc;
use vanity_experiment::{Alternative, AlternativeCounts, Choice, Experiment, Identity};

/// Registered experiment plus the playground it belongs to
///
/// Every operation looks the store up again, so switching the playground to
/// the test store is observed by handles obtained earlier.
#[derive(Debug, Clone)]
pub struct ExperimentHandle {
    experiment: Arc<Experiment>,
    playground: Playground,
}

impl ExperimentHandle {
    pub(crate) fn new(experiment: Arc<Experiment>, playground: Playground) -> Self {
        Self {
            experiment,
            playground,
        }
    }

    /// Underlying definition
    #[inline]
    #[must_use]
    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Unique key
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        self.experiment.id()
    }

    /// Alternatives in order, control first
    #[inline]
    #[must_use]
    pub fn alternatives(&self) -> &[Alternative] {
        self.experiment.alternatives()
    }

    /// Alternative for the visitor, assigning one on first exposure
    ///
    /// # Errors
    /// `VanityError::Store` if the store cannot be reached.
    pub async fn choose(&self, identity: &Identity) -> Result<Choice, VanityError> {
        let store = self.playground.store()?;
        Ok(self.experiment.choose(store.as_ref(), identity).await?)
    }

    /// Whether the visitor is assigned to `alternative`
    ///
    /// # Errors
    /// `VanityError::Store` if the store cannot be reached.
    pub async fn showing(
        &self,
        identity: &Identity,
        alternative: &Alternative,
    ) -> Result<bool, VanityError> {
        let store = self.playground.store()?;
        Ok(self
            .experiment
            .showing(store.as_ref(), identity, alternative)
            .await?)
    }

    /// Force the visitor onto `alternative`
    ///
    /// # Errors
    /// `VanityError::Experiment` for a foreign alternative or store failure.
    pub async fn chooses(
        &self,
        identity: &Identity,
        alternative: &Alternative,
    ) -> Result<(), VanityError> {
        let store = self.playground.store()?;
        self.experiment
            .chooses(store.as_ref(), identity, alternative)
            .await?;
        Ok(())
    }

    /// Apply a fingerprint override; unknown tokens are ignored
    ///
    /// # Errors
    /// `VanityError::Store` if the store cannot be reached.
    pub async fn force_fingerprint(
        &self,
        identity: &Identity,
        token: &str,
    ) -> Result<Option<Alternative>, VanityError> {
        let store = self.playground.store()?;
        Ok(self
            .experiment
            .force_fingerprint(store.as_ref(), identity, token)
            .await?
            .cloned())
    }

    /// Record a conversion against the visitor's assignment
    ///
    /// Returns `false` when the visitor has no assignment yet.
    ///
    /// # Errors
    /// `VanityError::Experiment` if the metric is not tracked or the store
    /// fails.
    pub async fn record_metric(
        &self,
        identity: &Identity,
        metric: &str,
        count: u64,
    ) -> Result<bool, VanityError> {
        let store = self.playground.store()?;
        Ok(self
            .experiment
            .record_metric(store.as_ref(), identity, metric, count)
            .await?)
    }

    /// Raw per-alternative counters
    ///
    /// # Errors
    /// `VanityError::Store` if the store cannot be reached.
    pub async fn alternative_counts(&self) -> Result<Vec<AlternativeCounts>, VanityError> {
        let store = self.playground.store()?;
        Ok(self.experiment.counts(store.as_ref()).await?)
    }

    /// Drop every assignment and counter recorded for this experiment
    ///
    /// # Errors
    /// `VanityError::Store` if the store cannot be reached.
    pub async fn destroy(&self) -> Result<(), VanityError> {
        let store = self.playground.store()?;
        store.destroy_experiment(self.id()).await?;
        tracing::info!("Destroyed recorded data of experiment {}", self.id());
        Ok(())
    }
}

//! A/B test definitions and the assignment engine
//!
//! An [`Experiment`] is validated once from an [`ExperimentDefinition`] and is
//! immutable afterwards. All mutable state (assignments, participants,
//! conversions) lives in the [`Store`] passed to each operation.

use crate::alternative::Alternative;
use crate::error::{ExperimentError, StoreError};
use crate::hash;
use crate::identity::Identity;
use crate::store::{AlternativeCounts, Store};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative experiment definition, as registered in code or loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    /// Unique key
    pub id: String,
    /// Display name (derived from the id when absent)
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered candidate values; the first is the control
    #[serde(default = "default_alternatives")]
    pub alternatives: Vec<Value>,
    /// Metric ids this experiment converts on
    #[serde(default)]
    pub metrics: Vec<String>,
}

fn default_alternatives() -> Vec<Value> {
    vec![Value::Bool(false), Value::Bool(true)]
}

impl ExperimentDefinition {
    /// Create definition with the default `[false, true]` alternatives
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            alternatives: default_alternatives(),
            metrics: Vec::new(),
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

    /// With alternatives
    #[must_use]
    pub fn with_alternatives<I, V>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    /// With tracked metrics
    #[must_use]
    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of [`Experiment::choose`]
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    alternative: Alternative,
    fresh: bool,
}

impl Choice {
    /// Alternative the visitor sees
    #[inline]
    #[must_use]
    pub fn alternative(&self) -> &Alternative {
        &self.alternative
    }

    /// Index of the alternative
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.alternative.index()
    }

    /// Value of the alternative
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        self.alternative.value()
    }

    /// Whether this call created the assignment
    ///
    /// `false` means the visitor was already decided, either by an earlier
    /// `choose` or by a forced override.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Consume into the alternative
    #[inline]
    #[must_use]
    pub fn into_alternative(self) -> Alternative {
        self.alternative
    }
}

/// Validated, immutable A/B test
#[derive(Debug, Clone)]
pub struct Experiment {
    id: String,
    name: String,
    description: Option<String>,
    alternatives: Vec<Alternative>,
    fingerprints: Vec<String>,
    metrics: Vec<String>,
}

impl Experiment {
    /// Validate a definition
    ///
    /// # Errors
    /// `ExperimentError::InvalidDefinition` if the id is empty or contains
    /// whitespace or `:`, if fewer than two alternatives are given, or if two
    /// alternatives share a value.
    pub fn from_definition(definition: ExperimentDefinition) -> Result<Self, ExperimentError> {
        let ExperimentDefinition {
            id,
            name,
            description,
            alternatives,
            metrics,
        } = definition;

        if id.is_empty() {
            return Err(ExperimentError::invalid(id, "id must not be empty"));
        }
        if id.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(ExperimentError::invalid(
                id,
                "id must not contain whitespace or ':'",
            ));
        }
        if alternatives.len() < 2 {
            return Err(ExperimentError::invalid(
                id,
                format!("needs at least two alternatives, got {}", alternatives.len()),
            ));
        }
        for (i, value) in alternatives.iter().enumerate() {
            if alternatives[..i].contains(value) {
                return Err(ExperimentError::invalid(
                    id,
                    format!("duplicate alternative {value}"),
                ));
            }
        }

        let fingerprints = (0..alternatives.len())
            .map(|index| hash::fingerprint(&id, index))
            .collect();
        let alternatives = alternatives
            .into_iter()
            .enumerate()
            .map(|(index, value)| Alternative::new(index, value))
            .collect();

        Ok(Self {
            name: name.unwrap_or_else(|| titleize(&id)),
            id,
            description,
            alternatives,
            fingerprints,
            metrics,
        })
    }

    /// Unique key
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, if any
    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Ordered alternatives; the first is the control
    #[inline]
    #[must_use]
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Control alternative
    #[inline]
    #[must_use]
    pub fn control(&self) -> &Alternative {
        &self.alternatives[0]
    }

    /// Alternative at index
    #[inline]
    #[must_use]
    pub fn alternative(&self, index: usize) -> Option<&Alternative> {
        self.alternatives.get(index)
    }

    /// Alternative carrying a value
    #[must_use]
    pub fn find_alternative(&self, value: &Value) -> Option<&Alternative> {
        self.alternatives.iter().find(|alt| alt.value() == value)
    }

    /// Metric ids tracked by this experiment
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Whether this experiment converts on `metric`
    #[inline]
    #[must_use]
    pub fn tracks(&self, metric: &str) -> bool {
        self.metrics.iter().any(|m| m == metric)
    }

    /// Hash-derived alternative index for a visitor, ignoring the store
    #[inline]
    #[must_use]
    pub fn alternative_for(&self, identity: &Identity) -> usize {
        hash::bucket(&self.id, identity, self.alternatives.len())
    }

    /// Override fingerprint for an alternative
    ///
    /// Returns an empty string for an alternative from another experiment.
    #[must_use]
    pub fn fingerprint(&self, alternative: &Alternative) -> &str {
        self.fingerprints
            .get(alternative.index())
            .map_or("", String::as_str)
    }

    /// Alternative a fingerprint token points at
    #[must_use]
    pub fn alternative_for_fingerprint(&self, token: &str) -> Option<&Alternative> {
        self.fingerprints
            .iter()
            .position(|fp| fp == token)
            .and_then(|index| self.alternatives.get(index))
    }

    /// Alternative for a visitor, assigning one on first exposure
    ///
    /// A stored assignment always wins over the hash. The first assignment is
    /// an atomic insert-if-absent and adds the visitor to the alternative's
    /// participants.
    ///
    /// # Errors
    /// `StoreError` if the store cannot be reached; no alternative is
    /// guessed in that case.
    pub async fn choose(&self, store: &dyn Store, identity: &Identity) -> Result<Choice, StoreError> {
        let proposed = self.alternative_for(identity);
        let assignment = store.assign_if_absent(&self.id, identity, proposed).await?;

        let alternative = match self.alternatives.get(assignment.alternative) {
            Some(alternative) => alternative,
            None => {
                tracing::warn!(
                    "Stored alternative {} out of range for experiment {}, reassigning",
                    assignment.alternative,
                    self.id
                );
                store.set_assignment(&self.id, identity, proposed).await?;
                store.add_participant(&self.id, proposed, identity).await?;
                return Ok(Choice {
                    alternative: self.alternatives[proposed].clone(),
                    fresh: true,
                });
            }
        };

        if assignment.created {
            tracing::debug!(
                "Assigned {} to alternative {} of {}",
                identity,
                alternative.index(),
                self.id
            );
            store
                .add_participant(&self.id, alternative.index(), identity)
                .await?;
        }

        Ok(Choice {
            alternative: alternative.clone(),
            fresh: assignment.created,
        })
    }

    /// Whether the visitor's stored assignment is `alternative`
    ///
    /// Never assigns. A visitor without an assignment is showing nothing.
    ///
    /// # Errors
    /// `StoreError` if the store cannot be reached.
    pub async fn showing(
        &self,
        store: &dyn Store,
        identity: &Identity,
        alternative: &Alternative,
    ) -> Result<bool, StoreError> {
        let stored = store.assignment(&self.id, identity).await?;
        Ok(stored == Some(alternative.index()) && self.owns(alternative))
    }

    /// Force the visitor onto `alternative`, replacing any assignment
    ///
    /// # Errors
    /// `ExperimentError::UnknownAlternative` if the alternative is not part
    /// of this experiment, `ExperimentError::Store` on store failure.
    pub async fn chooses(
        &self,
        store: &dyn Store,
        identity: &Identity,
        alternative: &Alternative,
    ) -> Result<(), ExperimentError> {
        if !self.owns(alternative) {
            return Err(ExperimentError::UnknownAlternative {
                experiment: self.id.clone(),
                alternative: alternative.to_string(),
            });
        }
        store
            .set_assignment(&self.id, identity, alternative.index())
            .await?;
        store
            .add_participant(&self.id, alternative.index(), identity)
            .await?;
        Ok(())
    }

    /// Apply a fingerprint override for the visitor
    ///
    /// Unknown tokens are ignored and leave the assignment untouched.
    /// Returns the forced alternative when the token matched.
    ///
    /// # Errors
    /// `StoreError` if the store cannot be reached.
    pub async fn force_fingerprint(
        &self,
        store: &dyn Store,
        identity: &Identity,
        token: &str,
    ) -> Result<Option<&Alternative>, StoreError> {
        let Some(alternative) = self.alternative_for_fingerprint(token) else {
            tracing::debug!("Fingerprint {} does not match {}", token, self.id);
            return Ok(None);
        };
        store
            .set_assignment(&self.id, identity, alternative.index())
            .await?;
        store
            .add_participant(&self.id, alternative.index(), identity)
            .await?;
        tracing::debug!(
            "Forced {} onto alternative {} of {}",
            identity,
            alternative.index(),
            self.id
        );
        Ok(Some(alternative))
    }

    /// Record a conversion on `metric` against the visitor's assignment
    ///
    /// Returns `false` (and records nothing) when the visitor has no
    /// assignment yet.
    ///
    /// # Errors
    /// `ExperimentError::UnknownMetric` if the experiment does not track the
    /// metric, `ExperimentError::Store` on store failure.
    pub async fn record_metric(
        &self,
        store: &dyn Store,
        identity: &Identity,
        metric: &str,
        count: u64,
    ) -> Result<bool, ExperimentError> {
        if !self.tracks(metric) {
            return Err(ExperimentError::UnknownMetric {
                experiment: self.id.clone(),
                metric: metric.to_string(),
            });
        }
        let Some(index) = store.assignment(&self.id, identity).await? else {
            return Ok(false);
        };
        if index >= self.alternatives.len() {
            return Ok(false);
        }
        store.add_conversion(&self.id, index, identity, count).await?;
        Ok(true)
    }

    /// Raw counters for every alternative, in order
    ///
    /// # Errors
    /// `StoreError` if the store cannot be reached.
    pub async fn counts(&self, store: &dyn Store) -> Result<Vec<AlternativeCounts>, StoreError> {
        let mut counts = Vec::with_capacity(self.alternatives.len());
        for alternative in &self.alternatives {
            counts.push(store.alternative_counts(&self.id, alternative.index()).await?);
        }
        Ok(counts)
    }

    fn owns(&self, alternative: &Alternative) -> bool {
        self.alternatives.get(alternative.index()) == Some(alternative)
    }
}

/// `pie_or_cake` → `Pie or cake`
pub(crate) fn titleize(id: &str) -> String {
    let spaced = id.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;
    use serde_json::json;

    fn pie_or_cake() -> Experiment {
        Experiment::from_definition(
            ExperimentDefinition::new("pie_or_cake").with_metrics(["sugar_high"]),
        )
        .unwrap()
    }

    #[test]
    fn default_alternatives_are_false_true() {
        let experiment = pie_or_cake();
        assert_eq!(experiment.alternatives().len(), 2);
        assert_eq!(experiment.control().value(), &json!(false));
        assert_eq!(experiment.alternatives()[1].value(), &json!(true));
        assert_eq!(experiment.name(), "Pie or cake");
    }

    #[test]
    fn rejects_invalid_definitions() {
        assert!(Experiment::from_definition(ExperimentDefinition::new("")).is_err());
        assert!(Experiment::from_definition(ExperimentDefinition::new("a b")).is_err());
        assert!(Experiment::from_definition(ExperimentDefinition::new("a:b")).is_err());
        assert!(Experiment::from_definition(
            ExperimentDefinition::new("one").with_alternatives(["only"])
        )
        .is_err());
        assert!(Experiment::from_definition(
            ExperimentDefinition::new("dup").with_alternatives(["x", "x"])
        )
        .is_err());
    }

    #[test]
    fn definition_from_yaml_shape() {
        let definition: ExperimentDefinition = serde_json::from_value(json!({
            "id": "price",
            "alternatives": [19, 25, 29],
            "metrics": ["signup"]
        }))
        .unwrap();
        let experiment = Experiment::from_definition(definition).unwrap();
        assert_eq!(experiment.alternatives().len(), 3);
        assert!(experiment.tracks("signup"));
        assert!(experiment.find_alternative(&json!(25)).is_some());
    }

    #[test]
    fn fingerprint_lookup_roundtrip() {
        let experiment = pie_or_cake();
        for alternative in experiment.alternatives() {
            let token = experiment.fingerprint(alternative).to_string();
            assert_eq!(
                experiment.alternative_for_fingerprint(&token),
                Some(alternative)
            );
        }
        assert!(experiment.alternative_for_fingerprint("567").is_none());
    }

    #[tokio::test]
    async fn choose_is_sticky_and_fresh_once() {
        let experiment = pie_or_cake();
        let store = MemoryStore::new();
        let visitor = Identity::new("visitor");

        let first = experiment.choose(&store, &visitor).await.unwrap();
        assert!(first.is_fresh());
        assert_eq!(first.index(), experiment.alternative_for(&visitor));

        for _ in 0..5 {
            let again = experiment.choose(&store, &visitor).await.unwrap();
            assert!(!again.is_fresh());
            assert_eq!(again.alternative(), first.alternative());
        }

        let counts = experiment.counts(&store).await.unwrap();
        assert_eq!(counts.iter().map(|c| c.participants).sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn stored_assignment_wins_over_hash() {
        let experiment = pie_or_cake();
        let store = MemoryStore::new();
        let visitor = Identity::new("visitor");
        let other = 1 - experiment.alternative_for(&visitor);

        store
            .set_assignment(experiment.id(), &visitor, other)
            .await
            .unwrap();

        let choice = experiment.choose(&store, &visitor).await.unwrap();
        assert_eq!(choice.index(), other);
        assert!(!choice.is_fresh());
    }

    #[tokio::test]
    async fn showing_never_assigns() {
        let experiment = pie_or_cake();
        let store = MemoryStore::new();
        let visitor = Identity::new("visitor");

        for alternative in experiment.alternatives() {
            assert!(!experiment.showing(&store, &visitor, alternative).await.unwrap());
        }
        assert_eq!(store.assignment_count(), 0);
    }

    #[tokio::test]
    async fn force_fingerprint_assigns_and_ignores_garbage() {
        let experiment = pie_or_cake();
        let store = MemoryStore::new();
        let visitor = Identity::new("visitor");
        let control = experiment.control().clone();

        let ignored = experiment
            .force_fingerprint(&store, &visitor, "567")
            .await
            .unwrap();
        assert!(ignored.is_none());
        assert_eq!(store.assignment_count(), 0);

        let token = experiment.fingerprint(&control).to_string();
        let forced = experiment
            .force_fingerprint(&store, &visitor, &token)
            .await
            .unwrap();
        assert_eq!(forced, Some(&control));

        let choice = experiment.choose(&store, &visitor).await.unwrap();
        assert!(!choice.is_fresh());
        assert!(experiment.showing(&store, &visitor, &control).await.unwrap());
    }

    #[tokio::test]
    async fn chooses_rejects_foreign_alternative() {
        let experiment = pie_or_cake();
        let store = MemoryStore::new();
        let foreign = Alternative::new(5, json!("cake"));

        let err = experiment
            .chooses(&store, &Identity::new("v"), &foreign)
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentError::UnknownAlternative { .. }));
    }

    #[tokio::test]
    async fn record_metric_requires_assignment() {
        let experiment = pie_or_cake();
        let store = MemoryStore::new();
        let visitor = Identity::new("visitor");

        assert!(!experiment
            .record_metric(&store, &visitor, "sugar_high", 1)
            .await
            .unwrap());

        let choice = experiment.choose(&store, &visitor).await.unwrap();
        assert!(experiment
            .record_metric(&store, &visitor, "sugar_high", 1)
            .await
            .unwrap());

        let counts = experiment.counts(&store).await.unwrap();
        assert_eq!(counts[choice.index()].converted, 1);
        assert_eq!(counts[choice.index()].conversions, 1);

        let err = experiment
            .record_metric(&store, &visitor, "signup", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentError::UnknownMetric { .. }));
    }

    #[test]
    fn titleize_ids() {
        assert_eq!(titleize("pie_or_cake"), "Pie or cake");
        assert_eq!(titleize("checkout-flow"), "Checkout flow");
        assert_eq!(titleize(""), "");
    }

    proptest! {
        #[test]
        fn prop_choose_is_idempotent(identity in "[a-z0-9]{1,32}") {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let experiment = Experiment::from_definition(
                    ExperimentDefinition::new("color").with_alternatives(["red", "green", "blue"]),
                ).unwrap();
                let store = MemoryStore::new();
                let visitor = Identity::new(identity);
                let first = experiment.choose(&store, &visitor).await.unwrap();
                for _ in 0..3 {
                    let again = experiment.choose(&store, &visitor).await.unwrap();
                    assert_eq!(again.index(), first.index());
                }
            });
        }
    }
}

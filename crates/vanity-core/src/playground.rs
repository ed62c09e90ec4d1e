//! Experiment registry and store owner
//!
//! A [`Playground`] is a cheap handle; clones share one registry and one
//! store slot. The store is created lazily from the configuration on first
//! use and replaced whenever the store configuration changes.

use crate::config::PlaygroundConfig;
use crate::error::VanityError;
use crate::handle::ExperimentHandle;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use vanity_config::{load_definitions, ResolvedEndpoint, StoreEndpoint};
use vanity_experiment::{
    Alternative, Experiment, ExperimentDefinition, ExperimentError, Identity, MemoryStore,
    MetricDefinition, Store, StoreKind,
};
use vanity_redis::RedisStore;

#[derive(Debug)]
struct Inner {
    config: RwLock<PlaygroundConfig>,
    experiments: DashMap<String, Arc<Experiment>>,
    metrics: DashMap<String, MetricDefinition>,
    store: RwLock<Option<Arc<dyn Store>>>,
}

/// Registry of experiments and metrics plus the active store
#[derive(Debug, Clone)]
pub struct Playground {
    inner: Arc<Inner>,
}

impl Playground {
    /// Create playground from configuration
    #[must_use]
    pub fn new(config: PlaygroundConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                experiments: DashMap::new(),
                metrics: DashMap::new(),
                store: RwLock::new(None),
            }),
        }
    }

    /// Create playground from `VANITY_*` environment variables
    ///
    /// # Errors
    /// `VanityError::Config` if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, VanityError> {
        Ok(Self::new(PlaygroundConfig::from_env()?))
    }

    /// Snapshot of the current configuration
    #[must_use]
    pub fn config(&self) -> PlaygroundConfig {
        self.inner.config.read().clone()
    }

    /// Set the experiments directory
    ///
    /// Relative paths resolve against the process root.
    pub fn configure(&self, load_path: impl Into<PathBuf>) {
        let load_path = load_path.into();
        tracing::info!("Experiment load path set to {}", load_path.display());
        self.inner.config.write().load_path = Some(load_path);
    }

    /// Experiments directory after resolution
    #[must_use]
    pub fn load_path(&self) -> PathBuf {
        self.inner.config.read().resolved_load_path()
    }

    /// Set the store endpoint from a connection string
    ///
    /// Leaves test mode and drops the current store; the next store access
    /// connects to the new endpoint.
    ///
    /// # Errors
    /// `VanityError::Config` if the string is not an endpoint.
    pub fn configure_store(&self, endpoint: &str) -> Result<(), VanityError> {
        self.configure_store_endpoint(endpoint.parse()?);
        Ok(())
    }

    /// Set the store endpoint
    pub fn configure_store_endpoint(&self, endpoint: StoreEndpoint) {
        tracing::info!("Store endpoint set to {}", endpoint);
        {
            let mut config = self.inner.config.write();
            config.store = Some(endpoint);
            config.test_mode = false;
        }
        *self.inner.store.write() = None;
    }

    /// Switch to a fresh in-memory store
    pub fn use_test_store(&self) {
        self.inner.config.write().test_mode = true;
        *self.inner.store.write() = Some(Arc::new(MemoryStore::new()));
        tracing::info!("Using in-memory test store");
    }

    /// Replace the active store with a caller-supplied backend
    ///
    /// The store stays in place until the store configuration changes.
    pub fn use_store(&self, store: Arc<dyn Store>) {
        tracing::info!("Using {} store at {}", store.kind(), store.describe());
        *self.inner.store.write() = Some(store);
    }

    /// Whether the in-memory store is selected
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        self.inner.config.read().test_mode
    }

    /// Endpoint the networked store uses, with its origin
    ///
    /// # Errors
    /// `VanityError::Config` if the endpoint file exists but is malformed.
    pub fn store_endpoint(&self) -> Result<ResolvedEndpoint, VanityError> {
        let resolver = self.inner.config.read().endpoint_resolver();
        Ok(resolver.resolve()?)
    }

    /// Active store, created on first use
    ///
    /// No connection is made here; the networked store connects on its
    /// first command.
    ///
    /// # Errors
    /// `VanityError::Config` if the endpoint cannot be resolved.
    pub fn store(&self) -> Result<Arc<dyn Store>, VanityError> {
        if let Some(store) = self.inner.store.read().as_ref() {
            return Ok(Arc::clone(store));
        }

        let mut slot = self.inner.store.write();
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }

        let config = self.inner.config.read().clone();
        let store: Arc<dyn Store> = if config.test_mode {
            Arc::new(MemoryStore::new())
        } else {
            let resolved = config.endpoint_resolver().resolve()?;
            tracing::info!(
                "Using redis store at {} ({:?})",
                resolved.endpoint,
                resolved.origin
            );
            Arc::new(RedisStore::with_options(
                resolved.endpoint,
                config.namespace.clone(),
                config.command_timeout(),
            ))
        };
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Kind of the active store
    ///
    /// # Errors
    /// As [`store`](Self::store).
    pub fn store_kind(&self) -> Result<StoreKind, VanityError> {
        Ok(self.store()?.kind())
    }

    /// Register or replace a metric
    pub fn register_metric(&self, metric: MetricDefinition) {
        tracing::info!("Registered metric {}", metric.id);
        self.inner.metrics.insert(metric.id.clone(), metric);
    }

    /// Registered metric by id
    #[must_use]
    pub fn metric(&self, id: &str) -> Option<MetricDefinition> {
        self.inner.metrics.get(id).map(|entry| entry.value().clone())
    }

    /// All registered metrics, ordered by id
    #[must_use]
    pub fn metrics(&self) -> Vec<MetricDefinition> {
        let mut metrics: Vec<_> = self
            .inner
            .metrics
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Register an experiment, replacing one with the same id
    ///
    /// # Errors
    /// - `ExperimentError::InvalidDefinition` if the definition is invalid
    /// - `ExperimentError::UnknownMetric` if it names an unregistered metric
    pub fn register_experiment(
        &self,
        definition: ExperimentDefinition,
    ) -> Result<ExperimentHandle, VanityError> {
        let experiment = Experiment::from_definition(definition)?;
        if let Some(metric) = experiment
            .metrics()
            .iter()
            .find(|metric| !self.inner.metrics.contains_key(metric.as_str()))
        {
            return Err(ExperimentError::UnknownMetric {
                experiment: experiment.id().to_string(),
                metric: metric.clone(),
            }
            .into());
        }

        let experiment = Arc::new(experiment);
        let replaced = self
            .inner
            .experiments
            .insert(experiment.id().to_string(), Arc::clone(&experiment))
            .is_some();
        if replaced {
            tracing::info!("Replaced experiment {}", experiment.id());
        } else {
            tracing::info!(
                "Registered experiment {} with {} alternatives",
                experiment.id(),
                experiment.alternatives().len()
            );
        }
        Ok(ExperimentHandle::new(experiment, self.clone()))
    }

    /// Registered experiment by id
    ///
    /// # Errors
    /// `VanityError::NotFound` if nothing is registered under `id`.
    pub fn experiment(&self, id: &str) -> Result<ExperimentHandle, VanityError> {
        self.inner
            .experiments
            .get(id)
            .map(|entry| ExperimentHandle::new(Arc::clone(entry.value()), self.clone()))
            .ok_or_else(|| VanityError::NotFound(id.to_string()))
    }

    /// All registered experiments, ordered by id
    #[must_use]
    pub fn experiments(&self) -> Vec<ExperimentHandle> {
        let mut experiments: Vec<_> = self
            .inner
            .experiments
            .iter()
            .map(|entry| ExperimentHandle::new(Arc::clone(entry.value()), self.clone()))
            .collect();
        experiments.sort_by(|a, b| a.id().cmp(b.id()));
        experiments
    }

    /// Register every definition found under the load path
    ///
    /// Metrics are registered before experiments. Returns the number of
    /// experiments registered.
    ///
    /// # Errors
    /// `VanityError::Config` for unreadable files, `VanityError::Experiment`
    /// for invalid definitions.
    pub async fn load_experiments(&self) -> Result<usize, VanityError> {
        let definitions = load_definitions(&self.load_path()).await?;
        for metric in definitions.metrics {
            self.register_metric(metric);
        }
        let count = definitions.experiments.len();
        for definition in definitions.experiments {
            self.register_experiment(definition)?;
        }
        Ok(count)
    }

    /// Apply a `_vanity` fingerprint token for the visitor
    ///
    /// The first experiment owning the token forces the matching
    /// alternative. Unknown tokens return `None` and change nothing.
    ///
    /// # Errors
    /// `VanityError::Store` if the store cannot be reached.
    pub async fn force_fingerprint(
        &self,
        identity: &Identity,
        token: &str,
    ) -> Result<Option<(ExperimentHandle, Alternative)>, VanityError> {
        for handle in self.experiments() {
            if handle.experiment().alternative_for_fingerprint(token).is_none() {
                continue;
            }
            if let Some(alternative) = handle.force_fingerprint(identity, token).await? {
                return Ok(Some((handle, alternative)));
            }
        }
        tracing::debug!("Ignoring unknown fingerprint {}", token);
        Ok(None)
    }

    /// Count `count` occurrences of a metric for the visitor
    ///
    /// Records a conversion on every experiment tracking the metric where the
    /// visitor is assigned, then adds to today's metric total. Writes are not
    /// transactional: a store failure stops at the failing write and leaves
    /// earlier conversions in place, and the daily total is only touched once
    /// every conversion has been recorded.
    ///
    /// # Errors
    /// `VanityError::MetricNotFound` for an unregistered metric,
    /// `VanityError::Store` on store failure.
    pub async fn track(
        &self,
        metric: &str,
        identity: &Identity,
        count: u64,
    ) -> Result<(), VanityError> {
        if !self.inner.metrics.contains_key(metric) {
            return Err(VanityError::MetricNotFound(metric.to_string()));
        }
        for handle in self.experiments() {
            if handle.experiment().tracks(metric) {
                handle.record_metric(identity, metric, count).await?;
            }
        }
        self.store()?
            .track_metric(metric, Utc::now().date_naive(), count)
            .await?;
        tracing::debug!("Tracked {} x{} for {}", metric, count, identity);
        Ok(())
    }

    /// Daily totals of a metric over `from..=to`
    ///
    /// # Errors
    /// `VanityError::MetricNotFound` for an unregistered metric,
    /// `VanityError::Store` on store failure.
    pub async fn metric_values(
        &self,
        metric: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, u64)>, VanityError> {
        if !self.inner.metrics.contains_key(metric) {
            return Err(VanityError::MetricNotFound(metric.to_string()));
        }
        let store = self.store()?;
        let mut values = Vec::new();
        for day in from.iter_days().take_while(|day| *day <= to) {
            values.push((day, store.metric_total(metric, day).await?));
        }
        Ok(values)
    }

    /// Forget every experiment and metric and flush the active store
    ///
    /// A store that was never created is left alone.
    ///
    /// # Errors
    /// `VanityError::Store` if the flush fails.
    pub async fn reset(&self) -> Result<(), VanityError> {
        self.inner.experiments.clear();
        self.inner.metrics.clear();
        let store = self.inner.store.read().clone();
        if let Some(store) = store {
            store.flush().await?;
        }
        tracing::info!("Playground reset");
        Ok(())
    }
}

impl Default for Playground {
    fn default() -> Self {
        Self::new(PlaygroundConfig::default())
    }
}

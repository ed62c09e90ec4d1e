//! Redis implementation of the assignment store

use crate::client::RedisClient;
use crate::resp::RespValue;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use vanity_config::StoreEndpoint;
use vanity_experiment::{AlternativeCounts, Assignment, Identity, Store, StoreError, StoreKind};

/// Default key prefix
pub const DEFAULT_NAMESPACE: &str = "vanity";

/// Attempts at insert-if-absent before giving up on a vanishing key
const ASSIGN_ATTEMPTS: usize = 3;

/// `SCAN` page size hint, also the number of keys per `DEL`
const SCAN_BATCH: usize = 100;

/// Per-experiment key families
const EXPERIMENT_FIELDS: [&str; 2] = ["participant", "alts"];

/// [`Store`] backed by a Redis server
///
/// First assignments use `SET key value NX`, so concurrent first visits from
/// several workers settle on a single alternative. Bulk deletes walk the
/// keyspace with `SCAN` rather than `KEYS`.
#[derive(Debug)]
pub struct RedisStore {
    client: RedisClient,
    namespace: String,
}

impl RedisStore {
    /// Create store for endpoint with the default namespace and timeout
    #[inline]
    #[must_use]
    pub fn new(endpoint: StoreEndpoint) -> Self {
        Self::from_client(RedisClient::new(endpoint), DEFAULT_NAMESPACE)
    }

    /// Create store with explicit namespace and timeout
    #[inline]
    #[must_use]
    pub fn with_options(
        endpoint: StoreEndpoint,
        namespace: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::from_client(RedisClient::with_timeout(endpoint, timeout), namespace)
    }

    /// Wrap an existing client
    #[inline]
    #[must_use]
    pub fn from_client(client: RedisClient, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Endpoint in use
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &StoreEndpoint {
        self.client.endpoint()
    }

    /// Key prefix in use
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn assignment_key(&self, experiment: &str, identity: &Identity) -> String {
        format!("{}:{experiment}:participant:{identity}:show", self.namespace)
    }

    fn alternative_key(&self, experiment: &str, alternative: usize, field: &str) -> String {
        format!("{}:{experiment}:alts:{alternative}:{field}", self.namespace)
    }

    fn metric_key(&self, metric: &str, date: NaiveDate) -> String {
        format!("{}:metrics:{metric}:{}:value", self.namespace, date.format("%Y-%m-%d"))
    }

    /// Keys matching a glob, walked with a `SCAN` cursor
    async fn matching_keys(&self, pattern: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let count = SCAN_BATCH.to_string();
        let mut keys = Vec::new();
        let mut cursor = b"0".to_vec();
        loop {
            let reply = self
                .client
                .cmd(&[
                    b"SCAN",
                    cursor.as_slice(),
                    b"MATCH",
                    pattern.as_bytes(),
                    b"COUNT",
                    count.as_bytes(),
                ])
                .await?;
            let RespValue::Array(Some(parts)) = &reply else {
                return Err(StoreError::Protocol(format!("unexpected reply to SCAN: {reply:?}")));
            };
            let [next, RespValue::Array(Some(batch))] = parts.as_slice() else {
                return Err(StoreError::Protocol(format!("unexpected reply to SCAN: {reply:?}")));
            };
            let Some(next) = next.as_bytes() else {
                return Err(StoreError::Protocol(format!("unexpected SCAN cursor: {next:?}")));
            };
            keys.extend(
                batch
                    .iter()
                    .filter_map(|key| key.as_bytes().map(<[u8]>::to_vec)),
            );
            if next == b"0" {
                break;
            }
            cursor = next.to_vec();
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<(), StoreError> {
        let keys = self.matching_keys(pattern).await?;
        let mut deleted = 0;
        for chunk in keys.chunks(SCAN_BATCH) {
            let mut args: Vec<&[u8]> = Vec::with_capacity(chunk.len() + 1);
            args.push(b"DEL");
            args.extend(chunk.iter().map(Vec::as_slice));
            deleted += self.client.cmd_int(&args).await?;
        }
        tracing::debug!("Deleted {} keys matching {}", deleted, pattern);
        Ok(())
    }

    async fn get_u64(&self, key: &str) -> Result<u64, StoreError> {
        match self.client.cmd_bulk(&[b"GET", key.as_bytes()]).await? {
            Some(raw) => parse_number(key, &raw),
            None => Ok(0),
        }
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let count = self.client.cmd_int(&[b"SCARD", key.as_bytes()]).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl Store for RedisStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Redis
    }

    fn describe(&self) -> String {
        self.client.endpoint().server()
    }

    async fn assignment(
        &self,
        experiment: &str,
        identity: &Identity,
    ) -> Result<Option<usize>, StoreError> {
        let key = self.assignment_key(experiment, identity);
        match self.client.cmd_bulk(&[b"GET", key.as_bytes()]).await? {
            Some(raw) => Ok(Some(parse_number(&key, &raw)?)),
            None => Ok(None),
        }
    }

    async fn assign_if_absent(
        &self,
        experiment: &str,
        identity: &Identity,
        alternative: usize,
    ) -> Result<Assignment, StoreError> {
        let key = self.assignment_key(experiment, identity);
        let value = alternative.to_string();

        for _ in 0..ASSIGN_ATTEMPTS {
            let reply = self
                .client
                .cmd(&[b"SET", key.as_bytes(), value.as_bytes(), b"NX"])
                .await?;
            if reply.is_ok() {
                return Ok(Assignment {
                    alternative,
                    created: true,
                });
            }
            if !reply.is_null() {
                return Err(StoreError::Protocol(format!("unexpected reply to SET NX: {reply:?}")));
            }
            if let Some(raw) = self.client.cmd_bulk(&[b"GET", key.as_bytes()]).await? {
                return Ok(Assignment {
                    alternative: parse_number(&key, &raw)?,
                    created: false,
                });
            }
            tracing::debug!("Assignment {} vanished between SET NX and GET, retrying", key);
        }
        Err(StoreError::Protocol(format!("could not settle assignment {key}")))
    }

    async fn set_assignment(
        &self,
        experiment: &str,
        identity: &Identity,
        alternative: usize,
    ) -> Result<(), StoreError> {
        let key = self.assignment_key(experiment, identity);
        let value = alternative.to_string();
        self.client
            .cmd_ok(&[b"SET", key.as_bytes(), value.as_bytes()])
            .await
    }

    async fn add_participant(
        &self,
        experiment: &str,
        alternative: usize,
        identity: &Identity,
    ) -> Result<(), StoreError> {
        let key = self.alternative_key(experiment, alternative, "participants");
        self.client
            .cmd_int(&[b"SADD", key.as_bytes(), identity.as_str().as_bytes()])
            .await?;
        Ok(())
    }

    async fn add_conversion(
        &self,
        experiment: &str,
        alternative: usize,
        identity: &Identity,
        count: u64,
    ) -> Result<(), StoreError> {
        let converted = self.alternative_key(experiment, alternative, "converted");
        let conversions = self.alternative_key(experiment, alternative, "conversions");
        let count = count.to_string();
        self.client
            .cmd_int(&[b"SADD", converted.as_bytes(), identity.as_str().as_bytes()])
            .await?;
        self.client
            .cmd_int(&[b"INCRBY", conversions.as_bytes(), count.as_bytes()])
            .await?;
        Ok(())
    }

    async fn alternative_counts(
        &self,
        experiment: &str,
        alternative: usize,
    ) -> Result<AlternativeCounts, StoreError> {
        Ok(AlternativeCounts {
            alternative,
            participants: self
                .scard(&self.alternative_key(experiment, alternative, "participants"))
                .await?,
            converted: self
                .scard(&self.alternative_key(experiment, alternative, "converted"))
                .await?,
            conversions: self
                .get_u64(&self.alternative_key(experiment, alternative, "conversions"))
                .await?,
        })
    }

    async fn track_metric(
        &self,
        metric: &str,
        date: NaiveDate,
        count: u64,
    ) -> Result<(), StoreError> {
        let key = self.metric_key(metric, date);
        let count = count.to_string();
        self.client
            .cmd_int(&[b"INCRBY", key.as_bytes(), count.as_bytes()])
            .await?;
        Ok(())
    }

    async fn metric_total(&self, metric: &str, date: NaiveDate) -> Result<u64, StoreError> {
        self.get_u64(&self.metric_key(metric, date)).await
    }

    async fn destroy_experiment(&self, experiment: &str) -> Result<(), StoreError> {
        let prefix = format!("{}:{}", escape_glob(&self.namespace), escape_glob(experiment));
        for field in EXPERIMENT_FIELDS {
            self.delete_matching(&format!("{prefix}:{field}:*")).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let pattern = format!("{}:*", escape_glob(&self.namespace));
        self.delete_matching(&pattern).await
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &[u8]) -> Result<T, StoreError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            StoreError::Protocol(format!(
                "{key} holds non-numeric value '{}'",
                String::from_utf8_lossy(raw)
            ))
        })
}

/// Escape Redis glob metacharacters
fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

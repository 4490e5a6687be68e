//! # Bucket Store
//!
//! Durable counters keyed by `(bucket_key, window_start)`. The only
//! operation on the hot path is [`BucketStore::atomic_increment`]: a single
//! insert-or-increment that returns the post-increment count. There is no
//! read-then-write, so concurrent requests against one bucket can never
//! observe the same count.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use embedgate_core::{Clock, FixedWindow};
use sqlx::PgPool;

/// Bucket store failures. The rate limiter treats every variant as
/// "store degraded".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bucket store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("bucket store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic fixed-window counter storage.
#[async_trait]
pub trait BucketStore: Send + Sync + 'static {
    /// Create the bucket with count 1, or add 1, and return the new count.
    async fn atomic_increment(&self, bucket_key: &str, window_start: i64) -> Result<u64, StoreError>;

    /// Drop buckets whose window started before `window_start`. Returns the
    /// number removed.
    async fn prune_before(&self, window_start: i64) -> Result<u64, StoreError>;
}

/// Process-local bucket store.
///
/// `DashMap::entry` holds the shard write lock for the duration of the
/// increment, which makes it atomic per bucket.
#[derive(Debug, Default)]
pub struct InMemoryBucketStore {
    buckets: DashMap<(String, i64), u64>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for a bucket, if it exists.
    pub fn count(&self, bucket_key: &str, window_start: i64) -> Option<u64> {
        self.buckets
            .get(&(bucket_key.to_string(), window_start))
            .map(|c| *c)
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn atomic_increment(&self, bucket_key: &str, window_start: i64) -> Result<u64, StoreError> {
        let mut count = self
            .buckets
            .entry((bucket_key.to_string(), window_start))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn prune_before(&self, window_start: i64) -> Result<u64, StoreError> {
        let before = self.buckets.len();
        self.buckets.retain(|(_, start), _| *start >= window_start);
        Ok(before.saturating_sub(self.buckets.len()) as u64)
    }
}

/// Buckets in the `rate_limit_buckets` table.
#[derive(Debug, Clone)]
pub struct PgBucketStore {
    pool: PgPool,
}

impl PgBucketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BucketStore for PgBucketStore {
    async fn atomic_increment(&self, bucket_key: &str, window_start: i64) -> Result<u64, StoreError> {
        let count = crate::db::buckets::increment(&self.pool, bucket_key, window_start).await?;
        u64::try_from(count)
            .map_err(|_| StoreError::Unavailable(format!("negative bucket count {count}")))
    }

    async fn prune_before(&self, window_start: i64) -> Result<u64, StoreError> {
        Ok(crate::db::buckets::delete_before(&self.pool, window_start).await?)
    }
}

/// Remove every bucket older than the current window.
pub async fn prune_stale(
    store: &dyn BucketStore,
    window: FixedWindow,
    clock: &dyn Clock,
) -> Result<u64, StoreError> {
    let current = window.slot(clock.now_millis()).start;
    store.prune_before(current).await
}

/// Spawn the housekeeping loop that prunes stale buckets every `interval`.
pub fn spawn_pruner(
    store: Arc<dyn BucketStore>,
    window: FixedWindow,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match prune_stale(store.as_ref(), window, clock.as_ref()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "pruned stale rate-limit buckets"),
                Err(e) => tracing::warn!(error = %e, "bucket pruning failed"),
            }
        }
    })
}

//! Process-memory state backend using [`moka`].
//!
//! Entries are held as JSON strings in a `moka::future::Cache`, so the
//! store behaves exactly like the SQLite backend at the serialization
//! boundary. Everything is lost when the process exits, which is the
//! desired behavior for checkpoints of an unclean host session.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::state::{StateStore, validate_key};

// ── stats ────────────────────────────────────────────────────────────

/// Lookup counters for a [`MemoryStateStore`].
#[derive(Debug, Default)]
pub struct StoreStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StoreStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookups that found a value.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing (or a corrupt entry).
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hits={} misses={}", self.hits(), self.misses())
    }
}

// ── store ────────────────────────────────────────────────────────────

/// In-memory [`StateStore`] with bounded capacity and idle expiry.
#[derive(Clone)]
pub struct MemoryStateStore {
    inner: Cache<String, String>,
    stats: Arc<StoreStats>,
}

impl MemoryStateStore {
    /// Store with default limits (1 000 entries, 1 hour idle expiry).
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a store.
    pub fn builder() -> MemoryStateStoreBuilder {
        MemoryStateStoreBuilder {
            max_capacity: 1_000,
            time_to_idle: Duration::from_secs(3_600),
        }
    }

    /// Lookup statistics since creation.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        validate_key(key)?;
        let Some(raw) = self.inner.get(key).await else {
            self.stats.record_miss();
            debug!(key, "state miss");
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.stats.record_hit();
                Ok(Some(value))
            }
            Err(err) => {
                warn!(key, %err, "corrupt state entry, evicting");
                self.inner.invalidate(key).await;
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        validate_key(key)?;
        let raw = serde_json::to_string(&value)?;
        debug!(key, bytes = raw.len(), "state set");
        self.inner.insert(key.to_owned(), raw).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let existed = self.inner.remove(key).await.is_some();
        debug!(key, existed, "state remove");
        Ok(existed)
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`MemoryStateStore`].
pub struct MemoryStateStoreBuilder {
    max_capacity: u64,
    time_to_idle: Duration,
}

impl MemoryStateStoreBuilder {
    /// Maximum number of keys held at once.
    pub fn max_capacity(mut self, cap: u64) -> Self {
        self.max_capacity = cap;
        self
    }

    /// Evict entries that have not been read or written for `ttl`.
    pub fn time_to_idle(mut self, ttl: Duration) -> Self {
        self.time_to_idle = ttl;
        self
    }

    pub fn build(self) -> MemoryStateStore {
        let inner = Cache::builder()
            .max_capacity(self.max_capacity)
            .time_to_idle(self.time_to_idle)
            .build();

        MemoryStateStore {
            inner,
            stats: Arc::new(StoreStats::default()),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

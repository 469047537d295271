//! Persistent response cache with TTL and stale-read support.
//!
//! Entries live in the DuckDB-backed [`ResponseStore`] so they survive process
//! restarts. Storage failures never fail a fetch: reads degrade to a miss and
//! writes are dropped, both with a `warn` log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use econfeed_warehouse::{ResponseStore, StoreConfig, StoredResponse, WarehouseError};
use serde::Serialize;
use thiserror::Error;

use crate::SourceId;

/// Read mode for [`CacheStore::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRead {
    /// Only return entries still inside their TTL.
    Fresh,
    /// Return the entry regardless of age. Used as a failure fallback.
    AllowStale,
}

/// A cached response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub payload: String,
    pub stored_at_ms: i64,
    pub expired: bool,
}

/// Errors from cache maintenance operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub location: Option<PathBuf>,
    pub entries: u64,
    pub total_bytes: u64,
    pub expired_entries: u64,
    pub oldest_stored_at_ms: Option<i64>,
    pub newest_stored_at_ms: Option<i64>,
    pub default_ttl_seconds: u64,
    pub max_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub writes: u64,
    pub write_errors: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    writes: AtomicU64,
    write_errors: AtomicU64,
    evictions: AtomicU64,
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

struct CacheInner {
    store: Option<ResponseStore>,
    default_ttl: Duration,
    max_size_bytes: u64,
    counters: CacheCounters,
    clock: Clock,
}

/// Thread-safe persistent cache shared by every source client.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("location", &self.location())
            .field("default_ttl", &self.inner.default_ttl)
            .field("max_size_bytes", &self.inner.max_size_bytes)
            .finish()
    }
}

impl CacheStore {
    /// Wrap an open store.
    ///
    /// A `max_size_bytes` of zero disables size eviction.
    pub fn new(store: ResponseStore, default_ttl: Duration, max_size_bytes: u64) -> Self {
        Self::build(Some(store), default_ttl, max_size_bytes, Arc::new(system_now_ms))
    }

    /// Open (or create) the cache database at `path`.
    pub fn open(
        path: impl Into<PathBuf>,
        default_ttl: Duration,
        max_size_bytes: u64,
    ) -> Result<Self, CacheError> {
        let store = ResponseStore::open(StoreConfig {
            db_path: path.into(),
            ..StoreConfig::default()
        })?;
        Ok(Self::new(store, default_ttl, max_size_bytes))
    }

    /// A cache that never stores or returns anything.
    pub fn disabled() -> Self {
        Self::build(None, Duration::ZERO, 0, Arc::new(system_now_ms))
    }

    /// Replace the wall clock (unix milliseconds) used for TTL checks.
    pub fn with_clock(self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        let inner = &self.inner;
        Self::build(
            inner.store.clone(),
            inner.default_ttl,
            inner.max_size_bytes,
            Arc::new(clock),
        )
    }

    fn build(
        store: Option<ResponseStore>,
        default_ttl: Duration,
        max_size_bytes: u64,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                default_ttl,
                max_size_bytes,
                counters: CacheCounters::default(),
                clock,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.store.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    pub fn location(&self) -> Option<&Path> {
        self.inner.store.as_ref().map(ResponseStore::db_path)
    }

    fn now_ms(&self) -> i64 {
        (self.inner.clock)()
    }

    async fn with_store<T, F>(&self, op: F) -> Option<Result<T, CacheError>>
    where
        F: FnOnce(&ResponseStore) -> Result<T, WarehouseError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.inner.store.clone()?;
        let result = match tokio::task::spawn_blocking(move || op(&store)).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(error) => Err(CacheError::from(error)),
        };
        Some(result)
    }

    /// Look up `key`. With [`CacheRead::Fresh`] an entry older than its TTL is a miss.
    pub async fn get(&self, key: &str, mode: CacheRead) -> Option<CachedPayload> {
        let now_ms = self.now_ms();
        let lookup_key = key.to_owned();
        let row = match self.with_store(move |store| store.get(&lookup_key)).await? {
            Ok(row) => row,
            Err(error) => {
                tracing::warn!(key, error = %error, "cache read failed; treating as miss");
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let counters = &self.inner.counters;
        let Some(row) = row else {
            if mode == CacheRead::Fresh {
                counters.misses.fetch_add(1, Ordering::Relaxed);
            }
            tracing::debug!(key, "cache miss");
            return None;
        };

        let age_ms = now_ms.saturating_sub(row.stored_at_ms);
        let expired = age_ms > row.ttl_seconds.saturating_mul(1_000);

        match (mode, expired) {
            (CacheRead::Fresh, true) => {
                counters.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, age_ms, "cache entry expired");
                return None;
            }
            (CacheRead::AllowStale, true) => {
                counters.stale_hits.fetch_add(1, Ordering::Relaxed);
            }
            (_, false) => {
                counters.hits.fetch_add(1, Ordering::Relaxed);
            }
        }

        Some(CachedPayload {
            payload: row.payload,
            stored_at_ms: row.stored_at_ms,
            expired,
        })
    }

    /// Store `payload` under `key` with the default TTL.
    pub async fn set(&self, key: &str, source: SourceId, payload: &str) {
        self.set_with_ttl(key, source, payload, self.inner.default_ttl)
            .await;
    }

    /// Store `payload` under `key`, then evict oldest entries beyond the size bound.
    pub async fn set_with_ttl(&self, key: &str, source: SourceId, payload: &str, ttl: Duration) {
        let entry = StoredResponse {
            key: key.to_owned(),
            source: source.as_str().to_owned(),
            payload: payload.to_owned(),
            stored_at_ms: self.now_ms(),
            ttl_seconds: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        };
        let max_size_bytes = self.inner.max_size_bytes;

        let outcome = self
            .with_store(move |store| {
                store.upsert(&entry)?;
                if max_size_bytes == 0 {
                    return Ok(Ok(0));
                }
                Ok(store.evict_to(max_size_bytes, &entry.key))
            })
            .await;

        if let Some(outcome) = outcome {
            self.record_write(key, outcome);
        }
    }

    /// The outer result is the upsert, the inner one the eviction pass that
    /// runs after it has committed.
    fn record_write(&self, key: &str, outcome: Result<Result<u64, WarehouseError>, CacheError>) {
        let counters = &self.inner.counters;
        let evicted = match outcome {
            Ok(evicted) => {
                counters.writes.fetch_add(1, Ordering::Relaxed);
                evicted
            }
            Err(error) => {
                counters.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, error = %error, "cache write failed; entry dropped");
                return;
            }
        };

        match evicted {
            Ok(0) => {}
            Ok(evicted) => {
                counters.evictions.fetch_add(evicted, Ordering::Relaxed);
                tracing::debug!(key, evicted, "evicted oldest cache entries");
            }
            Err(error) => {
                tracing::warn!(key, error = %error, "cache eviction failed; entry kept");
            }
        }
    }

    /// Remove every entry. Returns the number removed.
    pub async fn clear(&self) -> Result<u64, CacheError> {
        self.with_store(|store| store.clear())
            .await
            .unwrap_or(Ok(0))
    }

    /// Remove entries whose TTL has elapsed. Returns the number removed.
    pub async fn clear_expired(&self) -> Result<u64, CacheError> {
        let now_ms = self.now_ms();
        self.with_store(move |store| store.clear_expired(now_ms))
            .await
            .unwrap_or(Ok(0))
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now_ms = self.now_ms();
        let counters = &self.inner.counters;
        let mut stats = CacheStats {
            enabled: self.is_enabled(),
            location: self.location().map(Path::to_path_buf),
            default_ttl_seconds: self.inner.default_ttl.as_secs(),
            max_size_bytes: self.inner.max_size_bytes,
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            stale_hits: counters.stale_hits.load(Ordering::Relaxed),
            writes: counters.writes.load(Ordering::Relaxed),
            write_errors: counters.write_errors.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        if let Some(summary) = self.with_store(move |store| store.summary(now_ms)).await {
            let summary = summary?;
            stats.entries = summary.entries;
            stats.total_bytes = summary.total_bytes;
            stats.expired_entries = summary.expired_entries;
            stats.oldest_stored_at_ms = summary.oldest_stored_at_ms;
            stats.newest_stored_at_ms = summary.newest_stored_at_ms;
        }

        Ok(stats)
    }
}

fn system_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

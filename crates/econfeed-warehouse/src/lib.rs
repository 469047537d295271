//! # Econfeed Warehouse
//!
//! DuckDB-backed persistence for raw provider responses.
//!
//! ## Overview
//!
//! The store keeps one row per cache key holding the raw response body, the
//! time it was written and the TTL it was written with. It knows nothing about
//! freshness rules: callers pass the current time in and decide what an
//! expired row means.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use econfeed_warehouse::{ResponseStore, StoreConfig, StoredResponse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ResponseStore::open(StoreConfig::default())?;
//!
//!     store.upsert(&StoredResponse {
//!         key: "fred|GDP|2020-01-01|2020-12-31".to_string(),
//!         source: "fred".to_string(),
//!         payload: r#"{"observations":[]}"#.to_string(),
//!         stored_at_ms: 1_700_000_000_000,
//!         ttl_seconds: 86_400,
//!     })?;
//!
//!     let hit = store.get("fred|GDP|2020-01-01|2020-12-31")?;
//!     assert!(hit.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `response_cache` | Raw response bodies keyed by request |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection};
use serde::Serialize;
use thiserror::Error;

pub use self::duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration for the response store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_pool_size: 4,
        }
    }
}

/// One cached response row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub key: String,
    pub source: String,
    pub payload: String,
    pub stored_at_ms: i64,
    pub ttl_seconds: i64,
}

/// Aggregate view of the `response_cache` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub entries: u64,
    pub total_bytes: u64,
    pub expired_entries: u64,
    pub oldest_stored_at_ms: Option<i64>,
    pub newest_stored_at_ms: Option<i64>,
}

/// Persistent key/value store for raw provider responses.
#[derive(Clone)]
pub struct ResponseStore {
    manager: DuckDbConnectionManager,
}

impl ResponseStore {
    /// Open a store at the default location.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(StoreConfig::default())
    }

    /// Open a store with the specified configuration.
    pub fn open(config: StoreConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let store = Self { manager };
        store.initialize()?;
        Ok(store)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Look up a row by key regardless of its age.
    pub fn get(&self, key: &str) -> Result<Option<StoredResponse>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT cache_key, source, payload, stored_at_ms, ttl_seconds \
             FROM response_cache WHERE cache_key = ?",
        )?;
        let mut rows = statement.query(params![key])?;

        match rows.next()? {
            Some(row) => Ok(Some(StoredResponse {
                key: row.get(0)?,
                source: row.get(1)?,
                payload: row.get(2)?,
                stored_at_ms: row.get(3)?,
                ttl_seconds: row.get(4)?,
            })),
            None => Ok(None),
        }
    }

    /// Insert or replace a row.
    ///
    /// The whole row is replaced inside one transaction, so a concurrent reader
    /// observes either the previous payload or the new one.
    pub fn upsert(&self, entry: &StoredResponse) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            let payload_bytes = i64::try_from(entry.payload.len()).unwrap_or(i64::MAX);
            connection.execute(
                "INSERT OR REPLACE INTO response_cache \
                 (cache_key, source, payload, payload_bytes, stored_at_ms, ttl_seconds) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    entry.key,
                    entry.source,
                    entry.payload,
                    payload_bytes,
                    entry.stored_at_ms,
                    entry.ttl_seconds
                ],
            )?;
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Delete every row. Returns the number of rows removed.
    pub fn clear(&self) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let removed = connection.execute("DELETE FROM response_cache", [])?;
        Ok(removed as u64)
    }

    /// Delete rows whose TTL has elapsed at `now_ms`.
    pub fn clear_expired(&self, now_ms: i64) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let removed = connection.execute(
            "DELETE FROM response_cache \
             WHERE CAST(? AS BIGINT) - stored_at_ms > ttl_seconds * 1000",
            params![now_ms],
        )?;
        Ok(removed as u64)
    }

    /// Sum of stored payload sizes in bytes.
    pub fn total_bytes(&self) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        total_bytes(&connection)
    }

    /// Evict the oldest-stored rows until the payload total fits in `max_bytes`.
    ///
    /// `keep_key` is never evicted, so a single row larger than the bound
    /// survives on its own. Returns the number of rows removed.
    pub fn evict_to(&self, max_bytes: u64, keep_key: &str) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<u64, WarehouseError> {
            let mut total = total_bytes(&connection)?;
            if total <= max_bytes {
                return Ok(0);
            }

            let candidates = {
                let mut statement = connection.prepare(
                    "SELECT cache_key, payload_bytes FROM response_cache \
                     WHERE cache_key <> ? ORDER BY stored_at_ms ASC, cache_key ASC",
                )?;
                let rows = statement.query_map(params![keep_key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let mut removed = 0_u64;
            for (key, bytes) in candidates {
                if total <= max_bytes {
                    break;
                }
                connection.execute(
                    "DELETE FROM response_cache WHERE cache_key = ?",
                    params![key],
                )?;
                total = total.saturating_sub(bytes.max(0) as u64);
                removed += 1;
            }

            Ok(removed)
        })();

        finalize_transaction(&connection, result)
    }

    /// Aggregate counts for the table, evaluating expiry at `now_ms`.
    pub fn summary(&self, now_ms: i64) -> Result<StoreSummary, WarehouseError> {
        let connection = self.manager.acquire()?;
        let summary = connection.query_row(
            "SELECT \
                COUNT(*), \
                CAST(COALESCE(SUM(payload_bytes), 0) AS BIGINT), \
                CAST(COALESCE(SUM(CASE WHEN CAST(? AS BIGINT) - stored_at_ms > ttl_seconds * 1000 \
                    THEN 1 ELSE 0 END), 0) AS BIGINT), \
                MIN(stored_at_ms), \
                MAX(stored_at_ms) \
             FROM response_cache",
            params![now_ms],
            |row| {
                Ok(StoreSummary {
                    entries: row.get::<_, i64>(0)?.max(0) as u64,
                    total_bytes: row.get::<_, i64>(1)?.max(0) as u64,
                    expired_entries: row.get::<_, i64>(2)?.max(0) as u64,
                    oldest_stored_at_ms: row.get(3)?,
                    newest_stored_at_ms: row.get(4)?,
                })
            },
        )?;
        Ok(summary)
    }
}

fn total_bytes(connection: &Connection) -> Result<u64, WarehouseError> {
    let total: i64 = connection.query_row(
        "SELECT CAST(COALESCE(SUM(payload_bytes), 0) AS BIGINT) FROM response_cache",
        [],
        |row| row.get(0),
    )?;
    Ok(total.max(0) as u64)
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the econfeed home directory from environment or default.
pub fn resolve_econfeed_home() -> PathBuf {
    if let Some(path) = env::var_os("ECONFEED_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".econfeed");
    }

    PathBuf::from(".econfeed")
}

/// Default database location under the econfeed home.
pub fn default_db_path() -> PathBuf {
    resolve_econfeed_home()
        .join("cache")
        .join("responses.duckdb")
}

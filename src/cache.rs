//! Durable snapshots of the store and of the draw index.
//!
//! Both blobs live in the `cache_blobs` table. Read failures of any kind are
//! cache misses; write failures are retried once with a truncated draw list.

use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::database::{get_blob, put_blob};
use crate::error::StorageError;
use crate::types::{Draw, DrawIndexEntry, IndexSnapshot, Source, StoreSnapshot};

pub const STORE_KEY: &str = "lottery_cache_v5";
pub const INDEX_KEY: &str = "lottery_list_cache_v5";
pub const SCHEMA_VERSION: u32 = 5;
pub const TRUNCATED_DRAWS: usize = 48;
pub const INDEX_MAX_AGE_MS: i64 = 12 * 60 * 60 * 1000;
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub struct PersistentCache {
    conn: Mutex<Connection>,
    quota_bytes: usize,
}

impl PersistentCache {
    pub fn new(conn: Connection, quota_bytes: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            quota_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, key: &str, json: &str) -> Result<(), StorageError> {
        if json.len() > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                size: json.len(),
                quota: self.quota_bytes,
            });
        }
        put_blob(&self.lock(), key, json)?;
        Ok(())
    }

    fn write_store(&self, draws: Vec<Draw>, now_ms: i64) -> Result<(), StorageError> {
        let snapshot = StoreSnapshot {
            timestamp: now_ms,
            schema_version: SCHEMA_VERSION,
            draws,
        };
        let json = serde_json::to_string(&snapshot)?;
        self.write(STORE_KEY, &json)
    }

    /// Persists the api-sourced subset of `draws`, which must be sorted newest first.
    /// Returns whether anything was written.
    pub fn save_store(&self, draws: &[Draw], now_ms: i64) -> bool {
        let api: Vec<Draw> = draws.iter().filter(|d| d.source == Source::Api).cloned().collect();

        let err = match self.write_store(api.clone(), now_ms) {
            Ok(()) => {
                debug!(draws = api.len(), "store snapshot saved");
                return true;
            }
            Err(e) => e,
        };

        warn!(error = %err, "store snapshot write failed, retrying with {TRUNCATED_DRAWS} draws");
        let truncated: Vec<Draw> = api.into_iter().take(TRUNCATED_DRAWS).collect();
        match self.write_store(truncated, now_ms) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "store snapshot save failed");
                false
            }
        }
    }

    /// Missing, corrupt or schema-mismatched snapshots all read as `None`.
    pub fn load_store(&self) -> Option<StoreSnapshot> {
        let raw = match get_blob(&self.lock(), STORE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "store snapshot read failed");
                return None;
            }
        };

        let snapshot: StoreSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "store snapshot is corrupt, ignoring");
                return None;
            }
        };

        if snapshot.schema_version != SCHEMA_VERSION {
            debug!(
                found = snapshot.schema_version,
                expected = SCHEMA_VERSION,
                "store snapshot schema mismatch, ignoring"
            );
            return None;
        }

        Some(snapshot)
    }

    pub fn save_index(&self, ids: &[DrawIndexEntry], now_ms: i64) -> bool {
        let snapshot = IndexSnapshot {
            timestamp: now_ms,
            ids: ids.to_vec(),
        };
        let result = serde_json::to_string(&snapshot)
            .map_err(StorageError::from)
            .and_then(|json| self.write(INDEX_KEY, &json));

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "index snapshot save failed");
                false
            }
        }
    }

    /// Returns the cached index with the time it was fetched, unless it is
    /// missing, corrupt or older than 12 hours.
    pub fn load_index(&self, now_ms: i64) -> Option<IndexSnapshot> {
        let raw = get_blob(&self.lock(), INDEX_KEY).ok().flatten()?;
        let snapshot: IndexSnapshot = serde_json::from_str(&raw).ok()?;

        if now_ms - snapshot.timestamp > INDEX_MAX_AGE_MS {
            debug!("index snapshot is stale");
            return None;
        }
        Some(snapshot)
    }
}

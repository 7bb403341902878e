//! In-memory token store for tests and local development.
//!
//! Keys live in an ordered map so scans can resume after the last key they
//! returned. Expiry uses [`tokio::time::Instant`], which lets tests drive TTLs
//! with `tokio::time::pause` and `advance`. Expired entries are invisible to
//! every operation and are purged lazily.

use crate::{ttl_millis, ScanCursor, ScanPage, StoreError, StoreResult, TokenStore};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// All clones share the same underlying map.
#[derive(Clone)]
pub struct MemoryTokenStore {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
    scan_batch_size: usize,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            scan_batch_size: crate::DEFAULT_SCAN_BATCH,
        }
    }

    /// Smaller pages make multi-round sweeps observable in tests.
    pub fn with_scan_batch_size(mut self, scan_batch_size: usize) -> Self {
        self.scan_batch_size = scan_batch_size.max(1);
        self
    }

    /// Number of unexpired keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> StoreResult<String> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(entry.value.clone()),
            _ => Err(StoreError::not_found(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        ttl_millis(ttl)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    async fn try_claim(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        ttl_millis(ttl)?;
        // Check and insert under one write guard; no window between them.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_live(Instant::now()) {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .map(|entry| entry.is_live(Instant::now()))
            .unwrap_or(false))
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: &ScanCursor,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let count = count.max(1);
        let now = Instant::now();
        let lower = match cursor.token() {
            Some(last) => Bound::Excluded(last),
            None => Bound::Included(prefix),
        };

        // The guard covers this page only; other callers interleave between pages.
        let mut entries = self.entries.write().await;
        let mut keys = Vec::with_capacity(count);
        let mut expired = Vec::new();
        let mut more = false;

        for (key, entry) in entries.range::<str, _>((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if keys.len() == count {
                more = true;
                break;
            }
            if entry.is_live(now) {
                keys.push(key.clone());
            } else {
                expired.push(key.clone());
            }
        }

        for key in &expired {
            entries.remove(key);
        }

        let next = match keys.last() {
            Some(last) if more => ScanCursor::resume(last.clone()),
            _ => ScanCursor::start(),
        };
        Ok(ScanPage { keys, next })
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let deleted = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|entry| entry.is_live(now))
            .count();
        debug!(requested = keys.len(), deleted, "Memory store batch delete");
        Ok(deleted)
    }

    fn scan_batch_size(&self) -> usize {
        self.scan_batch_size
    }
}

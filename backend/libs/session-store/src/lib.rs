//! Shared session token storage
//!
//! Provides the storage capability behind session issuance, rotation and
//! revocation:
//! - TTL-bound values (the store is the only authority on expiry)
//! - Atomic create-if-absent claims
//! - SCAN-based prefix revocation (no blocking KEYS)
//! - Redis backend for production, in-memory backend for tests
//!
//! # Example
//!
//! ```no_run
//! use session_store::{RedisTokenStore, SessionKey, StoreConfig, TokenStore};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = RedisTokenStore::connect(&StoreConfig::from_env()?).await?;
//! let key = SessionKey::session(42, "opaque-credential");
//! if store.try_claim(&key, "{}", Duration::from_secs(3600)).await? {
//!     // this caller owns the session slot
//! }
//! store.delete_by_prefix(&SessionKey::subject_prefix(42)).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod keys;
mod memory;
mod remote;
mod scan;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use keys::{hash_credential, SessionKey, KEY_VERSION};
pub use memory::MemoryTokenStore;
pub use remote::RedisTokenStore;
pub use scan::{sweep_prefix, ScanCursor, ScanPage};

use std::time::Duration;

/// Default number of keys requested per scan round trip
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Key-value operations with TTL and atomic-claim semantics.
///
/// Backends are substitutable; nothing above this trait knows which one is
/// in use.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Current value of an unexpired key, or [`StoreError::NotFound`].
    async fn get(&self, key: &str) -> StoreResult<String>;

    /// Unconditionally write `value` with expiry `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Write `value` only if no unexpired value exists.
    ///
    /// Returns whether this call performed the write. Among concurrent
    /// claimants of one key exactly one observes `true`.
    async fn try_claim(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remove a key. Absent keys are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Whether the key is present and unexpired.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Fetch up to roughly `count` keys starting with `prefix`, resuming at `cursor`.
    async fn scan_page(
        &self,
        prefix: &str,
        cursor: &ScanCursor,
        count: usize,
    ) -> StoreResult<ScanPage>;

    /// Delete a batch of keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize>;

    /// Page size used by [`delete_by_prefix`](Self::delete_by_prefix).
    fn scan_batch_size(&self) -> usize {
        DEFAULT_SCAN_BATCH
    }

    /// Remove every key matching `prefix*` via resumable bounded iteration.
    async fn delete_by_prefix(&self, prefix: &str) -> StoreResult<usize> {
        sweep_prefix(self, prefix, self.scan_batch_size()).await
    }
}

/// TTL in whole milliseconds, rejecting anything below one millisecond.
pub(crate) fn ttl_millis(ttl: Duration) -> StoreResult<u64> {
    let millis = ttl.as_millis();
    if millis == 0 {
        return Err(StoreError::InvalidTtl(ttl));
    }
    Ok(u64::try_from(millis).unwrap_or(u64::MAX))
}

//! Resumable key iteration and the prefix sweep built on it.
//!
//! A sweep never issues one unbounded scan. Each round trip fetches a bounded
//! page plus a continuation cursor, deletes that page, and resumes from the
//! cursor until the backend hands back the starting cursor again.

use crate::{StoreError, StoreResult, TokenStore};
use tracing::debug;

/// Opaque continuation token for [`TokenStore::scan_page`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor(Option<String>);

impl ScanCursor {
    /// Initial cursor. A page returning this cursor ends the iteration.
    pub fn start() -> Self {
        Self(None)
    }

    pub fn resume(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }

    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// One bounded batch of matching keys.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub next: ScanCursor,
}

impl ScanPage {
    pub fn is_last(&self) -> bool {
        self.next.is_start()
    }
}

/// Delete every key matching `prefix*`, one page at a time.
///
/// Keys written while the sweep runs may or may not be removed. Keys present
/// when it started are gone once it returns `Ok`. The first backend error
/// aborts the sweep; pages already deleted stay deleted.
pub async fn sweep_prefix<S>(store: &S, prefix: &str, batch_size: usize) -> StoreResult<usize>
where
    S: TokenStore + ?Sized,
{
    if prefix.is_empty() {
        return Err(StoreError::InvalidPrefix(
            "empty prefix would match every key".to_string(),
        ));
    }

    let batch_size = batch_size.max(1);
    let mut cursor = ScanCursor::start();
    let mut total_deleted = 0;
    let mut pages = 0usize;

    loop {
        let page = store.scan_page(prefix, &cursor, batch_size).await?;
        pages += 1;

        if !page.keys.is_empty() {
            total_deleted += store.delete_many(&page.keys).await?;
        }

        cursor = page.next;
        if cursor.is_start() {
            break;
        }
    }

    debug!(prefix = %prefix, deleted = total_deleted, pages, "Prefix sweep complete");
    Ok(total_deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTokenStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Memory store whose `delete_many` fails from the given call onwards
    struct FailingDeletes {
        inner: MemoryTokenStore,
        calls: AtomicUsize,
        fail_from_call: usize,
    }

    #[async_trait::async_trait]
    impl TokenStore for FailingDeletes {
        async fn get(&self, key: &str) -> StoreResult<String> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
            self.inner.set(key, value, ttl).await
        }

        async fn try_claim(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
            self.inner.try_claim(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.inner.exists(key).await
        }

        async fn scan_page(
            &self,
            prefix: &str,
            cursor: &ScanCursor,
            count: usize,
        ) -> StoreResult<ScanPage> {
            self.inner.scan_page(prefix, cursor, count).await
        }

        async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.fail_from_call {
                return Err(StoreError::Timeout(Duration::from_millis(1)));
            }
            self.inner.delete_many(keys).await
        }
    }

    #[tokio::test]
    async fn test_sweep_aborts_on_delete_error_and_keeps_progress() {
        let inner = MemoryTokenStore::new();
        for i in 0..5 {
            inner
                .set(&format!("p:{}", i), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        let store = FailingDeletes {
            inner: inner.clone(),
            calls: AtomicUsize::new(0),
            fail_from_call: 2,
        };

        let result = sweep_prefix(&store, "p:", 2).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);

        // First page stays deleted, the rest is untouched
        assert!(!inner.exists("p:0").await.unwrap());
        assert!(!inner.exists("p:1").await.unwrap());
        assert_eq!(inner.len().await, 3);
    }

    #[test]
    fn test_cursor_start() {
        assert!(ScanCursor::start().is_start());
        assert!(ScanCursor::default().is_start());
        assert_eq!(ScanCursor::start().token(), None);
    }

    #[test]
    fn test_cursor_resume() {
        let cursor = ScanCursor::resume("17");
        assert!(!cursor.is_start());
        assert_eq!(cursor.token(), Some("17"));
    }

    #[test]
    fn test_default_page_is_last() {
        assert!(ScanPage::default().is_last());
    }
}

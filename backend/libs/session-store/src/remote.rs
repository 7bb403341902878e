//! Redis-backed token store.
//!
//! The connection manager is cloned per command rather than shared behind a
//! mutex, so a long prefix sweep never stalls concurrent reads and writes.
//! Reconnects are the connection manager's job; this store never retries.

use crate::{
    ttl_millis, ScanCursor, ScanPage, StoreConfig, StoreError, StoreResult, TokenStore,
};
use redis::aio::ConnectionManager;
use redis::{Client, FromRedisValue};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    scan_batch_size: usize,
}

impl RedisTokenStore {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::open(config.redis_url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        info!("Token store connected to Redis");
        Ok(Self::from_manager(conn, config))
    }

    pub fn from_manager(conn: ConnectionManager, config: &StoreConfig) -> Self {
        Self {
            conn,
            op_timeout: config.op_timeout(),
            scan_batch_size: config.scan_batch_size.max(1),
        }
    }

    async fn query<T>(&self, cmd: &redis::Cmd) -> StoreResult<T>
    where
        T: FromRedisValue + Send,
    {
        let mut conn = self.conn.clone();
        match timeout(self.op_timeout, cmd.query_async::<_, T>(&mut conn)).await {
            Ok(result) => result.map_err(|e| {
                warn!(error = %e, "Redis command failed");
                StoreError::Unavailable(e)
            }),
            Err(_) => {
                warn!(timeout = ?self.op_timeout, "Redis command timed out");
                Err(StoreError::Timeout(self.op_timeout))
            }
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self, key: &str) -> StoreResult<String> {
        let value: Option<String> = self.query(redis::cmd("GET").arg(key)).await?;
        match value {
            Some(value) => Ok(value),
            None => {
                debug!(key = %key, "Token store miss");
                Err(StoreError::not_found(key))
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let millis = ttl_millis(ttl)?;
        self.query::<()>(redis::cmd("SET").arg(key).arg(value).arg("PX").arg(millis))
            .await?;
        debug!(key = %key, ttl_ms = millis, "Token store set");
        Ok(())
    }

    async fn try_claim(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let millis = ttl_millis(ttl)?;
        // SET NX replies OK on success and nil when the key already exists.
        let reply: Option<String> = self
            .query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(millis),
            )
            .await?;
        let claimed = reply.is_some();
        debug!(key = %key, claimed, "Token store claim");
        Ok(claimed)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.query::<usize>(redis::cmd("DEL").arg(key)).await?;
        debug!(key = %key, "Token store delete");
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.query(redis::cmd("EXISTS").arg(key)).await
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: &ScanCursor,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let position: u64 = match cursor.token() {
            Some(token) => token
                .parse()
                .map_err(|_| StoreError::InvalidCursor(token.to_string()))?,
            None => 0,
        };

        // SCAN instead of KEYS so the server is never blocked by a full keyspace walk
        let (next, keys): (u64, Vec<String>) = self
            .query(
                redis::cmd("SCAN")
                    .arg(position)
                    .arg("MATCH")
                    .arg(match_pattern(prefix))
                    .arg("COUNT")
                    .arg(count.max(1)),
            )
            .await?;

        let next = if next == 0 {
            ScanCursor::start()
        } else {
            ScanCursor::resume(next.to_string())
        };
        Ok(ScanPage { keys, next })
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let deleted: usize = self.query(redis::cmd("DEL").arg(keys)).await?;
        debug!(requested = keys.len(), deleted, "Token store batch delete");
        Ok(deleted)
    }

    fn scan_batch_size(&self) -> usize {
        self.scan_batch_size
    }
}

/// MATCH pattern selecting keys that start with `prefix` literally.
fn match_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

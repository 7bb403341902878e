//! Token store configuration
//!
//! Loaded from environment variables (with a `.env` file in debug builds):
//! - `REDIS_URL` (default `redis://127.0.0.1:6379`)
//! - `TOKEN_STORE_OP_TIMEOUT_MS` (default 500)
//! - `TOKEN_STORE_SCAN_BATCH` (default 100)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::DEFAULT_SCAN_BATCH;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub redis_url: String,
    /// Per-command timeout in milliseconds
    pub op_timeout_ms: u64,
    /// Keys requested per SCAN round trip during prefix revocation
    pub scan_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            op_timeout_ms: 500,
            scan_batch_size: DEFAULT_SCAN_BATCH,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        let defaults = Self::default();
        Ok(Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            op_timeout_ms: match env::var("TOKEN_STORE_OP_TIMEOUT_MS") {
                Ok(raw) => raw
                    .parse()
                    .context("Invalid TOKEN_STORE_OP_TIMEOUT_MS")?,
                Err(_) => defaults.op_timeout_ms,
            },
            scan_batch_size: match env::var("TOKEN_STORE_SCAN_BATCH") {
                Ok(raw) => raw.parse().context("Invalid TOKEN_STORE_SCAN_BATCH")?,
                Err(_) => defaults.scan_batch_size,
            },
        })
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

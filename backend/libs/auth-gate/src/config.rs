//! Gate and session configuration
//!
//! Environment variables:
//! - `AUTH_GATE_VERIFY_TIMEOUT_MS` (default 2000)
//! - `AUTH_SESSION_TTL_SECS` (default 86400)
//! - `AUTH_ROTATE_WITHIN_SECS` (default 3600)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthGateConfig {
    /// Upper bound on one verifier call in milliseconds
    pub verify_timeout_ms: u64,
    /// Lifetime of an issued session
    pub session_ttl_secs: u64,
    /// Sessions with less remaining lifetime than this are rotated
    pub rotate_within_secs: u64,
}

impl Default for AuthGateConfig {
    fn default() -> Self {
        Self {
            verify_timeout_ms: 2000,
            session_ttl_secs: 24 * 60 * 60,
            rotate_within_secs: 60 * 60,
        }
    }
}

impl AuthGateConfig {
    pub fn from_env() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        let defaults = Self::default();
        Ok(Self {
            verify_timeout_ms: env_or("AUTH_GATE_VERIFY_TIMEOUT_MS", defaults.verify_timeout_ms)?,
            session_ttl_secs: env_or("AUTH_SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            rotate_within_secs: env_or("AUTH_ROTATE_WITHIN_SECS", defaults.rotate_within_secs)?,
        })
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn rotate_within(&self) -> Duration {
        Duration::from_secs(self.rotate_within_secs)
    }
}

fn env_or(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_gate_config_default() {
        let config = AuthGateConfig::default();
        assert_eq!(config.verify_timeout(), Duration::from_secs(2));
        assert_eq!(config.session_ttl(), Duration::from_secs(86400));
        assert_eq!(config.rotate_within(), Duration::from_secs(3600));
        assert!(config.rotate_within() < config.session_ttl());
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("AUTH_GATE_TEST_UNSET_VARIABLE", 7).unwrap(), 7);
    }
}

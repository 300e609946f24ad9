use anyhow::{Context, Result};
use std::time::Duration;

use crate::store::CircuitBreakerConfig;

// ============================================================================
// Runtime configuration (binary only, the library reads no environment)
// ============================================================================

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Remote delivery API. `None` runs against the in-memory store.
    pub api_url: Option<String>,
    pub request_timeout: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("DELIVERY_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let timeout_ms = parse_or(&lookup, "DELIVERY_API_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let breaker_threshold = parse_or(&lookup, "DELIVERY_BREAKER_THRESHOLD", DEFAULT_BREAKER_THRESHOLD)?;
        let cooldown_secs = parse_or(&lookup, "DELIVERY_BREAKER_COOLDOWN_SECS", DEFAULT_BREAKER_COOLDOWN_SECS)?;

        if breaker_threshold == 0 {
            anyhow::bail!("DELIVERY_BREAKER_THRESHOLD must be at least 1");
        }

        Ok(Self {
            api_url,
            request_timeout: Duration::from_millis(timeout_ms),
            breaker_threshold,
            breaker_cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_threshold,
            cooldown: self.breaker_cooldown,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
        None => Ok(default),
    }
}

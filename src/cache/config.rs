//! Cache configuration.
//!
//! Controls the event body and revalidation token lifetimes and the in-memory
//! store capacity via the `[cache]` section of `ghactivity.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_BODY_TTL_SECONDS: u64 = 300;
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 1800;
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached event list body.
    pub body_ttl_seconds: u64,
    /// Lifetime of a revalidation token; never shorter than the body.
    pub token_ttl_seconds: u64,
    /// Maximum entries (bodies and tokens together) held by the memory store.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            body_ttl_seconds: DEFAULT_BODY_TTL_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            body_ttl_seconds: settings.body_ttl_seconds,
            token_ttl_seconds: settings.token_ttl_seconds,
            capacity: settings.capacity,
        }
    }
}

impl CacheConfig {
    pub fn body_ttl(&self) -> Duration {
        Duration::from_secs(self.body_ttl_seconds)
    }

    /// Token TTL, raised to the body TTL if configured lower.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds.max(self.body_ttl_seconds))
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

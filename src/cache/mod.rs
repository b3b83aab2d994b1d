//! Cache store adapter for upstream event responses.
//!
//! Bodies and revalidation tokens are stored under separate keys so a token can
//! outlive the body it was issued with:
//!
//! ```toml
//! [cache]
//! body_ttl_seconds = 300
//! token_ttl_seconds = 1800
//! capacity = 1024
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::{CacheStore, CachedValue, MemoryStore, StoreError, StoreWrite};

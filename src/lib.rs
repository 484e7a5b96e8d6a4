//! # tiercache
//!
//! Client-side tiered caching for the booking front end.
//!
//! Four storage tiers sit behind one facade: a volatile in-process memory
//! tier, two bounded synchronous persistent tiers (session and origin
//! scope) and a larger asynchronous transactional tier opened lazily on
//! first use. The facade layers TTL expiry, tag invalidation, priority+LRU
//! eviction, statistics and a diagnostic export on top, with background
//! tasks sweeping expired entries and relieving memory pressure.
//!
//! ```no_run
//! use tiercache::{CacheConfig, CacheService, GetOptions, SetOptions};
//!
//! # async fn example() -> tiercache::Result<()> {
//! let cache = CacheService::new(CacheConfig::default());
//! cache.init();
//!
//! cache.set("profile:42", &serde_json::json!({"name": "Ana"}), SetOptions::default()).await?;
//! let profile = cache.get("profile:42", GetOptions::default()).await;
//! assert!(profile.is_some());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;

pub use cache::{
    CacheConfig, CacheService, CacheStats, CacheTier, GetOptions, Priority, SetOptions,
    StatsSnapshot,
};
pub use error::{Error, Result};

//! Tier Identity and Contract
//!
//! The tier selector is a closed set of variants dispatched through
//! exhaustive matching; the storage contract is one asynchronous trait so
//! the orchestrator is written once, even though three of the four tiers
//! complete synchronously.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entry::{CacheEntry, MetadataSnapshot};
use crate::error::Result;

/// Cache tier enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Volatile in-process store
    Memory,
    /// Bounded persistent store, session lifetime
    SessionPersistent,
    /// Bounded persistent store, origin lifetime
    OriginPersistent,
    /// Larger asynchronous transactional store, opened lazily
    AsyncPersistent,
}

impl CacheTier {
    /// Fixed search order for unscoped reads
    pub const FALLBACK_ORDER: [CacheTier; 4] = [
        CacheTier::Memory,
        CacheTier::SessionPersistent,
        CacheTier::OriginPersistent,
        CacheTier::AsyncPersistent,
    ];

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CacheTier::Memory => "memory",
            CacheTier::SessionPersistent => "session",
            CacheTier::OriginPersistent => "origin",
            CacheTier::AsyncPersistent => "async",
        }
    }
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Uniform storage contract implemented by every tier
///
/// Absence is a normal outcome: `get` returns `Ok(None)` for a missing or
/// expired key, and `delete` on an absent key is a no-op. Only `set` can
/// fail with `CapacityExceeded`; the orchestrator recovers from that with
/// an eviction-and-retry cycle.
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Which tier this store implements
    fn tier(&self) -> CacheTier;

    /// Capacity ceiling in bytes
    fn capacity(&self) -> u64;

    /// Look up a live entry; expired entries are dropped and reported absent
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry, failing with `CapacityExceeded` when over budget
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// Remove an entry; returns whether something was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;

    /// Number of live entries
    async fn len(&self) -> usize;

    /// Bytes currently accounted against the capacity
    async fn used_bytes(&self) -> u64;

    /// Metadata snapshot of every entry, for eviction and tag scans.
    ///
    /// This is a linear scan over live entries; there is no secondary tag
    /// index. A documented cost, acceptable at client-cache sizes.
    async fn scan(&self) -> Vec<(String, MetadataSnapshot)>;

    /// Delete entries with `expiry <= now`; returns how many were removed
    async fn remove_expired(&self, now: u64) -> usize;
}

// =============================================================================
// Tests
// =============================================================================

//! Cache Entry Types
//!
//! Entries pair an opaque serialized payload with the metadata the
//! orchestrator needs for TTL expiry, tag invalidation and eviction.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::tier::CacheTier;

/// Current wall-clock time as epoch milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Retention weight for eviction ordering
///
/// Low-priority entries are evicted before normal, before high. This is a
/// tie-breaker for the eviction policy, not a correctness guarantee.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Metadata for cache entries
///
/// Access tracking uses atomics so a memory-tier hit can record recency
/// through a shared reference, without taking the map's write lock.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Absolute expiry timestamp (epoch ms); always > `created_at`
    pub expiry: u64,
    /// Which tier holds this entry
    pub tier: CacheTier,
    /// Retention weight
    pub priority: Priority,
    /// Byte length of the stored payload at write time
    pub size: u64,
    /// Labels for bulk invalidation
    pub tags: BTreeSet<String>,
    /// Creation timestamp (epoch ms)
    pub created_at: u64,
    /// Access count; updated only on a memory-tier hit
    #[serde(with = "atomic_u32")]
    pub access_count: AtomicU32,
    /// Last access timestamp (epoch ms); updated only on a memory-tier hit
    #[serde(with = "atomic_u64")]
    pub last_accessed: AtomicU64,
    /// Whether the payload went through the string compressor
    pub compressed: bool,
}

impl EntryMetadata {
    /// Create metadata for a new entry
    ///
    /// The TTL is clamped to at least 1ms so `expiry > created_at` holds.
    pub fn new(
        tier: CacheTier,
        ttl: Duration,
        priority: Priority,
        size: u64,
        tags: BTreeSet<String>,
        compressed: bool,
    ) -> Self {
        let now = now_millis();
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        Self {
            expiry: now + ttl_ms,
            tier,
            priority,
            size,
            tags,
            created_at: now,
            access_count: AtomicU32::new(0),
            last_accessed: AtomicU64::new(now),
            compressed,
        }
    }

    /// Check whether the entry is expired at the given instant
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry <= now
    }

    /// Check whether the entry is expired now
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Record an access (memory-tier hits only)
    #[inline]
    pub fn record_access(&self) {
        self.last_accessed.store(now_millis(), Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get access count
    #[inline]
    pub fn access_count(&self) -> u32 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Get last access time (epoch ms)
    #[inline]
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }

    /// Check whether this entry carries any of the given tags
    pub fn matches_tags<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.contains(t.as_ref()))
    }

    /// Snapshot the fields the eviction policy and tag scans need
    pub fn snapshot(&self) -> MetadataSnapshot {
        MetadataSnapshot {
            expiry: self.expiry,
            priority: self.priority,
            size: self.size,
            last_accessed: self.last_accessed(),
            tags: self.tags.clone(),
        }
    }
}

impl Clone for EntryMetadata {
    fn clone(&self) -> Self {
        Self {
            expiry: self.expiry,
            tier: self.tier,
            priority: self.priority,
            size: self.size,
            tags: self.tags.clone(),
            created_at: self.created_at,
            access_count: AtomicU32::new(self.access_count.load(Ordering::Relaxed)),
            last_accessed: AtomicU64::new(self.last_accessed.load(Ordering::Relaxed)),
            compressed: self.compressed,
        }
    }
}

/// Plain copy of the metadata fields scans need (no atomics)
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    pub expiry: u64,
    pub priority: Priority,
    pub size: u64,
    pub last_accessed: u64,
    pub tags: BTreeSet<String>,
}

/// Cache entry: serialized payload plus metadata
///
/// The payload is the serde_json byte form of the cached value, optionally
/// lz4-compressed (string values only). Serializing the whole entry yields
/// the persisted `{ value, metadata }` record layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized payload
    #[serde(rename = "value")]
    pub payload: Bytes,
    /// Entry metadata
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Create a new entry; `metadata.size` is taken from the payload
    pub fn new(payload: Bytes, mut metadata: EntryMetadata) -> Self {
        metadata.size = payload.len() as u64;
        Self { payload, metadata }
    }

    /// Get payload size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    /// Check if expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.metadata.is_expired()
    }
}

mod atomic_u32 {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &AtomicU32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(v.load(Ordering::Relaxed))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<AtomicU32, D::Error> {
        Ok(AtomicU32::new(u32::deserialize(d)?))
    }
}

mod atomic_u64 {
    use std::sync::atomic::{AtomicU64, Ordering};

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &AtomicU64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(v.load(Ordering::Relaxed))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<AtomicU64, D::Error> {
        Ok(AtomicU64::new(u64::deserialize(d)?))
    }
}

// =============================================================================
// Tests
// =============================================================================

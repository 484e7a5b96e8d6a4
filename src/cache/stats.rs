//! Cache Statistics
//!
//! Counters for the operator dashboard. The snapshot is serializable so it
//! can ride along in the export artifact.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Cache statistics collector
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Create a new statistics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hit rate over completed lookups (0 when there were none)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Snapshot all counters together with tier occupancy
    pub fn snapshot(&self, memory_usage: MemoryUsage, cache_size: TierCounts) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            sets: self.sets(),
            deletes: self.deletes(),
            evictions: self.evictions(),
            hit_rate: self.hit_rate(),
            memory_usage,
            cache_size,
        }
    }
}

/// Memory tier occupancy
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    /// Bytes currently held
    pub current: u64,
    /// Capacity ceiling in bytes
    pub max: u64,
    /// current/max as a percentage
    pub percentage: f64,
}

impl MemoryUsage {
    pub fn new(current: u64, max: u64) -> Self {
        let percentage = if max == 0 {
            0.0
        } else {
            current as f64 / max as f64 * 100.0
        };
        Self {
            current,
            max,
            percentage,
        }
    }
}

/// Entry counts per tier
#[derive(Debug, Clone, Serialize)]
pub struct TierCounts {
    pub memory: usize,
    pub session_persistent: usize,
    pub origin_persistent: usize,
    pub async_persistent: usize,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.memory + self.session_persistent + self.origin_persistent + self.async_persistent
    }
}

/// Snapshot of all cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub memory_usage: MemoryUsage,
    pub cache_size: TierCounts,
}

// =============================================================================
// Tests
// =============================================================================

//! Eviction Policy
//!
//! Victim ordering is priority ascending, then least-recently-used: every
//! low-priority entry goes before any normal one, every normal before any
//! high, and within a priority the oldest access goes first. Expired
//! entries always sort to the front.
//!
//! The memory tier evicts until the freed byte count satisfies the pending
//! write. The persistent tiers have only a coarse quota signal, so they
//! evict a fixed fraction of entries in victim order instead.

use std::cmp::Reverse;

use super::entry::{MetadataSnapshot, Priority};

/// Eviction policy configuration
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Fraction of entries removed from a quota-bounded tier per cycle
    pub fraction: f64,
    /// Memory usage ratio above which the monitor evicts proactively
    pub monitor_high_watermark: f64,
    /// Fraction of memory capacity the monitor frees when triggered
    pub monitor_evict_fraction: f64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            monitor_high_watermark: 0.80,
            monitor_evict_fraction: 0.20,
        }
    }
}

impl EvictionPolicy {
    /// Sort candidates into eviction order (first = evict first)
    pub fn order_victims(mut candidates: Vec<VictimCandidate>) -> Vec<VictimCandidate> {
        candidates.sort_by_key(|c| (Reverse(c.expired), c.priority, c.last_accessed));
        candidates
    }

    /// How many entries a fraction-based cycle removes (at least one)
    pub fn fraction_count(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((len as f64 * self.fraction).ceil() as usize).max(1)
    }
}

/// One eviction candidate, derived from a tier scan
#[derive(Debug, Clone)]
pub struct VictimCandidate {
    pub key: String,
    pub expired: bool,
    pub priority: Priority,
    pub last_accessed: u64,
    pub size: u64,
}

impl VictimCandidate {
    /// Build a candidate from a scanned entry
    pub fn from_snapshot(key: String, meta: &MetadataSnapshot, now: u64) -> Self {
        Self {
            key,
            expired: meta.expiry <= now,
            priority: meta.priority,
            last_accessed: meta.last_accessed,
            size: meta.size,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

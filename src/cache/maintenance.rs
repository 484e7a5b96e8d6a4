//! Background Maintenance
//!
//! Two loops run alongside the cache and call tier primitives directly:
//!
//! - **Janitor**: periodic expiry sweep across all tiers, plus one final
//!   sweep at shutdown. Best-effort; a missed run leaves stale entries for
//!   the next run or for a miss-and-overwrite on the next access.
//! - **MemoryMonitor**: watches memory tier occupancy and evicts
//!   proactively above the high watermark, pre-empting hard capacity
//!   failures on the write path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::entry::now_millis;
use super::memory::MemoryTier;
use super::policy::{EvictionPolicy, VictimCandidate};
use super::stats::CacheStats;
use super::tier::TierStore;

/// Maintenance loop configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Expiry sweep interval
    pub janitor_interval: Duration,
    /// Memory occupancy check interval
    pub monitor_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            janitor_interval: Duration::from_secs(300),
            monitor_interval: Duration::from_secs(60),
        }
    }
}

/// Platform lifecycle signals delivered by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Connectivity lost
    Offline,
    /// Connectivity restored
    Online,
    /// Application teardown
    Teardown,
}

/// Periodic expiry sweep across all tiers
pub struct Janitor {
    tiers: Vec<Arc<dyn TierStore>>,
    period: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Janitor {
    pub fn new(tiers: Vec<Arc<dyn TierStore>>, period: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            tiers,
            period,
            shutdown,
        }
    }

    /// Remove expired entries from every tier; returns how many went
    pub async fn sweep(&self) -> usize {
        let now = now_millis();
        let mut removed = 0;
        for tier in &self.tiers {
            let n = tier.remove_expired(now).await;
            if n > 0 {
                debug!(tier = %tier.tier(), removed = n, "swept expired entries");
            }
            removed += n;
        }
        removed
    }

    /// Run the sweep loop until shutdown is flagged
    #[instrument(skip(self))]
    pub async fn run(self: Arc<Self>) {
        info!(period = ?self.period, "starting cache janitor");

        let mut tick = interval(self.period);
        tick.tick().await; // first tick completes immediately

        loop {
            tick.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                info!("cache janitor shutting down");
                break;
            }
            self.sweep().await;
        }
    }
}

/// Reactive memory-tier eviction above the high watermark
pub struct MemoryMonitor {
    memory: Arc<MemoryTier>,
    policy: EvictionPolicy,
    stats: Arc<CacheStats>,
    period: Duration,
    shutdown: Arc<AtomicBool>,
}

impl MemoryMonitor {
    pub fn new(
        memory: Arc<MemoryTier>,
        policy: EvictionPolicy,
        stats: Arc<CacheStats>,
        period: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            memory,
            policy,
            stats,
            period,
            shutdown,
        }
    }

    /// Check occupancy and evict proactively when over the watermark;
    /// returns how many entries were evicted
    pub async fn check(&self) -> usize {
        let used = self.memory.used_bytes().await;
        let capacity = self.memory.capacity();
        if capacity == 0 {
            return 0;
        }

        let usage = used as f64 / capacity as f64;
        if usage <= self.policy.monitor_high_watermark {
            return 0;
        }

        let target = (capacity as f64 * self.policy.monitor_evict_fraction) as u64;
        let now = now_millis();
        let candidates = self
            .memory
            .scan()
            .await
            .into_iter()
            .map(|(key, meta)| VictimCandidate::from_snapshot(key, &meta, now))
            .collect();

        let mut freed = 0u64;
        let mut evicted = 0usize;
        for victim in EvictionPolicy::order_victims(candidates) {
            if freed >= target {
                break;
            }
            if self.memory.delete(&victim.key).await.unwrap_or(false) {
                freed += victim.size;
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.stats.record_evictions(evicted as u64);
            info!(
                usage = format!("{:.0}%", usage * 100.0),
                evicted, freed, "memory monitor evicted under pressure"
            );
        }
        evicted
    }

    /// Run the occupancy loop until shutdown is flagged
    #[instrument(skip(self))]
    pub async fn run(self: Arc<Self>) {
        info!(period = ?self.period, "starting memory monitor");

        let mut tick = interval(self.period);
        tick.tick().await;

        loop {
            tick.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                info!("memory monitor shutting down");
                break;
            }
            self.check().await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

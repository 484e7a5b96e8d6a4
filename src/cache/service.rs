//! Cache Service - Orchestrator Facade
//!
//! The single entry point callers hold. Owns one instance of every tier,
//! the statistics collector, the compression codec and the background
//! maintenance tasks.
//!
//! Error policy is best-effort: reads never fail, they miss, and tier-level
//! read errors are logged at debug and swallowed. Writes surface only two
//! error classes to the caller: serialization failures and capacity
//! exhaustion that persists after one evict-and-retry cycle.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::compression::{CompressionCodec, CompressionConfig};
use super::durable::AsyncTier;
use super::entry::{now_millis, CacheEntry, EntryMetadata, Priority};
use super::maintenance::{Janitor, LifecycleSignal, MaintenanceConfig, MemoryMonitor};
use super::memory::{MemoryConfig, MemoryTier};
use super::persistent::PersistentTier;
use super::policy::{EvictionPolicy, VictimCandidate};
use super::stats::{CacheStats, MemoryUsage, StatsSnapshot, TierCounts};
use super::tier::{CacheTier, TierStore};
use super::{
    DEFAULT_DURABLE_CAPACITY, DEFAULT_MEMORY_CAPACITY, DEFAULT_PERSISTENT_QUOTA, DEFAULT_TTL,
};
use crate::error::{Error, Result};

/// Cache service configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory tier capacity in bytes
    pub memory_capacity: u64,
    /// Session-scoped persistent tier quota in bytes
    pub session_quota: u64,
    /// Origin-scoped persistent tier quota in bytes
    pub origin_quota: u64,
    /// Asynchronous persistent tier capacity in bytes
    pub durable_capacity: u64,
    /// TTL applied when a write does not specify one
    pub default_ttl: Duration,
    /// String payload compression settings
    pub compression: CompressionConfig,
    /// Eviction policy settings
    pub policy: EvictionPolicy,
    /// Background maintenance intervals
    pub maintenance: MaintenanceConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            session_quota: DEFAULT_PERSISTENT_QUOTA,
            origin_quota: DEFAULT_PERSISTENT_QUOTA,
            durable_capacity: DEFAULT_DURABLE_CAPACITY,
            default_ttl: DEFAULT_TTL,
            compression: CompressionConfig::default(),
            policy: EvictionPolicy::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Per-write options
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Time to live; falls back to the configured default when `None`
    pub ttl: Option<Duration>,
    /// Tier to store in
    pub strategy: CacheTier,
    /// Retention weight for eviction
    pub priority: Priority,
    /// Attempt lz4 compression (string values only)
    pub compress: bool,
    /// Labels for bulk invalidation
    pub tags: Vec<String>,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            strategy: CacheTier::Memory,
            priority: Priority::Normal,
            compress: false,
            tags: Vec::new(),
        }
    }
}

/// Per-read options
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Tier to read from; a miss there is a miss overall. `None` searches
    /// every tier fastest-first.
    pub strategy: Option<CacheTier>,
    /// Additional tiers appended to the fixed order on unscoped reads;
    /// ignored when `strategy` is set
    pub fallback_tiers: Vec<CacheTier>,
}

/// One decoded memory-tier entry in the export artifact
#[derive(Debug, Clone, Serialize)]
pub struct ExportedEntry {
    pub key: String,
    pub value: Value,
    /// Absolute expiry (epoch ms)
    pub expiry: u64,
    pub priority: Priority,
    pub tags: Vec<String>,
}

/// Diagnostic snapshot of the memory tier plus counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheExport {
    /// Suggested artifact name, `cache_export_<unix-ts>.json`
    pub filename: String,
    pub exported_at: DateTime<Utc>,
    pub stats: StatsSnapshot,
    pub memory_entries: Vec<ExportedEntry>,
}

impl CacheExport {
    /// Write the artifact under `dir`; returns the full path
    pub async fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Tiered cache service
pub struct CacheService {
    memory: Arc<MemoryTier>,
    session: Arc<PersistentTier>,
    origin: Arc<PersistentTier>,
    durable: Arc<AsyncTier>,
    stats: Arc<CacheStats>,
    config: CacheConfig,
    codec: CompressionCodec,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    shutdown: Arc<AtomicBool>,
}

impl CacheService {
    /// Create a service on in-memory backends per the given configuration
    pub fn new(config: CacheConfig) -> Self {
        let memory = Arc::new(MemoryTier::with_config(MemoryConfig {
            capacity: config.memory_capacity,
        }));
        let session = Arc::new(PersistentTier::session(config.session_quota));
        let origin = Arc::new(PersistentTier::origin(config.origin_quota));
        let durable = Arc::new(AsyncTier::in_memory());

        Self::with_tiers(config, memory, session, origin, durable)
    }

    /// Create a service over externally-constructed tiers
    pub fn with_tiers(
        config: CacheConfig,
        memory: Arc<MemoryTier>,
        session: Arc<PersistentTier>,
        origin: Arc<PersistentTier>,
        durable: Arc<AsyncTier>,
    ) -> Self {
        Self {
            memory,
            session,
            origin,
            durable,
            stats: Arc::new(CacheStats::new()),
            codec: CompressionCodec::with_config(config.compression.clone()),
            config,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start background maintenance; idempotent
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let janitor = Arc::new(Janitor::new(
            vec![
                self.memory.clone() as Arc<dyn TierStore>,
                self.session.clone() as Arc<dyn TierStore>,
                self.origin.clone() as Arc<dyn TierStore>,
                self.durable.clone() as Arc<dyn TierStore>,
            ],
            self.config.maintenance.janitor_interval,
            self.shutdown.clone(),
        ));
        let monitor = Arc::new(MemoryMonitor::new(
            self.memory.clone(),
            self.config.policy.clone(),
            self.stats.clone(),
            self.config.maintenance.monitor_interval,
            self.shutdown.clone(),
        ));

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(janitor.run()));
        tasks.push(tokio::spawn(monitor.run()));
        info!("cache service started");
    }

    /// Stop background maintenance and run one final expiry sweep
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }

        let removed = self.clear_expired().await;
        info!(removed, "cache service shut down");
    }

    fn store_for(&self, tier: CacheTier) -> Arc<dyn TierStore> {
        match tier {
            CacheTier::Memory => self.memory.clone(),
            CacheTier::SessionPersistent => self.session.clone(),
            CacheTier::OriginPersistent => self.origin.clone(),
            CacheTier::AsyncPersistent => self.durable.clone(),
        }
    }

    /// Store a value
    ///
    /// On capacity exhaustion the target tier is evicted once in victim
    /// order and the write retried; a second failure is surfaced.
    #[instrument(skip(self, value, options), fields(tier = %options.strategy))]
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let json = serde_json::to_value(value)?;
        let raw = serde_json::to_vec(&json)?;

        // Only string payloads go through the compressor; structured values
        // are left alone so tooling can read the persisted records
        let (payload, compressed) = if options.compress && json.is_string() {
            self.codec.compress(&raw)
        } else {
            (Bytes::from(raw), false)
        };

        let tier = options.strategy;
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        let tags: BTreeSet<String> = options.tags.into_iter().collect();
        let entry = CacheEntry::new(
            payload,
            EntryMetadata::new(tier, ttl, options.priority, 0, tags, compressed),
        );

        let store = self.store_for(tier);
        match store.set(key, entry.clone()).await {
            Ok(()) => {
                self.stats.record_set();
                Ok(())
            }
            Err(Error::CapacityExceeded { needed, .. }) => {
                self.evict_for(tier, key, needed).await;
                store.set(key, entry).await?;
                self.stats.record_set();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a value; `None` on miss, expiry, or any tier-level failure
    pub async fn get(&self, key: &str, options: GetOptions) -> Option<Value> {
        let tiers: Vec<CacheTier> = match options.strategy {
            Some(tier) => vec![tier],
            None => {
                let mut tiers = CacheTier::FALLBACK_ORDER.to_vec();
                tiers.extend(options.fallback_tiers);
                tiers
            }
        };

        for tier in tiers {
            let store = self.store_for(tier);
            match store.get(key).await {
                Ok(Some(entry)) => match self.decode(&entry) {
                    Ok(value) => {
                        self.stats.record_hit();
                        return Some(value);
                    }
                    Err(e) => {
                        debug!(key, tier = %tier, error = %e, "dropping undecodable entry");
                        let _ = store.delete(key).await;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    debug!(key, tier = %tier, error = %e, "tier read failed, treating as miss");
                }
            }
        }

        self.stats.record_miss();
        None
    }

    /// Look up a value and deserialize it into `T`
    ///
    /// A stored value of the wrong shape is a miss, not an error.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str, options: GetOptions) -> Option<T> {
        let value = self.get(key, options).await?;
        serde_json::from_value(value).ok()
    }

    /// Remove a key from one tier, or from all tiers when `None`
    ///
    /// Absent keys are a no-op.
    pub async fn delete(&self, key: &str, tier: Option<CacheTier>) {
        let tiers: Vec<CacheTier> = match tier {
            Some(t) => vec![t],
            None => CacheTier::FALLBACK_ORDER.to_vec(),
        };

        let mut removed = false;
        for tier in tiers {
            match self.store_for(tier).delete(key).await {
                Ok(true) => removed = true,
                Ok(false) => {}
                Err(e) => debug!(key, tier = %tier, error = %e, "tier delete failed"),
            }
        }

        if removed {
            self.stats.record_delete();
        }
    }

    /// Remove every entry carrying any of the given tags
    ///
    /// Covers the memory and synchronous persistent tiers. The async tier
    /// is excluded: a full metadata scan there is too costly for a
    /// best-effort invalidation path, and its entries age out via TTL.
    pub async fn clear_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        if tags.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for tier in [
            CacheTier::Memory,
            CacheTier::SessionPersistent,
            CacheTier::OriginPersistent,
        ] {
            let store = self.store_for(tier);
            for (key, meta) in store.scan().await {
                if tags.iter().any(|t| meta.tags.contains(t.as_ref()))
                    && store.delete(&key).await.unwrap_or(false)
                {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed, "cleared entries by tag");
        }
        removed
    }

    /// Remove expired entries from every tier
    pub async fn clear_expired(&self) -> usize {
        let now = now_millis();
        let mut removed = 0;
        for tier in CacheTier::FALLBACK_ORDER {
            removed += self.store_for(tier).remove_expired(now).await;
        }
        removed
    }

    /// Empty every tier and reset the statistics counters
    pub async fn clear_all(&self) {
        for tier in CacheTier::FALLBACK_ORDER {
            if let Err(e) = self.store_for(tier).clear().await {
                warn!(tier = %tier, error = %e, "failed to clear tier");
            }
        }
        self.stats.reset();
    }

    /// Snapshot counters plus current tier occupancy
    pub async fn stats(&self) -> StatsSnapshot {
        let usage = MemoryUsage::new(self.memory.used_bytes().await, self.memory.capacity());
        let counts = TierCounts {
            memory: self.memory.len().await,
            session_persistent: self.session.len().await,
            origin_persistent: self.origin.len().await,
            async_persistent: self.durable.len().await,
        };
        self.stats.snapshot(usage, counts)
    }

    /// Build a diagnostic export of the memory tier and counters
    pub async fn export(&self) -> Result<CacheExport> {
        let stats = self.stats().await;

        let mut memory_entries = Vec::new();
        for (key, entry) in self.memory.dump() {
            match self.decode(&entry) {
                Ok(value) => memory_entries.push(ExportedEntry {
                    key,
                    value,
                    expiry: entry.metadata.expiry,
                    priority: entry.metadata.priority,
                    tags: entry.metadata.tags.iter().cloned().collect(),
                }),
                Err(e) => debug!(key, error = %e, "skipping undecodable entry in export"),
            }
        }

        let exported_at = Utc::now();
        Ok(CacheExport {
            filename: format!("cache_export_{}.json", exported_at.timestamp()),
            exported_at,
            stats,
            memory_entries,
        })
    }

    /// React to a host lifecycle signal
    pub async fn on_lifecycle(&self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Offline => {
                info!("host went offline; local tiers keep serving");
            }
            LifecycleSignal::Online => {
                let removed = self.clear_expired().await;
                info!(removed, "host back online; swept expired entries");
            }
            LifecycleSignal::Teardown => {
                self.shutdown().await;
            }
        }
    }

    fn decode(&self, entry: &CacheEntry) -> Result<Value> {
        let raw = self
            .codec
            .decompress(&entry.payload, entry.metadata.compressed)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Evict from one tier in victim order
    ///
    /// The memory tier frees exactly the bytes the pending write needs,
    /// crediting what an overwrite of `key` would release; quota-bounded
    /// tiers have no byte-level signal, so they shed a fixed fraction of
    /// entries instead. The key being written is never a victim.
    async fn evict_for(&self, tier: CacheTier, key: &str, incoming: u64) {
        let store = self.store_for(tier);
        let now = now_millis();
        let candidates: Vec<VictimCandidate> = store
            .scan()
            .await
            .into_iter()
            .map(|(key, meta)| VictimCandidate::from_snapshot(key, &meta, now))
            .collect();
        let existing = candidates
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.size)
            .unwrap_or(0);
        let victims = EvictionPolicy::order_victims(
            candidates.into_iter().filter(|c| c.key != key).collect(),
        );

        let mut evicted = 0u64;
        match tier {
            CacheTier::Memory => {
                let used = store.used_bytes().await;
                let to_free = (used.saturating_sub(existing) + incoming)
                    .saturating_sub(store.capacity());
                let mut freed = 0u64;
                for victim in victims {
                    if freed >= to_free {
                        break;
                    }
                    if store.delete(&victim.key).await.unwrap_or(false) {
                        freed += victim.size;
                        evicted += 1;
                    }
                }
            }
            _ => {
                let count = self.config.policy.fraction_count(victims.len());
                for victim in victims.into_iter().take(count) {
                    if store.delete(&victim.key).await.unwrap_or(false) {
                        evicted += 1;
                    }
                }
            }
        }

        if evicted > 0 {
            self.stats.record_evictions(evicted);
            debug!(tier = %tier, evicted, "evicted to make room");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn small_service(memory_capacity: u64) -> CacheService {
        CacheService::new(CacheConfig {
            memory_capacity,
            ..CacheConfig::default()
        })
    }

    fn to(tier: CacheTier) -> SetOptions {
        SetOptions {
            strategy: tier,
            ..SetOptions::default()
        }
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = CacheService::new(CacheConfig::default());
        cache
            .set("profile:42", &serde_json::json!({"name": "Ana"}), SetOptions::default())
            .await
            .unwrap();

        let got = cache.get("profile:42", GetOptions::default()).await.unwrap();
        assert_eq!(got["name"], "Ana");

        let snapshot = cache.stats().await;
        assert_eq!(snapshot.sets, 1);
        assert_eq!(snapshot.hits, 1);
    }

    #[tokio::test]
    async fn test_typed_get() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Profile {
            name: String,
        }

        let cache = CacheService::new(CacheConfig::default());
        let profile = Profile { name: "Ana".into() };
        cache.set("p", &profile, SetOptions::default()).await.unwrap();

        let got: Profile = cache.get_as("p", GetOptions::default()).await.unwrap();
        assert_eq!(got, profile);

        // Wrong shape is a miss, not an error
        let wrong: Option<Vec<u32>> = cache.get_as("p", GetOptions::default()).await;
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn test_tiers_are_isolated_namespaces() {
        let cache = CacheService::new(CacheConfig::default());
        cache.set("k", &"mem", to(CacheTier::Memory)).await.unwrap();
        cache
            .set("k", &"origin", to(CacheTier::OriginPersistent))
            .await
            .unwrap();

        let scoped = GetOptions {
            strategy: Some(CacheTier::OriginPersistent),
            ..GetOptions::default()
        };
        assert_eq!(cache.get("k", scoped).await.unwrap(), "origin");
        // Unscoped hits the fastest tier first
        assert_eq!(cache.get("k", GetOptions::default()).await.unwrap(), "mem");
    }

    #[tokio::test]
    async fn test_fallback_search_finds_slow_tier() {
        let cache = CacheService::new(CacheConfig::default());
        cache
            .set("only-async", &1, to(CacheTier::AsyncPersistent))
            .await
            .unwrap();

        assert_eq!(cache.get("only-async", GetOptions::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scoped_miss_does_not_fall_through() {
        let cache = CacheService::new(CacheConfig::default());
        cache.set("k", &1, to(CacheTier::Memory)).await.unwrap();

        let scoped = GetOptions {
            strategy: Some(CacheTier::SessionPersistent),
            ..GetOptions::default()
        };
        assert!(cache.get("k", scoped).await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_scoped_miss_ignores_fallback_tiers() {
        let cache = CacheService::new(CacheConfig::default());
        cache
            .set("k", &1, to(CacheTier::OriginPersistent))
            .await
            .unwrap();

        // A scoped read answers from that tier alone, even when the caller
        // also supplies fallback tiers that do hold the key
        let scoped = GetOptions {
            strategy: Some(CacheTier::Memory),
            fallback_tiers: vec![CacheTier::OriginPersistent],
        };
        assert!(cache.get("k", scoped).await.is_none());
        assert_eq!(cache.stats().await.misses, 1);

        // Unscoped still finds it
        assert_eq!(cache.get("k", GetOptions::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_and_retries() {
        let cache = small_service(120);
        // 50-byte payloads: two fit, the third forces an eviction
        let blob = "x".repeat(48);
        cache.set("a", &blob, SetOptions::default()).await.unwrap();
        cache.set("b", &blob, SetOptions::default()).await.unwrap();
        cache.set("c", &blob, SetOptions::default()).await.unwrap();

        let snapshot = cache.stats().await;
        assert_eq!(snapshot.sets, 3);
        assert!(snapshot.evictions > 0);
        assert!(cache.get("c", GetOptions::default()).await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_credits_existing_bytes() {
        let cache = small_service(150);
        // Three 50-byte entries fill the tier exactly
        let blob = "x".repeat(48);
        cache.set("a", &blob, SetOptions::default()).await.unwrap();
        cache.set("b", &blob, SetOptions::default()).await.unwrap();
        cache.set("k", &blob, SetOptions::default()).await.unwrap();

        // Replacing "k" with 52 bytes only needs 2 bytes beyond what the
        // overwrite itself releases, so a single eviction must suffice
        let bigger = "y".repeat(50);
        cache.set("k", &bigger, SetOptions::default()).await.unwrap();

        let snapshot = cache.stats().await;
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.cache_size.memory, 2);
        assert_eq!(cache.get("k", GetOptions::default()).await.unwrap(), bigger);
    }

    #[tokio::test]
    async fn test_oversized_write_is_an_error() {
        let cache = small_service(64);
        let blob = "x".repeat(200);

        let err = cache.set("big", &blob, SetOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn test_compressed_string_roundtrip() {
        let cache = CacheService::new(CacheConfig::default());
        let long = "repetitive repetitive repetitive ".repeat(20);

        let opts = SetOptions {
            compress: true,
            ..SetOptions::default()
        };
        cache.set("long", &long, opts).await.unwrap();

        assert_eq!(cache.get("long", GetOptions::default()).await.unwrap(), long);
    }

    #[tokio::test]
    async fn test_clear_by_tags() {
        let cache = CacheService::new(CacheConfig::default());
        let tagged = SetOptions {
            tags: vec!["appointments".into()],
            ..SetOptions::default()
        };
        cache.set("appt:1", &1, tagged.clone()).await.unwrap();
        cache
            .set(
                "appt:2",
                &2,
                SetOptions {
                    strategy: CacheTier::SessionPersistent,
                    ..tagged.clone()
                },
            )
            .await
            .unwrap();
        cache.set("other", &3, SetOptions::default()).await.unwrap();

        let removed = cache.clear_by_tags(&["appointments"]).await;
        assert_eq!(removed, 2);
        assert!(cache.get("appt:1", GetOptions::default()).await.is_none());
        assert!(cache.get("other", GetOptions::default()).await.is_some());
    }

    #[tokio::test]
    async fn test_delete_scoped_and_unscoped() {
        let cache = CacheService::new(CacheConfig::default());
        cache.set("k", &1, to(CacheTier::Memory)).await.unwrap();
        cache.set("k", &2, to(CacheTier::OriginPersistent)).await.unwrap();

        cache.delete("k", Some(CacheTier::Memory)).await;
        assert_eq!(cache.get("k", GetOptions::default()).await.unwrap(), 2);

        cache.delete("k", None).await;
        assert!(cache.get("k", GetOptions::default()).await.is_none());

        // Deleting an absent key is a quiet no-op
        cache.delete("k", None).await;
        assert_eq!(cache.stats().await.deletes, 2);
    }

    #[tokio::test]
    async fn test_clear_all_resets_everything() {
        let cache = CacheService::new(CacheConfig::default());
        for tier in CacheTier::FALLBACK_ORDER {
            cache.set("k", &1, to(tier)).await.unwrap();
        }
        cache.get("k", GetOptions::default()).await;

        cache.clear_all().await;

        let snapshot = cache.stats().await;
        assert_eq!(snapshot.cache_size.total(), 0);
        assert_eq!(snapshot.hits, 0);
        assert_eq!(snapshot.sets, 0);
        assert_eq!(snapshot.memory_usage.current, 0);
    }

    #[tokio::test]
    async fn test_export_contains_memory_entries() {
        let cache = CacheService::new(CacheConfig::default());
        cache
            .set("profile:42", &serde_json::json!({"name": "Ana"}), SetOptions::default())
            .await
            .unwrap();
        cache
            .set("elsewhere", &1, to(CacheTier::SessionPersistent))
            .await
            .unwrap();

        let export = cache.export().await.unwrap();
        assert!(export.filename.starts_with("cache_export_"));
        assert!(export.filename.ends_with(".json"));
        assert_eq!(export.memory_entries.len(), 1);
        assert_eq!(export.memory_entries[0].key, "profile:42");
        assert_eq!(export.memory_entries[0].value["name"], "Ana");
        assert_eq!(export.stats.sets, 2);
    }

    #[tokio::test]
    async fn test_export_write_to_disk() {
        let cache = CacheService::new(CacheConfig::default());
        cache.set("k", &1, SetOptions::default()).await.unwrap();

        let dir = std::env::temp_dir();
        let export = cache.export().await.unwrap();
        let path = export.write_to(&dir).await.unwrap();

        let raw = tokio::fs::read(&path).await.unwrap();
        let parsed: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed["memory_entries"][0]["key"], "k");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_init_is_idempotent_and_shutdown_sweeps() {
        let cache = CacheService::new(CacheConfig::default());
        cache.init();
        cache.init();
        assert_eq!(cache.tasks.lock().len(), 2);

        cache
            .set(
                "stale",
                &1,
                SetOptions {
                    ttl: Some(Duration::from_millis(1)),
                    ..SetOptions::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        cache.shutdown().await;
        assert_eq!(cache.stats().await.cache_size.memory, 0);
    }

    #[tokio::test]
    async fn test_lifecycle_online_sweeps() {
        let cache = CacheService::new(CacheConfig::default());
        cache
            .set(
                "stale",
                &1,
                SetOptions {
                    ttl: Some(Duration::from_millis(1)),
                    strategy: CacheTier::OriginPersistent,
                    ..SetOptions::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        cache.on_lifecycle(LifecycleSignal::Online).await;
        assert_eq!(cache.stats().await.cache_size.origin_persistent, 0);
    }
}

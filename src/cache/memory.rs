//! Memory Tier - Volatile In-Process Store
//!
//! Process-local key→entry map with explicit byte-size accounting. The only
//! tier that tracks recency: a hit bumps `access_count`/`last_accessed`
//! through the entry's atomics. Expired entries are dropped lazily on read;
//! the janitor catches the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::entry::{now_millis, CacheEntry, MetadataSnapshot};
use super::tier::{CacheTier, TierStore};
use super::DEFAULT_MEMORY_CAPACITY;
use crate::error::{Error, Result};

/// Memory tier configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum capacity in bytes
    pub capacity: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

/// Memory tier - volatile in-process store
pub struct MemoryTier {
    /// Entry storage
    map: RwLock<HashMap<String, CacheEntry>>,
    /// Configuration
    config: MemoryConfig,
    /// Current size in bytes
    used: AtomicU64,
}

impl MemoryTier {
    /// Create a new memory tier with default configuration
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Create a new memory tier with custom configuration
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            config,
            used: AtomicU64::new(0),
        }
    }

    /// Blocking adapter for callers that truly need synchronous access.
    ///
    /// Same semantics as the async `get`: drops expired entries, records
    /// recency on a hit.
    pub fn get_blocking(&self, key: &str) -> Option<CacheEntry> {
        let now = now_millis();

        {
            let map = self.map.read();
            match map.get(key) {
                Some(entry) if !entry.metadata.is_expired_at(now) => {
                    entry.metadata.record_access();
                    return Some(entry.clone());
                }
                Some(_) => {} // expired, drop below
                None => return None,
            }
        }

        let mut map = self.map.write();
        if let Some(entry) = map.get(key) {
            if entry.metadata.is_expired_at(now) {
                let size = entry.metadata.size;
                map.remove(key);
                self.used.fetch_sub(size, Ordering::Relaxed);
            }
        }
        None
    }

    fn set_sync(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let size = entry.size();
        let mut map = self.map.write();

        let existing = map.get(key).map(|e| e.metadata.size).unwrap_or(0);
        let used = self.used.load(Ordering::Relaxed);
        let projected = used - existing + size;

        if projected > self.config.capacity {
            return Err(Error::CapacityExceeded {
                tier: CacheTier::Memory,
                needed: size,
                available: self.config.capacity.saturating_sub(used - existing),
            });
        }

        map.insert(key.to_string(), entry);
        self.used.store(projected, Ordering::Relaxed);
        Ok(())
    }

    fn delete_sync(&self, key: &str) -> bool {
        let mut map = self.map.write();
        if let Some(entry) = map.remove(key) {
            self.used.fetch_sub(entry.metadata.size, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Full dump of live entries, for the export artifact
    pub fn dump(&self) -> Vec<(String, CacheEntry)> {
        let now = now_millis();
        let map = self.map.read();
        map.iter()
            .filter(|(_, e)| !e.metadata.is_expired_at(now))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TierStore for MemoryTier {
    fn tier(&self) -> CacheTier {
        CacheTier::Memory
    }

    fn capacity(&self) -> u64 {
        self.config.capacity
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.get_blocking(key))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.set_sync(key, entry)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.delete_sync(key))
    }

    async fn clear(&self) -> Result<()> {
        let mut map = self.map.write();
        map.clear();
        self.used.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.map.read().len()
    }

    async fn used_bytes(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    async fn scan(&self) -> Vec<(String, MetadataSnapshot)> {
        let map = self.map.read();
        map.iter()
            .map(|(k, e)| (k.clone(), e.metadata.snapshot()))
            .collect()
    }

    async fn remove_expired(&self, now: u64) -> usize {
        let mut removed = 0;
        let mut map = self.map.write();
        map.retain(|_, e| {
            if e.metadata.is_expired_at(now) {
                self.used.fetch_sub(e.metadata.size, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::{EntryMetadata, Priority};
    use bytes::Bytes;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn make_entry(data: &[u8], ttl: Duration) -> CacheEntry {
        CacheEntry::new(
            Bytes::copy_from_slice(data),
            EntryMetadata::new(
                CacheTier::Memory,
                ttl,
                Priority::Normal,
                0,
                BTreeSet::new(),
                false,
            ),
        )
    }

    #[tokio::test]
    async fn test_set_get() {
        let tier = MemoryTier::new();
        tier.set("k", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();

        let got = tier.get("k").await.unwrap().unwrap();
        assert_eq!(got.payload.as_ref(), b"\"v\"");
        assert_eq!(tier.len().await, 1);
        assert_eq!(tier.used_bytes().await, 3);
    }

    #[tokio::test]
    async fn test_miss_is_none() {
        let tier = MemoryTier::new();
        assert!(tier.get("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hit_records_recency() {
        let tier = MemoryTier::new();
        tier.set("k", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();

        tier.get("k").await.unwrap();
        tier.get("k").await.unwrap();

        let got = tier.get("k").await.unwrap().unwrap();
        // Two prior hits plus the one that returned this clone
        assert_eq!(got.metadata.access_count(), 3);
    }

    #[tokio::test]
    async fn test_expired_entry_dropped_on_read() {
        let tier = MemoryTier::new();
        tier.set("k", make_entry(b"\"v\"", Duration::from_millis(5)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(tier.get("k").await.unwrap().is_none());
        assert_eq!(tier.len().await, 0);
        assert_eq!(tier.used_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_rejection() {
        let tier = MemoryTier::with_config(MemoryConfig { capacity: 10 });

        let err = tier
            .set("big", make_entry(&[b'x'; 32], Duration::from_secs(60)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::CapacityExceeded {
                tier: CacheTier::Memory,
                needed: 32,
                ..
            }
        ));
        assert_eq!(tier.len().await, 0);
    }

    #[tokio::test]
    async fn test_replace_updates_accounting() {
        let tier = MemoryTier::with_config(MemoryConfig { capacity: 100 });

        tier.set("k", make_entry(&[b'a'; 80], Duration::from_secs(60)))
            .await
            .unwrap();
        // Replacing frees the old 80 bytes first, so 90 fits
        tier.set("k", make_entry(&[b'b'; 90], Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(tier.used_bytes().await, 90);
        assert_eq!(tier.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let tier = MemoryTier::new();
        tier.set("k", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(tier.delete("k").await.unwrap());
        assert!(!tier.delete("k").await.unwrap());
        assert_eq!(tier.used_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_remove_expired() {
        let tier = MemoryTier::new();
        tier.set("live", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();
        tier.set("stale", make_entry(b"\"v\"", Duration::from_millis(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let removed = tier.remove_expired(now_millis()).await;
        assert_eq!(removed, 1);
        assert_eq!(tier.len().await, 1);
        assert!(tier.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let tier = MemoryTier::new();
        for i in 0..5 {
            tier.set(
                &format!("k{}", i),
                make_entry(b"\"v\"", Duration::from_secs(60)),
            )
            .await
            .unwrap();
        }

        tier.clear().await.unwrap();
        assert_eq!(tier.len().await, 0);
        assert_eq!(tier.used_bytes().await, 0);
    }

    #[test]
    fn test_blocking_adapter() {
        let tier = MemoryTier::new();
        tier.set_sync("k", make_entry(b"\"v\"", Duration::from_secs(60)))
            .unwrap();

        let got = tier.get_blocking("k").unwrap();
        assert_eq!(got.payload.as_ref(), b"\"v\"");
        assert!(tier.get_blocking("absent").is_none());
    }
}

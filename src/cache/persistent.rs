//! Persistent Tiers - Bounded Synchronous Stores
//!
//! Two independent tiers share this implementation: session scope (cleared
//! with the browsing session) and origin scope (survives restarts). Both
//! sit on a pluggable string key/value backend with a byte quota — the
//! stand-in for platform-bounded storage. Exact free-space accounting is
//! not available from such backends; the quota overflow signal is the only
//! capacity indicator, which is why eviction here removes a fixed fraction
//! of entries rather than counting freed bytes.
//!
//! Records are stored under a namespaced key (`tiercache:` + key) as the
//! JSON `{ value, metadata }` form of the entry, so cache data cannot
//! collide with unrelated data in the same store. These tiers do not track
//! recency; only the memory tier does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::entry::{now_millis, CacheEntry, MetadataSnapshot};
use super::tier::{CacheTier, TierStore};
use super::{DEFAULT_PERSISTENT_QUOTA, KEY_PREFIX};
use crate::error::{Error, Result};

/// Overflow signal from a `KvBackend` write
#[derive(Debug, Clone, Copy)]
pub struct QuotaExceeded {
    /// Bytes the rejected write needed
    pub needed: u64,
    /// Bytes still available under the quota
    pub available: u64,
}

/// Synchronous string key/value backend with a byte quota
pub trait KvBackend: Send + Sync {
    /// Read a stored value
    fn read(&self, key: &str) -> Option<String>;

    /// Write a value, signalling overflow when the quota would be exceeded
    fn write(&self, key: &str, value: &str) -> std::result::Result<(), QuotaExceeded>;

    /// Remove a value; absent keys are a no-op
    fn remove(&self, key: &str) -> bool;

    /// All stored keys
    fn keys(&self) -> Vec<String>;

    /// Remove every value
    fn clear(&self);

    /// Bytes currently stored (keys + values)
    fn used_bytes(&self) -> u64;

    /// Quota ceiling in bytes
    fn quota(&self) -> u64;
}

/// In-memory `KvBackend` with web-storage-style accounting
/// (key length + value length counted against the quota)
pub struct InMemoryKvBackend {
    map: RwLock<HashMap<String, String>>,
    used: AtomicU64,
    quota: u64,
}

impl InMemoryKvBackend {
    pub fn new(quota: u64) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            used: AtomicU64::new(0),
            quota,
        }
    }
}

impl Default for InMemoryKvBackend {
    fn default() -> Self {
        Self::new(DEFAULT_PERSISTENT_QUOTA)
    }
}

impl KvBackend for InMemoryKvBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.map.read().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> std::result::Result<(), QuotaExceeded> {
        let mut map = self.map.write();

        let incoming = (key.len() + value.len()) as u64;
        let existing = map
            .get(key)
            .map(|v| (key.len() + v.len()) as u64)
            .unwrap_or(0);
        let used = self.used.load(Ordering::Relaxed);
        let projected = used - existing + incoming;

        if projected > self.quota {
            return Err(QuotaExceeded {
                needed: incoming,
                available: self.quota.saturating_sub(used - existing),
            });
        }

        map.insert(key.to_string(), value.to_string());
        self.used.store(projected, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, key: &str) -> bool {
        let mut map = self.map.write();
        if let Some(value) = map.remove(key) {
            self.used
                .fetch_sub((key.len() + value.len()) as u64, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    fn keys(&self) -> Vec<String> {
        self.map.read().keys().cloned().collect()
    }

    fn clear(&self) {
        self.map.write().clear();
        self.used.store(0, Ordering::Relaxed);
    }

    fn used_bytes(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    fn quota(&self) -> u64 {
        self.quota
    }
}

/// Lifetime/visibility scope of a persistent tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistScope {
    /// Cleared when the session ends
    Session,
    /// Survives restarts, shared across sessions of the same origin
    Origin,
}

impl PersistScope {
    pub fn tier(&self) -> CacheTier {
        match self {
            PersistScope::Session => CacheTier::SessionPersistent,
            PersistScope::Origin => CacheTier::OriginPersistent,
        }
    }
}

/// Bounded synchronous persistent tier
pub struct PersistentTier {
    scope: PersistScope,
    backend: Box<dyn KvBackend>,
}

impl PersistentTier {
    pub fn new(scope: PersistScope, backend: Box<dyn KvBackend>) -> Self {
        Self { scope, backend }
    }

    /// Session-scoped tier on an in-memory backend
    pub fn session(quota: u64) -> Self {
        Self::new(
            PersistScope::Session,
            Box::new(InMemoryKvBackend::new(quota)),
        )
    }

    /// Origin-scoped tier on an in-memory backend
    pub fn origin(quota: u64) -> Self {
        Self::new(
            PersistScope::Origin,
            Box::new(InMemoryKvBackend::new(quota)),
        )
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    /// Parse a stored record, dropping it when corrupt
    fn load(&self, storage_key: &str) -> Option<CacheEntry> {
        let raw = self.backend.read(storage_key)?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(tier = %self.scope.tier(), key = storage_key, error = %e,
                       "dropping unreadable cache record");
                self.backend.remove(storage_key);
                None
            }
        }
    }

    fn cache_keys(&self) -> Vec<String> {
        self.backend
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .collect()
    }
}

#[async_trait]
impl TierStore for PersistentTier {
    fn tier(&self) -> CacheTier {
        self.scope.tier()
    }

    fn capacity(&self) -> u64 {
        self.backend.quota()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let skey = Self::storage_key(key);
        match self.load(&skey) {
            Some(entry) if entry.is_expired() => {
                self.backend.remove(&skey);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let record = serde_json::to_string(&entry)?;
        self.backend
            .write(&Self::storage_key(key), &record)
            .map_err(|q| Error::CapacityExceeded {
                tier: self.tier(),
                needed: q.needed,
                available: q.available,
            })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.backend.remove(&Self::storage_key(key)))
    }

    async fn clear(&self) -> Result<()> {
        // Only drop our namespaced records; the backing store may be shared
        for key in self.cache_keys() {
            self.backend.remove(&key);
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.cache_keys().len()
    }

    async fn used_bytes(&self) -> u64 {
        self.backend.used_bytes()
    }

    async fn scan(&self) -> Vec<(String, MetadataSnapshot)> {
        self.cache_keys()
            .into_iter()
            .filter_map(|skey| {
                let entry = self.load(&skey)?;
                let key = skey[KEY_PREFIX.len()..].to_string();
                Some((key, entry.metadata.snapshot()))
            })
            .collect()
    }

    async fn remove_expired(&self, now: u64) -> usize {
        let mut removed = 0;
        for skey in self.cache_keys() {
            if let Some(entry) = self.load(&skey) {
                if entry.metadata.is_expired_at(now) && self.backend.remove(&skey) {
                    removed += 1;
                }
            }
        }
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
                CacheTier::SessionPersistent,
                ttl,
                Priority::Normal,
                0,
                BTreeSet::new(),
                false,
            ),
        )
    }

    #[test]
    fn test_backend_quota_accounting() {
        let backend = InMemoryKvBackend::new(64);

        backend.write("a", "12345").unwrap();
        assert_eq!(backend.used_bytes(), 6);

        backend.write("a", "123").unwrap();
        assert_eq!(backend.used_bytes(), 4);

        assert!(backend.remove("a"));
        assert_eq!(backend.used_bytes(), 0);
        assert!(!backend.remove("a"));
    }

    #[test]
    fn test_backend_quota_overflow() {
        let backend = InMemoryKvBackend::new(16);
        backend.write("k", "0123456789").unwrap();

        let err = backend.write("other", "0123456789").unwrap_err();
        assert_eq!(err.needed, 15);
        assert_eq!(err.available, 5);
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let tier = PersistentTier::session(DEFAULT_PERSISTENT_QUOTA);
        tier.set("k", make_entry(b"{\"a\":1}", Duration::from_secs(60)))
            .await
            .unwrap();

        let got = tier.get("k").await.unwrap().unwrap();
        assert_eq!(got.payload.as_ref(), b"{\"a\":1}");
        assert_eq!(tier.len().await, 1);
    }

    #[tokio::test]
    async fn test_records_are_namespaced() {
        let backend = InMemoryKvBackend::default();
        // Unrelated data sharing the store
        backend.write("app_settings", "dark_mode").unwrap();

        let tier = PersistentTier::new(PersistScope::Origin, Box::new(backend));
        tier.set("k", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(tier.len().await, 1);
        tier.clear().await.unwrap();
        assert_eq!(tier.len().await, 0);
        // clear() must not touch the unrelated record
        assert!(tier.backend.read("app_settings").is_some());
    }

    #[tokio::test]
    async fn test_expired_dropped_on_read() {
        let tier = PersistentTier::origin(DEFAULT_PERSISTENT_QUOTA);
        tier.set("k", make_entry(b"\"v\"", Duration::from_millis(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tier.get("k").await.unwrap().is_none());
        assert_eq!(tier.len().await, 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_dropped() {
        let backend = InMemoryKvBackend::default();
        backend
            .write(&format!("{}bad", KEY_PREFIX), "not json")
            .unwrap();

        let tier = PersistentTier::new(PersistScope::Session, Box::new(backend));
        assert!(tier.get("bad").await.unwrap().is_none());
        assert_eq!(tier.len().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_error_carries_tier() {
        let tier = PersistentTier::session(32);
        let err = tier
            .set("k", make_entry(&[b'x'; 64], Duration::from_secs(60)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::CapacityExceeded {
                tier: CacheTier::SessionPersistent,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_remove_expired_scan() {
        let tier = PersistentTier::session(DEFAULT_PERSISTENT_QUOTA);
        tier.set("live", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();
        tier.set("stale", make_entry(b"\"v\"", Duration::from_millis(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(tier.remove_expired(now_millis()).await, 1);
        assert!(tier.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scan_strips_prefix() {
        let tier = PersistentTier::origin(DEFAULT_PERSISTENT_QUOTA);
        tier.set("profile:1", make_entry(b"\"v\"", Duration::from_secs(60)))
            .await
            .unwrap();

        let scanned = tier.scan().await;
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].0, "profile:1");
    }
}

//! Async Tier - Lazily-Opened Transactional Store
//!
//! The high-capacity tier. Operations suspend until the backing store
//! acknowledges; the store is opened on first use. If opening fails the
//! failure is logged once and the tier serves misses for the rest of the
//! session — there is no reconnect policy.
//!
//! Racing writes to the same key resolve last-write-wins; there is no
//! compare-and-swap. The in-memory backend keeps a secondary expiry index
//! so the janitor's sweep is a range scan instead of a full table walk.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::entry::{CacheEntry, MetadataSnapshot};
use super::tier::{CacheTier, TierStore};
use super::DEFAULT_DURABLE_CAPACITY;
use crate::error::{Error, Result};

/// Asynchronous transactional storage backend
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Open the store; called lazily before the first operation
    async fn open(&self) -> Result<()>;

    /// Get an entry
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Put an entry (last-write-wins on races)
    async fn put(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// Delete an entry; returns whether something was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry
    async fn clear(&self) -> Result<()>;

    /// Keys of entries with `expiry <= cutoff`, via the expiry index
    async fn expired_before(&self, cutoff: u64) -> Result<Vec<String>>;

    /// Number of stored entries
    async fn len(&self) -> usize;

    /// Bytes currently stored
    async fn used_bytes(&self) -> u64;

    /// Metadata snapshot of every entry
    async fn scan(&self) -> Vec<(String, MetadataSnapshot)>;
}

/// In-memory `DurableBackend` with an expiry-ordered secondary index
pub struct InMemoryDurableBackend {
    store: DashMap<String, CacheEntry>,
    /// expiry (epoch ms) -> keys expiring at that instant
    expiry_index: RwLock<BTreeMap<u64, BTreeSet<String>>>,
    used: AtomicU64,
    /// Simulate an unavailable store (tests)
    fail_open: AtomicBool,
}

impl InMemoryDurableBackend {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
            expiry_index: RwLock::new(BTreeMap::new()),
            used: AtomicU64::new(0),
            fail_open: AtomicBool::new(false),
        }
    }

    /// Backend whose `open` always fails, for exercising the miss-only path
    pub fn failing_open() -> Self {
        let backend = Self::new();
        backend.fail_open.store(true, Ordering::Relaxed);
        backend
    }

    fn index_remove(&self, expiry: u64, key: &str) {
        let mut index = self.expiry_index.write();
        if let Some(keys) = index.get_mut(&expiry) {
            keys.remove(key);
            if keys.is_empty() {
                index.remove(&expiry);
            }
        }
    }

    fn index_insert(&self, expiry: u64, key: String) {
        self.expiry_index.write().entry(expiry).or_default().insert(key);
    }
}

impl Default for InMemoryDurableBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableBackend for InMemoryDurableBackend {
    async fn open(&self) -> Result<()> {
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(Error::TierUnavailable {
                tier: CacheTier::AsyncPersistent,
                reason: "store refused to open".into(),
            });
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.store.get(key).map(|e| e.clone()))
    }

    async fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let size = entry.size();
        let expiry = entry.metadata.expiry;

        if let Some(old) = self.store.insert(key.to_string(), entry) {
            self.index_remove(old.metadata.expiry, key);
            self.used.fetch_sub(old.metadata.size, Ordering::Relaxed);
        }
        self.used.fetch_add(size, Ordering::Relaxed);
        self.index_insert(expiry, key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        if let Some((_, old)) = self.store.remove(key) {
            self.index_remove(old.metadata.expiry, key);
            self.used.fetch_sub(old.metadata.size, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear();
        self.expiry_index.write().clear();
        self.used.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn expired_before(&self, cutoff: u64) -> Result<Vec<String>> {
        let index = self.expiry_index.read();
        Ok(index
            .range(..=cutoff)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect())
    }

    async fn len(&self) -> usize {
        self.store.len()
    }

    async fn used_bytes(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    async fn scan(&self) -> Vec<(String, MetadataSnapshot)> {
        self.store
            .iter()
            .map(|e| (e.key().clone(), e.value().metadata.snapshot()))
            .collect()
    }
}

/// Asynchronous persistent tier
pub struct AsyncTier {
    backend: Arc<dyn DurableBackend>,
    capacity: u64,
    /// Resolved on first use; `false` pins the tier to miss-only
    available: OnceCell<bool>,
}

impl AsyncTier {
    pub fn new(backend: Arc<dyn DurableBackend>, capacity: u64) -> Self {
        Self {
            backend,
            capacity,
            available: OnceCell::new(),
        }
    }

    /// Tier on an in-memory backend with the default capacity
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryDurableBackend::new()), DEFAULT_DURABLE_CAPACITY)
    }

    /// Lazily open the backend once; a failed open pins the tier miss-only
    async fn ensure_open(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                match self.backend.open().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "async tier failed to open; serving misses for this session");
                        false
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl TierStore for AsyncTier {
    fn tier(&self) -> CacheTier {
        CacheTier::AsyncPersistent
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        if !self.ensure_open().await {
            return Ok(None);
        }

        match self.backend.get(key).await? {
            Some(entry) if entry.is_expired() => {
                self.backend.delete(key).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        if !self.ensure_open().await {
            return Err(Error::TierUnavailable {
                tier: CacheTier::AsyncPersistent,
                reason: "store failed to open".into(),
            });
        }

        let size = entry.size();
        let used = self.backend.used_bytes().await;
        if used + size > self.capacity {
            return Err(Error::CapacityExceeded {
                tier: CacheTier::AsyncPersistent,
                needed: size,
                available: self.capacity.saturating_sub(used),
            });
        }

        self.backend.put(key, entry).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        if !self.ensure_open().await {
            return Ok(false);
        }
        self.backend.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        if !self.ensure_open().await {
            return Ok(());
        }
        self.backend.clear().await
    }

    async fn len(&self) -> usize {
        if !self.ensure_open().await {
            return 0;
        }
        self.backend.len().await
    }

    async fn used_bytes(&self) -> u64 {
        if !self.ensure_open().await {
            return 0;
        }
        self.backend.used_bytes().await
    }

    async fn scan(&self) -> Vec<(String, MetadataSnapshot)> {
        if !self.ensure_open().await {
            return Vec::new();
        }
        self.backend.scan().await
    }

    async fn remove_expired(&self, now: u64) -> usize {
        if !self.ensure_open().await {
            return 0;
        }

        // Range scan over the expiry index, then targeted deletes
        let stale = match self.backend.expired_before(now).await {
            Ok(keys) => keys,
            Err(e) => {
                debug!(error = %e, "expiry range scan failed");
                return 0;
            }
        };

        let mut removed = 0;
        for key in stale {
            match self.backend.delete(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => debug!(key, error = %e, "failed to delete expired entry"),
            }
        }
        removed
    }
}

// =============================================================================
// Tests
// =============================================================================

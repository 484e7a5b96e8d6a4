//! Tiered Cache Service
//!
//! Client-side caching for the booking front end, unifying four storage
//! backends behind a single facade.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          CacheService                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Memory        │ Session        │ Origin         │ Async            │
//! │  ┌──────────┐  │ ┌───────────┐  │ ┌───────────┐  │ ┌─────────────┐  │
//! │  │ HashMap  │  │ │ KvBackend │  │ │ KvBackend │  │ │ Durable     │  │
//! │  │ (bytes-  │  │ │ (session  │  │ │ (origin   │  │ │ Backend     │  │
//! │  │ counted) │  │ │  scope)   │  │ │  scope)   │  │ │ (lazy open) │  │
//! │  └──────────┘  │ └───────────┘  │ └───────────┘  │ └─────────────┘  │
//! │       │        │       │        │       │        │        │         │
//! │       └────────┴───────┴────────┴───────┴────────┴────────┘         │
//! │                              │                                      │
//! │            TTL · tags · priority+LRU eviction · stats               │
//! └─────────────────────────────────────────────────────────────────────┘
//!          ▲                                   ▲
//!      Janitor (expiry sweep)        MemoryMonitor (reactive eviction)
//! ```
//!
//! # Design Principles
//!
//! - Every tier call is modeled as an operation that may suspend, even for
//!   the memory tier, so the orchestrator is written once against a single
//!   asynchronous contract.
//! - Best-effort: no cache-internal failure interrupts the caller. Reads
//!   never fail, they miss. Only `set()` surfaces capacity/serialization
//!   errors, and only after an eviction-and-retry cycle.
//! - Tiers are isolated namespaces: the same key may exist in several tiers
//!   with unrelated values.

pub mod compression;
mod durable;
mod entry;
mod maintenance;
mod memory;
mod persistent;
mod policy;
mod service;
mod stats;
mod tier;

pub use compression::{CompressionCodec, CompressionConfig, Compressor};
pub use durable::{AsyncTier, DurableBackend, InMemoryDurableBackend};
pub use entry::{now_millis, CacheEntry, EntryMetadata, MetadataSnapshot, Priority};
pub use maintenance::{Janitor, LifecycleSignal, MaintenanceConfig, MemoryMonitor};
pub use memory::{MemoryConfig, MemoryTier};
pub use persistent::{InMemoryKvBackend, KvBackend, PersistScope, PersistentTier, QuotaExceeded};
pub use policy::{EvictionPolicy, VictimCandidate};
pub use service::{CacheConfig, CacheExport, CacheService, ExportedEntry, GetOptions, SetOptions};
pub use stats::{CacheStats, MemoryUsage, StatsSnapshot, TierCounts};
pub use tier::{CacheTier, TierStore};

use std::time::Duration;

/// Prefix for keys in persistent backing stores, so cache records cannot
/// collide with unrelated data sharing the same store
pub const KEY_PREFIX: &str = "tiercache:";

/// Default entry TTL (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default memory tier capacity (5MB)
pub const DEFAULT_MEMORY_CAPACITY: u64 = 5 * 1024 * 1024;

/// Default quota for each synchronous persistent tier (5MB)
pub const DEFAULT_PERSISTENT_QUOTA: u64 = 5 * 1024 * 1024;

/// Default capacity for the asynchronous persistent tier (50MB)
pub const DEFAULT_DURABLE_CAPACITY: u64 = 50 * 1024 * 1024;

// =============================================================================
// Tests
// =============================================================================

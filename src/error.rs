//! Error types for the tiered cache service

use thiserror::Error;

use crate::cache::CacheTier;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tiered cache
///
/// The governing policy is best-effort: read-path failures are swallowed by
/// the orchestrator and reported as misses. Only `set()` surfaces errors to
/// the caller, and only after one eviction-and-retry cycle.
#[derive(Error, Debug)]
pub enum Error {
    /// A tier write would exceed the tier's capacity
    #[error("capacity exceeded on {tier}: need {needed} bytes, {available} available")]
    CapacityExceeded {
        tier: CacheTier,
        needed: u64,
        available: u64,
    },

    /// Value could not be serialized or deserialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tier backend is unavailable (e.g. the async store failed to open)
    #[error("tier {tier} unavailable: {reason}")]
    TierUnavailable { tier: CacheTier, reason: String },

    /// Compression failed
    #[error("compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    /// I/O error (export artifact writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Payload Compression Support
//!
//! LZ4 compression for string payloads with automatic fallback to
//! uncompressed when compression fails or does not help. A placeholder for
//! a real content-aware codec; reversibility is guaranteed, shrinkage is
//! not.

use bytes::Bytes;
use tracing::warn;

use crate::error::{Error, Result};

/// Configuration for compression
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Minimum payload size to attempt compression
    pub min_size_bytes: u64,
    /// Compression level (LZ4 high-compression mode)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: 128,
            level: 4,
        }
    }
}

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm name
    fn name(&self) -> &'static str;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn name(&self) -> &'static str {
        "none"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// LZ4 compressor
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for Lz4Compressor {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "lz4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "lz4".into(),
            reason: e.to_string(),
        })
    }
}

/// Codec facade used by the cache service
///
/// `compress` returns the payload to store plus whether it was actually
/// compressed; callers persist that flag in the entry metadata and hand it
/// back to `decompress` on the way out.
pub struct CompressionCodec {
    config: CompressionConfig,
    lz4: Lz4Compressor,
}

impl CompressionCodec {
    pub fn new() -> Self {
        Self::with_config(CompressionConfig::default())
    }

    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            config,
        }
    }

    /// Compress a serialized payload, falling back to the original bytes
    /// when the payload is small, incompressible, or compression fails
    pub fn compress(&self, data: &[u8]) -> (Bytes, bool) {
        if (data.len() as u64) < self.config.min_size_bytes {
            return (Bytes::copy_from_slice(data), false);
        }

        match self.lz4.compress(data) {
            Ok(compressed) if compressed.len() < data.len() => (Bytes::from(compressed), true),
            Ok(_) => (Bytes::copy_from_slice(data), false),
            Err(e) => {
                warn!(error = %e, "compression failed, storing uncompressed");
                (Bytes::copy_from_slice(data), false)
            }
        }
    }

    /// Decompress a payload previously returned by `compress`
    pub fn decompress(&self, data: &[u8], compressed: bool) -> Result<Bytes> {
        if !compressed {
            return Ok(Bytes::copy_from_slice(data));
        }
        Ok(Bytes::from(self.lz4.decompress(data)?))
    }
}

impl Default for CompressionCodec {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

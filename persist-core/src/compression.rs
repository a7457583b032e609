/*!
Compression adapters for binary state files.

Compression is applied on top of a binary codec through
[`CompressedCodec`](crate::codec::CompressedCodec). The default implementation
uses gzip, but any adapter can be plugged in.
*/

use std::io::{Read, Write};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use crate::{PersistError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Default cap on the decompressed size of one state file (256 MiB).
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024 * 1024;

/// Compression abstraction for encoded state
pub trait CompressionAdapter: Send + Sync {
    /// Compress the input data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the input data
    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of the compression algorithm
    fn algorithm_name(&self) -> &str;
}

/// Gzip compression adapter
///
/// # Example
/// ```rust
/// use persist_core::compression::{CompressionAdapter, GzipCompressor};
///
/// let compressor = GzipCompressor::new();
/// let data = b"some encoded state to compress";
/// let compressed = compressor.compress(data)?;
/// let decompressed = compressor.decompress(&compressed)?;
/// assert_eq!(data, &decompressed[..]);
/// # Ok::<(), persist_core::PersistError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    compression_level: Compression,
    max_decompressed_size: u64,
}

impl GzipCompressor {
    /// Create a new gzip compressor with default compression level (6)
    pub fn new() -> Self {
        Self::with_level(Compression::default().level())
    }

    /// Create a new gzip compressor with the specified compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            compression_level: Compression::new(level),
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
        }
    }

    /// Refuse to inflate state files beyond `bytes`.
    pub fn max_decompressed_size(mut self, bytes: u64) -> Self {
        self.max_decompressed_size = bytes;
        self
    }

    pub fn fast() -> Self {
        Self::with_level(1)
    }

    pub fn max() -> Self {
        Self::with_level(9)
    }

    /// Whether `data` starts with the gzip header.
    pub fn is_gzip(data: &[u8]) -> bool {
        data.starts_with(&GZIP_MAGIC)
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.compression_level);

        encoder.write_all(data)
            .map_err(|e| PersistError::compression(format!("Failed to write data for compression: {e}")))?;

        encoder.finish()
            .map_err(|e| PersistError::compression(format!("Failed to finish compression: {e}")))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        if !Self::is_gzip(compressed_data) {
            return Err(PersistError::invalid_format(
                "state file is not gzip-compressed",
            ));
        }

        // One byte past the cap is enough to tell an oversized stream apart.
        let mut decoder = GzDecoder::new(compressed_data).take(self.max_decompressed_size.saturating_add(1));
        let mut decompressed = Vec::new();

        decoder.read_to_end(&mut decompressed)
            .map_err(|e| PersistError::compression(format!("Failed to decompress data: {e}")))?;

        if decompressed.len() as u64 > self.max_decompressed_size {
            return Err(PersistError::compression(format!(
                "Decompressed state exceeds {} bytes",
                self.max_decompressed_size
            )));
        }

        Ok(decompressed)
    }

    fn algorithm_name(&self) -> &str {
        "gzip"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_shrinks_repetitive_state() {
        let compressor = GzipCompressor::new();
        let original_data = b"Theme=dark;FontSize=12;RecentFiles=a.txt,b.txt;".repeat(20);

        let compressed = compressor.compress(&original_data).unwrap();
        assert!(compressed.len() < original_data.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(original_data, decompressed);
    }

    #[test]
    fn test_gzip_levels_agree() {
        let data = b"level test data".repeat(10);
        for compressor in [GzipCompressor::fast(), GzipCompressor::new(), GzipCompressor::max()] {
            let compressed = compressor.compress(&data).unwrap();
            assert_eq!(compressor.decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn test_decompressed_size_is_capped() {
        let data = vec![0u8; 64 * 1024];
        let compressed = GzipCompressor::new().compress(&data).unwrap();
        assert!(compressed.len() < 1024);

        let capped = GzipCompressor::new().max_decompressed_size(16 * 1024);
        let result = capped.decompress(&compressed);
        assert!(matches!(result, Err(PersistError::Compression(ref msg)) if msg.contains("exceeds")));

        let exact = GzipCompressor::new().max_decompressed_size(data.len() as u64);
        assert_eq!(exact.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_gzip_rejects_plain_state() {
        let compressor = GzipCompressor::new();
        let result = compressor.decompress(br#"{"Theme": "dark"}"#);
        assert!(matches!(result, Err(PersistError::InvalidFormat(_))));
    }

    #[test]
    fn test_gzip_rejects_truncated_stream() {
        let compressor = GzipCompressor::new();
        let compressed = compressor.compress(&b"truncated state".repeat(8)).unwrap();
        assert!(GzipCompressor::is_gzip(&compressed));

        let result = compressor.decompress(&compressed[..compressed.len() / 2]);
        assert!(matches!(result, Err(PersistError::Compression(_))));
    }
}

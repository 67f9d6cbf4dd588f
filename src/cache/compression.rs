//! Value Compression Module
//!
//! zlib compression with a leading marker so reads can tell compressed
//! payloads from raw ones without tracking which keys were compressed.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{CacheError, Result};

/// Prefix on every compressed payload. The leading NUL never begins a
/// serialized JSON value, so raw values cannot be mistaken for compressed ones.
pub const COMPRESSED_MARKER: [u8; 4] = [0x00, b'P', b'C', 0x01];

/// Returns true when `bytes` carries the compression marker.
pub fn is_compressed(bytes: &[u8]) -> bool {
    bytes.starts_with(&COMPRESSED_MARKER)
}

// == Compress ==
/// Compresses `bytes` unconditionally, prefixing the marker.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(COMPRESSED_MARKER.len() + bytes.len() / 2);
    out.extend_from_slice(&COMPRESSED_MARKER);

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CacheError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CacheError::Compression(e.to_string()))
}

// == Decompress ==
/// Inflates a marked payload; unmarked input is returned unchanged.
///
/// A marked payload that does not inflate cleanly is an error rather than
/// being handed back raw.
pub fn decompress(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if !is_compressed(&bytes) {
        return Ok(bytes);
    }
    let body = &bytes[COMPRESSED_MARKER.len()..];

    let mut out = Vec::with_capacity(body.len() * 2);
    ZlibDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Compression(format!("malformed compressed payload: {e}")))?;
    Ok(out)
}

// == Compressor ==
/// Applies the cache's compression policy to serialized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    enabled: bool,
    threshold: usize,
}

impl Compressor {
    pub fn new(enabled: bool, threshold: usize) -> Self {
        Self { enabled, threshold }
    }

    /// True when a value of `len` bytes would be compressed.
    pub fn should_compress(&self, len: usize) -> bool {
        self.enabled && len >= self.threshold
    }

    /// Prepares a serialized value for storage.
    pub fn pack(&self, raw: Vec<u8>) -> Result<Vec<u8>> {
        if self.should_compress(raw.len()) {
            compress(&raw)
        } else {
            Ok(raw)
        }
    }

    /// Recovers the serialized value from stored bytes.
    ///
    /// Runs regardless of `enabled`, so values written while compression was
    /// on stay readable after it is turned off.
    pub fn unpack(&self, stored: Vec<u8>) -> Result<Vec<u8>> {
        decompress(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_roundtrip() {
        let value = "lorem ipsum ".repeat(200).into_bytes();
        let packed = compress(&value).unwrap();

        assert!(is_compressed(&packed));
        assert!(packed.len() < value.len());
        assert_eq!(decompress(packed).unwrap(), value);
    }

    #[test]
    fn test_compress_empty() {
        let packed = compress(b"").unwrap();
        assert_eq!(decompress(packed).unwrap(), b"");
    }

    #[test]
    fn test_decompress_passes_raw_through() {
        let raw = br#"{"name":"value"}"#.to_vec();
        assert_eq!(decompress(raw.clone()).unwrap(), raw);
    }

    #[test]
    fn test_decompress_unmarked_zlib_is_raw() {
        // Valid zlib without the marker is ordinary data.
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"payload").unwrap();
        let zlib = encoder.finish().unwrap();

        assert_eq!(decompress(zlib.clone()).unwrap(), zlib);
    }

    #[test]
    fn test_decompress_corrupt_marked_payload() {
        let mut corrupt = COMPRESSED_MARKER.to_vec();
        corrupt.extend_from_slice(b"definitely not zlib");

        assert!(matches!(
            decompress(corrupt),
            Err(CacheError::Compression(_))
        ));
    }

    #[test]
    fn test_decompress_truncated_payload() {
        let mut packed = compress(&"x".repeat(4096).into_bytes()).unwrap();
        packed.truncate(packed.len() / 2);

        assert!(matches!(decompress(packed), Err(CacheError::Compression(_))));
    }

    #[test]
    fn test_compressor_threshold_gate() {
        let compressor = Compressor::new(true, 8);

        let below = compressor.pack(b"1234567".to_vec()).unwrap();
        assert_eq!(below, b"1234567");

        let at = compressor.pack(b"12345678".to_vec()).unwrap();
        assert!(is_compressed(&at));
        assert_eq!(compressor.unpack(at).unwrap(), b"12345678");
    }

    #[test]
    fn test_compressor_disabled() {
        let compressor = Compressor::new(false, 0);
        let value = "y".repeat(4096).into_bytes();

        assert!(!compressor.should_compress(value.len()));
        assert_eq!(compressor.pack(value.clone()).unwrap(), value);
    }

    #[test]
    fn test_compressor_unpack_when_disabled() {
        let packed = compress(b"written while enabled").unwrap();
        let compressor = Compressor::new(false, 1024);

        assert_eq!(compressor.unpack(packed).unwrap(), b"written while enabled");
    }
}

//! Raw compression primitives behind the envelope and record bodies.

use super::CompressionKind;
use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Inflates a zlib stream that must produce exactly `flat_len` bytes
pub(crate) fn inflate(body: &[u8], flat_len: usize) -> Result<Vec<u8>> {
    let mut flat = Vec::with_capacity(flat_len);
    // One extra byte is enough to notice an oversized stream
    let mut decoder = ZlibDecoder::new(body).take(flat_len as u64 + 1);
    decoder
        .read_to_end(&mut flat)
        .map_err(|e| Error::decompression(CompressionKind::Deflate, e.to_string()))?;
    check_flat_len(CompressionKind::Deflate, flat.len(), flat_len)?;
    Ok(flat)
}

/// Compresses `flat` into a zlib stream
pub(crate) fn deflate(flat: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(flat.len() / 2), Compression::new(level));
    encoder
        .write_all(flat)
        .map_err(|e| Error::compression(CompressionKind::Deflate, e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::compression(CompressionKind::Deflate, e.to_string()))
}

/// Decompresses an LZ4 block that must produce exactly `flat_len` bytes
pub(crate) fn lz4_decompress(body: &[u8], flat_len: usize) -> Result<Vec<u8>> {
    let flat = lz4_flex::block::decompress(body, flat_len)
        .map_err(|e| Error::decompression(CompressionKind::Lz4, e.to_string()))?;
    check_flat_len(CompressionKind::Lz4, flat.len(), flat_len)?;
    Ok(flat)
}

/// Compresses `flat` as a single LZ4 block without a size prefix
pub(crate) fn lz4_compress(flat: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(flat)
}

fn check_flat_len(kind: CompressionKind, actual: usize, declared: usize) -> Result<()> {
    if actual != declared {
        return Err(Error::decompression(
            kind,
            format!(
                "decompressed size mismatch (declared {}, got {}{})",
                declared,
                if actual > declared { "more than " } else { "" },
                actual.min(declared)
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_roundtrip() {
        let flat = b"change forms change forms change forms".repeat(8);
        let body = deflate(&flat, 6).unwrap();
        assert!(body.len() < flat.len());
        assert_eq!(inflate(&body, flat.len()).unwrap(), flat);
    }

    #[test]
    fn test_inflate_truncated_stream() {
        let flat = (0..=255u8).cycle().take(4096).collect::<Vec<_>>();
        let body = deflate(&flat, 6).unwrap();
        let err = inflate(&body[..body.len() / 2], flat.len()).unwrap_err();
        assert!(matches!(err, Error::Decompression { kind: CompressionKind::Deflate, .. }));
    }

    #[test]
    fn test_inflate_size_mismatch() {
        let body = deflate(b"twelve bytes", 6).unwrap();
        assert!(inflate(&body, 11).is_err());
        assert!(inflate(&body, 13).is_err());
    }

    #[test]
    fn test_lz4_roundtrip_and_mismatch() {
        let flat = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaabbbbbbbb".to_vec();
        let body = lz4_compress(&flat);
        assert_eq!(lz4_decompress(&body, flat.len()).unwrap(), flat);
        assert!(lz4_decompress(&body, flat.len() + 4).is_err());
    }

    #[test]
    fn test_lz4_corrupt_block() {
        let flat = b"change forms change forms change forms".repeat(16);
        let body = lz4_compress(&flat);

        let truncated = lz4_decompress(&body[..body.len() / 2], flat.len()).unwrap_err();
        assert!(matches!(truncated, Error::Decompression { kind: CompressionKind::Lz4, .. }));

        // A literal run whose length byte is missing
        let garbage = lz4_decompress(&[0xF0], flat.len()).unwrap_err();
        assert!(matches!(garbage, Error::Decompression { kind: CompressionKind::Lz4, .. }));
    }
}

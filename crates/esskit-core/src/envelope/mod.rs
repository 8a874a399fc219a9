//! Compression envelope around a sub-region of the save.
//!
//! ## Wire Format
//!
//! All integers are little-endian:
//!
//! | field      | width | meaning                                   |
//! |------------|-------|-------------------------------------------|
//! | `kind`     | 2     | [`CompressionKind`] ordinal               |
//! | `flat_len` | 4     | size of the body once decompressed        |
//! | `body_len` | 4     | number of body bytes that follow          |
//! | `body`     | n     | flat bytes, zlib stream, or LZ4 block     |
//!
//! Decoding goes through two states: [`FramedBody`] holds the header and the
//! still-compressed body, [`CompressionEnvelope`] holds the flat buffer ready
//! for element parsing. Re-encoding runs the same path backwards with the
//! algorithm the envelope was read with. Only uncompressed envelopes are
//! guaranteed to come back byte-identical; compressed ones come back with a
//! body that decompresses to the same flat buffer.

mod codec;

pub(crate) use codec::{deflate, inflate};

use crate::config::CodecConfig;
use crate::element::{encode_element, ByteCursor, Element, ReadElement};
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes};
use std::fmt;
use tracing::{debug, trace};

/// Compression algorithm of an envelope body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CompressionKind {
    /// Body is stored as-is
    None = 0,
    /// zlib-wrapped deflate stream
    Deflate = 1,
    /// LZ4 block format
    Lz4 = 2,
}

impl CompressionKind {
    /// All kinds in ordinal order
    pub const ALL: [CompressionKind; 3] = [Self::None, Self::Deflate, Self::Lz4];

    /// Ordinal used on the wire
    pub fn ordinal(self) -> u16 {
        self as u16
    }

    /// Short lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "uncompressed",
            Self::Deflate => "deflate",
            Self::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u16> for CompressionKind {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Deflate),
            2 => Ok(Self::Lz4),
            _ => Err(Error::UnknownCompression { offset: 0, value }),
        }
    }
}

impl Element for CompressionKind {
    fn size(&self) -> usize {
        2
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        out.put_u16_le(self.ordinal());
    }
}

impl ReadElement for CompressionKind {
    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        let offset = cursor.offset();
        let value = cursor.read_u16_le()?;
        Self::try_from(value).map_err(|_| Error::UnknownCompression { offset, value })
    }
}

/// An envelope as it appears on the wire, body not yet decompressed
#[derive(Debug, Clone)]
pub struct FramedBody {
    kind: CompressionKind,
    flat_len: usize,
    body: Bytes,
    offset: usize,
}

impl FramedBody {
    /// Size of the fixed header
    pub const HEADER_LEN: usize = 10;

    /// Reads the header and takes the declared body bytes
    pub fn read(cursor: &mut ByteCursor, config: &CodecConfig) -> Result<Self> {
        let offset = cursor.offset();
        let kind = CompressionKind::read(cursor)?;
        let flat_len = cursor.read_u32_le()? as usize;
        let body_len = cursor.read_u32_le()? as usize;

        if flat_len > config.max_flat_len {
            return Err(Error::format(
                offset,
                format!(
                    "declared flat size {} exceeds the limit of {}",
                    flat_len, config.max_flat_len
                ),
            ));
        }
        if body_len > cursor.remaining() {
            return Err(Error::format(
                cursor.offset(),
                format!(
                    "declared body length {} exceeds the {} bytes remaining",
                    body_len,
                    cursor.remaining()
                ),
            ));
        }
        if kind == CompressionKind::None && body_len != flat_len {
            return Err(Error::format(
                offset,
                format!(
                    "uncompressed body length {} differs from flat size {}",
                    body_len, flat_len
                ),
            ));
        }

        let body = cursor.take(body_len)?;
        trace!(
            "Framed {} envelope at {}: {} -> {} bytes",
            kind,
            offset,
            body_len,
            flat_len
        );
        Ok(Self {
            kind,
            flat_len,
            body,
            offset,
        })
    }

    /// Declared algorithm
    pub fn kind(&self) -> CompressionKind {
        self.kind
    }

    /// Declared decompressed size
    pub fn flat_len(&self) -> usize {
        self.flat_len
    }

    /// The body exactly as stored
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Offset of the header in the enclosing buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Decompresses the body into a flat envelope
    pub fn into_flat(self, config: &CodecConfig) -> Result<CompressionEnvelope> {
        let flat = match self.kind {
            CompressionKind::None => self.body,
            CompressionKind::Deflate => inflate(&self.body, self.flat_len)?.into(),
            CompressionKind::Lz4 => codec::lz4_decompress(&self.body, self.flat_len)?.into(),
        };
        Ok(CompressionEnvelope {
            kind: self.kind,
            flat,
            deflate_level: config.deflate_level,
        })
    }
}

impl Element for FramedBody {
    fn size(&self) -> usize {
        Self::HEADER_LEN + self.body.len()
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        self.kind.write(out);
        out.put_u32_le(self.flat_len as u32);
        out.put_u32_le(self.body.len() as u32);
        out.put_slice(&self.body);
    }
}

/// A decoded envelope: algorithm plus flat buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionEnvelope {
    kind: CompressionKind,
    flat: Bytes,
    deflate_level: u32,
}

impl CompressionEnvelope {
    /// Creates an envelope that will compress `flat` with `kind`
    pub fn new(kind: CompressionKind, flat: impl Into<Bytes>) -> Self {
        Self {
            kind,
            flat: flat.into(),
            deflate_level: CodecConfig::default().deflate_level,
        }
    }

    /// Reads and decompresses an envelope with the default configuration
    pub fn read(cursor: &mut ByteCursor) -> Result<Self> {
        Self::read_with_config(cursor, &CodecConfig::default())
    }

    /// Reads and decompresses an envelope
    pub fn read_with_config(cursor: &mut ByteCursor, config: &CodecConfig) -> Result<Self> {
        let framed = FramedBody::read(cursor, config)?;
        let offset = framed.offset();
        let envelope = framed.into_flat(config)?;
        debug!(
            "Decoded {} envelope at {} ({} flat bytes)",
            envelope.kind,
            offset,
            envelope.flat.len()
        );
        Ok(envelope)
    }

    /// Algorithm used on re-encode
    pub fn kind(&self) -> CompressionKind {
        self.kind
    }

    /// Changes the algorithm used on re-encode
    pub fn set_kind(&mut self, kind: CompressionKind) {
        self.kind = kind;
    }

    /// The decompressed buffer
    pub fn flat(&self) -> &Bytes {
        &self.flat
    }

    /// Replaces the decompressed buffer
    pub fn set_flat(&mut self, flat: impl Into<Bytes>) {
        self.flat = flat.into();
    }

    /// A cursor over the flat buffer, for parsing nested elements
    pub fn cursor(&self) -> ByteCursor {
        ByteCursor::new(self.flat.clone())
    }

    /// Compresses the flat buffer back into its framed form
    pub fn frame(&self) -> Result<FramedBody> {
        let body: Bytes = match self.kind {
            CompressionKind::None => self.flat.clone(),
            CompressionKind::Deflate => deflate(&self.flat, self.deflate_level)?.into(),
            CompressionKind::Lz4 => codec::lz4_compress(&self.flat).into(),
        };
        if self.flat.len() > u32::MAX as usize || body.len() > u32::MAX as usize {
            return Err(Error::format(
                0,
                format!("{} byte envelope does not fit a 32-bit length", self.flat.len()),
            ));
        }
        Ok(FramedBody {
            kind: self.kind,
            flat_len: self.flat.len(),
            body,
            offset: 0,
        })
    }

    /// Encodes header and (re)compressed body
    pub fn reencode(&self) -> Result<Bytes> {
        encode_element(&self.frame()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(kind: u16, flat_len: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&flat_len.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_compression_kind_conversion() {
        assert_eq!(CompressionKind::try_from(0).unwrap(), CompressionKind::None);
        assert_eq!(CompressionKind::try_from(1).unwrap(), CompressionKind::Deflate);
        assert_eq!(CompressionKind::try_from(2).unwrap(), CompressionKind::Lz4);
        assert!(CompressionKind::try_from(3).is_err());
    }

    #[test]
    fn test_unknown_kind_is_format_error() {
        let data = framed(3, 4, b"abcd");
        let err = CompressionEnvelope::read(&mut ByteCursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::UnknownCompression { offset: 0, value: 3 }));
        assert!(err.is_format());
    }

    #[test]
    fn test_uncompressed_is_bitwise_roundtrip() {
        let data = framed(0, 5, b"hello");
        let envelope = CompressionEnvelope::read(&mut ByteCursor::new(data.clone())).unwrap();
        assert_eq!(envelope.kind(), CompressionKind::None);
        assert_eq!(&envelope.flat()[..], b"hello");
        assert_eq!(&envelope.reencode().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_body_length_past_end() {
        let mut data = framed(0, 5, b"hello");
        data.truncate(data.len() - 1);
        let err = CompressionEnvelope::read(&mut ByteCursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::Format { offset: 10, .. }));
    }

    #[test]
    fn test_uncompressed_length_disagreement() {
        let data = framed(0, 6, b"hello");
        assert!(CompressionEnvelope::read(&mut ByteCursor::new(data)).is_err());
    }

    #[test]
    fn test_flat_limit() {
        let data = framed(1, 1024, b"");
        let config = CodecConfig::new().max_flat_len(512);
        let err = CompressionEnvelope::read_with_config(&mut ByteCursor::new(data), &config)
            .unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_deflate_declared_size_mismatch() {
        let body = deflate(b"0123456789", 6).unwrap();
        let data = framed(1, 9, &body);
        let err = CompressionEnvelope::read(&mut ByteCursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::Decompression { kind: CompressionKind::Deflate, .. }));
    }

    #[test]
    fn test_compressed_semantic_roundtrip() {
        for kind in [CompressionKind::Deflate, CompressionKind::Lz4] {
            let flat = b"QUST QUST QUST NPC_ NPC_ REFR".repeat(20);
            let encoded = CompressionEnvelope::new(kind, flat.clone()).reencode().unwrap();
            assert_eq!(u16::from_le_bytes([encoded[0], encoded[1]]), kind.ordinal());

            let decoded = CompressionEnvelope::read(&mut ByteCursor::new(encoded)).unwrap();
            assert_eq!(decoded.kind(), kind);
            assert_eq!(&decoded.flat()[..], &flat[..]);
        }
    }

    #[test]
    fn test_empty_flat_buffer() {
        for kind in CompressionKind::ALL {
            let encoded = CompressionEnvelope::new(kind, Bytes::new()).reencode().unwrap();
            let decoded = CompressionEnvelope::read(&mut ByteCursor::new(encoded)).unwrap();
            assert!(decoded.flat().is_empty());
        }
    }

    #[test]
    fn test_read_leaves_trailing_bytes() {
        let mut data = framed(0, 2, b"ok");
        data.extend_from_slice(b"next");
        let mut cursor = ByteCursor::new(data);
        CompressionEnvelope::read(&mut cursor).unwrap();
        assert_eq!(cursor.remaining(), 4);
    }
}

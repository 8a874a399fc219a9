//! Length-prefixed strings that keep their original bytes.
//!
//! Save files contain strings in whatever charset the game happened to use.
//! Decoding them for display and encoding them back would not always give the
//! same bytes, so the raw form stays authoritative until the text is edited.

use super::{ByteCursor, Element, ReadElement};
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes};
use std::fmt;

/// Largest byte length the 16-bit prefix can describe
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Authority {
    /// `raw` came from the file
    Pristine,
    /// `raw` was produced from edited text
    Edited,
}

/// A `u16` length prefix followed by that many bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthPrefixedString {
    raw: Bytes,
    text: String,
    authority: Authority,
}

impl LengthPrefixedString {
    /// Wraps bytes read from a file
    pub fn from_raw(raw: Bytes) -> Result<Self> {
        if raw.len() > MAX_STRING_LEN {
            return Err(Error::StringTooLong {
                len: raw.len(),
                max: MAX_STRING_LEN,
            });
        }
        let text = String::from_utf8_lossy(&raw).into_owned();
        Ok(Self {
            raw,
            text,
            authority: Authority::Pristine,
        })
    }

    /// Creates a string from text, encoded as UTF-8
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let mut string = Self::default();
        string.set_text(text)?;
        Ok(string)
    }

    /// Replaces the text, re-encoding it as UTF-8
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.len() > MAX_STRING_LEN {
            return Err(Error::StringTooLong {
                len: text.len(),
                max: MAX_STRING_LEN,
            });
        }
        self.raw = Bytes::copy_from_slice(text.as_bytes());
        self.text = text;
        self.authority = Authority::Edited;
        Ok(())
    }

    /// Decoded text, lossy if the bytes were not valid UTF-8
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bytes that will be written
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// True once `set_text` has been called
    pub fn is_edited(&self) -> bool {
        self.authority == Authority::Edited
    }
}

impl Default for LengthPrefixedString {
    fn default() -> Self {
        Self {
            raw: Bytes::new(),
            text: String::new(),
            authority: Authority::Pristine,
        }
    }
}

impl fmt::Display for LengthPrefixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Element for LengthPrefixedString {
    fn size(&self) -> usize {
        2 + self.raw.len()
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        out.put_u16_le(self.raw.len() as u16);
        out.put_slice(&self.raw);
    }
}

impl ReadElement for LengthPrefixedString {
    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        let len = cursor.read_u16_le()? as usize;
        let raw = cursor.take(len)?;
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::encode_element;

    #[test]
    fn test_pristine_bytes_survive_invalid_utf8() {
        // "Caf\xE9" is Windows-1252, not UTF-8
        let wire = vec![0x04, 0x00, b'C', b'a', b'f', 0xE9];
        let string = LengthPrefixedString::read(&mut ByteCursor::new(wire.clone())).unwrap();

        assert_eq!(string.text(), "Caf\u{FFFD}");
        assert!(!string.is_edited());
        assert_eq!(&encode_element(&string).unwrap()[..], &wire[..]);
    }

    #[test]
    fn test_edit_recomputes_prefix() {
        let wire = vec![0x02, 0x00, b'h', b'i'];
        let mut string = LengthPrefixedString::read(&mut ByteCursor::new(wire)).unwrap();
        string.set_text("héllo").unwrap();

        assert!(string.is_edited());
        assert_eq!(string.size(), 2 + 6);
        let encoded = encode_element(&string).unwrap();
        assert_eq!(&encoded[..2], &[0x06, 0x00]);
        assert_eq!(&encoded[2..], "héllo".as_bytes());
    }

    #[test]
    fn test_too_long_text_is_rejected() {
        let mut string = LengthPrefixedString::default();
        let err = string.set_text("x".repeat(MAX_STRING_LEN + 1)).unwrap_err();
        assert!(matches!(err, Error::StringTooLong { .. }));
        assert!(!string.is_edited());
    }

    #[test]
    fn test_declared_length_past_end() {
        let wire = vec![0x05, 0x00, b'a'];
        assert!(matches!(
            LengthPrefixedString::read(&mut ByteCursor::new(wire)),
            Err(Error::Truncated { needed: 5, .. })
        ));
    }
}

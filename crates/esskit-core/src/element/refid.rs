//! Reference identifiers.

use super::{ByteCursor, Element, ReadElement};
use crate::error::Result;
use bytes::BufMut;
use std::fmt;

/// Opaque 24-bit key identifying a game object.
///
/// Stored as three bytes, most significant first. The core only compares
/// these; it never resolves them into the objects they name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RefId(u32);

/// How the game interprets the low 22 bits of a [`RefId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefIdKind {
    /// Index into the save's form id table
    Index,
    /// Form id from the base game master
    Default,
    /// Form created at runtime
    Created,
    /// Reserved
    Unknown,
}

impl RefId {
    /// Number of bytes on the wire
    pub const SIZE: usize = 3;

    /// Largest representable raw value
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Wraps a raw value, discarding anything above 24 bits
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & Self::MAX)
    }

    /// Raw 24-bit value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Interpretation of the value bits
    pub fn kind(self) -> RefIdKind {
        match self.0 >> 22 {
            0 => RefIdKind::Index,
            1 => RefIdKind::Default,
            2 => RefIdKind::Created,
            _ => RefIdKind::Unknown,
        }
    }

    /// Low 22 bits
    pub fn value(self) -> u32 {
        self.0 & 0x003F_FFFF
    }

    /// True for the all-zero null reference
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl Element for RefId {
    fn size(&self) -> usize {
        Self::SIZE
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        out.put_uint(u64::from(self.0), Self::SIZE);
    }
}

impl ReadElement for RefId {
    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        cursor.read_u24_be().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::encode_element;

    #[test]
    fn test_refid_wire_order() {
        let id = RefId::from_raw(0x40_0A1B);
        assert_eq!(&encode_element(&id).unwrap()[..], &[0x40, 0x0A, 0x1B]);

        let mut cursor = ByteCursor::new(vec![0x40, 0x0A, 0x1B]);
        assert_eq!(RefId::read(&mut cursor).unwrap(), id);
    }

    #[test]
    fn test_refid_kind() {
        assert_eq!(RefId::from_raw(0x00_0001).kind(), RefIdKind::Index);
        assert_eq!(RefId::from_raw(0x40_0001).kind(), RefIdKind::Default);
        assert_eq!(RefId::from_raw(0x80_0001).kind(), RefIdKind::Created);
        assert_eq!(RefId::from_raw(0xC0_0001).kind(), RefIdKind::Unknown);
        assert_eq!(RefId::from_raw(0x80_0123).value(), 0x123);
    }

    #[test]
    fn test_refid_display() {
        assert_eq!(RefId::from_raw(0xABC).to_string(), "000ABC");
        assert_eq!(RefId::from_raw(0x1FF_FFFF).raw(), 0xFF_FFFF);
    }
}

//! Decoded values of optional record fields.

use super::flags::FieldKind;
use crate::element::{ByteCursor, Element, LengthPrefixedString, ReadElement, RefId};
use crate::error::{Error, Result};
use bytes::BufMut;

/// Where a reference sits and how it is turned
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Cell or worldspace the reference is in
    pub cell: RefId,
    /// x, y, z
    pub position: [f32; 3],
    /// Rotation around x, y, z in radians
    pub rotation: [f32; 3],
}

impl Element for Position {
    fn size(&self) -> usize {
        RefId::SIZE + 6 * 4
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        self.cell.write(out);
        for value in self.position.iter().chain(&self.rotation) {
            out.put_f32_le(*value);
        }
    }
}

impl ReadElement for Position {
    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        let cell = RefId::read(cursor)?;
        let mut position = [0.0; 3];
        let mut rotation = [0.0; 3];
        for value in position.iter_mut().chain(rotation.iter_mut()) {
            *value = cursor.read_f32_le()?;
        }
        Ok(Self {
            cell,
            position,
            rotation,
        })
    }
}

/// Value of one optional field, one variant per modeled [`FieldKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// [`FieldKind::U8`]
    U8(u8),
    /// [`FieldKind::U16`]
    U16(u16),
    /// [`FieldKind::U32`]
    U32(u32),
    /// [`FieldKind::F32`]
    F32(f32),
    /// [`FieldKind::RefId`]
    RefId(RefId),
    /// [`FieldKind::FormFlags`]
    FormFlags {
        /// Record flags
        flags: u32,
        /// Unidentified trailing half-word
        unknown: u16,
    },
    /// [`FieldKind::Position`]
    Position(Position),
    /// [`FieldKind::String`]
    String(LengthPrefixedString),
    /// [`FieldKind::RefIdList`]
    RefIdList(Vec<RefId>),
    /// [`FieldKind::Marker`]
    Marker,
}

impl FieldValue {
    /// Decodes a value of the given kind
    ///
    /// Opaque kinds have no layout; asking for one is a format error.
    pub fn read(kind: FieldKind, cursor: &mut ByteCursor) -> Result<Self> {
        Ok(match kind {
            FieldKind::U8 => Self::U8(cursor.read_u8()?),
            FieldKind::U16 => Self::U16(cursor.read_u16_le()?),
            FieldKind::U32 => Self::U32(cursor.read_u32_le()?),
            FieldKind::F32 => Self::F32(cursor.read_f32_le()?),
            FieldKind::RefId => Self::RefId(RefId::read(cursor)?),
            FieldKind::FormFlags => Self::FormFlags {
                flags: cursor.read_u32_le()?,
                unknown: cursor.read_u16_le()?,
            },
            FieldKind::Position => Self::Position(Position::read(cursor)?),
            FieldKind::String => Self::String(LengthPrefixedString::read(cursor)?),
            FieldKind::RefIdList => {
                let offset = cursor.offset();
                let count = cursor.read_u32_le()? as usize;
                let needed = count.saturating_mul(RefId::SIZE);
                if needed > cursor.remaining() {
                    return Err(Error::truncated(offset, needed, cursor.remaining()));
                }
                let ids = (0..count)
                    .map(|_| RefId::read(cursor))
                    .collect::<Result<Vec<_>>>()?;
                Self::RefIdList(ids)
            }
            FieldKind::Marker => Self::Marker,
            FieldKind::Opaque => {
                return Err(Error::format(
                    cursor.offset(),
                    "opaque fields have no decodable layout",
                ))
            }
        })
    }

    /// Zero value of a kind, `None` for opaque kinds
    pub fn default_for(kind: FieldKind) -> Option<Self> {
        Some(match kind {
            FieldKind::U8 => Self::U8(0),
            FieldKind::U16 => Self::U16(0),
            FieldKind::U32 => Self::U32(0),
            FieldKind::F32 => Self::F32(0.0),
            FieldKind::RefId => Self::RefId(RefId::default()),
            FieldKind::FormFlags => Self::FormFlags {
                flags: 0,
                unknown: 0,
            },
            FieldKind::Position => Self::Position(Position::default()),
            FieldKind::String => Self::String(LengthPrefixedString::default()),
            FieldKind::RefIdList => Self::RefIdList(Vec::new()),
            FieldKind::Marker => Self::Marker,
            FieldKind::Opaque => return None,
        })
    }

    /// Kind this value encodes as
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::U8(_) => FieldKind::U8,
            Self::U16(_) => FieldKind::U16,
            Self::U32(_) => FieldKind::U32,
            Self::F32(_) => FieldKind::F32,
            Self::RefId(_) => FieldKind::RefId,
            Self::FormFlags { .. } => FieldKind::FormFlags,
            Self::Position(_) => FieldKind::Position,
            Self::String(_) => FieldKind::String,
            Self::RefIdList(_) => FieldKind::RefIdList,
            Self::Marker => FieldKind::Marker,
        }
    }
}

impl Element for FieldValue {
    fn size(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) | Self::F32(_) => 4,
            Self::RefId(id) => id.size(),
            Self::FormFlags { .. } => 6,
            Self::Position(position) => position.size(),
            Self::String(string) => string.size(),
            Self::RefIdList(ids) => 4 + ids.len() * RefId::SIZE,
            Self::Marker => 0,
        }
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        match self {
            Self::U8(value) => out.put_u8(*value),
            Self::U16(value) => out.put_u16_le(*value),
            Self::U32(value) => out.put_u32_le(*value),
            Self::F32(value) => out.put_f32_le(*value),
            Self::RefId(id) => id.write(out),
            Self::FormFlags { flags, unknown } => {
                out.put_u32_le(*flags);
                out.put_u16_le(*unknown);
            }
            Self::Position(position) => position.write(out),
            Self::String(string) => string.write(out),
            Self::RefIdList(ids) => {
                out.put_u32_le(ids.len() as u32);
                for id in ids {
                    id.write(out);
                }
            }
            Self::Marker => {}
        }
    }
}

//! Change records and their flag-controlled bodies.
//!
//! ## Wire Format
//!
//! | field     | width  | meaning                                          |
//! |-----------|--------|--------------------------------------------------|
//! | `ref_id`  | 3      | [`RefId`], most significant byte first           |
//! | `flags`   | 4      | [`FlagWord`], little-endian                      |
//! | `type`    | 1      | bits 0-5 record type, bits 6-7 length width      |
//! | `version` | 1      | record format version                            |
//! | `length1` | 1/2/4  | stored body length                               |
//! | `length2` | 1/2/4  | decompressed body length, 0 if stored flat       |
//! | `body`    | length1| optional fields, zlib-compressed if `length2 > 0`|
//!
//! ## Body states
//!
//! A freshly read record keeps its body as raw bytes. Asking for a field
//! materializes it: the body is decompressed if needed and walked in
//! schema order, one field per set flag bit. Walking stops at the first set
//! bit the schema has no layout for; from there on the body is kept as an
//! opaque tail. As long as nothing is edited the original bytes are written
//! back, so untouched records always round-trip exactly.

mod collection;
mod field;
mod flags;
mod schemas;

pub use collection::ChangeRecordCollection;
pub use field::{FieldValue, Position};
pub use flags::{FieldKind, FieldSpec, FieldTag, FlagSchema, FlagWord};
pub use schemas::{
    ACTOR, BASE_OBJECT, BOOK, CELL, EMPTY, ENCOUNTER_ZONE, FACTION, FORM_LIST, INFO,
    LEVELED_LIST, NPC, QUEST, REFERENCE,
};

use crate::config::CodecConfig;
use crate::element::{ByteCursor, Element, ReadElement, RefId};
use crate::envelope::{deflate, inflate};
use crate::error::{Error, Result, SchemaGapWarning};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace, warn};

macro_rules! record_types {
    ($($variant:ident = $code:literal => $signature:literal,)*) => {
        /// Record category, stored in the low six bits of the type byte
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RecordType {
            $(
                #[doc = concat!("`", $signature, "`")]
                $variant,
            )*
            /// A type code this crate does not know.
            ///
            /// Records normalize the code through [`RecordType::from_code`],
            /// so `Other` holding a known code never reaches the wire.
            Other(u8),
        }

        impl RecordType {
            /// Maps a 6-bit type code to its category
            pub fn from_code(code: u8) -> Self {
                match code {
                    $($code => Self::$variant,)*
                    other => Self::Other(other),
                }
            }

            /// The 6-bit type code
            pub fn code(self) -> u8 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Other(code) => code & TYPE_MASK,
                }
            }

            /// Four-letter record signature
            pub fn signature(self) -> &'static str {
                match self {
                    $(Self::$variant => $signature,)*
                    Self::Other(_) => "????",
                }
            }
        }
    };
}

record_types! {
    Reference = 0 => "REFR",
    ActorReference = 1 => "ACHR",
    MissileProjectile = 2 => "PMIS",
    GrenadeProjectile = 3 => "PGRE",
    BeamProjectile = 4 => "PBEA",
    FlameProjectile = 5 => "PFLA",
    Cell = 6 => "CELL",
    Info = 7 => "INFO",
    Quest = 8 => "QUST",
    Npc = 9 => "NPC_",
    Activator = 10 => "ACTI",
    TalkingActivator = 11 => "TACT",
    Armor = 12 => "ARMO",
    Book = 13 => "BOOK",
    Container = 14 => "CONT",
    Door = 15 => "DOOR",
    Ingredient = 16 => "INGR",
    Light = 17 => "LIGH",
    Misc = 18 => "MISC",
    Apparatus = 19 => "APPA",
    Static = 20 => "STAT",
    MovableStatic = 21 => "MSTT",
    Furniture = 22 => "FURN",
    Weapon = 23 => "WEAP",
    Ammo = 24 => "AMMO",
    Key = 25 => "KEYM",
    Alchemy = 26 => "ALCH",
    IdleMarker = 27 => "IDLM",
    Note = 28 => "NOTE",
    EncounterZone = 29 => "ECZN",
    Class = 30 => "CLAS",
    Faction = 31 => "FACT",
    Package = 32 => "PACK",
    NavMesh = 33 => "NAVM",
    WordOfPower = 34 => "WOOP",
    MagicEffect = 35 => "MGEF",
    StoryManagerQuestNode = 36 => "SMQN",
    Scene = 37 => "SCEN",
    Location = 38 => "LCTN",
    Relationship = 39 => "RELA",
    HazardProjectile = 40 => "PHZD",
    BarrierProjectile = 41 => "PBAR",
    ConeProjectile = 42 => "PCON",
    FormList = 43 => "FLST",
    LeveledNpc = 44 => "LVLN",
    LeveledItem = 45 => "LVLI",
    LeveledSpell = 46 => "LVSP",
    ArrowProjectile = 47 => "PARW",
    Enchantment = 48 => "ENCH",
}

const TYPE_MASK: u8 = 0x3F;

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "type {}", code),
            known => f.write_str(known.signature()),
        }
    }
}

/// Width of the two length fields, from the top bits of the type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LengthWidth {
    /// One byte each
    U8,
    /// Two bytes each
    U16,
    /// Four bytes each
    U32,
}

impl LengthWidth {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::U8),
            1 => Some(Self::U16),
            2 => Some(Self::U32),
            _ => None,
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::U8 => 0,
            Self::U16 => 1,
            Self::U32 => 2,
        }
    }

    /// Bytes per length field
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    fn max_len(self) -> usize {
        match self {
            Self::U8 => u8::MAX as usize,
            Self::U16 => u16::MAX as usize,
            Self::U32 => u32::MAX as usize,
        }
    }

    /// Narrowest width that can hold `len`
    fn fitting(len: usize) -> Self {
        [Self::U8, Self::U16, Self::U32]
            .into_iter()
            .find(|width| len <= width.max_len())
            .unwrap_or(Self::U32)
    }

    fn read(self, cursor: &mut ByteCursor) -> Result<usize> {
        Ok(match self {
            Self::U8 => cursor.read_u8()? as usize,
            Self::U16 => cursor.read_u16_le()? as usize,
            Self::U32 => cursor.read_u32_le()? as usize,
        })
    }

    fn write<B: BufMut>(self, out: &mut B, len: usize) {
        match self {
            Self::U8 => out.put_u8(len as u8),
            Self::U16 => out.put_u16_le(len as u16),
            Self::U32 => out.put_u32_le(len as u32),
        }
    }
}

/// Body bytes as they go to disk
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredBody {
    data: Bytes,
    /// Decompressed length, 0 when `data` is not compressed
    flat_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Materialized {
    /// Decoded fields keyed by flag bit; iteration order is on-disk order
    fields: BTreeMap<u8, FieldValue>,
    /// Bytes after the last decoded field
    tail: Bytes,
    /// First set bit that could not be decoded
    gap: Option<u8>,
    compressed: bool,
    deflate_level: u32,
    /// Original bytes until the first edit, then the rebuilt body
    stored: StoredBody,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Raw(StoredBody),
    Materialized(Materialized),
}

/// One change record
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    ref_id: RefId,
    flags: FlagWord,
    record_type: RecordType,
    version: u8,
    width: LengthWidth,
    body: Body,
    /// Settings for materializing on first field access
    config: CodecConfig,
}

impl ChangeRecord {
    /// Creates a record with no flags and an empty, uncompressed body
    pub fn new(ref_id: RefId, record_type: RecordType, version: u8) -> Self {
        Self {
            ref_id,
            flags: FlagWord::default(),
            record_type: RecordType::from_code(record_type.code()),
            version,
            width: LengthWidth::U8,
            body: Body::Raw(StoredBody {
                data: Bytes::new(),
                flat_len: 0,
            }),
            config: CodecConfig::default(),
        }
    }

    /// Reads a record whose lazy materialization follows `config`
    pub fn read_with_config(cursor: &mut ByteCursor, config: &CodecConfig) -> Result<Self> {
        let ref_id = RefId::read(cursor)?;
        let flags = FlagWord::read(cursor)?;

        let type_offset = cursor.offset();
        let type_byte = cursor.read_u8()?;
        let width = LengthWidth::from_code(type_byte >> 6)
            .ok_or_else(|| Error::format(type_offset, "reserved length width 3"))?;
        let record_type = RecordType::from_code(type_byte & TYPE_MASK);
        let version = cursor.read_u8()?;

        let length1 = width.read(cursor)?;
        let length2 = width.read(cursor)?;
        if length1 > cursor.remaining() {
            return Err(Error::format(
                cursor.offset(),
                format!(
                    "declared body length {} exceeds the {} bytes remaining",
                    length1,
                    cursor.remaining()
                ),
            ));
        }
        let data = cursor.take(length1)?;

        Ok(Self {
            ref_id,
            flags,
            record_type,
            version,
            width,
            body: Body::Raw(StoredBody {
                data,
                flat_len: length2,
            }),
            config: config.clone(),
        })
    }

    /// Reference id of the object this record changes
    pub fn ref_id(&self) -> RefId {
        self.ref_id
    }

    /// Record category
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Record format version
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Current flag word
    pub fn flags(&self) -> FlagWord {
        self.flags
    }

    /// Width of the length fields
    pub fn length_width(&self) -> LengthWidth {
        self.width
    }

    /// Schema selected by the record type
    pub fn schema(&self) -> &'static FlagSchema {
        FlagSchema::for_type(self.record_type)
    }

    fn stored(&self) -> &StoredBody {
        match &self.body {
            Body::Raw(stored) => stored,
            Body::Materialized(materialized) => &materialized.stored,
        }
    }

    /// Body bytes as written to disk (compressed if the record is)
    pub fn stored_body(&self) -> &Bytes {
        &self.stored().data
    }

    /// Whether the stored body is a zlib stream
    pub fn is_compressed(&self) -> bool {
        self.stored().flat_len > 0
    }

    /// Whether the body has been decoded into fields
    pub fn is_materialized(&self) -> bool {
        matches!(self.body, Body::Materialized(_))
    }

    /// Whether the schema defines `tag` and its flag bit is set
    pub fn has_field(&self, tag: FieldTag) -> bool {
        self.schema()
            .spec_for(tag)
            .map_or(false, |spec| self.flags.is_set(spec.bit))
    }

    /// Fields the flag word declares, in on-disk order
    pub fn present_fields(&self) -> Vec<FieldTag> {
        self.schema().present_tags(self.flags)
    }

    /// Undecoded bytes after the last decoded field, once materialized
    pub fn tail(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Materialized(materialized) => Some(&materialized.tail),
            Body::Raw(_) => None,
        }
    }

    /// First set bit that could not be decoded, once materialized
    pub fn gap(&self) -> Option<u8> {
        match &self.body {
            Body::Materialized(materialized) => materialized.gap,
            Body::Raw(_) => None,
        }
    }

    /// Decodes the body into fields.
    ///
    /// Returns a warning when the flag word sets a bit the schema cannot
    /// decode; the record is still materialized, with everything from that
    /// field on kept as an opaque tail. With `strict_schema` the gap is an
    /// error instead. Calling this again on a materialized record is a no-op.
    ///
    /// Field accessors materialize on demand with the configuration the
    /// record was read with.
    pub fn materialize(&mut self, config: &CodecConfig) -> Result<Option<SchemaGapWarning>> {
        let Body::Raw(stored) = &self.body else {
            return Ok(None);
        };
        let stored = stored.clone();

        let flat: Bytes = if stored.flat_len > 0 {
            if stored.flat_len > config.max_flat_len {
                return Err(Error::format(
                    0,
                    format!(
                        "declared body size {} exceeds the limit of {}",
                        stored.flat_len, config.max_flat_len
                    ),
                ));
            }
            inflate(&stored.data, stored.flat_len)?.into()
        } else {
            stored.data.clone()
        };

        let schema = self.schema();
        let mut cursor = ByteCursor::new(flat);
        let mut fields = BTreeMap::new();
        let mut gap = None;

        for bit in self.flags.set_bits() {
            let spec = match schema.spec_at(bit) {
                Some(spec) if spec.kind.is_modeled() => spec,
                _ => {
                    gap = Some(bit);
                    break;
                }
            };
            let value = FieldValue::read(spec.kind, &mut cursor).map_err(|e| match e {
                Error::Truncated { offset, .. } => Error::format(
                    offset,
                    format!(
                        "{} {} body ends inside its '{}' field",
                        self.record_type, self.ref_id, spec.tag
                    ),
                ),
                other => other,
            })?;
            trace!("{} {}: decoded {}", self.record_type, self.ref_id, spec.tag);
            fields.insert(bit, value);
        }

        let stopped_at = cursor.position();
        let tail = cursor.take_rest();
        let warning = gap.map(|bit| SchemaGapWarning {
            record_index: None,
            ref_id: self.ref_id,
            record_type: self.record_type,
            bit,
            offset: stopped_at,
        });

        match &warning {
            Some(warning) if config.strict_schema => {
                return Err(Error::format(stopped_at, warning.to_string()));
            }
            Some(warning) => warn!("{}", warning),
            None if !tail.is_empty() => debug!(
                "{} {}: {} trailing bytes kept as opaque tail",
                self.record_type,
                self.ref_id,
                tail.len()
            ),
            None => {}
        }

        self.body = Body::Materialized(Materialized {
            fields,
            tail,
            gap,
            compressed: stored.flat_len > 0,
            deflate_level: config.deflate_level,
            stored,
        });
        Ok(warning)
    }

    fn materialized(&mut self) -> Result<&mut Materialized> {
        let config = self.config.clone();
        self.materialize(&config)?;
        match &mut self.body {
            Body::Materialized(materialized) => Ok(materialized),
            Body::Raw(_) => unreachable!("materialize always leaves a materialized body"),
        }
    }

    /// Looks up a schema field, rejecting tags past the schema gap
    fn editable_spec(&mut self, tag: FieldTag) -> Result<&'static FieldSpec> {
        let record_type = self.record_type;
        let spec = self
            .schema()
            .spec_for(tag)
            .ok_or(Error::FieldNotInSchema { record_type, tag })?;
        if let Some(gap) = self.materialized()?.gap {
            if spec.bit >= gap {
                return Err(Error::FieldInOpaqueRegion {
                    tag,
                    bit: spec.bit,
                    gap,
                });
            }
        }
        Ok(spec)
    }

    /// Value of a field, materializing the body if needed.
    ///
    /// `Ok(None)` means the field's flag bit is clear.
    pub fn field(&mut self, tag: FieldTag) -> Result<Option<&FieldValue>> {
        let spec = self.editable_spec(tag)?;
        Ok(self.materialized()?.fields.get(&spec.bit))
    }

    /// Sets a field and its flag bit, then rebuilds the body
    pub fn set_field(&mut self, tag: FieldTag, value: FieldValue) -> Result<()> {
        let spec = self.editable_spec(tag)?;
        if !spec.kind.is_modeled() {
            return Err(Error::OpaqueField { tag });
        }
        if value.kind() != spec.kind {
            return Err(Error::FieldKindMismatch {
                tag,
                expected: spec.kind,
                actual: value.kind(),
            });
        }
        self.materialized()?.fields.insert(spec.bit, value);
        self.flags.set(spec.bit, true);
        self.rebuild()
    }

    /// Drops a field and clears its flag bit, then rebuilds the body
    pub fn clear_field(&mut self, tag: FieldTag) -> Result<()> {
        let spec = self.editable_spec(tag)?;
        if !self.flags.is_set(spec.bit) {
            return Ok(());
        }
        self.materialized()?.fields.remove(&spec.bit);
        self.flags.set(spec.bit, false);
        self.rebuild()
    }

    /// Sets or clears one flag bit.
    ///
    /// Schema bits add a zero-valued field or drop the existing one. Bits the
    /// schema does not define only flip and the body is left alone, so they
    /// can only be flipped while no higher bit is set.
    pub fn set_flag(&mut self, bit: u8, on: bool) -> Result<()> {
        if self.flags.is_set(bit) == on {
            return Ok(());
        }
        match self.schema().spec_at(bit) {
            None => {
                if let Some(above) = self.flags.set_bits().find(|&set| set > bit) {
                    return Err(Error::UnmodeledFlagBelowFields { bit, above });
                }
                self.flags.set(bit, on);
                Ok(())
            }
            Some(spec) if on => {
                let value =
                    FieldValue::default_for(spec.kind).ok_or(Error::OpaqueField { tag: spec.tag })?;
                self.set_field(spec.tag, value)
            }
            Some(spec) => self.clear_field(spec.tag),
        }
    }

    /// Re-encodes the fields and tail into a new stored body
    fn rebuild(&mut self) -> Result<()> {
        let Body::Materialized(materialized) = &mut self.body else {
            return Ok(());
        };

        let mut flat = BytesMut::new();
        for value in materialized.fields.values() {
            value.write(&mut flat);
        }
        flat.put_slice(&materialized.tail);
        let flat = flat.freeze();

        materialized.stored = if materialized.compressed && !flat.is_empty() {
            StoredBody {
                data: deflate(&flat, materialized.deflate_level)?.into(),
                flat_len: flat.len(),
            }
        } else {
            StoredBody {
                data: flat,
                flat_len: 0,
            }
        };

        let longest = materialized.stored.data.len().max(materialized.stored.flat_len);
        if longest > self.width.max_len() {
            self.width = LengthWidth::fitting(longest);
        }
        trace!(
            "{} {}: rebuilt body ({} bytes)",
            self.record_type,
            self.ref_id,
            longest
        );
        Ok(())
    }
}

impl Element for ChangeRecord {
    fn size(&self) -> usize {
        RefId::SIZE + 4 + 1 + 1 + 2 * self.width.size() + self.stored().data.len()
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        let stored = self.stored();
        self.ref_id.write(out);
        self.flags.write(out);
        out.put_u8((self.width.code() << 6) | self.record_type.code());
        out.put_u8(self.version);
        self.width.write(out, stored.data.len());
        self.width.write(out, stored.flat_len);
        out.put_slice(&stored.data);
    }
}

impl ReadElement for ChangeRecord {
    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        Self::read_with_config(cursor, &CodecConfig::default())
    }
}

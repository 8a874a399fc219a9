//! Flag words and the schemas that give their bits meaning.
//!
//! A record's flag word says which optional fields its body carries. Which
//! bit means which field depends on the record category, so every category
//! has a [`FlagSchema`]: a static table of [`FieldSpec`]s sorted by bit.
//! Fields appear in the body in that order.
//!
//! Bits a schema does not define are never interpreted or cleared; they
//! travel through a decode/encode cycle untouched.

use crate::element::{ByteCursor, Element, ReadElement};
use crate::error::Result;
use bytes::BufMut;
use std::fmt;

/// 32-bit change flags, bit 0 least significant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagWord(u32);

impl FlagWord {
    /// Wraps raw bits
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Tests a bit; positions past 31 are never set
    pub fn is_set(self, bit: u8) -> bool {
        1u32.checked_shl(u32::from(bit))
            .map_or(false, |mask| self.0 & mask != 0)
    }

    /// Sets or clears a bit; positions past 31 are ignored
    pub fn set(&mut self, bit: u8, on: bool) {
        if let Some(mask) = 1u32.checked_shl(u32::from(bit)) {
            if on {
                self.0 |= mask;
            } else {
                self.0 &= !mask;
            }
        }
    }

    /// Positions of the set bits, ascending
    pub fn set_bits(self) -> impl Iterator<Item = u8> {
        (0..32u8).filter(move |&bit| self.is_set(bit))
    }
}

impl fmt::Display for FlagWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Element for FlagWord {
    fn size(&self) -> usize {
        4
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        out.put_u32_le(self.0);
    }
}

impl ReadElement for FlagWord {
    fn read(cursor: &mut ByteCursor) -> Result<Self> {
        cursor.read_u32_le().map(Self)
    }
}

/// Byte layout of an optional field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// One byte
    U8,
    /// Little-endian `u16`
    U16,
    /// Little-endian `u32`
    U32,
    /// Little-endian `f32`
    F32,
    /// Three-byte reference id
    RefId,
    /// `u32` flags followed by an unidentified `u16`
    FormFlags,
    /// Cell reference id, then position and rotation as three `f32` each
    Position,
    /// Length-prefixed string
    String,
    /// `u32` count followed by that many reference ids
    RefIdList,
    /// No payload; the flag bit alone carries the information
    Marker,
    /// Layout not modeled; decoding stops at this field
    Opaque,
}

impl FieldKind {
    /// Whether values of this kind can be decoded
    pub fn is_modeled(self) -> bool {
        self != Self::Opaque
    }
}

macro_rules! field_tags {
    ($($variant:ident => $name:literal,)*) => {
        /// Symbolic name of an optional record field
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum FieldTag {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl FieldTag {
            /// Name used in output and error messages
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

field_tags! {
    FormFlags => "formFlags",
    BaseValue => "baseValue",
    FullName => "fullName",
    QuestFlags => "questFlags",
    ScriptDelay => "scriptDelay",
    AlreadyRun => "alreadyRun",
    Instances => "instances",
    RunData => "runData",
    Objectives => "objectives",
    Script => "script",
    Stages => "stages",
    Move => "move",
    HavokMove => "havokMove",
    CellChanged => "cellChanged",
    Scale => "scale",
    Inventory => "inventory",
    ExtraOwnership => "extraOwnership",
    BaseObject => "baseObject",
    ItemData => "itemData",
    Ammo => "ammo",
    LockData => "lockData",
    LifeState => "lifeState",
    ActorValues => "actorValues",
    Packages => "packages",
    Promoted => "promoted",
    ActivatingChildren => "activatingChildren",
    LeveledInventory => "leveledInventory",
    Animation => "animation",
    EncounterZone => "encounterZone",
    CreatedOnly => "createdOnly",
    GameOnly => "gameOnly",
    BaseData => "baseData",
    Attributes => "attributes",
    AiData => "aiData",
    SpellList => "spellList",
    Factions => "factions",
    Skills => "skills",
    Class => "class",
    Race => "race",
    Face => "face",
    DefaultOutfit => "defaultOutfit",
    SleepOutfit => "sleepOutfit",
    Gender => "gender",
    CellFlags => "cellFlags",
    Ownership => "ownership",
    ExteriorShort => "exteriorShort",
    ExteriorChar => "exteriorChar",
    DetachTime => "detachTime",
    SeenData => "seenData",
    FactionFlags => "factionFlags",
    Reactions => "reactions",
    CrimeCounts => "crimeCounts",
    AddedForms => "addedForms",
    AddedObjects => "addedObjects",
    SaidOnce => "saidOnce",
    TeachesSkill => "teachesSkill",
    ZoneFlags => "zoneFlags",
    ZoneGameData => "zoneGameData",
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One bit of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Bit position in the flag word
    pub bit: u8,
    /// Field the bit controls
    pub tag: FieldTag,
    /// Layout of the field's bytes
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Creates a new field spec
    pub const fn new(bit: u8, tag: FieldTag, kind: FieldKind) -> Self {
        Self { bit, tag, kind }
    }
}

/// Bit-to-field table for one record category
#[derive(Debug, PartialEq, Eq)]
pub struct FlagSchema {
    name: &'static str,
    fields: &'static [FieldSpec],
}

impl FlagSchema {
    /// Creates a schema; `fields` must be sorted by ascending bit
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields }
    }

    /// Category name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Every defined field in on-disk order
    pub fn field_order(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Fields present under `word`, in on-disk order
    pub fn decode(&self, word: FlagWord) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(move |spec| word.is_set(spec.bit))
    }

    /// Tags present under `word`, in on-disk order
    pub fn present_tags(&self, word: FlagWord) -> Vec<FieldTag> {
        self.decode(word).map(|spec| spec.tag).collect()
    }

    /// Flag bits for a set of tags; tags outside the schema are ignored
    pub fn encode(&self, tags: &[FieldTag]) -> FlagWord {
        let mut word = FlagWord::default();
        for spec in self.fields.iter().filter(|spec| tags.contains(&spec.tag)) {
            word.set(spec.bit, true);
        }
        word
    }

    /// Mask of all bits this schema defines
    pub fn defined_mask(&self) -> u32 {
        self.fields
            .iter()
            .fold(0, |mask, spec| mask | (1u32 << spec.bit))
    }

    /// Bits set in `word` that this schema does not define
    pub fn unknown_bits(&self, word: FlagWord) -> u32 {
        word.bits() & !self.defined_mask()
    }

    /// Looks up a field by tag
    pub fn spec_for(&self, tag: FieldTag) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.tag == tag)
    }

    /// Looks up a field by bit
    pub fn spec_at(&self, bit: u8) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.bit == bit)
    }

    /// Whether the schema defines `tag`
    pub fn contains(&self, tag: FieldTag) -> bool {
        self.spec_for(tag).is_some()
    }
}

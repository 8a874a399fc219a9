//! Flag schemas for every record category.
//!
//! Adding a category means adding a table here and an arm in
//! [`FlagSchema::for_type`]; the decoding engine does not change.

use super::flags::{FieldKind as K, FieldSpec as F, FieldTag as T, FlagSchema};
use super::RecordType;

/// Categories without modeled flags
pub static EMPTY: FlagSchema = FlagSchema::new("empty", &[]);

/// Base objects: activators, items, containers and the like
pub static BASE_OBJECT: FlagSchema = FlagSchema::new(
    "base object",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::BaseValue, K::U32),
        F::new(2, T::FullName, K::String),
    ],
);

/// Placed object references and projectiles
pub static REFERENCE: FlagSchema = FlagSchema::new(
    "reference",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::Move, K::Position),
        F::new(2, T::HavokMove, K::Opaque),
        F::new(3, T::CellChanged, K::RefId),
        F::new(4, T::Scale, K::F32),
        F::new(5, T::Inventory, K::Opaque),
        F::new(6, T::ExtraOwnership, K::Opaque),
        F::new(7, T::BaseObject, K::RefId),
        F::new(10, T::ItemData, K::Opaque),
        F::new(11, T::Ammo, K::Opaque),
        F::new(12, T::LockData, K::Opaque),
        F::new(23, T::Promoted, K::Opaque),
        F::new(24, T::ActivatingChildren, K::Opaque),
        F::new(25, T::LeveledInventory, K::Opaque),
        F::new(26, T::Animation, K::Opaque),
        F::new(27, T::EncounterZone, K::RefId),
        F::new(28, T::CreatedOnly, K::Opaque),
        F::new(29, T::GameOnly, K::Opaque),
    ],
);

/// Placed actors
pub static ACTOR: FlagSchema = FlagSchema::new(
    "actor",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::Move, K::Position),
        F::new(2, T::HavokMove, K::Opaque),
        F::new(3, T::CellChanged, K::RefId),
        F::new(4, T::Scale, K::F32),
        F::new(5, T::Inventory, K::Opaque),
        F::new(6, T::ExtraOwnership, K::Opaque),
        F::new(7, T::BaseObject, K::RefId),
        F::new(10, T::LifeState, K::Opaque),
        F::new(11, T::ActorValues, K::Opaque),
        F::new(12, T::Packages, K::Opaque),
        F::new(23, T::Promoted, K::Opaque),
        F::new(24, T::ActivatingChildren, K::Opaque),
        F::new(25, T::LeveledInventory, K::Opaque),
        F::new(26, T::Animation, K::Opaque),
        F::new(27, T::EncounterZone, K::RefId),
        F::new(28, T::CreatedOnly, K::Opaque),
        F::new(29, T::GameOnly, K::Opaque),
    ],
);

/// Actor base records
pub static NPC: FlagSchema = FlagSchema::new(
    "npc",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::BaseData, K::Opaque),
        F::new(2, T::Attributes, K::Opaque),
        F::new(3, T::AiData, K::Opaque),
        F::new(4, T::SpellList, K::Opaque),
        F::new(5, T::FullName, K::String),
        F::new(6, T::Factions, K::Opaque),
        F::new(9, T::Skills, K::Opaque),
        F::new(10, T::Class, K::RefId),
        F::new(11, T::Race, K::Opaque),
        F::new(12, T::Face, K::Opaque),
        F::new(24, T::DefaultOutfit, K::RefId),
        F::new(25, T::SleepOutfit, K::RefId),
        F::new(26, T::Gender, K::U8),
    ],
);

/// Quests
pub static QUEST: FlagSchema = FlagSchema::new(
    "quest",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::QuestFlags, K::U16),
        F::new(2, T::ScriptDelay, K::F32),
        F::new(26, T::AlreadyRun, K::U8),
        F::new(27, T::Instances, K::Opaque),
        F::new(28, T::RunData, K::Opaque),
        F::new(29, T::Objectives, K::Opaque),
        F::new(30, T::Script, K::Opaque),
        F::new(31, T::Stages, K::Opaque),
    ],
);

/// Cells
pub static CELL: FlagSchema = FlagSchema::new(
    "cell",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::CellFlags, K::U32),
        F::new(2, T::FullName, K::String),
        F::new(3, T::Ownership, K::Opaque),
        F::new(28, T::ExteriorShort, K::Opaque),
        F::new(29, T::ExteriorChar, K::Opaque),
        F::new(30, T::DetachTime, K::U32),
        F::new(31, T::SeenData, K::Opaque),
    ],
);

/// Factions
pub static FACTION: FlagSchema = FlagSchema::new(
    "faction",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::FactionFlags, K::U32),
        F::new(2, T::Reactions, K::Opaque),
        F::new(31, T::CrimeCounts, K::Opaque),
    ],
);

/// Form lists
pub static FORM_LIST: FlagSchema = FlagSchema::new(
    "form list",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(31, T::AddedForms, K::RefIdList),
    ],
);

/// Leveled actor, item and spell lists
pub static LEVELED_LIST: FlagSchema = FlagSchema::new(
    "leveled list",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(31, T::AddedObjects, K::Opaque),
    ],
);

/// Dialogue responses
pub static INFO: FlagSchema = FlagSchema::new(
    "info",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(31, T::SaidOnce, K::Marker),
    ],
);

/// Books
pub static BOOK: FlagSchema = FlagSchema::new(
    "book",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::BaseValue, K::U32),
        F::new(2, T::FullName, K::String),
        F::new(5, T::TeachesSkill, K::Marker),
    ],
);

/// Encounter zones
pub static ENCOUNTER_ZONE: FlagSchema = FlagSchema::new(
    "encounter zone",
    &[
        F::new(0, T::FormFlags, K::FormFlags),
        F::new(1, T::ZoneFlags, K::U32),
        F::new(31, T::ZoneGameData, K::Opaque),
    ],
);

impl FlagSchema {
    /// The schema for a record category
    pub fn for_type(record_type: RecordType) -> &'static FlagSchema {
        use RecordType as R;

        match record_type {
            R::Reference
            | R::MissileProjectile
            | R::GrenadeProjectile
            | R::BeamProjectile
            | R::FlameProjectile
            | R::ConeProjectile
            | R::BarrierProjectile
            | R::ArrowProjectile
            | R::HazardProjectile => &REFERENCE,
            R::ActorReference => &ACTOR,
            R::Npc => &NPC,
            R::Quest => &QUEST,
            R::Cell => &CELL,
            R::Faction => &FACTION,
            R::FormList => &FORM_LIST,
            R::LeveledNpc | R::LeveledItem | R::LeveledSpell => &LEVELED_LIST,
            R::Info => &INFO,
            R::Book => &BOOK,
            R::EncounterZone => &ENCOUNTER_ZONE,
            R::Other(_) => &EMPTY,
            _ => &BASE_OBJECT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> [&'static FlagSchema; 13] {
        [
            &EMPTY,
            &BASE_OBJECT,
            &REFERENCE,
            &ACTOR,
            &NPC,
            &QUEST,
            &CELL,
            &FACTION,
            &FORM_LIST,
            &LEVELED_LIST,
            &INFO,
            &BOOK,
            &ENCOUNTER_ZONE,
        ]
    }

    #[test]
    fn test_schemas_are_sorted_and_unique() {
        for schema in all() {
            let fields = schema.field_order();
            for pair in fields.windows(2) {
                assert!(
                    pair[0].bit < pair[1].bit,
                    "{} schema out of order at bit {}",
                    schema.name(),
                    pair[1].bit
                );
            }
            for spec in fields {
                assert!(spec.bit < 32);
                assert_eq!(
                    fields.iter().filter(|other| other.tag == spec.tag).count(),
                    1,
                    "{} schema repeats {}",
                    schema.name(),
                    spec.tag
                );
            }
        }
    }

    #[test]
    fn test_quest_schema_high_bits() {
        let tags = QUEST.present_tags(crate::record::FlagWord::new(0xFC00_0000));
        assert_eq!(
            tags,
            vec![T::AlreadyRun, T::Instances, T::RunData, T::Objectives, T::Script, T::Stages]
        );
    }

    #[test]
    fn test_for_type() {
        assert_eq!(FlagSchema::for_type(RecordType::Quest).name(), "quest");
        assert_eq!(FlagSchema::for_type(RecordType::ArrowProjectile).name(), "reference");
        assert_eq!(FlagSchema::for_type(RecordType::Weapon).name(), "base object");
        assert_eq!(FlagSchema::for_type(RecordType::Other(60)).name(), "empty");
    }
}

//! Integration tests for decode/encode round trips.
//!
//! These tests go through the public API only: raw bytes in, elements out,
//! and back to bytes again.

use esskit_core::{
    encode_element, ByteCursor, ChangeRecord, ChangeRecordCollection, ChangeRegion, CodecConfig,
    CompressionEnvelope, CompressionKind, Error, FieldTag, FieldValue, ReadElement, RecordType,
    RefId,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Helper to build one record, picking the narrowest length width.
fn record_bytes(ref_id: u32, flags: u32, type_code: u8, version: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&ref_id.to_be_bytes()[1..]);
    out.extend_from_slice(&flags.to_le_bytes());
    if body.len() <= u8::MAX as usize {
        out.push(type_code);
        out.push(version);
        out.push(body.len() as u8);
        out.push(0);
    } else {
        out.push((1 << 6) | type_code);
        out.push(version);
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out.extend_from_slice(body);
    out
}

/// formFlags (6 bytes) then questFlags (2 bytes)
const QUEST_BODY: [u8; 8] = [0x01, 0x00, 0x00, 0x00, 0xAB, 0xCD, 0x22, 0x11];

fn read_record(bytes: Vec<u8>) -> ChangeRecord {
    let mut cursor = ByteCursor::new(bytes);
    let record = ChangeRecord::read(&mut cursor).unwrap();
    assert!(cursor.is_empty());
    record
}

#[test]
fn test_quest_flags_scenario() {
    let bytes = record_bytes(0x00_0D62, 0x0000_0003, 8, 74, &QUEST_BODY);
    let mut record = read_record(bytes.clone());

    assert_eq!(record.record_type(), RecordType::Quest);
    assert_eq!(
        record.present_fields(),
        vec![FieldTag::FormFlags, FieldTag::QuestFlags]
    );
    assert!(record.has_field(FieldTag::FormFlags));
    assert!(record.has_field(FieldTag::QuestFlags));
    assert!(!record.has_field(FieldTag::ScriptDelay));

    record.set_flag(1, false).unwrap();
    assert!(!record.has_field(FieldTag::QuestFlags));

    let encoded = encode_element(&record).unwrap();
    assert_eq!(encoded.len(), bytes.len() - 2);

    let mut reread = read_record(encoded.to_vec());
    assert_eq!(reread.present_fields(), vec![FieldTag::FormFlags]);
    assert_eq!(
        reread.field(FieldTag::FormFlags).unwrap(),
        Some(&FieldValue::FormFlags {
            flags: 1,
            unknown: 0xCDAB
        })
    );
}

#[test]
fn test_unknown_compression_kind() {
    let mut bytes = vec![3, 0];
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    let err = CompressionEnvelope::read(&mut ByteCursor::new(bytes)).unwrap_err();
    assert!(err.is_format());
    assert!(matches!(
        err,
        Error::UnknownCompression {
            offset: 0,
            value: 3
        }
    ));
}

#[test]
fn test_empty_buffers_for_every_kind() {
    for kind in CompressionKind::ALL {
        let encoded = CompressionEnvelope::new(kind, Vec::new()).reencode().unwrap();
        let decoded = CompressionEnvelope::read(&mut ByteCursor::new(encoded)).unwrap();
        assert_eq!(decoded.kind(), kind);
        assert!(decoded.flat().is_empty());

        let region = ChangeRegion::decode(
            CompressionEnvelope::new(kind, Vec::new()).reencode().unwrap(),
            &CodecConfig::default(),
        )
        .unwrap();
        assert!(region.records().is_empty());
    }
}

#[test]
fn test_string_edit_through_record() {
    let mut body = vec![0u8; 6];
    body.extend_from_slice(&[3, 0, b'I', b'r', b'o']);
    let mut record = read_record(record_bytes(0x12, 0x0000_0005, 23, 1, &body));

    let Some(FieldValue::String(name)) = record.field(FieldTag::FullName).unwrap().cloned() else {
        panic!("expected a name");
    };
    assert_eq!(name.text(), "Iro");
    assert!(!name.is_edited());

    let mut renamed = name;
    renamed.set_text("Iron Sword").unwrap();
    record
        .set_field(FieldTag::FullName, FieldValue::String(renamed))
        .unwrap();

    let mut reread = read_record(encode_element(&record).unwrap().to_vec());
    match reread.field(FieldTag::FullName).unwrap() {
        Some(FieldValue::String(name)) => assert_eq!(name.text(), "Iron Sword"),
        other => panic!("expected a name, got {:?}", other),
    }
}

fn record_strategy() -> impl Strategy<Value = Vec<u8>> {
    (
        0u32..=RefId::MAX,
        any::<u32>(),
        0u8..64,
        any::<u8>(),
        prop::collection::vec(any::<u8>(), 0..600),
    )
        .prop_map(|(ref_id, flags, type_code, version, body)| {
            record_bytes(ref_id, flags, type_code, version, &body)
        })
}

proptest! {
    /// Any envelope decompresses back to the buffer it was built from
    #[test]
    fn prop_envelope_semantic_roundtrip(
        kind_index in 0usize..3,
        flat in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        let kind = CompressionKind::ALL[kind_index];
        let encoded = CompressionEnvelope::new(kind, flat.clone()).reencode().unwrap();
        let decoded = CompressionEnvelope::read(&mut ByteCursor::new(encoded)).unwrap();
        prop_assert_eq!(decoded.kind(), kind);
        prop_assert_eq!(decoded.flat().to_vec(), flat);
    }

    /// Records nobody touched come back byte for byte
    #[test]
    fn prop_untouched_record_roundtrip(bytes in record_strategy()) {
        let record = read_record(bytes.clone());
        prop_assert_eq!(encode_element(&record).unwrap().to_vec(), bytes);
    }

    /// Collections keep record order and bytes
    #[test]
    fn prop_collection_roundtrip(records in prop::collection::vec(record_strategy(), 0..16)) {
        let bytes: Vec<u8> = records.concat();
        let collection = ChangeRecordCollection::read(&mut ByteCursor::new(bytes.clone())).unwrap();
        prop_assert_eq!(collection.len(), records.len());
        prop_assert_eq!(collection.reencode().unwrap().to_vec(), bytes);

        for (record, raw) in collection.iter().zip(&records) {
            prop_assert_eq!(encode_element(record).unwrap().to_vec(), raw.clone());
        }
    }

    /// Lookups return the first record with a matching id
    #[test]
    fn prop_find_returns_first_match(
        ids in prop::collection::vec(0u32..8, 1..12),
        needle in 0u32..8
    ) {
        let bytes: Vec<u8> = ids
            .iter()
            .enumerate()
            .flat_map(|(i, id)| record_bytes(*id, 0, 18, i as u8, &[]))
            .collect();
        let collection = ChangeRecordCollection::read(&mut ByteCursor::new(bytes)).unwrap();
        let needle = RefId::from_raw(needle);

        let expected = ids.iter().position(|id| *id == needle.raw());
        prop_assert_eq!(collection.position(needle), expected);
        prop_assert_eq!(collection.contains(needle), expected.is_some());
        prop_assert_eq!(
            collection.find(needle).map(|record| record.version() as usize),
            expected
        );
    }

    /// Bits the quest schema does not define survive materialization and edits
    #[test]
    fn prop_unknown_bits_preserved(
        unknown in (0u32..1 << 23).prop_map(|bits| bits << 3),
        tail in prop::collection::vec(any::<u8>(), 0..32),
        quest_flags in any::<u16>()
    ) {
        let flags = 0x0000_0003 | unknown;
        let mut body = QUEST_BODY.to_vec();
        body.extend_from_slice(&tail);
        let bytes = record_bytes(0x42, flags, 8, 74, &body);
        let mut record = read_record(bytes.clone());

        let warning = record.materialize(&CodecConfig::default()).unwrap();
        prop_assert_eq!(warning.is_some(), unknown != 0);
        prop_assert_eq!(encode_element(&record).unwrap().to_vec(), bytes);

        record.set_field(FieldTag::QuestFlags, FieldValue::U16(quest_flags)).unwrap();
        let encoded = encode_element(&record).unwrap();
        prop_assert_eq!(&encoded[3..7], &flags.to_le_bytes()[..]);
        prop_assert_eq!(&encoded[encoded.len() - tail.len()..], &tail[..]);
        prop_assert_eq!(&encoded[encoded.len() - tail.len() - 2..encoded.len() - tail.len()], &quest_flags.to_le_bytes()[..]);
    }
}

//! Ordered change-record collection with reference lookup.

use super::ChangeRecord;
use crate::config::CodecConfig;
use crate::element::{encode_element, ByteCursor, Element, RefId};
use crate::error::{Result, SchemaGapWarning};
use bytes::{BufMut, Bytes};
use tracing::{debug, trace};

/// Change records in on-disk order.
///
/// Reference ids are expected to be unique, but duplicates are kept as read;
/// lookups return the first match. Lookups are linear scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeRecordCollection {
    records: Vec<ChangeRecord>,
}

impl ChangeRecordCollection {
    /// Creates an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads records until the cursor is exhausted.
    ///
    /// A failure is labeled with the index and offset of the record it hit.
    pub fn read(cursor: &mut ByteCursor) -> Result<Self> {
        Self::read_with_config(cursor, &CodecConfig::default())
    }

    /// Reads records whose on-demand materialization follows `config`
    pub fn read_with_config(cursor: &mut ByteCursor, config: &CodecConfig) -> Result<Self> {
        let mut records = Vec::new();
        while !cursor.is_empty() {
            let offset = cursor.offset();
            let record = ChangeRecord::read_with_config(cursor, config)
                .map_err(|e| e.in_record(records.len(), offset))?;
            trace!(
                "Record #{} at {}: {} {} flags {}",
                records.len(),
                offset,
                record.record_type(),
                record.ref_id(),
                record.flags()
            );
            records.push(record);
        }
        debug!("Read {} change records", records.len());
        Ok(Self { records })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with the given reference id
    pub fn find(&self, ref_id: RefId) -> Option<&ChangeRecord> {
        self.records.iter().find(|record| record.ref_id() == ref_id)
    }

    /// Mutable access to the first record with the given reference id
    pub fn find_mut(&mut self, ref_id: RefId) -> Option<&mut ChangeRecord> {
        self.records.iter_mut().find(|record| record.ref_id() == ref_id)
    }

    /// Index of the first record with the given reference id
    pub fn position(&self, ref_id: RefId) -> Option<usize> {
        self.records.iter().position(|record| record.ref_id() == ref_id)
    }

    /// Whether any record has the given reference id
    pub fn contains(&self, ref_id: RefId) -> bool {
        self.find(ref_id).is_some()
    }

    /// Record at an index
    pub fn get(&self, index: usize) -> Option<&ChangeRecord> {
        self.records.get(index)
    }

    /// Mutable record at an index
    pub fn get_mut(&mut self, index: usize) -> Option<&mut ChangeRecord> {
        self.records.get_mut(index)
    }

    /// Appends a record
    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    /// Removes the record at `index`, keeping the order of the rest
    pub fn remove(&mut self, index: usize) -> Option<ChangeRecord> {
        (index < self.records.len()).then(|| self.records.remove(index))
    }

    /// Puts `record` at `index` and returns the one it displaced
    pub fn replace(&mut self, index: usize, record: ChangeRecord) -> Option<ChangeRecord> {
        self.records
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, record))
    }

    /// Iterates in on-disk order
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    /// Iterates mutably in on-disk order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ChangeRecord> {
        self.records.iter_mut()
    }

    /// Materializes every record, collecting schema gap warnings.
    ///
    /// Stops at the first record whose body cannot be decoded. Error offsets
    /// are relative to the start of the encoded collection.
    pub fn materialize_all(&mut self, config: &CodecConfig) -> Result<Vec<SchemaGapWarning>> {
        let mut warnings = Vec::new();
        let mut offset = 0;
        for (index, record) in self.records.iter_mut().enumerate() {
            let result = record.materialize(config);
            if let Some(warning) = result.map_err(|e| e.in_record(index, offset))? {
                warnings.push(warning.at_index(index));
            }
            offset += record.size();
        }
        debug!(
            "Materialized {} records ({} with schema gaps)",
            self.records.len(),
            warnings.len()
        );
        Ok(warnings)
    }

    /// Concatenates every record's encoding
    pub fn reencode(&self) -> Result<Bytes> {
        encode_element(self)
    }
}

impl Element for ChangeRecordCollection {
    fn size(&self) -> usize {
        self.records.iter().map(Element::size).sum()
    }

    fn write<B: BufMut>(&self, out: &mut B) {
        for record in &self.records {
            record.write(out);
        }
    }
}

impl<'a> IntoIterator for &'a ChangeRecordCollection {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<ChangeRecord> for ChangeRecordCollection {
    fn from_iter<I: IntoIterator<Item = ChangeRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

//! A change-record region: an optional compression envelope around a
//! back-to-back run of change records.

use crate::config::CodecConfig;
use crate::element::ByteCursor;
use crate::envelope::{CompressionEnvelope, CompressionKind};
use crate::error::{Result, SchemaGapWarning};
use crate::record::ChangeRecordCollection;
use bytes::Bytes;
use tracing::debug;

/// Decoded change records plus the framing they were read from
#[derive(Debug, Clone)]
pub struct ChangeRegion {
    envelope: Option<CompressionEnvelope>,
    records: ChangeRecordCollection,
    /// Flat buffer the records were parsed from
    source: Bytes,
    config: CodecConfig,
}

impl ChangeRegion {
    /// Decodes an enveloped region starting at the beginning of `bytes`.
    ///
    /// Bytes after the envelope body are ignored.
    pub fn decode(bytes: impl Into<Bytes>, config: &CodecConfig) -> Result<Self> {
        Self::read(&mut ByteCursor::new(bytes), config)
    }

    /// Reads an enveloped region at the cursor position
    pub fn read(cursor: &mut ByteCursor, config: &CodecConfig) -> Result<Self> {
        let envelope = CompressionEnvelope::read_with_config(cursor, config)?;
        let records = ChangeRecordCollection::read_with_config(&mut envelope.cursor(), config)?;
        debug!(
            "Decoded {} region with {} records",
            envelope.kind(),
            records.len()
        );
        Ok(Self {
            source: envelope.flat().clone(),
            envelope: Some(envelope),
            records,
            config: config.clone(),
        })
    }

    /// Decodes records stored without an envelope
    pub fn decode_flat(bytes: impl Into<Bytes>, config: &CodecConfig) -> Result<Self> {
        let source: Bytes = bytes.into();
        let records =
            ChangeRecordCollection::read_with_config(&mut ByteCursor::new(source.clone()), config)?;
        debug!("Decoded flat region with {} records", records.len());
        Ok(Self {
            envelope: None,
            records,
            source,
            config: config.clone(),
        })
    }

    /// Envelope algorithm, `None` for flat regions
    pub fn kind(&self) -> Option<CompressionKind> {
        self.envelope.as_ref().map(CompressionEnvelope::kind)
    }

    /// The decoded records
    pub fn records(&self) -> &ChangeRecordCollection {
        &self.records
    }

    /// Mutable access to the decoded records
    pub fn records_mut(&mut self) -> &mut ChangeRecordCollection {
        &mut self.records
    }

    /// Consumes the region, returning its records
    pub fn into_records(self) -> ChangeRecordCollection {
        self.records
    }

    /// Materializes every record with the region's configuration
    pub fn materialize_all(&mut self) -> Result<Vec<SchemaGapWarning>> {
        self.records.materialize_all(&self.config)
    }

    /// The flat buffer as decoded, before any record was re-encoded
    pub fn decoded_flat(&self) -> &Bytes {
        &self.source
    }

    /// The records encoded back to back, without the envelope
    pub fn flat(&self) -> Result<Bytes> {
        self.records.reencode()
    }

    /// Encodes the records, wrapped in the original envelope kind if any
    pub fn reencode(&self) -> Result<Bytes> {
        let flat = self.flat()?;
        match &self.envelope {
            Some(envelope) => {
                let mut envelope = envelope.clone();
                envelope.set_flat(flat);
                envelope.reencode()
            }
            None => Ok(flat),
        }
    }
}

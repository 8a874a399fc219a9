//! Error types for the esskit-core library.
//!
//! Fatal conditions are variants of [`Error`], built with `thiserror`.
//! Schema gaps are not errors: they are reported as [`SchemaGapWarning`]
//! values next to a successfully decoded (partially opaque) record.

use crate::element::RefId;
use crate::envelope::CompressionKind;
use crate::record::{FieldKind, FieldTag, RecordType};
use std::fmt;
use thiserror::Error;

/// Result type alias for esskit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all esskit operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Structurally invalid data
    #[error("invalid save format at offset {offset}: {details}")]
    Format {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Not enough bytes left for a fixed-width read or a declared length
    #[error("truncated data at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Compression ordinal outside of the known set
    #[error("unknown compression kind {value} at offset {offset}")]
    UnknownCompression {
        /// Byte offset of the kind field
        offset: usize,
        /// The raw ordinal
        value: u16,
    },

    /// Corrupt, truncated or mis-sized compressed stream
    #[error("failed to decompress {kind} body: {details}")]
    Decompression {
        /// Algorithm the body was declared with
        kind: CompressionKind,
        /// Detailed description of the issue
        details: String,
    },

    /// The encoder rejected a flat buffer
    #[error("failed to compress {kind} body: {details}")]
    Compression {
        /// Algorithm being applied
        kind: CompressionKind,
        /// Detailed description of the issue
        details: String,
    },

    /// Failure while decoding one record of a collection
    #[error("record #{index} at offset {offset}: {source}")]
    Record {
        /// Position of the record in the collection
        index: usize,
        /// Byte offset where the record starts
        offset: usize,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// An element wrote a different number of bytes than its `size()` reported
    #[error("{element} reported {expected} bytes but wrote {actual}")]
    EncodingInvariant {
        /// Type name of the offending element
        element: &'static str,
        /// Value returned by `size()`
        expected: usize,
        /// Bytes actually written
        actual: usize,
    },

    /// Edited text does not fit the 16-bit length prefix
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    StringTooLong {
        /// Encoded length of the text
        len: usize,
        /// Largest encodable length
        max: usize,
    },

    /// The record's schema has no field with this tag
    #[error("{record_type} records have no '{tag}' field")]
    FieldNotInSchema {
        /// Category of the record
        record_type: RecordType,
        /// Requested field
        tag: FieldTag,
    },

    /// A value of the wrong kind was assigned to a field
    #[error("field '{tag}' holds {expected:?} values, got {actual:?}")]
    FieldKindMismatch {
        /// Field being assigned
        tag: FieldTag,
        /// Kind declared by the schema
        expected: FieldKind,
        /// Kind of the supplied value
        actual: FieldKind,
    },

    /// The field's layout is not modeled, so no value can be produced for it
    #[error("field '{tag}' has no modeled layout")]
    OpaqueField {
        /// Field being assigned
        tag: FieldTag,
    },

    /// The field lies in the undecoded tail of the record
    #[error("field '{tag}' (bit {bit}) is past the schema gap at bit {gap} and cannot be edited")]
    FieldInOpaqueRegion {
        /// Field being accessed
        tag: FieldTag,
        /// Bit of the field
        bit: u8,
        /// First bit that could not be decoded
        gap: u8,
    },

    /// An unmodeled flag bit cannot change while fields follow it in the body
    #[error("flag bit {bit} has no modeled layout and set bit {above} follows it")]
    UnmodeledFlagBelowFields {
        /// Bit being flipped
        bit: u8,
        /// Lowest set bit above it
        above: u8,
    },
}

impl Error {
    /// Creates a new format error
    pub fn format(offset: usize, details: impl Into<String>) -> Self {
        Self::Format {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new truncation error
    pub fn truncated(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::Truncated {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a new decompression error
    pub fn decompression(kind: CompressionKind, details: impl Into<String>) -> Self {
        Self::Decompression {
            kind,
            details: details.into(),
        }
    }

    /// Creates a new compression error
    pub fn compression(kind: CompressionKind, details: impl Into<String>) -> Self {
        Self::Compression {
            kind,
            details: details.into(),
        }
    }

    /// Wraps an error with the index and offset of the record it came from
    pub fn in_record(self, index: usize, offset: usize) -> Self {
        Self::Record {
            index,
            offset,
            source: Box::new(self),
        }
    }

    /// Creates a new encoding invariant error
    pub fn encoding_invariant(element: &'static str, expected: usize, actual: usize) -> Self {
        Self::EncodingInvariant {
            element,
            expected,
            actual,
        }
    }

    /// Returns true for failures of a single edit that leave the data untouched
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StringTooLong { .. }
                | Self::FieldNotInSchema { .. }
                | Self::FieldKindMismatch { .. }
                | Self::OpaqueField { .. }
                | Self::FieldInOpaqueRegion { .. }
                | Self::UnmodeledFlagBelowFields { .. }
        )
    }

    /// Returns true for malformed input (as opposed to bad compressed data or bugs)
    pub fn is_format(&self) -> bool {
        match self {
            Self::Format { .. } | Self::Truncated { .. } | Self::UnknownCompression { .. } => true,
            Self::Record { source, .. } => source.is_format(),
            _ => false,
        }
    }
}

/// A record whose flag word sets a bit the schema cannot decode.
///
/// Everything from `offset` to the end of the body is kept as an opaque tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaGapWarning {
    /// Position of the record in its collection, when known
    pub record_index: Option<usize>,
    /// Reference id of the record
    pub ref_id: RefId,
    /// Category of the record
    pub record_type: RecordType,
    /// First set bit without a decodable layout
    pub bit: u8,
    /// Offset into the flat body where decoding stopped
    pub offset: usize,
}

impl SchemaGapWarning {
    /// Returns the same warning attributed to a collection index
    pub fn at_index(mut self, index: usize) -> Self {
        self.record_index = Some(index);
        self
    }
}

impl fmt::Display for SchemaGapWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.record_index {
            write!(f, "record #{} ", index)?;
        }
        write!(
            f,
            "{} {}: bit {} is not modeled, body kept opaque from offset {}",
            self.record_type, self.ref_id, self.bit, self.offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownCompression {
            offset: 12,
            value: 3,
        };
        assert!(err.to_string().contains("unknown compression kind 3"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_record_label() {
        let err = Error::truncated(40, 4, 1).in_record(7, 32);
        let msg = err.to_string();
        assert!(msg.starts_with("record #7 at offset 32"));
        assert!(msg.contains("need 4 bytes"));
        assert!(err.is_format());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::StringTooLong { len: 70000, max: 65535 }.is_recoverable());
        assert!(!Error::format(0, "bad").is_recoverable());
        assert!(!Error::decompression(CompressionKind::Lz4, "short").is_format());
    }

    #[test]
    fn test_warning_display() {
        let warning = SchemaGapWarning {
            record_index: None,
            ref_id: RefId::from_raw(0x40_0001),
            record_type: RecordType::Quest,
            bit: 27,
            offset: 8,
        }
        .at_index(3);
        let msg = warning.to_string();
        assert!(msg.starts_with("record #3 QUST"));
        assert!(msg.contains("bit 27"));
    }
}

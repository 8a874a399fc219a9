//! # esskit-core
//!
//! A library for decoding, editing and re-encoding the change-record region of
//! binary game saves.
//!
//! This crate provides the core functionality for:
//! - Reading compression envelopes (uncompressed, zlib, LZ4)
//! - Parsing change records and their flag-controlled optional fields
//! - Editing fields and flags without disturbing bytes it does not understand
//! - Writing everything back, byte-identical when nothing was edited
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`element`]: The element contract, byte cursor and primitive elements
//! - [`envelope`]: Compression envelopes
//! - [`record`]: Change records, flag schemas and the record collection
//! - [`region`]: Envelope and collection together
//! - [`config`]: Decode/encode settings
//! - [`error`]: Error types and schema gap warnings
//!
//! ## Example
//!
//! ```no_run
//! use esskit_core::{ChangeRegion, CodecConfig, FieldTag, RefId};
//! use std::fs;
//!
//! let data = fs::read("changes.bin")?;
//! let mut region = ChangeRegion::decode(data, &CodecConfig::default())?;
//!
//! for warning in region.materialize_all()? {
//!     eprintln!("{}", warning);
//! }
//!
//! if let Some(record) = region.records_mut().find_mut(RefId::from_raw(0x01_2E4C)) {
//!     if record.has_field(FieldTag::QuestFlags) {
//!         record.clear_field(FieldTag::QuestFlags)?;
//!     }
//! }
//!
//! fs::write("changes.out.bin", region.reencode()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`Element`]: Implement for new fixed-layout values
//! - [`FlagSchema`]: Static tables describing what each flag bit means
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod element;
pub mod envelope;
pub mod error;
pub mod record;
pub mod region;

// Re-export primary types for convenience
pub use config::CodecConfig;
pub use element::{
    encode_element, read_counted, ByteCursor, Element, LengthPrefixedString, ReadElement, RefId,
    RefIdKind,
};
pub use envelope::{CompressionEnvelope, CompressionKind, FramedBody};
pub use error::{Error, Result, SchemaGapWarning};
pub use record::{
    ChangeRecord, ChangeRecordCollection, FieldKind, FieldTag, FieldValue, FlagSchema, FlagWord,
    LengthWidth, Position, RecordType,
};
pub use region::ChangeRegion;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! The element contract shared by every decodable unit.
//!
//! An element knows its exact serialized size and can write itself to any
//! [`BufMut`]. Types that can be decoded without outside context also
//! implement [`ReadElement`]; context-dependent ones (field values, whose
//! layout comes from a schema) provide their own `read` constructors.
//!
//! `size()` must always equal the number of bytes `write` emits and the
//! number of bytes `read` consumed. Downstream offsets depend on it, so the
//! re-encoding entry points go through [`encode_element`], which checks it.

mod cursor;
mod refid;
mod string;

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub use cursor::ByteCursor;
pub use refid::{RefId, RefIdKind};
pub use string::{LengthPrefixedString, MAX_STRING_LEN};

/// A value with a deterministic binary encoding
pub trait Element {
    /// Exact number of bytes `write` will emit
    fn size(&self) -> usize;

    /// Writes exactly `size()` bytes
    fn write<B: BufMut>(&self, out: &mut B);
}

/// An element that can be decoded from a cursor without extra context
pub trait ReadElement: Element + Sized {
    /// Decodes one value, advancing the cursor by the bytes consumed
    fn read(cursor: &mut ByteCursor) -> Result<Self>;
}

/// Encodes an element into a fresh buffer, verifying its reported size
pub fn encode_element<E: Element + ?Sized>(element: &E) -> Result<Bytes> {
    let expected = element.size();
    let mut out = BytesMut::with_capacity(expected);
    element.write(&mut out);
    if out.len() != expected {
        return Err(Error::encoding_invariant(
            std::any::type_name::<E>(),
            expected,
            out.len(),
        ));
    }
    Ok(out.freeze())
}

/// Decodes one element and returns it with the number of bytes consumed
pub fn read_counted<E: ReadElement>(cursor: &mut ByteCursor) -> Result<(E, usize)> {
    let start = cursor.position();
    let value = E::read(cursor)?;
    Ok((value, cursor.position() - start))
}

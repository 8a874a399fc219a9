//! Position-tracking read cursor over an immutable buffer.
//!
//! Every read is bounds-checked and fails with the absolute offset of the
//! attempted read, so errors deep inside a decompressed sub-buffer can still
//! be traced back. Sub-slices are handed out as [`Bytes`] without copying.

use crate::error::{Error, Result};
use bytes::{Buf, Bytes};

/// Read cursor over a [`Bytes`] buffer
#[derive(Debug, Clone)]
pub struct ByteCursor {
    data: Bytes,
    pos: usize,
    base: usize,
}

impl ByteCursor {
    /// Creates a cursor positioned at the start of `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_base_offset(data, 0)
    }

    /// Creates a cursor whose reported offsets start at `base`
    ///
    /// Used for buffers that are themselves a slice of a larger region.
    pub fn with_base_offset(data: impl Into<Bytes>, base: usize) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            base,
        }
    }

    /// Position relative to the start of this cursor's buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute offset used in error reports
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true when every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Moves to an absolute position within the buffer
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::truncated(self.base, pos, self.data.len()));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advances by `n` bytes without reading them
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.chunk(n).map(|_| ())
    }

    fn chunk(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.remaining() {
            return Err(Error::truncated(self.offset(), n, self.remaining()));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    /// Reads one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.chunk(1)?.get_u8())
    }

    /// Reads a little-endian `u16`
    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(self.chunk(2)?.get_u16_le())
    }

    /// Reads a little-endian `u32`
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(self.chunk(4)?.get_u32_le())
    }

    /// Reads a little-endian `f32`
    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(self.chunk(4)?.get_f32_le())
    }

    /// Reads a 3-byte big-endian unsigned integer
    pub fn read_u24_be(&mut self) -> Result<u32> {
        Ok(self.chunk(3)?.get_uint(3) as u32)
    }

    /// Takes the next `n` bytes as a shared slice of the underlying buffer
    pub fn take(&mut self, n: usize) -> Result<Bytes> {
        if n > self.remaining() {
            return Err(Error::truncated(self.offset(), n, self.remaining()));
        }
        let slice = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(slice)
    }

    /// Takes everything that has not been read yet
    pub fn take_rest(&mut self) -> Bytes {
        let slice = self.data.slice(self.pos..);
        self.pos = self.data.len();
        slice
    }
}

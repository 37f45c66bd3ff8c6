//! Growable record buffer with bounds-checked access helpers.

use crate::types::{GraphRecordError, Result};

/// Signed 32-bit offset stored inside records.
pub type DataOffset = i32;
/// Width of a [`DataOffset`] on disk.
pub const DATA_OFFSET_SIZE: usize = core::mem::size_of::<DataOffset>();

const OUT_OF_BOUNDS: GraphRecordError = GraphRecordError::Corruption("record access out of bounds");

/// The encoded property set of one vertex or edge.
///
/// A record carries no type information of its own; the schema that built
/// it decides how the bytes are interpreted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Record {
    buf: Vec<u8>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Record({})", hex::encode(&self.buf))
    }
}

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-filled record of `len` bytes with room for `capacity`.
    pub fn zeroed(len: usize, capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity.max(len));
        buf.resize(len, 0);
        Self { buf }
    }

    /// Wraps bytes read from storage.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Returns the underlying bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Borrowed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the record has no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bounds-checked view of `len` bytes at `off`.
    pub fn slice(&self, off: usize, len: usize) -> Result<&[u8]> {
        let end = off.checked_add(len).ok_or(OUT_OF_BOUNDS)?;
        self.buf.get(off..end).ok_or(OUT_OF_BOUNDS)
    }

    /// Overwrites `bytes.len()` bytes at `off`.
    pub fn write_at(&mut self, off: usize, bytes: &[u8]) -> Result<()> {
        let end = off.checked_add(bytes.len()).ok_or(OUT_OF_BOUNDS)?;
        self.buf
            .get_mut(off..end)
            .ok_or(OUT_OF_BOUNDS)?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Fills `len` bytes at `off` with `byte`.
    pub fn fill(&mut self, off: usize, len: usize, byte: u8) -> Result<()> {
        let end = off.checked_add(len).ok_or(OUT_OF_BOUNDS)?;
        self.buf.get_mut(off..end).ok_or(OUT_OF_BOUNDS)?.fill(byte);
        Ok(())
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&self, off: usize) -> Result<u16> {
        let b = self.slice(off, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Writes a little-endian u16.
    pub fn write_u16(&mut self, off: usize, v: u16) -> Result<()> {
        self.write_at(off, &v.to_le_bytes())
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&self, off: usize) -> Result<u32> {
        let b = self.slice(off, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, off: usize, v: u32) -> Result<()> {
        self.write_at(off, &v.to_le_bytes())
    }

    /// Reads a [`DataOffset`] and checks it points inside the record.
    pub fn read_offset(&self, off: usize) -> Result<usize> {
        let b = self.slice(off, DATA_OFFSET_SIZE)?;
        let v = DataOffset::from_le_bytes([b[0], b[1], b[2], b[3]]);
        if v < 0 || v as usize > self.buf.len() {
            return Err(GraphRecordError::Corruption("record offset out of range"));
        }
        Ok(v as usize)
    }

    /// Writes a [`DataOffset`].
    pub fn write_offset(&mut self, off: usize, v: usize) -> Result<()> {
        let v = DataOffset::try_from(v)
            .map_err(|_| GraphRecordError::Corruption("record offset overflows i32"))?;
        self.write_at(off, &v.to_le_bytes())
    }

    /// Reads bit `bit` of the bitmap starting at `base`.
    pub fn get_bit(&self, base: usize, bit: usize) -> Result<bool> {
        let byte = self.slice(base + bit / 8, 1)?[0];
        Ok(byte & (1 << (bit % 8)) != 0)
    }

    /// Sets or clears bit `bit` of the bitmap starting at `base`.
    pub fn set_bit(&mut self, base: usize, bit: usize, value: bool) -> Result<()> {
        let idx = base + bit / 8;
        let byte = self.buf.get_mut(idx).ok_or(OUT_OF_BOUNDS)?;
        if value {
            *byte |= 1 << (bit % 8);
        } else {
            *byte &= !(1 << (bit % 8));
        }
        Ok(())
    }

    /// Replaces `old_len` bytes at `off` with `data`, shifting the tail.
    ///
    /// When shrinking the tail moves left before the buffer is truncated;
    /// when growing the buffer is extended before the tail moves right.
    /// Returns the signed size change. Fails without touching the record if
    /// the result would exceed `max_record_size`.
    pub fn splice(
        &mut self,
        off: usize,
        old_len: usize,
        data: &[u8],
        max_record_size: usize,
    ) -> Result<isize> {
        let old_end = off.checked_add(old_len).ok_or(OUT_OF_BOUNDS)?;
        if old_end > self.buf.len() {
            return Err(OUT_OF_BOUNDS);
        }
        let new_len = data.len();
        let total = self.buf.len() - old_len + new_len;
        if new_len > old_len && total > max_record_size {
            return Err(GraphRecordError::RecordSizeLimitExceeded {
                max: max_record_size,
                given: total,
            });
        }
        let tail_len = self.buf.len() - old_end;
        if new_len < old_len {
            self.buf
                .copy_within(old_end..old_end + tail_len, off + new_len);
            self.buf.truncate(total);
        } else if new_len > old_len {
            self.buf.resize(total, 0);
            self.buf
                .copy_within(old_end..old_end + tail_len, off + new_len);
        }
        self.buf[off..off + new_len].copy_from_slice(data);
        Ok(new_len as isize - old_len as isize)
    }

    /// Adds `diff` to each [`DataOffset`] stored at the given positions.
    ///
    /// Used after a variable-length write to fix up every offset that points
    /// past the rewritten field.
    pub fn adjust_offsets<I>(&mut self, positions: I, diff: isize) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        if diff == 0 {
            return Ok(());
        }
        for pos in positions {
            let b = self.slice(pos, DATA_OFFSET_SIZE)?;
            let cur = DataOffset::from_le_bytes([b[0], b[1], b[2], b[3]]) as isize;
            let next = cur + diff;
            if next < 0 || next as usize > self.buf.len() {
                return Err(GraphRecordError::Corruption(
                    "adjusted record offset out of range",
                ));
            }
            self.write_at(pos, &(next as DataOffset).to_le_bytes())?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

#![forbid(unsafe_code)]
//! Encoding, varint, and buffer utilities shared across storage layers.

pub mod ord {
    //! Order-preserving encoders for index keys and identifiers.
    //!
    //! Every encoder here produces bytes whose lexicographic order equals the
    //! numeric (or byte-string) order of the input, and every encoding is
    //! prefix-free so encoded values can be concatenated.

    use crate::types::{GraphRecordError, Result};

    const U64_LEN: usize = core::mem::size_of::<u64>();
    const SIGN_BIT: u64 = 1 << 63;
    const ESCAPE: u8 = 0x00;
    const ESCAPED_ZERO: u8 = 0xFF;
    const TERMINATOR: u8 = 0x01;

    /// Appends the low `width` bytes of `v` in big-endian order.
    pub fn put_uint_be(dst: &mut Vec<u8>, v: u64, width: usize) {
        assert!(width <= U64_LEN, "width {width} exceeds u64");
        dst.extend_from_slice(&v.to_be_bytes()[U64_LEN - width..]);
    }

    /// Reads a `width`-byte big-endian unsigned integer.
    pub fn get_uint_be(src: &[u8], width: usize) -> Result<u64> {
        let head = src
            .get(..width)
            .ok_or(GraphRecordError::Corruption("big-endian integer truncated"))?;
        let mut bytes = [0u8; U64_LEN];
        bytes[U64_LEN - width..].copy_from_slice(head);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Encodes a signed integer into `width` bytes, flipping the sign bit for sorting.
    pub fn put_int_be(dst: &mut Vec<u8>, v: i64, width: usize) {
        let sign = 1u64 << (8 * width - 1);
        let mask = if width == U64_LEN {
            u64::MAX
        } else {
            (1u64 << (8 * width)) - 1
        };
        put_uint_be(dst, ((v as u64) & mask) ^ sign, width);
    }

    /// Decodes a value written by [`put_int_be`].
    pub fn get_int_be(src: &[u8], width: usize) -> Result<i64> {
        let sign = 1u64 << (8 * width - 1);
        let raw = get_uint_be(src, width)? ^ sign;
        let shift = 64 - 8 * width as u32;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Encodes an f64 with order preservation (NaN not allowed).
    pub fn put_f64_be(dst: &mut Vec<u8>, v: f64) {
        debug_assert!(!v.is_nan(), "NaN keys are not allowed");
        put_uint_be(dst, encode_f64_bits(v), U64_LEN);
    }

    /// Decodes an f64 with order preservation.
    pub fn get_f64_be(src: &[u8]) -> Result<f64> {
        let bits = get_uint_be(src, U64_LEN)?;
        Ok(f64::from_bits(decode_f64_bits(bits)))
    }

    /// Encodes an f32 with order preservation.
    pub fn put_f32_be(dst: &mut Vec<u8>, v: f32) {
        let bits = v.to_bits();
        let encoded = if bits & (1 << 31) != 0 {
            !bits
        } else {
            bits ^ (1 << 31)
        };
        dst.extend_from_slice(&encoded.to_be_bytes());
    }

    /// Decodes an f32 written by [`put_f32_be`].
    pub fn get_f32_be(src: &[u8]) -> Result<f32> {
        let encoded = get_uint_be(src, 4)? as u32;
        let bits = if encoded & (1 << 31) != 0 {
            encoded ^ (1 << 31)
        } else {
            !encoded
        };
        Ok(f32::from_bits(bits))
    }

    /// Appends an escaped, terminated byte string.
    ///
    /// `0x00` becomes `0x00 0xFF` and the value ends with `0x00 0x01`, so a
    /// shorter string sorts before any extension of it.
    pub fn put_bytes_key(dst: &mut Vec<u8>, bytes: &[u8]) {
        dst.reserve(bytes.len() + 2);
        for &b in bytes {
            dst.push(b);
            if b == ESCAPE {
                dst.push(ESCAPED_ZERO);
            }
        }
        dst.push(ESCAPE);
        dst.push(TERMINATOR);
    }

    /// Splits an escaped byte string, returning the raw bytes and the encoded length.
    pub fn split_bytes_key(src: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut out = Vec::with_capacity(src.len());
        let mut i = 0;
        while i < src.len() {
            let b = src[i];
            if b != ESCAPE {
                out.push(b);
                i += 1;
                continue;
            }
            match src.get(i + 1) {
                Some(&ESCAPED_ZERO) => {
                    out.push(ESCAPE);
                    i += 2;
                }
                Some(&TERMINATOR) => return Ok((out, i + 2)),
                _ => return Err(GraphRecordError::Corruption("bad escape in byte-string key")),
            }
        }
        Err(GraphRecordError::Corruption("byte-string key missing terminator"))
    }

    fn encode_f64_bits(v: f64) -> u64 {
        let bits = v.to_bits();
        if bits & SIGN_BIT != 0 {
            !bits
        } else {
            bits ^ SIGN_BIT
        }
    }

    fn decode_f64_bits(encoded: u64) -> u64 {
        if encoded & SIGN_BIT != 0 {
            encoded ^ SIGN_BIT
        } else {
            !encoded
        }
    }
}

pub mod var {
    //! Unsigned LEB128 varints used by persisted blobs.

    use crate::types::{GraphRecordError, Result};

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Decodes a u64 varint from a slice, updating the offset.
    pub fn decode_u64(src: &[u8], off: &mut usize) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..10 {
            let byte = *src
                .get(*off)
                .ok_or(GraphRecordError::Corruption("varint truncated"))?;
            *off += 1;
            let payload = (byte & 0x7f) as u64;
            if i == 9 && payload > 1 {
                return Err(GraphRecordError::Corruption("varint overflows u64"));
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(GraphRecordError::Corruption("varint longer than 10 bytes"))
    }
}

pub mod buf {
    //! A slice-backed cursor for parsing persisted blobs.

    use core::fmt;

    use super::var;
    use crate::types::{GraphRecordError, Result};

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        /// The underlying byte slice.
        pub buf: &'a [u8],
        /// Current read offset.
        pub off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Takes the next `n` bytes from the cursor, advancing the offset.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            let end = self
                .off
                .checked_add(n)
                .ok_or(GraphRecordError::Corruption("cursor offset overflow"))?;
            let slice = self
                .buf
                .get(self.off..end)
                .ok_or(GraphRecordError::Corruption("cursor read beyond buffer"))?;
            self.off = end;
            Ok(slice)
        }

        /// Reads a single byte.
        pub fn u8(&mut self) -> Result<u8> {
            Ok(self.take(1)?[0])
        }

        /// Reads an unsigned varint.
        pub fn var_u64(&mut self) -> Result<u64> {
            var::decode_u64(self.buf, &mut self.off)
        }

        /// Reads a varint length followed by that many bytes.
        pub fn len_prefixed(&mut self) -> Result<&'a [u8]> {
            let len = self.var_u64()? as usize;
            self.take(len)
        }

        /// Reads a length-prefixed UTF-8 string.
        pub fn string(&mut self) -> Result<String> {
            let bytes = self.len_prefixed()?;
            String::from_utf8(bytes.to_vec())
                .map_err(|_| GraphRecordError::Corruption("string is not valid UTF-8"))
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }

    /// Writes a varint length followed by the bytes.
    pub fn put_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
        var::encode_u64(bytes.len() as u64, out);
        out.extend_from_slice(bytes);
    }
}

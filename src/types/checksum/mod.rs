#![forbid(unsafe_code)]

use super::{GraphRecordError, Result};

const TRAILER_LEN: usize = 4;

/// CRC32 over a magic tag followed by the payload.
pub fn blob_crc32(magic: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(magic);
    hasher.update(payload);
    hasher.finalize()
}

/// Appends a CRC32 trailer covering `magic` and the current contents of `buf`.
pub fn seal(magic: &[u8], buf: &mut Vec<u8>) {
    let crc = blob_crc32(magic, buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Verifies the trailer written by [`seal`] and returns the covered payload.
pub fn unseal<'a>(magic: &[u8], bytes: &'a [u8]) -> Result<&'a [u8]> {
    if bytes.len() < TRAILER_LEN {
        return Err(GraphRecordError::Corruption("sealed blob shorter than trailer"));
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
    let mut stored = [0u8; TRAILER_LEN];
    stored.copy_from_slice(trailer);
    if u32::from_le_bytes(stored) != blob_crc32(magic, payload) {
        return Err(GraphRecordError::Corruption("blob checksum mismatch"));
    }
    Ok(payload)
}

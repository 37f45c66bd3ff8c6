use crate::primitives::bytes::ord;
use crate::storage::field::{codec, FieldData, FieldType};
use crate::types::{GraphRecordError, Result};

/// Turns on-record field bytes into order-preserving index keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyCodec {
    /// Key over one field.
    Single(FieldType),
    /// Key over several fields, concatenated in order.
    Composite(Vec<FieldType>),
}

fn width_mismatch() -> GraphRecordError {
    GraphRecordError::InputError("index key value has the wrong width for its type".into())
}

fn le_int(raw: &[u8]) -> Result<i64> {
    Ok(match *raw {
        [a] => a as i8 as i64,
        [a, b] => i16::from_le_bytes([a, b]) as i64,
        [a, b, c, d] => i32::from_le_bytes([a, b, c, d]) as i64,
        [a, b, c, d, e, f, g, h] => i64::from_le_bytes([a, b, c, d, e, f, g, h]),
        _ => return Err(width_mismatch()),
    })
}

fn nan_key() -> GraphRecordError {
    GraphRecordError::InputError("NaN cannot be used as an index key.".into())
}

/// Appends the key encoding of one value.
pub(crate) fn encode_part(ty: FieldType, raw: &[u8], out: &mut Vec<u8>) -> Result<()> {
    match ty {
        FieldType::String | FieldType::Blob => {
            ord::put_bytes_key(out, raw);
            return Ok(());
        }
        _ => {}
    }
    if Some(raw.len()) != ty.fixed_size() {
        return Err(width_mismatch());
    }
    match ty {
        FieldType::Bool => out.push(raw[0]),
        FieldType::Float => {
            let v = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            if v.is_nan() {
                return Err(nan_key());
            }
            ord::put_f32_be(out, v)
        }
        FieldType::Double => {
            let mut b = [0u8; 8];
            b.copy_from_slice(raw);
            let v = f64::from_le_bytes(b);
            if v.is_nan() {
                return Err(nan_key());
            }
            ord::put_f64_be(out, v);
        }
        _ => ord::put_int_be(out, le_int(raw)?, raw.len()),
    }
    Ok(())
}

/// Decodes one value from the front of `enc`, returning it and the bytes used.
fn decode_part(ty: FieldType, enc: &[u8]) -> Result<(FieldData, usize)> {
    if let FieldType::String | FieldType::Blob = ty {
        let (raw, used) = ord::split_bytes_key(enc)?;
        return Ok((codec::decode(ty, &raw)?, used));
    }
    let width = ty
        .fixed_size()
        .ok_or(GraphRecordError::Invalid("fixed width of variable type"))?;
    let part = enc
        .get(..width)
        .ok_or(GraphRecordError::Corruption("index key truncated"))?;
    let raw = match ty {
        FieldType::Bool => vec![part[0]],
        FieldType::Float => ord::get_f32_be(part)?.to_le_bytes().to_vec(),
        FieldType::Double => ord::get_f64_be(part)?.to_le_bytes().to_vec(),
        _ => ord::get_int_be(part, width)?.to_le_bytes()[..width].to_vec(),
    };
    Ok((codec::decode(ty, &raw)?, width))
}

impl KeyCodec {
    /// Encodes the on-record bytes of a single-field key.
    pub fn encode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyCodec::Single(ty) => {
                let mut out = Vec::with_capacity(raw.len() + 2);
                encode_part(*ty, raw, &mut out)?;
                Ok(out)
            }
            KeyCodec::Composite(_) => self.encode_parts(&[raw]),
        }
    }

    /// Encodes one raw value per key part.
    pub fn encode_parts(&self, parts: &[&[u8]]) -> Result<Vec<u8>> {
        let types = self.types();
        if parts.len() != types.len() {
            return Err(GraphRecordError::InputError(format!(
                "Composite key expects {} values, got {}",
                types.len(),
                parts.len()
            )));
        }
        self.encode_prefix(parts)
    }

    /// Encodes the first `parts.len()` key parts; used for prefix scans.
    pub fn encode_prefix(&self, parts: &[&[u8]]) -> Result<Vec<u8>> {
        let types = self.types();
        if parts.len() > types.len() {
            return Err(GraphRecordError::InputError(
                "too many values for composite key".into(),
            ));
        }
        let mut out = Vec::new();
        for (ty, raw) in types.iter().zip(parts) {
            encode_part(*ty, raw, &mut out)?;
        }
        Ok(out)
    }

    /// Decodes a complete logical key back into typed values.
    pub fn decode(&self, mut enc: &[u8]) -> Result<Vec<FieldData>> {
        let mut out = Vec::new();
        for ty in self.types() {
            let (v, used) = decode_part(*ty, enc)?;
            out.push(v);
            enc = &enc[used..];
        }
        if !enc.is_empty() {
            return Err(GraphRecordError::Corruption("trailing bytes in index key"));
        }
        Ok(out)
    }

    /// Types of the key parts.
    pub fn types(&self) -> &[FieldType] {
        match self {
            KeyCodec::Single(ty) => std::slice::from_ref(ty),
            KeyCodec::Composite(types) => types,
        }
    }
}

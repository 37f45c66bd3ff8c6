//! Width conversion for fixed-size values written under an older field type.
//!
//! The self-describing layout keeps the bytes a record was written with when
//! a field is retyped. Reads convert those bytes into the declared width:
//! integers saturate at the declared range, floats convert by precision.

use super::FieldType;
use crate::types::{GraphRecordError, Result};

fn read_int(stored: &[u8]) -> Result<i64> {
    Ok(match *stored {
        [a] => a as i8 as i64,
        [a, b] => i16::from_le_bytes([a, b]) as i64,
        [a, b, c, d] => i32::from_le_bytes([a, b, c, d]) as i64,
        [a, b, c, d, e, f, g, h] => i64::from_le_bytes([a, b, c, d, e, f, g, h]),
        _ => return Err(GraphRecordError::Corruption("unsupported stored integer width")),
    })
}

fn read_float(stored: &[u8]) -> Result<f64> {
    Ok(match *stored {
        [a, b, c, d] => f32::from_le_bytes([a, b, c, d]) as f64,
        [a, b, c, d, e, f, g, h] => f64::from_le_bytes([a, b, c, d, e, f, g, h]),
        _ => return Err(GraphRecordError::Corruption("unsupported stored float width")),
    })
}

/// Returns `stored` re-encoded at the width of `declared`.
///
/// Bytes that already have the declared width are returned unchanged.
pub fn convert_data(declared: FieldType, stored: &[u8]) -> Result<Vec<u8>> {
    let width = declared
        .fixed_size()
        .ok_or(GraphRecordError::Invalid("conversion of variable-length type"))?;
    if stored.len() == width {
        return Ok(stored.to_vec());
    }
    let out = match declared {
        FieldType::Bool => vec![read_int(stored)?.clamp(0, 1) as u8],
        FieldType::Float => (read_float(stored)? as f32).to_le_bytes().to_vec(),
        FieldType::Double => read_float(stored)?.to_le_bytes().to_vec(),
        ty => {
            let (lo, hi) = match ty {
                FieldType::Date => FieldType::Int32.int_range(),
                FieldType::DateTime => FieldType::Int64.int_range(),
                ty => ty.int_range(),
            }
            .ok_or(GraphRecordError::Invalid("no conversion for declared type"))?;
            let v = read_int(stored)?.clamp(lo, hi);
            v.to_le_bytes()[..width].to_vec()
        }
    };
    Ok(out)
}

//! Conversions between [`FieldData`], text, and the on-record byte form.
//!
//! Fixed-size values are stored little-endian at their declared width.
//! Strings are stored as raw UTF-8 and blobs as raw bytes.

use base64::Engine as _;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use super::{FieldData, FieldType};
use crate::types::{GraphRecordError, Result};

const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

fn parse_failed(field: &str, ty: FieldType, input: &str) -> GraphRecordError {
    GraphRecordError::ParseStringFailed {
        field: field.to_owned(),
        ty: ty.name().to_owned(),
        input: input.to_owned(),
    }
}

fn incompatible(data: &FieldData, ty: FieldType) -> GraphRecordError {
    GraphRecordError::ParseIncompatibleType {
        from: data.type_name().to_owned(),
        to: ty.name().to_owned(),
    }
}

/// Parses `input` as a value of type `ty`. The whole string must be consumed.
pub fn parse_str(ty: FieldType, input: &str, field: &str) -> Result<FieldData> {
    let fail = || parse_failed(field, ty, input);
    Ok(match ty {
        FieldType::Bool => match input.to_ascii_lowercase().as_str() {
            "true" | "1" => FieldData::Bool(true),
            "false" | "0" => FieldData::Bool(false),
            _ => return Err(fail()),
        },
        FieldType::Int8 => FieldData::Int8(input.parse().map_err(|_| fail())?),
        FieldType::Int16 => FieldData::Int16(input.parse().map_err(|_| fail())?),
        FieldType::Int32 => FieldData::Int32(input.parse().map_err(|_| fail())?),
        FieldType::Int64 => FieldData::Int64(input.parse().map_err(|_| fail())?),
        FieldType::Float => match input.parse::<f32>() {
            Ok(v) if !v.is_nan() => FieldData::Float(v),
            _ => return Err(fail()),
        },
        FieldType::Double => match input.parse::<f64>() {
            Ok(v) if !v.is_nan() => FieldData::Double(v),
            _ => return Err(fail()),
        },
        FieldType::Date => FieldData::Date(parse_date(input).ok_or_else(fail)?),
        FieldType::DateTime => FieldData::DateTime(parse_datetime(input).ok_or_else(fail)?),
        FieldType::String => FieldData::String(input.to_owned()),
        FieldType::Blob => FieldData::Blob(
            base64::engine::general_purpose::STANDARD
                .decode(input)
                .map_err(|_| fail())?,
        ),
    })
}

/// Converts `data` into a value of exactly type `ty`.
///
/// Integers convert between widths when in range, integers and floats widen
/// to floats, floats convert between precisions, dates promote to datetimes,
/// and strings are parsed. NaN is rejected since it has no place in an
/// ordered key.
pub fn coerce(ty: FieldType, data: &FieldData, field: &str) -> Result<FieldData> {
    if data.as_f64().is_some_and(f64::is_nan) {
        return Err(GraphRecordError::InputError(format!(
            "NaN is not a valid value for field [{field}]"
        )));
    }
    if data.field_type() == Some(ty) {
        return Ok(data.clone());
    }
    if let FieldData::String(s) = data {
        return parse_str(ty, s, field);
    }
    if let Some(v) = data.as_i64() {
        return match ty {
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => {
                int_in_range(ty, data, v)
            }
            FieldType::Float => Ok(FieldData::Float(v as f32)),
            FieldType::Double => Ok(FieldData::Double(v as f64)),
            _ => Err(incompatible(data, ty)),
        };
    }
    if let Some(v) = data.as_f64() {
        return match ty {
            FieldType::Float => Ok(FieldData::Float(v as f32)),
            FieldType::Double => Ok(FieldData::Double(v)),
            _ => Err(incompatible(data, ty)),
        };
    }
    match (data, ty) {
        (FieldData::Date(days), FieldType::DateTime) => {
            Ok(FieldData::DateTime(*days as i64 * MICROS_PER_DAY))
        }
        _ => Err(incompatible(data, ty)),
    }
}

fn int_in_range(ty: FieldType, data: &FieldData, v: i64) -> Result<FieldData> {
    let (lo, hi) = ty
        .int_range()
        .ok_or(GraphRecordError::Invalid("integer range of non-integer type"))?;
    if v < lo || v > hi {
        return Err(incompatible(data, ty));
    }
    Ok(match ty {
        FieldType::Int8 => FieldData::Int8(v as i8),
        FieldType::Int16 => FieldData::Int16(v as i16),
        FieldType::Int32 => FieldData::Int32(v as i32),
        _ => FieldData::Int64(v),
    })
}

/// On-record bytes of a non-null value.
pub fn to_bytes(data: &FieldData) -> Vec<u8> {
    match data {
        FieldData::Null => Vec::new(),
        FieldData::Bool(v) => vec![*v as u8],
        FieldData::Int8(v) => v.to_le_bytes().to_vec(),
        FieldData::Int16(v) => v.to_le_bytes().to_vec(),
        FieldData::Int32(v) | FieldData::Date(v) => v.to_le_bytes().to_vec(),
        FieldData::Int64(v) | FieldData::DateTime(v) => v.to_le_bytes().to_vec(),
        FieldData::Float(v) => v.to_le_bytes().to_vec(),
        FieldData::Double(v) => v.to_le_bytes().to_vec(),
        FieldData::String(s) => s.as_bytes().to_vec(),
        FieldData::Blob(b) => b.clone(),
    }
}

/// Decodes on-record bytes of type `ty`.
pub fn decode(ty: FieldType, bytes: &[u8]) -> Result<FieldData> {
    if let Some(width) = ty.fixed_size() {
        if bytes.len() != width {
            return Err(GraphRecordError::Corruption("fixed field width mismatch"));
        }
    }
    let mut raw = [0u8; 8];
    raw[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    Ok(match ty {
        FieldType::Bool => FieldData::Bool(bytes[0] != 0),
        FieldType::Int8 => FieldData::Int8(bytes[0] as i8),
        FieldType::Int16 => FieldData::Int16(i16::from_le_bytes([raw[0], raw[1]])),
        FieldType::Int32 => FieldData::Int32(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        FieldType::Date => FieldData::Date(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        FieldType::Int64 => FieldData::Int64(i64::from_le_bytes(raw)),
        FieldType::DateTime => FieldData::DateTime(i64::from_le_bytes(raw)),
        FieldType::Float => FieldData::Float(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        FieldType::Double => FieldData::Double(f64::from_le_bytes(raw)),
        FieldType::String => FieldData::String(
            String::from_utf8(bytes.to_vec())
                .map_err(|_| GraphRecordError::Corruption("string field is not valid UTF-8"))?,
        ),
        FieldType::Blob => FieldData::Blob(bytes.to_vec()),
    })
}

/// Parses `YYYY-MM-DD` into days since the epoch.
pub fn parse_date(input: &str) -> Option<i32> {
    let date = Date::parse(input, format_description!("[year]-[month]-[day]")).ok()?;
    Some(date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY)
}

/// Parses `YYYY-MM-DD HH:MM:SS[.ffffff]` (or a bare date) into microseconds since the epoch.
pub fn parse_datetime(input: &str) -> Option<i64> {
    if let Some(days) = parse_date(input) {
        return Some(days as i64 * MICROS_PER_DAY);
    }
    let (main, frac) = match input.split_once('.') {
        Some((main, frac)) => (main, Some(frac)),
        None => (input, None),
    };
    let dt = PrimitiveDateTime::parse(
        main,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .ok()?;
    let mut micros = dt.assume_utc().unix_timestamp().checked_mul(MICROS_PER_SECOND)?;
    if let Some(frac) = frac {
        if frac.is_empty() || frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let scaled: i64 = format!("{frac:0<6}").parse().ok()?;
        micros = micros.checked_add(scaled)?;
    }
    Some(micros)
}

/// Formats days since the epoch as `YYYY-MM-DD`.
pub fn format_date(days: i32) -> String {
    match Date::from_julian_day(days.saturating_add(UNIX_EPOCH_JULIAN_DAY)) {
        Ok(d) => format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day()),
        Err(_) => days.to_string(),
    }
}

/// Formats microseconds since the epoch as `YYYY-MM-DD HH:MM:SS[.ffffff]`.
pub fn format_datetime(micros: i64) -> String {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let frac = micros.rem_euclid(MICROS_PER_SECOND);
    let Ok(dt) = OffsetDateTime::from_unix_timestamp(secs) else {
        return micros.to_string();
    };
    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    );
    if frac != 0 {
        out.push_str(&format!(".{frac:06}"));
    }
    out
}

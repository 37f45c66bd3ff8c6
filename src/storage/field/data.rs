use std::fmt;

use base64::Engine as _;

use super::codec;
use super::FieldType;

/// A typed field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldData {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 8-bit integer.
    Int8(i8),
    /// 16-bit integer.
    Int16(i16),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// Days since the Unix epoch.
    Date(i32),
    /// Microseconds since the Unix epoch.
    DateTime(i64),
    /// Text.
    String(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl FieldData {
    /// Declared type this value naturally belongs to, `None` for null.
    pub fn field_type(&self) -> Option<FieldType> {
        Some(match self {
            FieldData::Null => return None,
            FieldData::Bool(_) => FieldType::Bool,
            FieldData::Int8(_) => FieldType::Int8,
            FieldData::Int16(_) => FieldType::Int16,
            FieldData::Int32(_) => FieldType::Int32,
            FieldData::Int64(_) => FieldType::Int64,
            FieldData::Float(_) => FieldType::Float,
            FieldData::Double(_) => FieldType::Double,
            FieldData::Date(_) => FieldType::Date,
            FieldData::DateTime(_) => FieldType::DateTime,
            FieldData::String(_) => FieldType::String,
            FieldData::Blob(_) => FieldType::Blob,
        })
    }

    /// Type name used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        self.field_type().map_or("NUL", FieldType::name)
    }

    /// Whether this is [`FieldData::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldData::Null)
    }

    /// Integer payload widened to i64, for any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldData::Int8(v) => Some(v as i64),
            FieldData::Int16(v) => Some(v as i64),
            FieldData::Int32(v) => Some(v as i64),
            FieldData::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Floating payload widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldData::Float(v) => Some(v as f64),
            FieldData::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldData::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for FieldData {
    fn from(v: bool) -> Self {
        FieldData::Bool(v)
    }
}

impl From<i32> for FieldData {
    fn from(v: i32) -> Self {
        FieldData::Int32(v)
    }
}

impl From<i64> for FieldData {
    fn from(v: i64) -> Self {
        FieldData::Int64(v)
    }
}

impl From<f64> for FieldData {
    fn from(v: f64) -> Self {
        FieldData::Double(v)
    }
}

impl From<&str> for FieldData {
    fn from(v: &str) -> Self {
        FieldData::String(v.to_owned())
    }
}

impl From<String> for FieldData {
    fn from(v: String) -> Self {
        FieldData::String(v)
    }
}

impl fmt::Display for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldData::Null => f.write_str("\"null\""),
            FieldData::Bool(v) => write!(f, "{v}"),
            FieldData::Int8(v) => write!(f, "{v}"),
            FieldData::Int16(v) => write!(f, "{v}"),
            FieldData::Int32(v) => write!(f, "{v}"),
            FieldData::Int64(v) => write!(f, "{v}"),
            FieldData::Float(v) => write!(f, "{v}"),
            FieldData::Double(v) => write!(f, "{v}"),
            FieldData::Date(days) => f.write_str(&codec::format_date(*days)),
            FieldData::DateTime(micros) => f.write_str(&codec::format_datetime(*micros)),
            FieldData::String(s) => f.write_str(s),
            FieldData::Blob(b) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

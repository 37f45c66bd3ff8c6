//! Field metadata, typed values, and the per-field record accessors.

pub mod codec;
pub mod convert;
mod data;
pub mod extractor;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GraphRecordError, Result};

pub use data::FieldData;
pub use extractor::FieldExtractor;

/// Declared type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    /// One byte, 0 or 1.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// IEEE single precision.
    Float,
    /// IEEE double precision.
    Double,
    /// Days since 1970-01-01, stored as i32.
    Date,
    /// Microseconds since 1970-01-01T00:00:00, stored as i64.
    DateTime,
    /// UTF-8 text.
    String,
    /// Opaque bytes.
    Blob,
}

impl FieldType {
    /// Every type, in tag order.
    pub const ALL: [FieldType; 11] = [
        FieldType::Bool,
        FieldType::Int8,
        FieldType::Int16,
        FieldType::Int32,
        FieldType::Int64,
        FieldType::Float,
        FieldType::Double,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::String,
        FieldType::Blob,
    ];

    /// Storage width for fixed-size types, `None` for variable-length ones.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Bool | FieldType::Int8 => Some(1),
            FieldType::Int16 => Some(2),
            FieldType::Int32 | FieldType::Float | FieldType::Date => Some(4),
            FieldType::Int64 | FieldType::Double | FieldType::DateTime => Some(8),
            FieldType::String | FieldType::Blob => None,
        }
    }

    /// Whether values of this type have a constant width.
    pub const fn is_fixed(self) -> bool {
        self.fixed_size().is_some()
    }

    /// Upper-case name used in messages.
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Bool => "BOOL",
            FieldType::Int8 => "INT8",
            FieldType::Int16 => "INT16",
            FieldType::Int32 => "INT32",
            FieldType::Int64 => "INT64",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Date => "DATE",
            FieldType::DateTime => "DATETIME",
            FieldType::String => "STRING",
            FieldType::Blob => "BLOB",
        }
    }

    /// Persistent tag.
    pub const fn tag(self) -> u8 {
        match self {
            FieldType::Bool => 1,
            FieldType::Int8 => 2,
            FieldType::Int16 => 3,
            FieldType::Int32 => 4,
            FieldType::Int64 => 5,
            FieldType::Float => 6,
            FieldType::Double => 7,
            FieldType::Date => 8,
            FieldType::DateTime => 9,
            FieldType::String => 10,
            FieldType::Blob => 11,
        }
    }

    /// Decodes a persistent tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.tag() == tag)
            .ok_or(GraphRecordError::Corruption("unknown field type tag"))
    }

    /// Inclusive value range of integer types.
    pub(crate) const fn int_range(self) -> Option<(i64, i64)> {
        match self {
            FieldType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            FieldType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            FieldType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            FieldType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    /// Field name, unique among live fields.
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
    /// Whether the field may be null.
    pub optional: bool,
    /// Value substituted when a record predates the field.
    pub default_value: Option<FieldData>,
    /// Tombstone flag used by the self-describing layout.
    pub deleted: bool,
    /// Assigned id. Dense under the eager layout, stable under the self-describing one.
    pub id: u16,
}

impl FieldSpec {
    /// A non-optional field without a default.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default_value: None,
            deleted: false,
            id: 0,
        }
    }

    /// An optional field without a default.
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }

    /// Attaches a default value.
    pub fn with_default(mut self, value: FieldData) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Whether a default has been declared.
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

//! Per-field accessors over encoded records.
//!
//! A [`FieldExtractor`] knows where one field lives inside a record and how
//! to read, write, null, and parse it. The schema builds one extractor per
//! field and hands each its position through `set_layout` whenever the field
//! set changes.

mod eager;
mod self_describing;

use std::borrow::Cow;

use super::{codec, FieldData, FieldSpec, FieldType};
use crate::options::StoreOptions;
use crate::storage::record::Record;
use crate::types::{GraphRecordError, Result};

pub use eager::{EagerExtractor, EagerLayout, EagerPlan, EagerSlot};
pub use self_describing::{SelfDescribingExtractor, SelfDescribingLayout};

pub(crate) use eager::plan as plan_eager;
pub(crate) use self_describing::empty_record as empty_self_describing_record;

/// Size limits enforced on writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLimits {
    /// Largest variable-length value.
    pub max_field_size: usize,
    /// Largest record.
    pub max_record_size: usize,
}

impl From<&StoreOptions> for RecordLimits {
    fn from(opts: &StoreOptions) -> Self {
        Self {
            max_field_size: opts.max_field_size,
            max_record_size: opts.max_record_size,
        }
    }
}

impl Default for RecordLimits {
    fn default() -> Self {
        RecordLimits::from(&StoreOptions::default())
    }
}

/// Accessor for one field under one of the two record layouts.
#[derive(Clone, Debug)]
pub enum FieldExtractor {
    /// Schema-wide fixed offsets.
    Eager(EagerExtractor),
    /// Offsets read from the record's own table.
    SelfDescribing(SelfDescribingExtractor),
}

impl FieldExtractor {
    /// Static field description.
    pub fn spec(&self) -> &FieldSpec {
        match self {
            FieldExtractor::Eager(e) => &e.spec,
            FieldExtractor::SelfDescribing(e) => &e.spec,
        }
    }

    pub(crate) fn spec_mut(&mut self) -> &mut FieldSpec {
        match self {
            FieldExtractor::Eager(e) => &mut e.spec,
            FieldExtractor::SelfDescribing(e) => &mut e.spec,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.spec().name
    }

    /// Declared type.
    pub fn ty(&self) -> FieldType {
        self.spec().ty
    }

    /// Field id.
    pub fn id(&self) -> u16 {
        self.spec().id
    }

    /// Whether the field may hold null.
    pub fn is_optional(&self) -> bool {
        self.spec().optional
    }

    /// Whether the field is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.spec().deleted
    }

    fn limits(&self) -> RecordLimits {
        match self {
            FieldExtractor::Eager(e) => e.limits,
            FieldExtractor::SelfDescribing(e) => e.limits,
        }
    }

    /// Whether the record physically holds this field. Always true for the
    /// eager layout.
    pub fn data_in_record(&self, record: &Record) -> Result<bool> {
        match self {
            FieldExtractor::Eager(_) => Ok(true),
            FieldExtractor::SelfDescribing(e) => e.data_in_record(record),
        }
    }

    /// Null flag. Non-optional fields never read as null.
    pub fn get_is_null(&self, record: &Record) -> Result<bool> {
        if !self.is_optional() {
            return Ok(false);
        }
        match self {
            FieldExtractor::Eager(e) => e.null_bit(record),
            FieldExtractor::SelfDescribing(e) => e.null_bit(record),
        }
    }

    /// Sets or clears the null flag.
    ///
    /// Nulling a variable-length field also drops its bytes.
    pub fn set_is_null(&self, record: &mut Record, is_null: bool) -> Result<()> {
        if is_null && !self.is_optional() {
            return Err(GraphRecordError::FieldCannotBeNull(self.name().to_owned()));
        }
        if is_null && !self.ty().is_fixed() && self.data_in_record(record)? {
            self.write_value(record, &[])?;
        }
        self.write_null_bit(record, is_null)
    }

    pub(crate) fn write_null_bit(&self, record: &mut Record, is_null: bool) -> Result<()> {
        match self {
            FieldExtractor::Eager(e) => e.set_null_bit(record, is_null),
            FieldExtractor::SelfDescribing(e) => e.set_null_bit(record, is_null),
        }
    }

    /// Bytes occupied by the value.
    pub fn data_size(&self, record: &Record) -> Result<usize> {
        match self {
            FieldExtractor::Eager(e) => e.data_size(record),
            FieldExtractor::SelfDescribing(e) => e.data_size(record),
        }
    }

    /// Absolute position of the field's slot.
    pub fn field_offset(&self, record: &Record) -> Result<usize> {
        match self {
            FieldExtractor::Eager(e) => e.field_offset(record),
            FieldExtractor::SelfDescribing(e) => e.field_offset(record),
        }
    }

    /// Encoded value at the declared width; empty when null.
    ///
    /// Borrowed from the record unless the value had to be converted or
    /// came from the field default.
    pub fn get_const_ref<'r>(&self, record: &'r Record) -> Result<Cow<'r, [u8]>> {
        if self.get_is_null(record)? {
            return Ok(Cow::Borrowed(&[][..]));
        }
        match self {
            FieldExtractor::Eager(e) => e.value(record).map(Cow::Borrowed),
            FieldExtractor::SelfDescribing(e) => e.value(record),
        }
    }

    /// Typed copy of the value, [`FieldData::Null`] when null.
    pub fn get_copy(&self, record: &Record) -> Result<FieldData> {
        if self.get_is_null(record)? {
            return Ok(FieldData::Null);
        }
        let bytes = self.get_const_ref(record)?;
        codec::decode(self.ty(), &bytes)
    }

    /// Parses `input` and stores it.
    ///
    /// An empty string nulls a fixed-size field.
    pub fn parse_and_set_str(&self, record: &mut Record, input: &str) -> Result<()> {
        if input.is_empty() && self.ty().is_fixed() {
            return self.set_is_null(record, true);
        }
        let data = codec::parse_str(self.ty(), input, self.name())?;
        self.store(record, &data)
    }

    /// Converts `data` to the declared type and stores it.
    pub fn parse_and_set(&self, record: &mut Record, data: &FieldData) -> Result<()> {
        if data.is_null() {
            return self.set_is_null(record, true);
        }
        let data = codec::coerce(self.ty(), data, self.name())?;
        self.store(record, &data)
    }

    fn store(&self, record: &mut Record, data: &FieldData) -> Result<()> {
        let bytes = codec::to_bytes(data);
        self.write_value(record, &bytes)?;
        self.write_null_bit(record, false)
    }

    /// Writes encoded bytes without touching the null flag.
    pub(crate) fn write_value(&self, record: &mut Record, bytes: &[u8]) -> Result<()> {
        if !self.ty().is_fixed() {
            let max = self.limits().max_field_size;
            if bytes.len() > max {
                return Err(GraphRecordError::DataSizeTooLarge {
                    max,
                    given: bytes.len(),
                });
            }
        }
        match self {
            FieldExtractor::Eager(e) => e.write_value(record, bytes),
            FieldExtractor::SelfDescribing(e) => e.write_value(record, bytes),
        }
    }

    /// Copies this field's value from `src` (laid out by `src_field`) into `dst`.
    ///
    /// Same-typed values move as raw bytes; others go through conversion.
    pub fn copy_from(
        &self,
        dst: &mut Record,
        src_field: &FieldExtractor,
        src: &Record,
    ) -> Result<()> {
        if src_field.get_is_null(src)? {
            return self.set_is_null(dst, true);
        }
        if src_field.ty() == self.ty() {
            let bytes = src_field.get_const_ref(src)?;
            self.write_value(dst, &bytes)?;
            return self.write_null_bit(dst, false);
        }
        let data = src_field.get_copy(src)?;
        self.parse_and_set(dst, &data)
    }

    /// Human-readable value; null renders as `"null"`.
    pub fn field_to_string(&self, record: &Record) -> Result<String> {
        Ok(self.get_copy(record)?.to_string())
    }
}

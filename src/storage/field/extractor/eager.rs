use crate::storage::field::FieldSpec;
use crate::storage::record::{Record, DATA_OFFSET_SIZE};
use crate::types::{GraphRecordError, Result};

use super::RecordLimits;

const NO_LAYOUT: GraphRecordError = GraphRecordError::Invalid("field extractor has no layout");

/// Where a field's value lives under the eager layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EagerSlot {
    /// Fixed-size value at a constant offset.
    Fixed {
        /// Absolute offset.
        offset: usize,
        /// Value width.
        width: usize,
    },
    /// Variable-length value reached through the offset array.
    Var {
        /// Start of the offset array.
        offsets_start: usize,
        /// Position among the variable fields.
        idx: usize,
        /// Number of variable fields in the schema.
        n_var: usize,
    },
}

/// Layout assigned to one eager extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EagerLayout {
    /// Start of the null bitmap.
    pub null_array_off: usize,
    /// Bit within the bitmap, only for optional fields.
    pub null_bit: Option<usize>,
    /// Value position.
    pub slot: EagerSlot,
}

/// Layout of a whole eager schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EagerPlan {
    /// Bytes reserved for the label id.
    pub label_size: usize,
    /// Bytes of null bitmap.
    pub null_bytes: usize,
    /// Start of the variable offset array.
    pub offsets_start: usize,
    /// Number of variable fields.
    pub n_var: usize,
    /// Size of a record holding no variable data.
    pub min_size: usize,
    /// One layout per field, in field order.
    pub layouts: Vec<EagerLayout>,
}

/// Assigns null bits and offsets: optional fields first get bitmap bits,
/// then fixed fields get consecutive offsets, then variable fields get
/// their offset-array slots.
pub fn plan(fields: &[FieldSpec], label_size: usize) -> EagerPlan {
    let n_optional = fields.iter().filter(|f| f.optional).count();
    let null_bytes = n_optional.div_ceil(8);
    let null_array_off = label_size;

    let mut next_bit = 0;
    let null_bits: Vec<Option<usize>> = fields
        .iter()
        .map(|f| {
            f.optional.then(|| {
                next_bit += 1;
                next_bit - 1
            })
        })
        .collect();

    let mut offset = null_array_off + null_bytes;
    let mut slots: Vec<Option<EagerSlot>> = fields
        .iter()
        .map(|f| {
            f.ty.fixed_size().map(|width| {
                let slot = EagerSlot::Fixed { offset, width };
                offset += width;
                slot
            })
        })
        .collect();

    let offsets_start = offset;
    let n_var = fields.iter().filter(|f| !f.ty.is_fixed()).count();
    let mut idx = 0;
    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        *slot = Some(EagerSlot::Var {
            offsets_start,
            idx,
            n_var,
        });
        idx += 1;
    }

    let layouts = slots
        .into_iter()
        .zip(null_bits)
        .filter_map(|(slot, null_bit)| {
            slot.map(|slot| EagerLayout {
                null_array_off,
                null_bit,
                slot,
            })
        })
        .collect();

    EagerPlan {
        label_size,
        null_bytes,
        offsets_start,
        n_var,
        min_size: offsets_start + DATA_OFFSET_SIZE * n_var.saturating_sub(1),
        layouts,
    }
}

impl EagerPlan {
    /// A record with every optional field null and every variable field empty.
    pub fn empty_record(&self, label: Option<u16>, size_hint: usize) -> Result<Record> {
        let mut rec = Record::zeroed(self.min_size, size_hint);
        if self.label_size > 0 {
            rec.write_u16(0, label.unwrap_or_default())?;
        }
        rec.fill(self.label_size, self.null_bytes, 0xFF)?;
        for i in 0..self.n_var.saturating_sub(1) {
            rec.write_offset(self.offsets_start + i * DATA_OFFSET_SIZE, self.min_size)?;
        }
        Ok(rec)
    }
}

/// Accessor for a field under the eager layout.
#[derive(Clone, Debug)]
pub struct EagerExtractor {
    pub(super) spec: FieldSpec,
    pub(super) limits: RecordLimits,
    layout: Option<EagerLayout>,
}

impl EagerExtractor {
    /// Extractor without a layout; call [`EagerExtractor::set_layout`] before use.
    pub fn new(spec: FieldSpec, limits: RecordLimits) -> Self {
        Self {
            spec,
            limits,
            layout: None,
        }
    }

    /// Installs the position computed by the schema.
    pub fn set_layout(&mut self, layout: EagerLayout) {
        self.layout = Some(layout);
    }

    /// Current layout, if assigned.
    pub fn layout(&self) -> Option<&EagerLayout> {
        self.layout.as_ref()
    }

    fn assigned(&self) -> Result<&EagerLayout> {
        self.layout.as_ref().ok_or(NO_LAYOUT)
    }

    pub(super) fn null_bit(&self, rec: &Record) -> Result<bool> {
        let layout = self.assigned()?;
        match layout.null_bit {
            Some(bit) => rec.get_bit(layout.null_array_off, bit),
            None => Ok(false),
        }
    }

    pub(super) fn set_null_bit(&self, rec: &mut Record, is_null: bool) -> Result<()> {
        let layout = self.assigned()?;
        match layout.null_bit {
            Some(bit) => rec.set_bit(layout.null_array_off, bit, is_null),
            None => Ok(()),
        }
    }

    /// Start and length of the value.
    fn extent(&self, rec: &Record) -> Result<(usize, usize)> {
        match self.assigned()?.slot {
            EagerSlot::Fixed { offset, width } => Ok((offset, width)),
            EagerSlot::Var {
                offsets_start,
                idx,
                n_var,
            } => {
                let start = if idx == 0 {
                    offsets_start + DATA_OFFSET_SIZE * (n_var - 1)
                } else {
                    rec.read_offset(offsets_start + DATA_OFFSET_SIZE * (idx - 1))?
                };
                let end = if idx + 1 == n_var {
                    rec.len()
                } else {
                    rec.read_offset(offsets_start + DATA_OFFSET_SIZE * idx)?
                };
                if end < start {
                    return Err(GraphRecordError::Corruption(
                        "variable field offsets out of order",
                    ));
                }
                Ok((start, end - start))
            }
        }
    }

    pub(super) fn data_size(&self, rec: &Record) -> Result<usize> {
        self.extent(rec).map(|(_, len)| len)
    }

    pub(super) fn field_offset(&self, rec: &Record) -> Result<usize> {
        self.extent(rec).map(|(off, _)| off)
    }

    pub(super) fn value<'r>(&self, rec: &'r Record) -> Result<&'r [u8]> {
        let (off, len) = self.extent(rec)?;
        rec.slice(off, len)
    }

    pub(super) fn write_value(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        match self.assigned()?.slot {
            EagerSlot::Fixed { offset, width } => {
                if bytes.len() != width {
                    return Err(GraphRecordError::Invalid("fixed value width mismatch"));
                }
                rec.write_at(offset, bytes)
            }
            EagerSlot::Var {
                offsets_start,
                idx,
                n_var,
            } => {
                let (start, old_len) = self.extent(rec)?;
                let diff = rec.splice(start, old_len, bytes, self.limits.max_record_size)?;
                let trailing = (idx..n_var - 1).map(|i| offsets_start + DATA_OFFSET_SIZE * i);
                rec.adjust_offsets(trailing, diff)
            }
        }
    }
}

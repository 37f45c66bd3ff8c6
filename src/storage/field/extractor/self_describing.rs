use std::borrow::Cow;
use std::sync::Arc;

use crate::storage::field::{codec, convert, FieldSpec};
use crate::storage::record::{Record, DATA_OFFSET_SIZE};
use crate::types::{GraphRecordError, Result};

use super::RecordLimits;

const NO_LAYOUT: GraphRecordError = GraphRecordError::Invalid("field extractor has no layout");
const ABSENT: GraphRecordError =
    GraphRecordError::Invalid("field is not present in record; migrate it first");
const COUNT_SIZE: usize = 2;
const VAR_LEN_SIZE: usize = 4;

/// Schema-wide facts a self-describing extractor needs besides its own spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelfDescribingLayout {
    /// Bytes reserved for the label id.
    pub label_size: usize,
    /// Ids of every variable-length field, alive or deleted, ascending.
    pub var_ids: Arc<[u16]>,
}

struct Header {
    count: usize,
    null_off: usize,
    table_off: usize,
    data_start: usize,
}

/// Accessor for a field whose position is read from the record itself.
#[derive(Clone, Debug)]
pub struct SelfDescribingExtractor {
    pub(super) spec: FieldSpec,
    pub(super) limits: RecordLimits,
    layout: Option<SelfDescribingLayout>,
}

impl SelfDescribingExtractor {
    /// Extractor without a layout; call [`SelfDescribingExtractor::set_layout`] before use.
    pub fn new(spec: FieldSpec, limits: RecordLimits) -> Self {
        Self {
            spec,
            limits,
            layout: None,
        }
    }

    /// Installs the schema-wide layout facts.
    pub fn set_layout(&mut self, layout: SelfDescribingLayout) {
        self.layout = Some(layout);
    }

    /// Current layout, if assigned.
    pub fn layout(&self) -> Option<&SelfDescribingLayout> {
        self.layout.as_ref()
    }

    fn assigned(&self) -> Result<&SelfDescribingLayout> {
        self.layout.as_ref().ok_or(NO_LAYOUT)
    }

    fn header(&self, rec: &Record) -> Result<Header> {
        let count_off = self.assigned()?.label_size;
        let count = rec.read_u16(count_off)? as usize;
        let null_off = count_off + COUNT_SIZE;
        let table_off = null_off + count.div_ceil(8);
        Ok(Header {
            count,
            null_off,
            table_off,
            data_start: table_off + DATA_OFFSET_SIZE * count,
        })
    }

    fn slot(rec: &Record, h: &Header, id: usize) -> Result<(usize, usize)> {
        let start = if id == 0 {
            h.data_start
        } else {
            rec.read_offset(h.table_off + DATA_OFFSET_SIZE * (id - 1))?
        };
        let end = rec.read_offset(h.table_off + DATA_OFFSET_SIZE * id)?;
        if end < start {
            return Err(GraphRecordError::Corruption("field slots out of order"));
        }
        Ok((start, end))
    }

    fn present(&self, rec: &Record) -> Result<Option<Header>> {
        let h = self.header(rec)?;
        Ok((usize::from(self.spec.id) < h.count).then_some(h))
    }

    fn default_bytes(&self) -> Result<Vec<u8>> {
        match &self.spec.default_value {
            Some(d) => Ok(codec::to_bytes(&codec::coerce(self.spec.ty, d, &self.spec.name)?)),
            None => Ok(vec![0; self.spec.ty.fixed_size().unwrap_or(0)]),
        }
    }

    /// Start and length of a present variable value, and the pointer slot.
    fn var_entry(&self, rec: &Record, h: &Header) -> Result<(usize, usize)> {
        let (slot_start, _) = Self::slot(rec, h, usize::from(self.spec.id))?;
        let ptr = rec.read_offset(slot_start)?;
        let len = rec.read_u32(ptr)? as usize;
        if ptr + VAR_LEN_SIZE + len > rec.len() {
            return Err(GraphRecordError::Corruption("variable entry overruns record"));
        }
        Ok((ptr, len))
    }

    pub(super) fn data_in_record(&self, rec: &Record) -> Result<bool> {
        self.present(rec).map(|h| h.is_some())
    }

    pub(super) fn null_bit(&self, rec: &Record) -> Result<bool> {
        match self.present(rec)? {
            Some(h) => rec.get_bit(h.null_off, usize::from(self.spec.id)),
            None => Ok(!self.spec.has_default()),
        }
    }

    pub(super) fn set_null_bit(&self, rec: &mut Record, is_null: bool) -> Result<()> {
        let h = self.present(rec)?.ok_or(ABSENT)?;
        rec.set_bit(h.null_off, usize::from(self.spec.id), is_null)
    }

    pub(super) fn data_size(&self, rec: &Record) -> Result<usize> {
        let Some(h) = self.present(rec)? else {
            return Ok(self.default_bytes()?.len());
        };
        if self.spec.ty.is_fixed() {
            let (start, end) = Self::slot(rec, &h, usize::from(self.spec.id))?;
            Ok(end - start)
        } else {
            self.var_entry(rec, &h).map(|(_, len)| len)
        }
    }

    pub(super) fn field_offset(&self, rec: &Record) -> Result<usize> {
        let h = self.present(rec)?.ok_or(ABSENT)?;
        Self::slot(rec, &h, usize::from(self.spec.id)).map(|(start, _)| start)
    }

    pub(super) fn value<'r>(&self, rec: &'r Record) -> Result<Cow<'r, [u8]>> {
        let Some(h) = self.present(rec)? else {
            return self.default_bytes().map(Cow::Owned);
        };
        match self.spec.ty.fixed_size() {
            Some(width) => {
                let (start, end) = Self::slot(rec, &h, usize::from(self.spec.id))?;
                let stored = rec.slice(start, end - start)?;
                if stored.len() == width {
                    Ok(Cow::Borrowed(stored))
                } else {
                    convert::convert_data(self.spec.ty, stored).map(Cow::Owned)
                }
            }
            None => {
                let (ptr, len) = self.var_entry(rec, &h)?;
                rec.slice(ptr + VAR_LEN_SIZE, len).map(Cow::Borrowed)
            }
        }
    }

    pub(super) fn write_value(&self, rec: &mut Record, bytes: &[u8]) -> Result<()> {
        let h = self.present(rec)?.ok_or(ABSENT)?;
        let id = usize::from(self.spec.id);
        let max = self.limits.max_record_size;
        let var_ids = Arc::clone(&self.assigned()?.var_ids);
        match self.spec.ty.fixed_size() {
            Some(width) => {
                if bytes.len() != width {
                    return Err(GraphRecordError::Invalid("fixed value width mismatch"));
                }
                let (start, end) = Self::slot(rec, &h, id)?;
                if end - start == width {
                    return rec.write_at(start, bytes);
                }
                // Stored under a different width: resize the slot, then shift
                // every later slot end and every variable pointer.
                let diff = rec.splice(start, end - start, bytes, max)?;
                let ends = (id..h.count).map(|j| h.table_off + DATA_OFFSET_SIZE * j);
                rec.adjust_offsets(ends, diff)?;
                let mut pointers = Vec::with_capacity(var_ids.len());
                for &vid in var_ids.iter().filter(|&&v| usize::from(v) < h.count) {
                    pointers.push(Self::slot(rec, &h, usize::from(vid))?.0);
                }
                rec.adjust_offsets(pointers, diff)
            }
            None => {
                let (ptr, old_len) = self.var_entry(rec, &h)?;
                let mut trailing = Vec::new();
                for &vid in var_ids
                    .iter()
                    .filter(|&&v| usize::from(v) < h.count && usize::from(v) != id)
                {
                    let (slot_start, _) = Self::slot(rec, &h, usize::from(vid))?;
                    if rec.read_offset(slot_start)? > ptr {
                        trailing.push(slot_start);
                    }
                }
                let diff = rec.splice(ptr + VAR_LEN_SIZE, old_len, bytes, max)?;
                let len = u32::try_from(bytes.len())
                    .map_err(|_| GraphRecordError::Invalid("variable value length overflows u32"))?;
                rec.write_u32(ptr, len)?;
                rec.adjust_offsets(trailing, diff)
            }
        }
    }
}

/// A record that holds a slot for every field in `fields`, all null and empty.
///
/// `fields[i].id` must equal `i`.
pub fn empty_record(
    fields: &[FieldSpec],
    label_size: usize,
    label: Option<u16>,
    size_hint: usize,
) -> Result<Record> {
    let count = fields.len();
    let count_u16 =
        u16::try_from(count).map_err(|_| GraphRecordError::Invalid("too many fields for record"))?;
    let null_off = label_size + COUNT_SIZE;
    let table_off = null_off + count.div_ceil(8);
    let data_start = table_off + DATA_OFFSET_SIZE * count;
    let slot_width = |f: &FieldSpec| f.ty.fixed_size().unwrap_or(DATA_OFFSET_SIZE);
    let data_end = data_start + fields.iter().map(slot_width).sum::<usize>();
    let n_var = fields.iter().filter(|f| !f.ty.is_fixed()).count();

    let mut rec = Record::zeroed(data_end + VAR_LEN_SIZE * n_var, size_hint);
    if label_size > 0 {
        rec.write_u16(0, label.unwrap_or_default())?;
    }
    rec.write_u16(label_size, count_u16)?;
    rec.fill(null_off, count.div_ceil(8), 0xFF)?;

    let mut slot_start = data_start;
    let mut entry = data_end;
    for (i, field) in fields.iter().enumerate() {
        let slot_end = slot_start + slot_width(field);
        rec.write_offset(table_off + DATA_OFFSET_SIZE * i, slot_end)?;
        if !field.ty.is_fixed() {
            rec.write_offset(slot_start, entry)?;
            entry += VAR_LEN_SIZE;
        }
        slot_start = slot_end;
    }
    Ok(rec)
}

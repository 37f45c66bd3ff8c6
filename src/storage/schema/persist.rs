//! Binary schema blob and its storage in the KV store.
//!
//! Layout: `magic | version u8 | body | crc32`. Lengths and counts in the
//! body are varints, strings are length-prefixed.

use tracing::debug;

use crate::kv::KvTransaction;
use crate::options::{LayoutKind, StoreOptions};
use crate::primitives::bytes::buf::{put_len_prefixed, Cursor};
use crate::primitives::bytes::var;
use crate::storage::field::{codec, FieldSpec, FieldType};
use crate::storage::index::{CompositeIndex, EdgeIndex, IndexUniqueness, KeyCodec, VertexIndex};
use crate::types::checksum;
use crate::types::{GraphRecordError, LabelId, Result};

use super::{EdgeConstraint, Schema, TemporalOrder};

/// Tag at the start of every schema blob.
pub const SCHEMA_MAGIC: &[u8; 4] = b"GRS1";
const SCHEMA_VERSION: u8 = 1;
/// KV table holding one schema blob per label.
pub const SCHEMA_TABLE: &str = "_schema";

const FLAG_VERTEX: u8 = 1 << 0;
const FLAG_LABEL_IN_RECORD: u8 = 1 << 1;
const FLAG_DETACHED: u8 = 1 << 2;
const FIELD_OPTIONAL: u8 = 1 << 0;
const FIELD_DELETED: u8 = 1 << 1;
const FIELD_DEFAULT: u8 = 1 << 2;

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_len_prefixed(out, s.as_bytes());
}

fn put_opt_str(out: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            out.push(1);
            put_str(out, s);
        }
        None => out.push(0),
    }
}

fn get_opt_str(cur: &mut Cursor<'_>) -> Result<Option<String>> {
    match cur.u8()? {
        0 => Ok(None),
        1 => cur.string().map(Some),
        _ => Err(GraphRecordError::Corruption("bad optional marker in schema")),
    }
}

fn get_count(cur: &mut Cursor<'_>) -> Result<usize> {
    let n = cur.var_u64()?;
    usize::try_from(n).map_err(|_| GraphRecordError::Corruption("schema count overflow"))
}

fn get_bool(cur: &mut Cursor<'_>) -> Result<bool> {
    match cur.u8()? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(GraphRecordError::Corruption("bad boolean in schema")),
    }
}

impl Schema {
    /// Serializes fields, metadata and index declarations.
    pub fn store_schema(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(64 + 16 * self.fields.len());
        out.extend_from_slice(SCHEMA_MAGIC);
        out.push(SCHEMA_VERSION);
        put_str(&mut out, &self.label);
        var::encode_u64(u64::from(self.label_id.0), &mut out);
        let mut flags = 0;
        if self.is_vertex {
            flags |= FLAG_VERTEX;
        }
        if self.options.label_in_record {
            flags |= FLAG_LABEL_IN_RECORD;
        }
        if self.detached {
            flags |= FLAG_DETACHED;
        }
        out.push(flags);
        out.push(match self.options.layout {
            LayoutKind::Eager => 0,
            LayoutKind::SelfDescribing => 1,
        });
        put_opt_str(&mut out, self.primary_field.as_deref());
        put_opt_str(&mut out, self.temporal_field.as_deref());
        out.push(match self.temporal_order {
            TemporalOrder::Ascending => 0,
            TemporalOrder::Descending => 1,
        });

        var::encode_u64(self.edge_constraints.len() as u64, &mut out);
        for c in &self.edge_constraints {
            put_str(&mut out, &c.src_label);
            put_str(&mut out, &c.dst_label);
        }

        var::encode_u64(self.fields.len() as u64, &mut out);
        for field in &self.fields {
            let spec = field.spec();
            put_str(&mut out, &spec.name);
            out.push(spec.ty.tag());
            var::encode_u64(u64::from(spec.id), &mut out);
            let mut flags = 0;
            if spec.optional {
                flags |= FIELD_OPTIONAL;
            }
            if spec.deleted {
                flags |= FIELD_DELETED;
            }
            if spec.default_value.is_some() {
                flags |= FIELD_DEFAULT;
            }
            out.push(flags);
            if let Some(default) = &spec.default_value {
                let value = codec::coerce(spec.ty, default, &spec.name)?;
                put_len_prefixed(&mut out, &codec::to_bytes(&value));
            }
        }

        for indexes in [
            self.vertex_indexes
                .iter()
                .map(|(n, i)| (n, i.uniqueness(), i.is_ready()))
                .collect::<Vec<_>>(),
            self.edge_indexes
                .iter()
                .map(|(n, i)| (n, i.uniqueness(), i.is_ready()))
                .collect(),
        ] {
            var::encode_u64(indexes.len() as u64, &mut out);
            for (name, uniqueness, ready) in indexes {
                put_str(&mut out, name);
                out.push(uniqueness.tag());
                out.push(u8::from(ready));
            }
        }

        var::encode_u64(self.composite_indexes.len() as u64, &mut out);
        for (names, index) in &self.composite_indexes {
            var::encode_u64(names.len() as u64, &mut out);
            for name in names {
                put_str(&mut out, name);
            }
            out.push(u8::from(index.is_unique()));
            out.push(u8::from(index.inner().is_ready()));
        }

        var::encode_u64(self.fulltext_fields.len() as u64, &mut out);
        for name in &self.fulltext_fields {
            put_str(&mut out, name);
        }

        checksum::seal(SCHEMA_MAGIC, &mut out);
        Ok(out)
    }

    /// Rebuilds a schema from [`Schema::store_schema`] output and reopens
    /// its index tables.
    ///
    /// Layout and label prefix come from the blob; the remaining options,
    /// such as size limits, come from `options`.
    pub fn load_schema(
        txn: &mut dyn KvTransaction,
        bytes: &[u8],
        options: StoreOptions,
    ) -> Result<Self> {
        if !bytes.starts_with(SCHEMA_MAGIC) {
            return Err(GraphRecordError::Corruption("schema blob magic mismatch"));
        }
        let payload = checksum::unseal(SCHEMA_MAGIC, bytes)?;
        let mut cur = Cursor::new(payload);
        cur.take(SCHEMA_MAGIC.len())?;
        if cur.u8()? != SCHEMA_VERSION {
            return Err(GraphRecordError::Corruption("unsupported schema version"));
        }
        let label = cur.string()?;
        let label_id = u16::try_from(cur.var_u64()?)
            .map_err(|_| GraphRecordError::Corruption("label id out of range"))?;
        let flags = cur.u8()?;
        let layout = match cur.u8()? {
            0 => LayoutKind::Eager,
            1 => LayoutKind::SelfDescribing,
            _ => return Err(GraphRecordError::Corruption("unknown record layout")),
        };
        let options = options
            .layout(layout)
            .label_in_record(flags & FLAG_LABEL_IN_RECORD != 0);
        let mut schema = Schema::new(label, LabelId(label_id), flags & FLAG_VERTEX != 0, options)?;
        schema.detached = flags & FLAG_DETACHED != 0;
        schema.primary_field = get_opt_str(&mut cur)?;
        schema.temporal_field = get_opt_str(&mut cur)?;
        schema.temporal_order = match cur.u8()? {
            0 => TemporalOrder::Ascending,
            1 => TemporalOrder::Descending,
            _ => return Err(GraphRecordError::Corruption("unknown temporal order")),
        };

        let n = get_count(&mut cur)?;
        for _ in 0..n {
            let src = cur.string()?;
            let dst = cur.string()?;
            schema.edge_constraints.push(EdgeConstraint::new(src, dst));
        }

        let n = get_count(&mut cur)?;
        let mut specs = Vec::with_capacity(n);
        for _ in 0..n {
            let name = cur.string()?;
            let ty = FieldType::from_tag(cur.u8()?)?;
            let id = u16::try_from(cur.var_u64()?)
                .map_err(|_| GraphRecordError::Corruption("field id out of range"))?;
            let flags = cur.u8()?;
            let default_value = if flags & FIELD_DEFAULT != 0 {
                Some(codec::decode(ty, cur.len_prefixed()?)?)
            } else {
                None
            };
            specs.push(FieldSpec {
                name,
                ty,
                optional: flags & FIELD_OPTIONAL != 0,
                default_value,
                deleted: flags & FIELD_DELETED != 0,
                id,
            });
        }
        schema.fields = specs.into_iter().map(|s| schema.extractor_for(s)).collect();
        schema.refresh_layout()?;

        let n = get_count(&mut cur)?;
        for _ in 0..n {
            let name = cur.string()?;
            let uniqueness = IndexUniqueness::from_tag(cur.u8()?)?;
            let ready = get_bool(&mut cur)?;
            let ty = schema.get_field_extractor(&name)?.ty();
            let table = schema.index_table_name("vidx", &name);
            let index = VertexIndex::open(
                txn,
                &table,
                KeyCodec::Single(ty),
                uniqueness,
                schema.options.index.clone(),
            )?;
            index.set_ready(ready);
            schema.vertex_indexes.insert(name, index);
        }
        let n = get_count(&mut cur)?;
        for _ in 0..n {
            let name = cur.string()?;
            let uniqueness = IndexUniqueness::from_tag(cur.u8()?)?;
            let ready = get_bool(&mut cur)?;
            let ty = schema.get_field_extractor(&name)?.ty();
            let table = schema.index_table_name("eidx", &name);
            let index = EdgeIndex::open(
                txn,
                &table,
                KeyCodec::Single(ty),
                uniqueness,
                schema.options.index.clone(),
            )?;
            index.set_ready(ready);
            schema.edge_indexes.insert(name, index);
        }
        let n = get_count(&mut cur)?;
        for _ in 0..n {
            let parts = get_count(&mut cur)?;
            let mut fields = Vec::with_capacity(parts);
            for _ in 0..parts {
                let name = cur.string()?;
                let ty = schema.get_field_extractor(&name)?.ty();
                fields.push((name, ty));
            }
            let unique = get_bool(&mut cur)?;
            let ready = get_bool(&mut cur)?;
            let key: Vec<String> = fields.iter().map(|(f, _)| f.clone()).collect();
            let table = schema.index_table_name("cidx", &key.join("+"));
            let index =
                CompositeIndex::open(txn, &table, fields, unique, schema.options.index.clone())?;
            index.inner().set_ready(ready);
            schema.composite_indexes.insert(key, index);
        }

        let n = get_count(&mut cur)?;
        for _ in 0..n {
            let name = cur.string()?;
            schema.fulltext_fields.insert(name);
        }
        if cur.remaining() != 0 {
            return Err(GraphRecordError::Corruption("trailing bytes in schema blob"));
        }
        schema.refresh_layout()?;
        debug!(label = %schema.label, n_fields = schema.fields.len(), "schema.load");
        Ok(schema)
    }

    /// Writes the schema blob under the label name in [`SCHEMA_TABLE`].
    pub fn persist(&self, txn: &mut dyn KvTransaction) -> Result<()> {
        let blob = self.store_schema()?;
        let table = txn.open_table(SCHEMA_TABLE, true)?;
        txn.put(&table, self.label.as_bytes(), &blob)?;
        debug!(label = %self.label, bytes = blob.len(), "schema.persist");
        Ok(())
    }

    /// Loads the schema persisted for `label`, if any.
    pub fn restore(
        txn: &mut dyn KvTransaction,
        label: &str,
        options: StoreOptions,
    ) -> Result<Option<Self>> {
        let table = match txn.open_table(SCHEMA_TABLE, false) {
            Ok(table) => table,
            Err(GraphRecordError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        match txn.get(&table, label.as_bytes())? {
            Some(blob) => Self::load_schema(txn, &blob, options).map(Some),
            None => Ok(None),
        }
    }
}

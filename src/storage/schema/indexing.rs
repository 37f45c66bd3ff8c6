//! Index declaration and per-record index maintenance for a [`Schema`].

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::kv::KvTransaction;
use crate::storage::field::{FieldExtractor, FieldType};
use crate::storage::index::{
    CompositeIndex, EdgeIndex, IndexUniqueness, KeyCodec, SecondaryIndex, VertexIndex,
};
use crate::storage::record::Record;
use crate::types::{EdgeUid, GraphRecordError, LabelId, Result, VertexId};

use super::Schema;

/// Change to forward to a full-text engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FullTextEntry {
    /// Index the listed `(field, text)` pairs of a vertex.
    AddVertex {
        /// Vertex id.
        vid: VertexId,
        /// Vertex label.
        lid: LabelId,
        /// Non-null full-text fields.
        kvs: Vec<(String, String)>,
    },
    /// Forget a vertex.
    DeleteVertex {
        /// Vertex id.
        vid: VertexId,
    },
    /// Index the listed `(field, text)` pairs of an edge.
    AddEdge {
        /// Edge identity.
        euid: EdgeUid,
        /// Non-null full-text fields.
        kvs: Vec<(String, String)>,
    },
    /// Forget an edge.
    DeleteEdge {
        /// Edge identity.
        euid: EdgeUid,
    },
}

fn duplicate_vertex(vid: VertexId, name: &str, value: &str) -> GraphRecordError {
    GraphRecordError::InputError(format!(
        "Failed to index vertex [{vid}] with field value [{name}:{value}]: index value already exists."
    ))
}

fn missing_vertex(vid: VertexId, name: &str, value: &str) -> GraphRecordError {
    GraphRecordError::InputError(format!(
        "Failed to un-index vertex [{vid}] with field value [{name}:{value}]: index value does not exist."
    ))
}

fn duplicate_edge(name: &str, value: &str) -> GraphRecordError {
    GraphRecordError::InputError(format!(
        "Failed to index edge with field value [{name}:{value}]: index value already exists."
    ))
}

fn missing_edge(name: &str, value: &str) -> GraphRecordError {
    GraphRecordError::InputError(format!(
        "Failed to un-index edge with field value [{name}:{value}]: index value does not exist."
    ))
}

impl Schema {
    pub(crate) fn has_indexes(&self) -> bool {
        !self.vertex_indexes.is_empty()
            || !self.edge_indexes.is_empty()
            || !self.composite_indexes.is_empty()
    }

    pub(super) fn index_table_name(&self, kind: &str, field: &str) -> String {
        format!("{}:{kind}:{field}", self.label)
    }

    fn indexable(&self, name: &str) -> Result<FieldType> {
        let ty = self.get_field_extractor(name)?.ty();
        if ty == FieldType::Blob {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: BLOB field [{name}] cannot be indexed",
                self.label
            )));
        }
        Ok(ty)
    }

    fn primary_is_indexed(&self) -> bool {
        self.primary_field
            .as_ref()
            .is_some_and(|p| self.vertex_indexes.contains_key(p))
    }

    /// Whether `name` has a single-field index.
    pub fn is_indexed(&self, name: &str) -> bool {
        self.vertex_indexes.contains_key(name) || self.edge_indexes.contains_key(name)
    }

    /// Names of fields with a single-field index.
    pub fn indexed_fields(&self) -> impl Iterator<Item = &str> {
        self.vertex_indexes
            .keys()
            .chain(self.edge_indexes.keys())
            .map(String::as_str)
    }

    /// Single-field vertex index on `name`.
    pub fn get_vertex_index(&self, name: &str) -> Option<&VertexIndex> {
        self.vertex_indexes.get(name)
    }

    /// Single-field edge index on `name`.
    pub fn get_edge_index(&self, name: &str) -> Option<&EdgeIndex> {
        self.edge_indexes.get(name)
    }

    /// Composite index over exactly `fields`, in order.
    pub fn get_composite_index(&self, fields: &[&str]) -> Option<&CompositeIndex> {
        let key: Vec<String> = fields.iter().map(|f| (*f).to_owned()).collect();
        self.composite_indexes.get(&key)
    }

    /// Every composite index.
    pub fn composite_indexes(&self) -> impl Iterator<Item = &CompositeIndex> {
        self.composite_indexes.values()
    }

    /// Declares an index on a vertex field.
    ///
    /// The primary field must be indexed first, and globally unique. The
    /// index starts out not ready; mark it ready once existing vertices have
    /// been loaded into it.
    pub fn add_vertex_index(
        &mut self,
        txn: &mut dyn KvTransaction,
        name: &str,
        uniqueness: IndexUniqueness,
    ) -> Result<&VertexIndex> {
        if !self.is_vertex {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}] is an edge label",
                self.label
            )));
        }
        let ty = self.indexable(name)?;
        if self.vertex_indexes.contains_key(name) {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: field [{name}] is already indexed",
                self.label
            )));
        }
        let is_primary = self.primary_field.as_deref() == Some(name);
        if is_primary && uniqueness != IndexUniqueness::GlobalUnique {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: primary field [{name}] needs a unique index",
                self.label
            )));
        }
        if !is_primary && !self.primary_is_indexed() {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: index the primary field before other fields",
                self.label
            )));
        }
        let table = self.index_table_name("vidx", name);
        let index = VertexIndex::open(
            txn,
            &table,
            KeyCodec::Single(ty),
            uniqueness,
            self.options.index.clone(),
        )?;
        debug!(label = %self.label, field = name, %uniqueness, "schema.add_vertex_index");
        Ok(self.vertex_indexes.entry(name.to_owned()).or_insert(index))
    }

    /// Declares an index on an edge field.
    pub fn add_edge_index(
        &mut self,
        txn: &mut dyn KvTransaction,
        name: &str,
        uniqueness: IndexUniqueness,
    ) -> Result<&EdgeIndex> {
        if self.is_vertex {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}] is a vertex label",
                self.label
            )));
        }
        let ty = self.indexable(name)?;
        if self.edge_indexes.contains_key(name) {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: field [{name}] is already indexed",
                self.label
            )));
        }
        let table = self.index_table_name("eidx", name);
        let index = EdgeIndex::open(
            txn,
            &table,
            KeyCodec::Single(ty),
            uniqueness,
            self.options.index.clone(),
        )?;
        debug!(label = %self.label, field = name, %uniqueness, "schema.add_edge_index");
        Ok(self.edge_indexes.entry(name.to_owned()).or_insert(index))
    }

    /// Declares a vertex index over several fields, in key order.
    pub fn add_composite_index(
        &mut self,
        txn: &mut dyn KvTransaction,
        names: &[&str],
        unique: bool,
    ) -> Result<&CompositeIndex> {
        if !self.is_vertex {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}] is an edge label",
                self.label
            )));
        }
        if names.len() < 2 {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: a composite index needs at least two fields",
                self.label
            )));
        }
        if !self.primary_is_indexed() {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: index the primary field before other fields",
                self.label
            )));
        }
        let mut fields = Vec::with_capacity(names.len());
        for &name in names {
            if fields.iter().any(|(f, _)| f == name) {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: field [{name}] repeated in composite index",
                    self.label
                )));
            }
            fields.push((name.to_owned(), self.indexable(name)?));
        }
        let key: Vec<String> = fields.iter().map(|(f, _)| f.clone()).collect();
        if self.composite_indexes.contains_key(&key) {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: composite index [{}] already exists",
                self.label,
                key.join(",")
            )));
        }
        let table = self.index_table_name("cidx", &key.join("+"));
        let index = CompositeIndex::open(txn, &table, fields, unique, self.options.index.clone())?;
        debug!(label = %self.label, fields = %key.join(","), unique, "schema.add_composite_index");
        Ok(self.composite_indexes.entry(key).or_insert(index))
    }

    /// Fails when dropping the index on `name` would leave other indexes
    /// without an indexed primary field.
    pub(super) fn check_index_droppable(&self, name: &str) -> Result<()> {
        let is_primary = self.primary_field.as_deref() == Some(name);
        let others = self.vertex_indexes.len() > 1 || !self.composite_indexes.is_empty();
        if self.is_vertex && is_primary && self.vertex_indexes.contains_key(name) && others {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: drop the other indexes before the primary index",
                self.label
            )));
        }
        Ok(())
    }

    /// Drops the single-field index on `name` and its table.
    pub fn drop_index(&mut self, txn: &mut dyn KvTransaction, name: &str) -> Result<bool> {
        self.check_index_droppable(name)?;
        if let Some(index) = self.vertex_indexes.remove(name) {
            txn.drop_table(index.table())?;
        } else if let Some(index) = self.edge_indexes.remove(name) {
            txn.drop_table(index.table())?;
        } else {
            return Ok(false);
        }
        debug!(label = %self.label, field = name, "schema.drop_index");
        Ok(true)
    }

    /// Drops the composite index over exactly `names`.
    pub fn drop_composite_index(
        &mut self,
        txn: &mut dyn KvTransaction,
        names: &[&str],
    ) -> Result<bool> {
        let key: Vec<String> = names.iter().map(|f| (*f).to_owned()).collect();
        let Some(index) = self.composite_indexes.remove(&key) else {
            return Ok(false);
        };
        txn.drop_table(index.inner().table())?;
        debug!(label = %self.label, fields = %key.join(","), "schema.drop_composite_index");
        Ok(true)
    }

    /// Drops every index that covers `name`.
    pub(super) fn drop_indexes_on(
        &mut self,
        txn: &mut dyn KvTransaction,
        name: &str,
    ) -> Result<()> {
        let covering: Vec<Vec<String>> = self
            .composite_indexes
            .keys()
            .filter(|k| k.iter().any(|f| f == name))
            .cloned()
            .collect();
        for key in covering {
            let names: Vec<&str> = key.iter().map(String::as_str).collect();
            self.drop_composite_index(txn, &names)?;
        }
        self.drop_index(txn, name)?;
        Ok(())
    }

    fn indexed_value<'r>(
        &self,
        name: &str,
        record: &'r Record,
    ) -> Result<Option<(&FieldExtractor, Cow<'r, [u8]>)>> {
        let field = self.get_field_extractor(name)?;
        if field.get_is_null(record)? {
            return Ok(None);
        }
        Ok(Some((field, field.get_const_ref(record)?)))
    }

    /// Adds `vid` to every single-field index for the non-null fields of
    /// `record`. On a duplicate, entries added so far are removed again.
    pub fn add_vertex_to_index(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        record: &Record,
    ) -> Result<()> {
        let mut created: Vec<&str> = Vec::with_capacity(self.vertex_indexes.len());
        for (name, index) in &self.vertex_indexes {
            let Some((field, raw)) = self.indexed_value(name, record)? else {
                continue;
            };
            let added = index.add(txn, &raw, vid);
            if !matches!(added, Ok(true)) {
                warn!(label = %self.label, field = %name, %vid, "index.add.rejected");
                self.delete_created_vertex_index(txn, vid, record, &created)?;
                added?;
                return Err(duplicate_vertex(vid, name, &field.field_to_string(record)?));
            }
            created.push(name.as_str());
        }
        Ok(())
    }

    fn delete_created_vertex_index(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        record: &Record,
        created: &[&str],
    ) -> Result<()> {
        for &name in created {
            let Some(index) = self.vertex_indexes.get(name) else {
                continue;
            };
            let Some((field, raw)) = self.indexed_value(name, record)? else {
                continue;
            };
            if !index.delete(txn, &raw, vid)? {
                return Err(missing_vertex(vid, name, &field.field_to_string(record)?));
            }
        }
        Ok(())
    }

    /// Removes `vid` from every single-field index.
    pub fn delete_vertex_index(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        record: &Record,
    ) -> Result<()> {
        let names: Vec<&str> = self.vertex_indexes.keys().map(String::as_str).collect();
        self.delete_created_vertex_index(txn, vid, record, &names)
    }

    /// Moves `vid` between keys for every indexed field whose value differs
    /// between `old` and `new`.
    pub fn update_vertex_index(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        old: &Record,
        new: &Record,
    ) -> Result<()> {
        for (name, index) in &self.vertex_indexes {
            let before = self.indexed_value(name, old)?;
            let after = self.indexed_value(name, new)?;
            if before.as_ref().map(|(_, b)| b) == after.as_ref().map(|(_, b)| b) {
                continue;
            }
            if let Some((field, raw)) = &before {
                if !index.delete(txn, raw, vid)? {
                    return Err(missing_vertex(vid, name, &field.field_to_string(old)?));
                }
            }
            if let Some((field, raw)) = &after {
                let added = index.add(txn, raw, vid);
                if !matches!(added, Ok(true)) {
                    if let Some((_, old_raw)) = &before {
                        index.add(txn, old_raw, vid)?;
                    }
                    warn!(label = %self.label, field = %name, %vid, "index.update.rejected");
                    added?;
                    return Err(duplicate_vertex(vid, name, &field.field_to_string(new)?));
                }
            }
        }
        Ok(())
    }

    /// Whether inserting `record` would collide with a unique vertex index.
    pub fn vertex_unique_index_conflict(
        &self,
        txn: &dyn KvTransaction,
        record: &Record,
    ) -> Result<bool> {
        for (name, index) in &self.vertex_indexes {
            if index.uniqueness() != IndexUniqueness::GlobalUnique {
                continue;
            }
            if let Some((_, raw)) = self.indexed_value(name, record)? {
                if index.unique_index_conflict(txn, &raw)? {
                    return Ok(true);
                }
            }
        }
        for index in self.composite_indexes.values().filter(|c| c.is_unique()) {
            if let Some(parts) = self.composite_parts(index, record)? {
                let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_ref()).collect();
                if index.unique_index_conflict(txn, &parts)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Raw values of the composite's fields, `None` when any is null.
    fn composite_parts<'r>(
        &self,
        index: &CompositeIndex,
        record: &'r Record,
    ) -> Result<Option<Vec<Cow<'r, [u8]>>>> {
        let mut parts = Vec::with_capacity(index.fields().len());
        for name in index.fields() {
            match self.indexed_value(name, record)? {
                Some((_, raw)) => parts.push(raw),
                None => return Ok(None),
            }
        }
        Ok(Some(parts))
    }

    fn composite_value(&self, index: &CompositeIndex, record: &Record) -> Result<String> {
        let names = index.fields().join(",");
        let values = index
            .fields()
            .iter()
            .map(|f| self.get_field_extractor(f)?.field_to_string(record))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{names}:{}", values.join(",")))
    }

    /// Adds `vid` to every composite index whose fields are all set.
    pub fn add_vertex_to_composite_index(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        record: &Record,
    ) -> Result<()> {
        let mut created: Vec<&CompositeIndex> = Vec::new();
        for index in self.composite_indexes.values() {
            let Some(parts) = self.composite_parts(index, record)? else {
                continue;
            };
            let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_ref()).collect();
            let added = index.add(txn, &parts, vid);
            if !matches!(added, Ok(true)) {
                warn!(label = %self.label, fields = %index.fields().join(","), %vid, "index.add.rejected");
                for done in created {
                    self.delete_one_composite(txn, done, vid, record)?;
                }
                added?;
                let value = self.composite_value(index, record)?;
                return Err(GraphRecordError::InputError(format!(
                    "Failed to index vertex [{vid}] with field value [{value}]: index value already exists."
                )));
            }
            created.push(index);
        }
        Ok(())
    }

    fn delete_one_composite(
        &self,
        txn: &mut dyn KvTransaction,
        index: &CompositeIndex,
        vid: VertexId,
        record: &Record,
    ) -> Result<()> {
        let Some(parts) = self.composite_parts(index, record)? else {
            return Ok(());
        };
        let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_ref()).collect();
        if !index.delete(txn, &parts, vid)? {
            let value = self.composite_value(index, record)?;
            return Err(GraphRecordError::InputError(format!(
                "Failed to un-index vertex [{vid}] with field value [{value}]: index value does not exist."
            )));
        }
        Ok(())
    }

    /// Removes `vid` from every composite index.
    pub fn delete_vertex_composite_index(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        record: &Record,
    ) -> Result<()> {
        for index in self.composite_indexes.values() {
            self.delete_one_composite(txn, index, vid, record)?;
        }
        Ok(())
    }

    fn edge_index_add(
        &self,
        txn: &mut dyn KvTransaction,
        name: &str,
        index: &SecondaryIndex<EdgeUid>,
        euid: EdgeUid,
        record: &Record,
    ) -> Result<bool> {
        match self.indexed_value(name, record)? {
            Some((field, raw)) => {
                if !index.add(txn, &raw, euid)? {
                    warn!(label = %self.label, field = name, %euid, "index.add.rejected");
                    return Err(duplicate_edge(name, &field.field_to_string(record)?));
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Adds `euid` to every edge index. On a duplicate, entries added so
    /// far are removed again.
    pub fn add_edge_to_index(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
        record: &Record,
    ) -> Result<()> {
        let mut created: Vec<&str> = Vec::with_capacity(self.edge_indexes.len());
        for (name, index) in &self.edge_indexes {
            match self.edge_index_add(txn, name, index, euid, record) {
                Ok(_) => created.push(name.as_str()),
                Err(e) => {
                    self.delete_created_edge_index(txn, euid, record, &created)?;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn delete_created_edge_index(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
        record: &Record,
        created: &[&str],
    ) -> Result<()> {
        for &name in created {
            let Some(index) = self.edge_indexes.get(name) else {
                continue;
            };
            let Some((field, raw)) = self.indexed_value(name, record)? else {
                continue;
            };
            if !index.delete(txn, &raw, euid)? {
                return Err(missing_edge(name, &field.field_to_string(record)?));
            }
        }
        Ok(())
    }

    /// Removes `euid` from every edge index.
    pub fn delete_edge_index(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
        record: &Record,
    ) -> Result<()> {
        let names: Vec<&str> = self.edge_indexes.keys().map(String::as_str).collect();
        self.delete_created_edge_index(txn, euid, record, &names)
    }

    /// Moves `euid` between keys for every indexed field that changed.
    pub fn update_edge_index(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
        old: &Record,
        new: &Record,
    ) -> Result<()> {
        for (name, index) in &self.edge_indexes {
            let before = self.indexed_value(name, old)?;
            let after = self.indexed_value(name, new)?;
            if before.as_ref().map(|(_, b)| b) == after.as_ref().map(|(_, b)| b) {
                continue;
            }
            if let Some((field, raw)) = &before {
                if !index.delete(txn, raw, euid)? {
                    return Err(missing_edge(name, &field.field_to_string(old)?));
                }
            }
            if let Err(err) = self.edge_index_add(txn, name, index, euid, new) {
                if let Some((_, old_raw)) = &before {
                    index.add(txn, old_raw, euid)?;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Queues a full-text add for a vertex when any field is marked.
    pub fn add_vertex_to_fulltext_index(
        &self,
        vid: VertexId,
        record: &Record,
        buffers: &mut Vec<FullTextEntry>,
    ) -> Result<()> {
        if self.fulltext_fields.is_empty() {
            return Ok(());
        }
        buffers.push(FullTextEntry::AddVertex {
            vid,
            lid: self.label_id,
            kvs: self.fulltext_values(record)?,
        });
        Ok(())
    }

    /// Queues a full-text delete for a vertex when any field is marked.
    pub fn delete_vertex_fulltext_index(&self, vid: VertexId, buffers: &mut Vec<FullTextEntry>) {
        if !self.fulltext_fields.is_empty() {
            buffers.push(FullTextEntry::DeleteVertex { vid });
        }
    }

    /// Queues a full-text add for an edge when any field is marked.
    pub fn add_edge_to_fulltext_index(
        &self,
        euid: EdgeUid,
        record: &Record,
        buffers: &mut Vec<FullTextEntry>,
    ) -> Result<()> {
        if self.fulltext_fields.is_empty() {
            return Ok(());
        }
        buffers.push(FullTextEntry::AddEdge {
            euid,
            kvs: self.fulltext_values(record)?,
        });
        Ok(())
    }

    /// Queues a full-text delete for an edge when any field is marked.
    pub fn delete_edge_fulltext_index(&self, euid: EdgeUid, buffers: &mut Vec<FullTextEntry>) {
        if !self.fulltext_fields.is_empty() {
            buffers.push(FullTextEntry::DeleteEdge { euid });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvStore, MemKv};
    use crate::options::StoreOptions;
    use crate::storage::field::{FieldData, FieldSpec};
    use crate::storage::schema::{EdgeConstraint, TemporalOrder};

    fn users(txn: &mut dyn KvTransaction) -> Result<Schema> {
        let mut s = Schema::new("user", LabelId(1), true, StoreOptions::default())?;
        s.set_schema(
            true,
            vec![
                FieldSpec::new("id", FieldType::Int64),
                FieldSpec::optional("uname", FieldType::String),
                FieldSpec::optional("city", FieldType::String),
                FieldSpec::optional("age", FieldType::Int16),
            ],
            Some("id"),
            None,
            TemporalOrder::Ascending,
            Vec::new(),
        )?;
        s.add_vertex_index(txn, "id", IndexUniqueness::GlobalUnique)?;
        s.add_vertex_index(txn, "uname", IndexUniqueness::GlobalUnique)?;
        Ok(s)
    }

    fn user(s: &Schema, id: i64, uname: &str) -> Result<Record> {
        s.build_record(&[("id", FieldData::Int64(id)), ("uname", uname.into())])
    }

    #[test]
    fn primary_must_be_indexed_first() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let mut s = Schema::new("user", LabelId(1), true, StoreOptions::default())?;
        s.set_schema(
            true,
            vec![
                FieldSpec::new("id", FieldType::Int64),
                FieldSpec::optional("tag", FieldType::String),
                FieldSpec::optional("raw", FieldType::Blob),
            ],
            Some("id"),
            None,
            TemporalOrder::Ascending,
            Vec::new(),
        )?;
        assert!(s.add_vertex_index(&mut txn, "tag", IndexUniqueness::NonUnique).is_err());
        assert!(s.add_vertex_index(&mut txn, "id", IndexUniqueness::NonUnique).is_err());
        s.add_vertex_index(&mut txn, "id", IndexUniqueness::GlobalUnique)?;
        assert!(s.add_vertex_index(&mut txn, "raw", IndexUniqueness::NonUnique).is_err());
        assert!(s.add_vertex_index(&mut txn, "id", IndexUniqueness::GlobalUnique).is_err());
        s.add_vertex_index(&mut txn, "tag", IndexUniqueness::NonUnique)?;
        assert!(s.is_indexed("tag"));
        assert!(s.drop_index(&mut txn, "id").is_err());
        assert!(s.drop_index(&mut txn, "tag")?);
        assert!(s.drop_index(&mut txn, "id")?);
        assert!(!s.has_indexes());
        Ok(())
    }

    #[test]
    fn duplicate_rolls_back_created_entries() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let s = users(&mut txn)?;
        let a = user(&s, 1, "ann")?;
        s.add_vertex_to_index(&mut txn, VertexId(10), &a)?;
        assert!(s.vertex_unique_index_conflict(&txn, &a)?);

        let b = user(&s, 2, "ann")?;
        let err = s.add_vertex_to_index(&mut txn, VertexId(11), &b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to index vertex [11] with field value [uname:ann]: index value already exists."
        );
        let id_index = s.get_vertex_index("id").ok_or(GraphRecordError::NotFound)?;
        assert!(id_index.lookup(&txn, &2i64.to_le_bytes())?.is_empty());
        assert_eq!(id_index.lookup(&txn, &1i64.to_le_bytes())?, vec![VertexId(10)]);
        Ok(())
    }

    #[test]
    fn null_fields_are_not_indexed() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let s = users(&mut txn)?;
        let a = s.build_record(&[("id", FieldData::Int64(1))])?;
        let b = s.build_record(&[("id", FieldData::Int64(2))])?;
        s.add_vertex_to_index(&mut txn, VertexId(1), &a)?;
        s.add_vertex_to_index(&mut txn, VertexId(2), &b)?;
        let uname = s.get_vertex_index("uname").ok_or(GraphRecordError::NotFound)?;
        assert_eq!(uname.num_keys(&txn)?, 0);
        s.delete_vertex_index(&mut txn, VertexId(2), &b)?;
        let err = s.delete_vertex_index(&mut txn, VertexId(2), &b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to un-index vertex [2] with field value [id:2]: index value does not exist."
        );
        Ok(())
    }

    #[test]
    fn update_moves_changed_values_only() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let s = users(&mut txn)?;
        let old = user(&s, 1, "ann")?;
        s.add_vertex_to_index(&mut txn, VertexId(1), &old)?;
        let mut new = old.clone();
        s.parse_and_set_str(&mut new, "uname", "anne")?;
        s.update_vertex_index(&mut txn, VertexId(1), &old, &new)?;
        let uname = s.get_vertex_index("uname").ok_or(GraphRecordError::NotFound)?;
        assert!(uname.lookup(&txn, b"ann")?.is_empty());
        assert_eq!(uname.lookup(&txn, b"anne")?, vec![VertexId(1)]);

        let mut cleared = new.clone();
        s.parse_and_set(&mut cleared, "uname", &FieldData::Null)?;
        s.update_vertex_index(&mut txn, VertexId(1), &new, &cleared)?;
        assert_eq!(uname.num_keys(&txn)?, 0);
        Ok(())
    }

    #[test]
    fn colliding_update_keeps_the_old_value_indexed() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let s = users(&mut txn)?;
        let ann = user(&s, 1, "ann")?;
        let bob = user(&s, 2, "bob")?;
        s.add_vertex_to_index(&mut txn, VertexId(1), &ann)?;
        s.add_vertex_to_index(&mut txn, VertexId(2), &bob)?;

        let mut renamed = ann.clone();
        s.parse_and_set_str(&mut renamed, "uname", "bob")?;
        let err = s
            .update_vertex_index(&mut txn, VertexId(1), &ann, &renamed)
            .unwrap_err();
        assert!(matches!(err, GraphRecordError::InputError(_)));
        let uname = s.get_vertex_index("uname").ok_or(GraphRecordError::NotFound)?;
        assert_eq!(uname.lookup(&txn, b"ann")?, vec![VertexId(1)]);
        assert_eq!(uname.lookup(&txn, b"bob")?, vec![VertexId(2)]);
        Ok(())
    }

    #[test]
    fn composite_maintenance() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let mut s = users(&mut txn)?;
        assert!(s.add_composite_index(&mut txn, &["city"], true).is_err());
        assert!(s.add_composite_index(&mut txn, &["city", "city"], true).is_err());
        s.add_composite_index(&mut txn, &["city", "age"], true)?;

        let mk = |id: i64, city: &str, age: i16| {
            s.build_record(&[
                ("id", FieldData::Int64(id)),
                ("city", city.into()),
                ("age", FieldData::Int16(age)),
            ])
        };
        let a = mk(1, "oslo", 30)?;
        let b = mk(2, "oslo", 30)?;
        s.add_vertex_to_composite_index(&mut txn, VertexId(1), &a)?;
        assert!(s.vertex_unique_index_conflict(&txn, &b)?);
        let err = s.add_vertex_to_composite_index(&mut txn, VertexId(2), &b).unwrap_err();
        assert!(err.to_string().contains("[city,age:oslo,30]"));
        s.delete_vertex_composite_index(&mut txn, VertexId(1), &a)?;
        assert!(!s.vertex_unique_index_conflict(&txn, &b)?);

        s.del_fields(&mut txn, &["age"])?;
        assert_eq!(s.composite_indexes().count(), 0);
        assert!(txn.open_table("user:cidx:city+age", false).is_err());
        Ok(())
    }

    #[test]
    fn edge_indexes_and_fulltext_buffers() -> Result<()> {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let mut s = Schema::new("rated", LabelId(9), false, StoreOptions::default())?;
        s.set_schema(
            false,
            vec![
                FieldSpec::new("ts", FieldType::Int64),
                FieldSpec::optional("note", FieldType::String),
            ],
            None,
            Some("ts"),
            TemporalOrder::Ascending,
            vec![EdgeConstraint::new("user", "movie")],
        )?;
        assert!(s.add_vertex_index(&mut txn, "ts", IndexUniqueness::GlobalUnique).is_err());
        s.add_edge_index(&mut txn, "note", IndexUniqueness::PairUnique)?;
        s.mark_fulltext("note", true)?;

        let rec = s.build_record(&[("ts", FieldData::Int64(5)), ("note", "great".into())])?;
        let e1 = EdgeUid::new(1, 2, 9, 5, 0);
        let e2 = EdgeUid::new(1, 2, 9, 6, 0);
        let e3 = EdgeUid::new(3, 2, 9, 5, 0);
        s.add_edge_to_index(&mut txn, e1, &rec)?;
        let err = s.add_edge_to_index(&mut txn, e2, &rec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to index edge with field value [note:great]: index value already exists."
        );
        s.add_edge_to_index(&mut txn, e3, &rec)?;

        let mut buffers = Vec::new();
        s.add_edge_to_fulltext_index(e1, &rec, &mut buffers)?;
        s.delete_edge_fulltext_index(e3, &mut buffers);
        assert_eq!(
            buffers[0],
            FullTextEntry::AddEdge {
                euid: e1,
                kvs: vec![("note".into(), "great".into())],
            }
        );
        assert_eq!(buffers[1], FullTextEntry::DeleteEdge { euid: e3 });

        s.delete_edge_index(&mut txn, e1, &rec)?;
        let err = s.delete_edge_index(&mut txn, e1, &rec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to un-index edge with field value [note:great]: index value does not exist."
        );
        Ok(())
    }
}

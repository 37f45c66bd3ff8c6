//! Detached property storage.
//!
//! A detached label keeps only its label id in the main record; the field
//! values live in a per-label table keyed by vertex id or edge uid.

use tracing::{debug, trace};

use crate::kv::{KvTable, KvTransaction};
use crate::storage::index::IndexEntry;
use crate::storage::record::Record;
use crate::types::{EdgeUid, GraphRecordError, Result, VertexId};

use super::{Schema, LABEL_SIZE};

impl Schema {
    /// Whether property records are kept in the label's property table.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Switches property storage between the main record and the
    /// property table. Rows already written are not moved.
    pub fn set_detached(&mut self, detached: bool) {
        self.detached = detached;
        debug!(label = %self.label, detached, "schema.set_detached");
    }

    /// Name of the KV table holding detached property records.
    pub fn property_table_name(&self) -> String {
        format!("{}:props", self.label)
    }

    /// Main record of a detached label: the label id alone.
    pub fn create_record_with_label_id(&self) -> Result<Record> {
        let mut record = Record::zeroed(LABEL_SIZE, LABEL_SIZE);
        record.write_u16(0, self.label_id.0)?;
        Ok(record)
    }

    fn property_table(&self, txn: &mut dyn KvTransaction) -> Result<KvTable> {
        if !self.detached {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: properties are not detached",
                self.label
            )));
        }
        txn.open_table(&self.property_table_name(), !txn.is_read_only())
    }

    fn add_detached<E: IndexEntry>(
        &self,
        txn: &mut dyn KvTransaction,
        id: E,
        property: &Record,
    ) -> Result<()> {
        id.check()?;
        let table = self.property_table(txn)?;
        if !txn.insert_new(&table, &id.to_bytes(), property.as_bytes())? {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: properties of [{id}] already exist",
                self.label
            )));
        }
        trace!(table = %table, %id, len = property.len(), "props.add");
        Ok(())
    }

    fn get_detached<E: IndexEntry>(
        &self,
        txn: &mut dyn KvTransaction,
        id: E,
    ) -> Result<Option<Record>> {
        id.check()?;
        let table = self.property_table(txn)?;
        Ok(txn.get(&table, &id.to_bytes())?.map(Record::from_vec))
    }

    fn set_detached_row<E: IndexEntry>(
        &self,
        txn: &mut dyn KvTransaction,
        id: E,
        property: &Record,
    ) -> Result<()> {
        id.check()?;
        let table = self.property_table(txn)?;
        let key = id.to_bytes();
        if txn.get(&table, &key)?.is_none() {
            return Err(GraphRecordError::NotFound);
        }
        txn.put(&table, &key, property.as_bytes())?;
        trace!(table = %table, %id, len = property.len(), "props.set");
        Ok(())
    }

    fn delete_detached<E: IndexEntry>(&self, txn: &mut dyn KvTransaction, id: E) -> Result<()> {
        id.check()?;
        let table = self.property_table(txn)?;
        if !txn.delete(&table, &id.to_bytes())? {
            return Err(GraphRecordError::NotFound);
        }
        trace!(table = %table, %id, "props.delete");
        Ok(())
    }

    /// Stores the property record of a new vertex.
    pub fn add_detached_vertex_property(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        property: &Record,
    ) -> Result<()> {
        self.add_detached(txn, vid, property)
    }

    /// Property record of `vid`, if one was stored.
    pub fn get_detached_vertex_property(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
    ) -> Result<Option<Record>> {
        self.get_detached(txn, vid)
    }

    /// Replaces the property record of an existing vertex.
    pub fn set_detached_vertex_property(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
        property: &Record,
    ) -> Result<()> {
        self.set_detached_row(txn, vid, property)
    }

    /// Removes the property record of `vid`.
    pub fn delete_detached_vertex_property(
        &self,
        txn: &mut dyn KvTransaction,
        vid: VertexId,
    ) -> Result<()> {
        self.delete_detached(txn, vid)
    }

    /// Stores the property record of a new edge.
    pub fn add_detached_edge_property(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
        property: &Record,
    ) -> Result<()> {
        self.add_detached(txn, euid, property)
    }

    /// Property record of `euid`, if one was stored.
    pub fn get_detached_edge_property(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
    ) -> Result<Option<Record>> {
        self.get_detached(txn, euid)
    }

    /// Replaces the property record of an existing edge.
    pub fn set_detached_edge_property(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
        property: &Record,
    ) -> Result<()> {
        self.set_detached_row(txn, euid, property)
    }

    /// Removes the property record of `euid`.
    pub fn delete_detached_edge_property(
        &self,
        txn: &mut dyn KvTransaction,
        euid: EdgeUid,
    ) -> Result<()> {
        self.delete_detached(txn, euid)
    }
}

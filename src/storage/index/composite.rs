use std::ops::Bound;

use crate::kv::KvTransaction;
use crate::options::IndexOptions;
use crate::storage::field::FieldType;
use crate::types::{Result, VertexId};

use super::{IndexIter, IndexUniqueness, KeyCodec, VertexIndex};

/// Vertex index over an ordered list of two or more fields.
#[derive(Debug)]
pub struct CompositeIndex {
    fields: Vec<String>,
    index: VertexIndex,
}

impl CompositeIndex {
    /// Opens the index table for `fields` with the given part types.
    pub fn open(
        txn: &mut dyn KvTransaction,
        name: &str,
        fields: Vec<(String, FieldType)>,
        unique: bool,
        options: IndexOptions,
    ) -> Result<Self> {
        let (names, types): (Vec<_>, Vec<_>) = fields.into_iter().unzip();
        let uniqueness = if unique {
            IndexUniqueness::GlobalUnique
        } else {
            IndexUniqueness::NonUnique
        };
        let index = VertexIndex::open(txn, name, KeyCodec::Composite(types), uniqueness, options)?;
        Ok(Self {
            fields: names,
            index,
        })
    }

    /// Field names in key order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Underlying single-table index.
    pub fn inner(&self) -> &VertexIndex {
        &self.index
    }

    /// Whether the key must be unique.
    pub fn is_unique(&self) -> bool {
        self.index.uniqueness() == IndexUniqueness::GlobalUnique
    }

    /// Adds `vid` under the key made of one raw value per field.
    pub fn add(&self, txn: &mut dyn KvTransaction, parts: &[&[u8]], vid: VertexId) -> Result<bool> {
        let enc = self.index.codec().encode_parts(parts)?;
        self.index.add_encoded(txn, enc, vid)
    }

    /// Removes `vid` from the key made of `parts`.
    pub fn delete(
        &self,
        txn: &mut dyn KvTransaction,
        parts: &[&[u8]],
        vid: VertexId,
    ) -> Result<bool> {
        let enc = self.index.codec().encode_parts(parts)?;
        self.index.delete_encoded(txn, enc, vid)
    }

    /// Whether `parts` would collide in a unique composite index.
    pub fn unique_index_conflict(&self, txn: &dyn KvTransaction, parts: &[&[u8]]) -> Result<bool> {
        let enc = self.index.codec().encode_parts(parts)?;
        self.index.conflict_encoded(txn, &enc)
    }

    /// Entries whose leading key parts equal `prefix`.
    pub fn scan_prefix<'t>(
        &self,
        txn: &'t dyn KvTransaction,
        prefix: &[&[u8]],
    ) -> Result<impl Iterator<Item = Result<(Vec<u8>, VertexId)>> + 't> {
        let enc = self.index.codec().encode_prefix(prefix)?;
        let enc = self.index.stored_key(enc);
        let iter: IndexIter<'t, VertexId> =
            self.index
                .range_encoded(txn, Bound::Included(enc.clone()), Bound::Unbounded, None)?;
        Ok(iter.take_while(move |item| match item {
            Ok((key, _)) => key.starts_with(&enc),
            Err(_) => true,
        }))
    }
}

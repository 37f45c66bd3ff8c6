use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use crate::kv::{KvCursor, KvTable, KvTransaction};
use crate::options::IndexOptions;
use crate::types::{GraphRecordError, Result};

use super::iter::IndexIter;
use super::{IndexEntry, IndexUniqueness, IndexValue, KeyCodec, ValueChange, MAX_ENTRIES};

/// Secondary index stored in one KV table.
///
/// Physical layout per mode:
/// * global unique: `key -> id`
/// * pair unique: `key ++ src ++ dst -> id`
/// * non unique: `key ++ max(ids) -> [count][ids]`
#[derive(Debug)]
pub struct SecondaryIndex<E> {
    table: KvTable,
    codec: KeyCodec,
    uniqueness: IndexUniqueness,
    options: IndexOptions,
    ready: AtomicBool,
    disabled: AtomicBool,
    _entry: PhantomData<E>,
}

impl<E: IndexEntry> SecondaryIndex<E> {
    /// Opens (creating if needed) the index table `name`.
    ///
    /// A freshly opened index is not ready until [`SecondaryIndex::set_ready`].
    pub fn open(
        txn: &mut dyn KvTransaction,
        name: &str,
        codec: KeyCodec,
        uniqueness: IndexUniqueness,
        options: IndexOptions,
    ) -> Result<Self> {
        if uniqueness == IndexUniqueness::PairUnique && E::PAIR_SCOPE_LEN == 0 {
            return Err(GraphRecordError::InputError(
                "pair-unique indexes are only supported on edges".into(),
            ));
        }
        if options.max_key_size <= E::SIZE {
            return Err(GraphRecordError::Invalid("max_key_size smaller than an index entry"));
        }
        let table = txn.open_table(name, true)?;
        debug!(index = name, %uniqueness, "index.open");
        Ok(Self {
            table,
            codec,
            uniqueness,
            options,
            ready: AtomicBool::new(false),
            disabled: AtomicBool::new(false),
            _entry: PhantomData,
        })
    }

    /// Backing table.
    pub fn table(&self) -> &KvTable {
        &self.table
    }

    /// Key codec.
    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Uniqueness mode.
    pub fn uniqueness(&self) -> IndexUniqueness {
        self.uniqueness
    }

    /// Whether the index has been fully built.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Marks the index as built (or not).
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Whether maintenance is suspended.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Suspends maintenance; `add` and `delete` become no-ops.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }

    /// Resumes maintenance.
    pub fn enable(&self) {
        self.disabled.store(false, Ordering::Release);
    }

    /// Bytes of physical key that follow the logical key.
    pub(crate) fn suffix_len(&self) -> usize {
        match self.uniqueness {
            IndexUniqueness::GlobalUnique => 0,
            IndexUniqueness::PairUnique => E::PAIR_SCOPE_LEN,
            IndexUniqueness::NonUnique => E::SIZE,
        }
    }

    fn too_long(&self, enc: &[u8]) -> GraphRecordError {
        GraphRecordError::InputError(format!(
            "Index key of {} bytes is too long, max is {}.",
            enc.len(),
            self.options.max_key_size - self.suffix_len()
        ))
    }

    /// Logical key as stored: non-unique keys beyond the limit are cut.
    pub(crate) fn stored_key(&self, mut enc: Vec<u8>) -> Vec<u8> {
        if self.uniqueness == IndexUniqueness::NonUnique {
            enc.truncate(self.options.max_key_size - E::SIZE);
        }
        enc
    }

    fn pair_key(&self, enc: &[u8], id: &E) -> Vec<u8> {
        let mut key = Vec::with_capacity(enc.len() + E::PAIR_SCOPE_LEN);
        key.extend_from_slice(enc);
        key.extend_from_slice(&id.to_bytes()[..E::PAIR_SCOPE_LEN]);
        key
    }

    /// Adds `id` under the key built from on-record bytes `raw`.
    ///
    /// Returns false when a unique index already holds the key, or when the
    /// id is already present.
    pub fn add(&self, txn: &mut dyn KvTransaction, raw: &[u8], id: E) -> Result<bool> {
        let enc = self.codec.encode(raw)?;
        self.add_encoded(txn, enc, id)
    }

    pub(crate) fn add_encoded(
        &self,
        txn: &mut dyn KvTransaction,
        enc: Vec<u8>,
        id: E,
    ) -> Result<bool> {
        if self.is_disabled() {
            return Ok(true);
        }
        id.check()?;
        let limit = self.options.max_key_size;
        let id_bytes = id.to_bytes();
        match self.uniqueness {
            IndexUniqueness::GlobalUnique => {
                if enc.len() > limit {
                    return Err(self.too_long(&enc));
                }
                let added = txn.insert_new(&self.table, &enc, &id_bytes)?;
                trace!(table = %self.table, %id, added, "index.add.unique");
                Ok(added)
            }
            IndexUniqueness::PairUnique => {
                if enc.len() + E::PAIR_SCOPE_LEN > limit {
                    return Err(self.too_long(&enc));
                }
                let key = self.pair_key(&enc, &id);
                let added = txn.insert_new(&self.table, &key, &id_bytes)?;
                trace!(table = %self.table, %id, added, "index.add.pair");
                Ok(added)
            }
            IndexUniqueness::NonUnique => self.add_packed(txn, &self.stored_key(enc), id),
        }
    }

    /// Finds the packed value that should hold `id` under `enc`.
    fn locate(
        &self,
        txn: &dyn KvTransaction,
        enc: &[u8],
        id: &E,
        step_back: bool,
    ) -> Result<Option<(Vec<u8>, IndexValue<E>)>> {
        let mut patched = enc.to_vec();
        id.write(&mut patched);
        let mut cursor = KvCursor::seek(txn, &self.table, &patched)?;
        let matches = |c: &KvCursor| {
            c.key()
                .is_some_and(|k| k.len() == enc.len() + E::SIZE && k.starts_with(enc))
        };
        if !matches(&cursor) {
            if !step_back {
                return Ok(None);
            }
            cursor.prev(txn)?;
            if !matches(&cursor) {
                return Ok(None);
            }
        }
        match (cursor.key(), cursor.value()) {
            (Some(k), Some(v)) => Ok(Some((k.to_vec(), IndexValue::decode(v)?))),
            _ => Ok(None),
        }
    }

    fn add_packed(&self, txn: &mut dyn KvTransaction, enc: &[u8], id: E) -> Result<bool> {
        let Some((old_key, mut value)) = self.locate(&*txn, enc, &id, true)? else {
            let mut value = IndexValue::new();
            value.insert(id);
            txn.put(&self.table, &value.create_key(enc), &value.encode()?)?;
            trace!(table = %self.table, %id, "index.add.new_key");
            return Ok(true);
        };
        let change = value.insert(id);
        if change == ValueChange::Unchanged {
            return Ok(false);
        }
        if value.too_large(self.options.split_threshold) {
            let right = value.split_right_half();
            txn.delete(&self.table, &old_key)?;
            txn.put(&self.table, &value.create_key(enc), &value.encode()?)?;
            txn.put(&self.table, &right.create_key(enc), &right.encode()?)?;
            debug!(
                table = %self.table,
                left = value.len(),
                right = right.len(),
                "index.split"
            );
            return Ok(true);
        }
        self.store_changed(txn, enc, &old_key, &value, change)?;
        trace!(table = %self.table, %id, ?change, "index.add.packed");
        Ok(true)
    }

    fn store_changed(
        &self,
        txn: &mut dyn KvTransaction,
        enc: &[u8],
        old_key: &[u8],
        value: &IndexValue<E>,
        change: ValueChange,
    ) -> Result<()> {
        match change {
            ValueChange::Unchanged => Ok(()),
            ValueChange::InPlace => txn.put(&self.table, old_key, &value.encode()?),
            ValueChange::KeyChanged => {
                txn.delete(&self.table, old_key)?;
                if value.is_empty() {
                    return Ok(());
                }
                txn.put(&self.table, &value.create_key(enc), &value.encode()?)
            }
        }
    }

    /// Removes `id` from the key built from `raw`. Returns false when absent.
    pub fn delete(&self, txn: &mut dyn KvTransaction, raw: &[u8], id: E) -> Result<bool> {
        let enc = self.codec.encode(raw)?;
        self.delete_encoded(txn, enc, id)
    }

    pub(crate) fn delete_encoded(
        &self,
        txn: &mut dyn KvTransaction,
        enc: Vec<u8>,
        id: E,
    ) -> Result<bool> {
        if self.is_disabled() {
            return Ok(true);
        }
        id.check()?;
        let key = match self.uniqueness {
            IndexUniqueness::GlobalUnique => enc,
            IndexUniqueness::PairUnique => self.pair_key(&enc, &id),
            IndexUniqueness::NonUnique => {
                let enc = self.stored_key(enc);
                let Some((old_key, mut value)) = self.locate(&*txn, &enc, &id, false)? else {
                    return Ok(false);
                };
                let change = value.delete_if_exists(&id);
                if change == ValueChange::Unchanged {
                    return Ok(false);
                }
                let change = if value.is_empty() {
                    ValueChange::KeyChanged
                } else {
                    change
                };
                self.store_changed(txn, &enc, &old_key, &value, change)?;
                trace!(table = %self.table, %id, ?change, "index.delete.packed");
                return Ok(true);
            }
        };
        if key.len() > self.options.max_key_size {
            return Ok(false);
        }
        match txn.get(&self.table, &key)? {
            Some(stored) if E::read(&stored)? == id => {
                txn.delete(&self.table, &key)?;
                trace!(table = %self.table, %id, "index.delete.unique");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Moves `id` from the key of `old_raw` to the key of `new_raw`.
    ///
    /// When the new key is rejected the entry stays under the old key.
    pub fn update(
        &self,
        txn: &mut dyn KvTransaction,
        old_raw: &[u8],
        new_raw: &[u8],
        id: E,
    ) -> Result<bool> {
        let new_enc = self.codec.encode(new_raw)?;
        if !self.delete(txn, old_raw, id)? {
            return Ok(false);
        }
        match self.add_encoded(txn, new_enc, id) {
            Ok(true) => Ok(true),
            rejected => {
                self.add(txn, old_raw, id)?;
                warn!(table = %self.table, %id, "index.update.restored");
                rejected
            }
        }
    }

    /// Whether adding `raw` to this global-unique index would collide.
    ///
    /// Keys too long to be indexed always count as a conflict.
    pub fn unique_index_conflict(&self, txn: &dyn KvTransaction, raw: &[u8]) -> Result<bool> {
        if self.uniqueness != IndexUniqueness::GlobalUnique {
            return Err(GraphRecordError::InputError(
                "Unique index conflict checks require a globally unique index.".into(),
            ));
        }
        let enc = self.codec.encode(raw)?;
        self.conflict_encoded(txn, &enc)
    }

    pub(crate) fn conflict_encoded(&self, txn: &dyn KvTransaction, enc: &[u8]) -> Result<bool> {
        if enc.len() > self.options.max_key_size {
            return Ok(true);
        }
        Ok(txn.get(&self.table, enc)?.is_some())
    }

    /// All ids stored under the key of `raw`.
    pub fn lookup(&self, txn: &dyn KvTransaction, raw: &[u8]) -> Result<Vec<E>> {
        let enc = self.stored_key(self.codec.encode(raw)?);
        self.range_encoded(txn, Bound::Included(enc.clone()), Bound::Included(enc), None)?
            .map(|item| item.map(|(_, id)| id))
            .collect()
    }

    /// Entries whose key lies in `[start, end)`, given as on-record bytes.
    pub fn iter<'t>(
        &self,
        txn: &'t dyn KvTransaction,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<IndexIter<'t, E>> {
        let start = start.map_or(Bound::Unbounded, Bound::Included);
        let end = end.map_or(Bound::Unbounded, Bound::Excluded);
        self.range(txn, start, end, None)
    }

    /// Entries whose key lies within the bounds, optionally starting at
    /// `hint` within the first key.
    ///
    /// The hint applies to every physical key sharing the included start
    /// key, so ids below it are skipped for the whole of that key.
    pub fn range<'t>(
        &self,
        txn: &'t dyn KvTransaction,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        hint: Option<E>,
    ) -> Result<IndexIter<'t, E>> {
        let encode = |b: Bound<&[u8]>| -> Result<Bound<Vec<u8>>> {
            Ok(match b {
                Bound::Included(raw) => Bound::Included(self.stored_key(self.codec.encode(raw)?)),
                Bound::Excluded(raw) => Bound::Excluded(self.stored_key(self.codec.encode(raw)?)),
                Bound::Unbounded => Bound::Unbounded,
            })
        };
        self.range_encoded(txn, encode(start)?, encode(end)?, hint)
    }

    pub(crate) fn range_encoded<'t>(
        &self,
        txn: &'t dyn KvTransaction,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        hint: Option<E>,
    ) -> Result<IndexIter<'t, E>> {
        IndexIter::new(
            txn,
            self.table.clone(),
            self.uniqueness == IndexUniqueness::NonUnique,
            self.suffix_len(),
            start,
            end,
            hint,
        )
    }

    /// Number of physical keys.
    pub fn num_keys(&self, txn: &dyn KvTransaction) -> Result<usize> {
        txn.key_count(&self.table)
    }

    /// One line per physical key: `hex(logical key) -> [ids]`.
    pub fn dump(&self, txn: &dyn KvTransaction) -> Result<Vec<String>> {
        let suffix = self.suffix_len();
        let mut lines = Vec::new();
        let mut cursor = KvCursor::first(txn, &self.table)?;
        while let (Some(k), Some(v)) = (cursor.key(), cursor.value()) {
            let logical = &k[..k.len().saturating_sub(suffix)];
            let ids: Vec<String> = if self.uniqueness == IndexUniqueness::NonUnique {
                IndexValue::<E>::decode(v)?
                    .entries()
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            } else {
                vec![E::read(v)?.to_string()]
            };
            lines.push(format!("{} -> [{}]", hex::encode(logical), ids.join(", ")));
            cursor.next(txn)?;
        }
        Ok(lines)
    }

    /// Removes every entry.
    pub fn clear(&self, txn: &mut dyn KvTransaction) -> Result<()> {
        let mut cursor = KvCursor::first(&*txn, &self.table)?;
        let mut removed = 0usize;
        while cursor.is_valid() {
            cursor.delete_key(txn)?;
            removed += 1;
        }
        debug!(table = %self.table, removed, "index.clear");
        Ok(())
    }

    /// Bulk-loads `ids` (strictly ascending) under the key of `raw`.
    ///
    /// Only allowed while the index is not ready. Non-unique keys are packed
    /// into as few values as the split threshold allows.
    pub fn append_sorted(&self, txn: &mut dyn KvTransaction, raw: &[u8], ids: &[E]) -> Result<()> {
        if self.is_ready() {
            return Err(GraphRecordError::Invalid("bulk append into a ready index"));
        }
        if ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GraphRecordError::Invalid("bulk ids must be strictly ascending"));
        }
        for id in ids {
            id.check()?;
        }
        let enc = self.codec.encode(raw)?;
        if self.uniqueness != IndexUniqueness::NonUnique {
            for &id in ids {
                if !self.add_encoded(txn, enc.clone(), id)? {
                    return Err(GraphRecordError::InputError(format!(
                        "Duplicate key for id [{id}] in unique index bulk load."
                    )));
                }
            }
            return Ok(());
        }
        let enc = self.stored_key(enc);
        let chunk =
            (self.options.split_threshold.saturating_sub(1) / E::SIZE).clamp(1, MAX_ENTRIES);
        for part in ids.chunks(chunk) {
            let value = IndexValue::from_sorted(part.to_vec())?;
            txn.put(&self.table, &value.create_key(&enc), &value.encode()?)?;
        }
        trace!(table = %self.table, n = ids.len(), "index.append_sorted");
        Ok(())
    }
}

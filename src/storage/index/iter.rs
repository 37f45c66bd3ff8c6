use std::collections::VecDeque;
use std::ops::Bound;

use crate::kv::{KvCursor, KvTable, KvTransaction};
use crate::types::Result;

use super::{IndexEntry, IndexValue};

/// Ordered walk over `(logical key, id)` pairs of one index.
///
/// Keys come out in key order and, within a key, ids in ascending order.
/// Logical keys are the stored key encodings; decode them with the index's
/// [`super::KeyCodec`].
pub struct IndexIter<'t, E> {
    txn: &'t dyn KvTransaction,
    cursor: KvCursor,
    packed: bool,
    suffix: usize,
    skip_key: Option<Vec<u8>>,
    end: Bound<Vec<u8>>,
    hint: Option<(Vec<u8>, E)>,
    current_key: Vec<u8>,
    pending: VecDeque<E>,
    started: bool,
    done: bool,
    out_of_range: bool,
}

impl<'t, E: IndexEntry> IndexIter<'t, E> {
    pub(crate) fn new(
        txn: &'t dyn KvTransaction,
        table: KvTable,
        packed: bool,
        suffix: usize,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        hint: Option<E>,
    ) -> Result<Self> {
        let (cursor, skip_key, hint) = match start {
            Bound::Included(key) => {
                let mut seek = key.clone();
                if let Some(h) = hint {
                    if packed {
                        h.write(&mut seek);
                    } else if suffix > 0 {
                        seek.extend_from_slice(&h.to_bytes()[..suffix]);
                    }
                }
                let hint = hint.map(|h| (key, h));
                (KvCursor::seek(txn, &table, &seek)?, None, hint)
            }
            Bound::Excluded(key) => (KvCursor::seek(txn, &table, &key)?, Some(key), None),
            Bound::Unbounded => (KvCursor::first(txn, &table)?, None, None),
        };
        Ok(Self {
            txn,
            cursor,
            packed,
            suffix,
            skip_key,
            end,
            hint,
            current_key: Vec::new(),
            pending: VecDeque::new(),
            started: false,
            done: false,
            out_of_range: false,
        })
    }

    /// Whether iteration stopped because a key passed the end bound, as
    /// opposed to running out of keys.
    pub fn key_out_of_range(&self) -> bool {
        self.out_of_range
    }

    fn past_end(&self, logical: &[u8]) -> bool {
        match &self.end {
            Bound::Included(end) => logical > end.as_slice(),
            Bound::Excluded(end) => logical >= end.as_slice(),
            Bound::Unbounded => false,
        }
    }

    /// Moves to the next physical key and queues its ids.
    fn load_next(&mut self) -> Result<()> {
        loop {
            if self.started {
                self.cursor.next(self.txn)?;
            }
            self.started = true;
            let (Some(key), Some(value)) = (self.cursor.key(), self.cursor.value()) else {
                self.done = true;
                return Ok(());
            };
            let logical = &key[..key.len().saturating_sub(self.suffix)];
            if self.skip_key.as_deref() == Some(logical) {
                continue;
            }
            self.skip_key = None;
            if self.past_end(logical) {
                self.out_of_range = true;
                self.done = true;
                return Ok(());
            }
            let mut ids: VecDeque<E> = if self.packed {
                IndexValue::<E>::decode(value)?.entries().iter().copied().collect()
            } else {
                VecDeque::from([E::read(value)?])
            };
            if let Some((hint_key, hint)) = &self.hint {
                if hint_key.as_slice() == logical {
                    ids.retain(|id| id >= hint);
                } else {
                    self.hint = None;
                }
            }
            self.current_key = logical.to_vec();
            self.pending = ids;
            return Ok(());
        }
    }
}

impl<E: IndexEntry> Iterator for IndexIter<'_, E> {
    type Item = Result<(Vec<u8>, E)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.pending.pop_front() {
                return Some(Ok((self.current_key.clone(), id)));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.load_next() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

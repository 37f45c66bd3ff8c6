use std::fmt;

use crate::types::{GraphRecordError, Result};

/// Most ids a packed value may hold; the count is stored in one byte.
pub const MAX_ENTRIES: usize = 254;
const COUNT_SIZE: usize = 1;

/// Fixed-size identifier stored in an index.
///
/// `write` must produce bytes whose lexicographic order matches `Ord`.
pub trait IndexEntry: Copy + Ord + fmt::Debug + fmt::Display {
    /// Encoded width.
    const SIZE: usize;
    /// Length of the encoded prefix that scopes pair-unique keys; zero when
    /// the entry has no pair scope.
    const PAIR_SCOPE_LEN: usize;
    /// Smallest entry.
    const MIN: Self;
    /// Largest entry.
    const MAX: Self;

    /// Appends the encoded entry.
    fn write(&self, out: &mut Vec<u8>);

    /// Decodes an entry from the first [`IndexEntry::SIZE`] bytes.
    fn read(src: &[u8]) -> Result<Self>;

    /// Fails when the entry cannot be encoded in [`IndexEntry::SIZE`] bytes.
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Encoded entry as a fresh buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.write(&mut out);
        out
    }
}

/// Effect of an insert or delete on a packed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueChange {
    /// Nothing changed.
    Unchanged = 0,
    /// Entries changed but the largest entry, and so the key, did not.
    InPlace = 1,
    /// The largest entry changed; the value must move to a new key.
    KeyChanged = 2,
}

/// Sorted, duplicate-free list of ids stored under one physical key.
///
/// Encoded as `[count u8][entry; count]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexValue<E> {
    entries: Vec<E>,
}

impl<E: IndexEntry> Default for IndexValue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: IndexEntry> IndexValue<E> {
    /// Empty value.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Value holding already sorted, unique entries.
    pub fn from_sorted(entries: Vec<E>) -> Result<Self> {
        if entries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GraphRecordError::Invalid("index entries must be strictly sorted"));
        }
        if entries.len() > MAX_ENTRIES {
            return Err(GraphRecordError::Invalid("too many entries for one index value"));
        }
        Ok(Self { entries })
    }

    /// Parses a stored value.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&count, rest) = bytes
            .split_first()
            .ok_or(GraphRecordError::Corruption("empty index value"))?;
        let count = count as usize;
        if rest.len() != count * E::SIZE {
            return Err(GraphRecordError::Corruption("index value length mismatch"));
        }
        let entries = rest
            .chunks_exact(E::SIZE)
            .map(E::read)
            .collect::<Result<Vec<_>>>()?;
        if entries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GraphRecordError::Corruption("index value entries out of order"));
        }
        Ok(Self { entries })
    }

    /// Serialized form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let count = u8::try_from(self.entries.len())
            .map_err(|_| GraphRecordError::Invalid("index value holds too many entries"))?;
        let mut out = Vec::with_capacity(self.serialized_size());
        out.push(count);
        for e in &self.entries {
            e.write(&mut out);
        }
        Ok(out)
    }

    /// Bytes the encoded value occupies.
    pub fn serialized_size(&self) -> usize {
        COUNT_SIZE + self.entries.len() * E::SIZE
    }

    /// Number of ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ids remain.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in ascending order.
    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    /// Largest id.
    pub fn max(&self) -> Option<E> {
        self.entries.last().copied()
    }

    /// Position of `id`, or where it would be inserted, and whether it exists.
    pub fn search(&self, id: &E) -> (usize, bool) {
        match self.entries.binary_search(id) {
            Ok(pos) => (pos, true),
            Err(pos) => (pos, false),
        }
    }

    /// Adds `id`, keeping the entries sorted.
    pub fn insert(&mut self, id: E) -> ValueChange {
        let (pos, found) = self.search(&id);
        if found {
            return ValueChange::Unchanged;
        }
        self.entries.insert(pos, id);
        if pos + 1 == self.entries.len() {
            ValueChange::KeyChanged
        } else {
            ValueChange::InPlace
        }
    }

    /// Removes `id` if present.
    pub fn delete_if_exists(&mut self, id: &E) -> ValueChange {
        let (pos, found) = self.search(id);
        if !found {
            return ValueChange::Unchanged;
        }
        self.entries.remove(pos);
        if pos == self.entries.len() {
            ValueChange::KeyChanged
        } else {
            ValueChange::InPlace
        }
    }

    /// Whether the value should be split before it is stored.
    pub fn too_large(&self, threshold: usize) -> bool {
        self.serialized_size() > threshold || self.entries.len() > MAX_ENTRIES
    }

    /// Moves the upper `len / 2` entries into a new value.
    ///
    /// `self` keeps the lower half and therefore needs a new key.
    pub fn split_right_half(&mut self) -> Self {
        let keep = self.entries.len() - self.entries.len() / 2;
        Self {
            entries: self.entries.split_off(keep),
        }
    }

    /// Physical key for this value: the logical key followed by the largest id.
    pub fn create_key(&self, logical: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(logical.len() + E::SIZE);
        key.extend_from_slice(logical);
        self.max().unwrap_or(E::MAX).write(&mut key);
        key
    }
}

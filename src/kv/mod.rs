//! Transactional ordered key-value store interface.
//!
//! The record and index layers only talk to storage through
//! [`KvTransaction`]; [`MemKv`] is the in-process implementation used by
//! embedders without a disk engine and by the test-suite.

use std::fmt;
use std::sync::Arc;

use crate::types::Result;

mod cursor;
mod memory;

pub use cursor::KvCursor;
pub use memory::{MemKv, MemTxn};

/// A key together with its value.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Handle to a named table. Keys inside a table are ordered byte-lexicographically.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KvTable {
    name: Arc<str>,
}

impl KvTable {
    /// Creates a handle for `name`. Use [`KvTransaction::open_table`] to ensure the table exists.
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for KvTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KvTable").field(&&*self.name).finish()
    }
}

impl fmt::Display for KvTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Operations available inside one transaction.
pub trait KvTransaction {
    /// Whether writes are rejected.
    fn is_read_only(&self) -> bool;

    /// Opens `name`, creating it when `create` is set.
    fn open_table(&mut self, name: &str, create: bool) -> Result<KvTable>;

    /// Removes a table and all its keys.
    fn drop_table(&mut self, table: &KvTable) -> Result<()>;

    /// Point lookup.
    fn get(&self, table: &KvTable, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Inserts or overwrites a key.
    fn put(&mut self, table: &KvTable, key: &[u8], value: &[u8]) -> Result<()>;

    /// Inserts a key only if absent; returns false when the key already exists.
    fn insert_new(&mut self, table: &KvTable, key: &[u8], value: &[u8]) -> Result<bool>;

    /// Removes a key; returns whether it existed.
    fn delete(&mut self, table: &KvTable, key: &[u8]) -> Result<bool>;

    /// First pair with key `>= key`.
    fn lower_bound(&self, table: &KvTable, key: &[u8]) -> Result<Option<KvPair>>;

    /// First pair with key `> key`.
    fn upper_bound(&self, table: &KvTable, key: &[u8]) -> Result<Option<KvPair>>;

    /// Last pair with key `< key`.
    fn last_before(&self, table: &KvTable, key: &[u8]) -> Result<Option<KvPair>>;

    /// Last pair in the table.
    fn last(&self, table: &KvTable) -> Result<Option<KvPair>>;

    /// Number of keys in the table.
    fn key_count(&self, table: &KvTable) -> Result<usize>;
}

/// A store that hands out transactions.
pub trait KvStore {
    /// Transaction type produced by this store.
    type Txn: KvTransaction;

    /// Starts a snapshot read transaction.
    fn begin_read(&self) -> Result<Self::Txn>;

    /// Starts a write transaction. Writers are serialized.
    fn begin_write(&self) -> Result<Self::Txn>;

    /// Publishes the transaction's writes.
    fn commit(&self, txn: Self::Txn) -> Result<()>;

    /// Discards the transaction's writes.
    fn abort(&self, txn: Self::Txn);
}

use super::{KvPair, KvTable, KvTransaction};
use crate::types::{GraphRecordError, Result};

/// A positioned cursor over one table.
///
/// The cursor owns a copy of the current pair and re-seeks through the
/// transaction on every move, so it never borrows the transaction and
/// writes may be interleaved with navigation.
#[derive(Debug, Clone)]
pub struct KvCursor {
    table: KvTable,
    anchor: Vec<u8>,
    current: Option<KvPair>,
}

impl KvCursor {
    /// Positions at the first key `>= key`.
    pub fn seek(txn: &dyn KvTransaction, table: &KvTable, key: &[u8]) -> Result<Self> {
        let current = txn.lower_bound(table, key)?;
        Ok(Self {
            table: table.clone(),
            anchor: key.to_vec(),
            current,
        })
    }

    /// Positions at the first key of the table.
    pub fn first(txn: &dyn KvTransaction, table: &KvTable) -> Result<Self> {
        Self::seek(txn, table, &[])
    }

    /// Whether the cursor points at a pair.
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Current key, if positioned.
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// Current value, if positioned.
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }

    /// Advances to the next key. Returns whether the cursor is still valid.
    pub fn next(&mut self, txn: &dyn KvTransaction) -> Result<bool> {
        let Some((key, _)) = self.current.take() else {
            return Ok(false);
        };
        self.current = txn.upper_bound(&self.table, &key)?;
        self.anchor = key;
        if self.current.is_none() {
            // smallest key sorting after the last visited one
            self.anchor.push(0);
        }
        Ok(self.current.is_some())
    }

    /// Steps back to the previous key.
    ///
    /// From an invalid position this lands on the last key before the seek
    /// target, or on the last visited key after running off the end.
    pub fn prev(&mut self, txn: &dyn KvTransaction) -> Result<bool> {
        let pivot = match self.current.take() {
            Some((key, _)) => key,
            None => std::mem::take(&mut self.anchor),
        };
        self.current = txn.last_before(&self.table, &pivot)?;
        self.anchor = pivot;
        Ok(self.current.is_some())
    }

    /// Overwrites the value at the current key.
    pub fn set_value(&mut self, txn: &mut dyn KvTransaction, value: &[u8]) -> Result<()> {
        let Some((key, old)) = self.current.as_mut() else {
            return Err(GraphRecordError::Invalid("cursor is not positioned"));
        };
        txn.put(&self.table, key, value)?;
        *old = value.to_vec();
        Ok(())
    }

    /// Deletes the current key and moves to its successor.
    pub fn delete_key(&mut self, txn: &mut dyn KvTransaction) -> Result<()> {
        let Some((key, _)) = self.current.take() else {
            return Err(GraphRecordError::Invalid("cursor is not positioned"));
        };
        txn.delete(&self.table, &key)?;
        self.current = txn.upper_bound(&self.table, &key)?;
        self.anchor = key;
        Ok(())
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use tracing::{debug, trace};

use super::{KvPair, KvStore, KvTable, KvTransaction};
use crate::primitives::bytes::buf::{self, Cursor};
use crate::primitives::bytes::var;
use crate::types::checksum;
use crate::types::{GraphRecordError, Result};

type TableMap = BTreeMap<Vec<u8>, Vec<u8>>;
type Tables = BTreeMap<String, TableMap>;

const SNAPSHOT_MAGIC: &[u8; 4] = b"GRKV";
const SNAPSHOT_VERSION: u8 = 1;

/// In-memory snapshot-isolated store.
///
/// Readers see the state committed when they began. A single writer works
/// on a copy-on-write clone that replaces the committed state on commit.
pub struct MemKv {
    committed: RwLock<Arc<Tables>>,
    writer: Arc<Mutex<()>>,
    commits: AtomicU64,
}

/// Transaction over a [`MemKv`].
pub struct MemTxn {
    state: Arc<Tables>,
    writer: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Default for MemKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::from_tables(Tables::new())
    }

    fn from_tables(tables: Tables) -> Self {
        Self {
            committed: RwLock::new(Arc::new(tables)),
            writer: Arc::new(Mutex::new(())),
            commits: AtomicU64::new(0),
        }
    }

    /// Number of successful write commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Writes the committed state to `path` in a checksummed format.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let state = self.committed.read().clone();
        let mut out = Vec::new();
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.push(SNAPSHOT_VERSION);
        var::encode_u64(state.len() as u64, &mut out);
        for (name, table) in state.iter() {
            buf::put_len_prefixed(&mut out, name.as_bytes());
            var::encode_u64(table.len() as u64, &mut out);
            for (k, v) in table {
                buf::put_len_prefixed(&mut out, k);
                buf::put_len_prefixed(&mut out, v);
            }
        }
        checksum::seal(SNAPSHOT_MAGIC, &mut out);
        fs::write(path, &out)?;
        debug!(path = %path.display(), bytes = out.len(), "memkv snapshot saved");
        Ok(())
    }

    /// Loads a store previously written by [`MemKv::save_snapshot`].
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let payload = checksum::unseal(SNAPSHOT_MAGIC, &bytes)?;
        let mut cur = Cursor::new(payload);
        if cur.take(SNAPSHOT_MAGIC.len())? != SNAPSHOT_MAGIC {
            return Err(GraphRecordError::Corruption("memkv snapshot magic mismatch"));
        }
        if cur.u8()? != SNAPSHOT_VERSION {
            return Err(GraphRecordError::Corruption("unsupported memkv snapshot version"));
        }
        let mut tables = Tables::new();
        for _ in 0..cur.var_u64()? {
            let name = cur.string()?;
            let mut table = TableMap::new();
            for _ in 0..cur.var_u64()? {
                let k = cur.len_prefixed()?.to_vec();
                let v = cur.len_prefixed()?.to_vec();
                table.insert(k, v);
            }
            tables.insert(name, table);
        }
        if cur.remaining() != 0 {
            return Err(GraphRecordError::Corruption("trailing bytes in memkv snapshot"));
        }
        debug!(path = %path.display(), tables = tables.len(), "memkv snapshot loaded");
        Ok(Self::from_tables(tables))
    }
}

impl KvStore for MemKv {
    type Txn = MemTxn;

    fn begin_read(&self) -> Result<MemTxn> {
        Ok(MemTxn {
            state: self.committed.read().clone(),
            writer: None,
        })
    }

    fn begin_write(&self) -> Result<MemTxn> {
        let guard = self.writer.lock_arc();
        Ok(MemTxn {
            state: self.committed.read().clone(),
            writer: Some(guard),
        })
    }

    fn commit(&self, txn: MemTxn) -> Result<()> {
        let MemTxn { state, writer } = txn;
        let Some(guard) = writer else {
            return Ok(());
        };
        *self.committed.write() = state;
        drop(guard);
        let n = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(commit = n, "memkv commit");
        Ok(())
    }

    fn abort(&self, txn: MemTxn) {
        if txn.writer.is_some() {
            trace!("memkv write transaction aborted");
        }
    }
}

impl MemTxn {
    fn table(&self, table: &KvTable) -> Option<&TableMap> {
        self.state.get(table.name())
    }

    fn table_mut(&mut self, table: &KvTable) -> Result<&mut TableMap> {
        if self.writer.is_none() {
            return Err(GraphRecordError::TxnReadOnly);
        }
        Ok(Arc::make_mut(&mut self.state)
            .entry(table.name().to_owned())
            .or_default())
    }

    fn first_in(&self, table: &KvTable, lower: Bound<&[u8]>) -> Option<KvPair> {
        self.table(table)?
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }
}

impl KvTransaction for MemTxn {
    fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    fn open_table(&mut self, name: &str, create: bool) -> Result<KvTable> {
        let handle = KvTable::new(name);
        if self.state.contains_key(name) {
            return Ok(handle);
        }
        if !create {
            return Err(GraphRecordError::NotFound);
        }
        self.table_mut(&handle)?;
        Ok(handle)
    }

    fn drop_table(&mut self, table: &KvTable) -> Result<()> {
        if self.writer.is_none() {
            return Err(GraphRecordError::TxnReadOnly);
        }
        Arc::make_mut(&mut self.state).remove(table.name());
        Ok(())
    }

    fn get(&self, table: &KvTable, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.table(table).and_then(|t| t.get(key).cloned()))
    }

    fn put(&mut self, table: &KvTable, key: &[u8], value: &[u8]) -> Result<()> {
        self.table_mut(table)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn insert_new(&mut self, table: &KvTable, key: &[u8], value: &[u8]) -> Result<bool> {
        let t = self.table_mut(table)?;
        if t.contains_key(key) {
            return Ok(false);
        }
        t.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn delete(&mut self, table: &KvTable, key: &[u8]) -> Result<bool> {
        if self.table(table).map_or(true, |t| !t.contains_key(key)) {
            return Ok(false);
        }
        Ok(self.table_mut(table)?.remove(key).is_some())
    }

    fn lower_bound(&self, table: &KvTable, key: &[u8]) -> Result<Option<KvPair>> {
        Ok(self.first_in(table, Bound::Included(key)))
    }

    fn upper_bound(&self, table: &KvTable, key: &[u8]) -> Result<Option<KvPair>> {
        Ok(self.first_in(table, Bound::Excluded(key)))
    }

    fn last_before(&self, table: &KvTable, key: &[u8]) -> Result<Option<KvPair>> {
        Ok(self.table(table).and_then(|t| {
            t.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
                .next_back()
                .map(|(k, v)| (k.clone(), v.clone()))
        }))
    }

    fn last(&self, table: &KvTable) -> Result<Option<KvPair>> {
        Ok(self
            .table(table)
            .and_then(|t| t.iter().next_back())
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn key_count(&self, table: &KvTable) -> Result<usize> {
        Ok(self.table(table).map_or(0, TableMap::len))
    }
}

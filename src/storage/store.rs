//! Durable Store Adapter
//!
//! Thin typed wrapper over the embedded RocksDB instance holding this node's
//! shard. All mutations arrive through the single-consumer `DurableWriter`,
//! so the engine never sees concurrent writers.

use crate::cluster::types::Entry;
use crate::error::{Error, Result};

use rocksdb::{IteratorMode, Options, DB};
use std::path::Path;

pub struct KvStore {
    db: DB,
}

impl KvStore {
    /// Opens (and on first start provisions) the backing database.
    pub fn open(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)?;
        tracing::info!("Opened durable store at {}", path.display());

        Ok(Self { db })
    }

    /// Upserts an entry. Replaces the value on key collision.
    pub fn put(&self, entry: &Entry) -> Result<()> {
        if entry.key.is_empty() || entry.value.is_empty() {
            return Err(Error::Precondition(
                "cannot store an entry with an empty key or value".to_string(),
            ));
        }

        self.db.put(entry.key.as_bytes(), entry.value.as_bytes())?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Entry>> {
        if key.is_empty() {
            return Err(Error::Precondition("cannot read an empty key".to_string()));
        }

        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Entry {
                key: key.to_string(),
                value: String::from_utf8_lossy(&raw).into_owned(),
            })),
            None => Ok(None),
        }
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Precondition("cannot delete an empty key".to_string()));
        }

        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    /// Returns every entry in the shard, in key order.
    pub fn scan_all(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();

        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;
            entries.push(Entry {
                key: String::from_utf8_lossy(&key).into_owned(),
                value: String::from_utf8_lossy(&value).into_owned(),
            });
        }

        Ok(entries)
    }
}

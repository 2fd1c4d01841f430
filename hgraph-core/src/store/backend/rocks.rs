//! RocksDB backend.

use rocksdb::{Direction, IteratorMode, Options, DB};

use super::{Backend, BatchOp, KeyValue, WriteBatch};
use crate::error::{Error, Result};
use crate::store::descriptor::{Descriptor, StoreConfig};

/// Backend for `rocksdb://` descriptors.
pub struct RocksBackend {
    db: DB,
    read_only: bool,
}

impl RocksBackend {
    /// Open or create the database directory named by `descriptor`.
    pub fn open(descriptor: &Descriptor, config: &StoreConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);

        let db = if config.read_only {
            DB::open_for_read_only(&opts, descriptor.location(), false)
        } else {
            DB::open(&opts, descriptor.location())
        }
        .map_err(|e| Error::store_open(descriptor.to_string(), e))?;

        Ok(Self {
            db,
            read_only: config.read_only,
        })
    }
}

impl Backend for RocksBackend {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn scan(&self, prefix: &[u8], after: Option<&[u8]>, limit: usize) -> Result<Vec<KeyValue>> {
        let start = match after {
            Some(after) if after >= prefix => after,
            _ => prefix,
        };
        let mut out = Vec::new();
        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) || out.len() >= limit {
                break;
            }
            if after.is_some_and(|after| &*key <= after) {
                continue;
            }
            out.push((key.into_vec(), value.into_vec()));
        }
        Ok(out)
    }

    fn write(&mut self, batch: WriteBatch) -> Result<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => rocks_batch.put(key, value),
                BatchOp::Delete(key) => rocks_batch.delete(key),
            }
        }
        self.db.write(rocks_batch)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.read_only {
            self.db.flush()?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()
    }
}

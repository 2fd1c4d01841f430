//! Ordered key-value backends.
//!
//! The hypergraph layout only needs byte keys in lexicographic order, point
//! reads, prefix scans and atomic batches. Each backend provides those over a
//! different engine and is picked at open time from the [`Descriptor`].

mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;
mod sqlite;

pub use memory::MemoryBackend;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksBackend;
pub use sqlite::SqliteBackend;

use super::descriptor::{BackendKind, Descriptor, StoreConfig};
use crate::error::Result;

/// Key-value pair as stored.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// One staged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Mutations applied atomically, in order.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Storage capability shared by all engines.
pub trait Backend: Send {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Up to `limit` pairs whose key starts with `prefix`, in key order,
    /// strictly after `after` when given.
    fn scan(&self, prefix: &[u8], after: Option<&[u8]>, limit: usize) -> Result<Vec<KeyValue>>;

    /// Apply every operation of `batch` or none of them.
    fn write(&mut self, batch: WriteBatch) -> Result<()>;

    /// Push buffered writes to durable storage.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the engine.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Open the backend named by `descriptor`.
pub fn open_backend(descriptor: &Descriptor, config: &StoreConfig) -> Result<Box<dyn Backend>> {
    match descriptor.kind() {
        BackendKind::Sqlite => Ok(Box::new(SqliteBackend::open(descriptor, config)?)),
        BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        #[cfg(feature = "rocksdb")]
        BackendKind::RocksDb => Ok(Box::new(RocksBackend::open(descriptor, config)?)),
        #[cfg(not(feature = "rocksdb"))]
        BackendKind::RocksDb => Err(crate::error::Error::store_open(
            descriptor.to_string(),
            "built without the `rocksdb` feature",
        )),
    }
}

/// Smallest key greater than every key starting with `prefix`, if any.
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[b'a', 0xff]), Some(b"b".to_vec()));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(b""), None);
    }

    #[test]
    fn test_write_batch() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put(b"k".to_vec(), b"v".to_vec());
        batch.delete(b"k".to_vec());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[1], BatchOp::Delete(b"k".to_vec()));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_requires_feature() {
        let descriptor = Descriptor::parse("rocksdb:///tmp/kb").unwrap();
        let err = open_backend(&descriptor, &StoreConfig::default()).err().unwrap();
        assert!(matches!(err, Error::StoreOpen { .. }));
    }

    /// Behaviour every backend must share.
    pub(crate) fn exercise_backend(backend: &mut dyn Backend) {
        let mut batch = WriteBatch::new();
        for key in ["a1", "a2", "a3", "b1"] {
            batch.put(key.as_bytes().to_vec(), key.to_uppercase().into_bytes());
        }
        backend.write(batch).unwrap();

        assert_eq!(backend.get(b"a2").unwrap(), Some(b"A2".to_vec()));
        assert_eq!(backend.get(b"zz").unwrap(), None);

        let page = backend.scan(b"a", None, 2).unwrap();
        let keys: Vec<&[u8]> = page.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"a1".as_slice(), b"a2".as_slice()]);

        let rest = backend.scan(b"a", Some(b"a2"), 10).unwrap();
        assert_eq!(rest, vec![(b"a3".to_vec(), b"A3".to_vec())]);

        let mut batch = WriteBatch::new();
        batch.delete(b"a1".to_vec());
        batch.put(b"a2".to_vec(), b"new".to_vec());
        backend.write(batch).unwrap();
        assert_eq!(backend.get(b"a1").unwrap(), None);
        assert_eq!(backend.get(b"a2").unwrap(), Some(b"new".to_vec()));
        assert_eq!(backend.scan(b"", None, 10).unwrap().len(), 3);

        backend.flush().unwrap();
    }
}

//! In-process ordered map backend.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::{prefix_end, Backend, BatchOp, KeyValue, WriteBatch};
use crate::error::Result;

/// Backend for `memory://` descriptors. Contents vanish on close.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn scan(&self, prefix: &[u8], after: Option<&[u8]>, limit: usize) -> Result<Vec<KeyValue>> {
        let lower = match after {
            Some(after) if after >= prefix => Bound::Excluded(after.to_vec()),
            _ => Bound::Included(prefix.to_vec()),
        };
        let upper = match prefix_end(prefix) {
            Some(end) => {
                // BTreeMap::range rejects inverted bounds
                if after.is_some_and(|after| after >= end.as_slice()) {
                    return Ok(Vec::new());
                }
                Bound::Excluded(end)
            }
            None => Bound::Unbounded,
        };
        Ok(self
            .map
            .range::<Vec<u8>, _>((lower, upper))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write(&mut self, batch: WriteBatch) -> Result<()> {
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    self.map.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    self.map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::tests::exercise_backend;

    #[test]
    fn test_memory_backend() {
        let mut backend = MemoryBackend::new();
        exercise_backend(&mut backend);
    }
}

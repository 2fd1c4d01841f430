//! The hypergraph store: reference-counted edges over an ordered key space.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::backend::{open_backend, Backend, KeyValue, WriteBatch};
use super::descriptor::{Descriptor, StoreConfig};
use super::keys::{self, EdgeRecord, RefKind};
use super::query::{EdgeFilter, EdgeIter, RecordIter, ScanIter};
use crate::error::{Error, Result};
use crate::hyperedge::Hyperedge;

/// Counts over the stored edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Distinct non-atomic edges.
    pub edges: u64,
    /// Distinct atoms.
    pub atoms: u64,
    /// Edges with at least one primary reference.
    pub primary: u64,
}

/// Outcome of [`Hypergraph::merge_from`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Edges replayed from the source store.
    pub edges: u64,
    /// Replayed edges that were not yet present in the target.
    pub new_edges: u64,
    /// Primary references transferred.
    pub primary_refs: u64,
    /// Non-primary direct references transferred.
    pub explicit_refs: u64,
}

/// Turns raw text into hyperedges for [`Hypergraph::ingest`].
pub trait TextParser {
    fn parse_edges(&self, text: &str) -> Result<Vec<Hyperedge>>;
}

/// A persistent store of semantic hyperedges.
///
/// Every added edge is stored together with all of its sub-hyperedges, each
/// carrying reference counts: primary assertions, direct non-primary adds and
/// the number of distinct stored edges that contain it. An edge disappears
/// once all three reach zero.
///
/// The handle serializes access to its backend internally. Closing is
/// explicit; a handle that is dropped while open closes itself and logs any
/// failure.
///
/// ```rust
/// use hgraph_core::{parse, Hypergraph};
///
/// let hg = Hypergraph::in_memory().unwrap();
/// let edge = parse("(is/Pd.sc/en wheel/Cc.s/en car/Cc.s/en)").unwrap();
/// assert!(hg.add(&edge, true).unwrap());
/// assert!(hg.is_primary(&edge).unwrap());
/// assert!(hg.exists(&parse("wheel/Cc.s/en").unwrap()).unwrap());
/// hg.close().unwrap();
/// ```
pub struct Hypergraph {
    backend: Mutex<Option<Box<dyn Backend>>>,
    descriptor: Descriptor,
    config: StoreConfig,
}

impl Hypergraph {
    /// Open the store named by `descriptor` with default configuration.
    pub fn open(descriptor: &str) -> Result<Self> {
        Self::open_with(descriptor, StoreConfig::default())
    }

    /// Open the store named by `descriptor`.
    #[instrument(skip(config))]
    pub fn open_with(descriptor: &str, config: StoreConfig) -> Result<Self> {
        let descriptor = Descriptor::parse(descriptor)?;
        Self::from_descriptor(descriptor, config)
    }

    /// Open a store from an already parsed descriptor.
    pub fn from_descriptor(descriptor: Descriptor, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let backend = open_backend(&descriptor, &config)?;
        info!(
            descriptor = %descriptor,
            backend = backend.name(),
            read_only = config.read_only,
            "opened hypergraph"
        );
        Ok(Self {
            backend: Mutex::new(Some(backend)),
            descriptor,
            config,
        })
    }

    /// Private in-memory store (for testing and scratch work).
    pub fn in_memory() -> Result<Self> {
        Self::from_descriptor(Descriptor::memory(), StoreConfig::default())
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn with_backend<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Backend) -> Result<T>,
    {
        let mut slot = self
            .backend
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock backend: {}", e)))?;
        match slot.as_deref_mut() {
            Some(backend) => f(backend),
            None => Err(Error::StoreClosed),
        }
    }

    /// Run `f` against a staging overlay and commit its writes as one batch.
    fn with_txn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Txn<'_>) -> Result<T>,
    {
        if self.config.read_only {
            return Err(Error::Config(format!(
                "store '{}' is opened read-only",
                self.descriptor
            )));
        }
        let page = self.config.scan_page_size;
        self.with_backend(|backend| {
            let (value, batch) = {
                let mut txn = Txn::new(&*backend, page);
                let value = f(&mut txn)?;
                (value, txn.into_batch())
            };
            backend.write(batch)?;
            Ok(value)
        })
    }

    pub(crate) fn scan_page(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<KeyValue>> {
        self.with_backend(|backend| backend.scan(prefix, after, limit))
    }

    fn scan(&self, prefix: Vec<u8>) -> ScanIter<'_> {
        ScanIter::new(self, prefix, self.config.scan_page_size)
    }

    // ==================== Mutation ====================

    /// Add `edge` and, transitively, all of its sub-hyperedges.
    ///
    /// Returns `true` if the edge was not stored before. Adding an edge that
    /// is already present only increments its reference count.
    #[instrument(level = "debug", skip(self, edge), fields(edge = %edge))]
    pub fn add(&self, edge: &Hyperedge, primary: bool) -> Result<bool> {
        let kind = if primary {
            RefKind::Primary
        } else {
            RefKind::Explicit
        };
        let is_new = self.with_txn(|txn| txn.add(edge, kind, 1))?;
        debug!(is_new, "added edge");
        Ok(is_new)
    }

    /// Drop one direct reference to `edge`.
    ///
    /// Primary references go first. The edge stays stored, as non-primary,
    /// while other stored edges still contain it; otherwise it is deleted
    /// together with its index entries and attributes, and the same applies
    /// to its elements. Returns `false` if the edge had no direct reference.
    #[instrument(level = "debug", skip(self, edge), fields(edge = %edge))]
    pub fn remove(&self, edge: &Hyperedge) -> Result<bool> {
        let removed = self.with_txn(|txn| txn.remove(edge))?;
        debug!(removed, "removed edge");
        Ok(removed)
    }

    /// Add every edge `parser` derives from `text` as primary. Returns the
    /// number of edges added.
    pub fn ingest(&self, parser: &dyn TextParser, text: &str) -> Result<usize> {
        let edges = parser.parse_edges(text)?;
        for edge in &edges {
            self.add(edge, true)?;
        }
        debug!(count = edges.len(), "ingested text");
        Ok(edges.len())
    }

    /// Replay the direct references of `other` into this store.
    ///
    /// Reference counts add up, so merging worker stores in any order or
    /// grouping yields the same result.
    #[instrument(skip(self, other), fields(source = %other.descriptor, target = %self.descriptor))]
    pub fn merge_from(&self, other: &Hypergraph) -> Result<MergeStats> {
        if std::ptr::eq(self, other) {
            return Err(Error::Config(
                "cannot merge a hypergraph into itself".to_string(),
            ));
        }
        let mut stats = MergeStats::default();
        for item in other.records() {
            let (edge, record) = item?;
            if record.primary == 0 && record.explicit == 0 {
                continue;
            }
            let is_new = self.with_txn(|txn| {
                let mut is_new = false;
                if record.primary > 0 {
                    is_new |= txn.add(&edge, RefKind::Primary, record.primary)?;
                }
                if record.explicit > 0 {
                    is_new |= txn.add(&edge, RefKind::Explicit, record.explicit)?;
                }
                Ok(is_new)
            })?;
            stats.edges += 1;
            stats.new_edges += u64::from(is_new);
            stats.primary_refs += record.primary;
            stats.explicit_refs += record.explicit;
        }
        info!(
            edges = stats.edges,
            new_edges = stats.new_edges,
            "merged hypergraph"
        );
        Ok(stats)
    }

    // ==================== Lookup ====================

    pub(crate) fn record(&self, edge: &Hyperedge) -> Result<Option<EdgeRecord>> {
        let key = keys::edge_key(edge);
        self.with_backend(|backend| backend.get(&key))?
            .map(|bytes| EdgeRecord::decode(&bytes))
            .transpose()
    }

    /// Whether `edge` is stored, as primary or derived.
    pub fn exists(&self, edge: &Hyperedge) -> Result<bool> {
        Ok(self.record(edge)?.is_some())
    }

    /// Whether `edge` has at least one primary reference.
    pub fn is_primary(&self, edge: &Hyperedge) -> Result<bool> {
        Ok(self.record(edge)?.is_some_and(|r| r.primary > 0))
    }

    /// Number of distinct stored edges containing `edge` as a direct element.
    pub fn degree(&self, edge: &Hyperedge) -> Result<u64> {
        Ok(self.record(edge)?.map_or(0, |r| r.parents))
    }

    // ==================== Iteration ====================

    /// Every stored edge, primary and derived, in key order.
    ///
    /// The sequence is read lazily in pages; calling `all` again starts over.
    pub fn all(&self) -> EdgeIter<'_> {
        let prefix = keys::edge_prefix();
        EdgeIter::new(self.scan(prefix), 1, EdgeFilter::All)
    }

    /// Every edge with a primary reference.
    pub fn all_primary(&self) -> EdgeIter<'_> {
        let prefix = keys::edge_prefix();
        EdgeIter::new(self.scan(prefix), 1, EdgeFilter::Primary)
    }

    /// Every stored atom.
    pub fn all_atoms(&self) -> EdgeIter<'_> {
        let prefix = keys::edge_prefix();
        EdgeIter::new(self.scan(prefix), 1, EdgeFilter::Atoms)
    }

    pub(crate) fn records(&self) -> RecordIter<'_> {
        RecordIter::new(self.scan(keys::edge_prefix()))
    }

    /// Stored edges having `edge` as a direct element.
    pub fn star(&self, edge: &Hyperedge) -> EdgeIter<'_> {
        let prefix = keys::star_prefix(edge);
        let len = prefix.len();
        EdgeIter::new(self.scan(prefix), len, EdgeFilter::All)
    }

    /// Stored atoms with the given root, any type or language.
    pub fn atoms_with_root(&self, root: &str) -> EdgeIter<'_> {
        let prefix = keys::root_prefix(root);
        let len = prefix.len();
        EdgeIter::new(self.scan(prefix), len, EdgeFilter::All)
    }

    /// Number of edges with a primary reference.
    pub fn count_primary(&self) -> Result<u64> {
        let mut count = 0;
        for item in self.records() {
            let (_, record) = item?;
            count += u64::from(record.primary > 0);
        }
        Ok(count)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for item in self.records() {
            let (edge, record) = item?;
            if edge.is_atom() {
                stats.atoms += 1;
            } else {
                stats.edges += 1;
            }
            stats.primary += u64::from(record.primary > 0);
        }
        Ok(stats)
    }

    // ==================== Attributes ====================

    /// Attach a string attribute to a stored edge. Returns `false` if the edge
    /// is not stored.
    pub fn set_attribute(&self, edge: &Hyperedge, name: &str, value: &str) -> Result<bool> {
        self.with_txn(|txn| {
            if txn.record(edge)?.is_none() {
                return Ok(false);
            }
            txn.put(keys::attr_key(edge, name), value.as_bytes().to_vec());
            Ok(true)
        })
    }

    pub fn get_attribute(&self, edge: &Hyperedge, name: &str) -> Result<Option<String>> {
        let key = keys::attr_key(edge, name);
        self.with_backend(|backend| backend.get(&key))?
            .map(decode_attribute)
            .transpose()
    }

    /// All attributes of an edge, by name.
    pub fn attributes(&self, edge: &Hyperedge) -> Result<BTreeMap<String, String>> {
        let prefix = keys::attr_prefix(edge);
        let len = prefix.len();
        let mut out = BTreeMap::new();
        for item in self.scan(prefix) {
            let (key, value) = item?;
            let name = String::from_utf8(key[len..].to_vec())
                .map_err(|_| Error::store_io("corrupted attribute name"))?;
            out.insert(name, decode_attribute(value)?);
        }
        Ok(out)
    }

    // ==================== Lifecycle ====================

    /// Push buffered writes to durable storage.
    pub fn flush(&self) -> Result<()> {
        self.with_backend(|backend| backend.flush())
    }

    /// Flush and release the backend. Every later operation fails with
    /// [`Error::StoreClosed`].
    pub fn close(&self) -> Result<()> {
        let backend = self
            .backend
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock backend: {}", e)))?
            .take()
            .ok_or(Error::StoreClosed)?;
        info!(descriptor = %self.descriptor, "closing hypergraph");
        backend.close()
    }

    pub fn is_closed(&self) -> bool {
        self.backend.lock().map(|slot| slot.is_none()).unwrap_or(true)
    }
}

impl Drop for Hypergraph {
    fn drop(&mut self) {
        if let Ok(slot) = self.backend.get_mut() {
            if let Some(backend) = slot.take() {
                if let Err(e) = backend.close() {
                    warn!(descriptor = %self.descriptor, error = %e, "failed to close hypergraph on drop");
                }
            }
        }
    }
}

impl fmt::Debug for Hypergraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hypergraph")
            .field("descriptor", &self.descriptor)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Open the store named by `descriptor` with default configuration.
pub fn open(descriptor: &str) -> Result<Hypergraph> {
    Hypergraph::open(descriptor)
}

fn decode_attribute(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::store_io("corrupted attribute value"))
}

/// Reads through staged writes; commits them as a single batch.
struct Txn<'b> {
    backend: &'b dyn Backend,
    page: usize,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'b> Txn<'b> {
    fn new(backend: &'b dyn Backend, page: usize) -> Self {
        Self {
            backend,
            page,
            pending: BTreeMap::new(),
        }
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.pending.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.backend.get(key),
        }
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, Some(value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.pending.insert(key, None);
    }

    fn record(&self, edge: &Hyperedge) -> Result<Option<EdgeRecord>> {
        self.get(&keys::edge_key(edge))?
            .map(|bytes| EdgeRecord::decode(&bytes))
            .transpose()
    }

    fn put_record(&mut self, edge: &Hyperedge, record: &EdgeRecord) -> Result<()> {
        self.put(keys::edge_key(edge), record.encode()?);
        Ok(())
    }

    /// Add `n` references of `kind` to `edge`, storing its elements on first
    /// sight. Returns whether `edge` was new.
    fn add(&mut self, edge: &Hyperedge, kind: RefKind, n: u64) -> Result<bool> {
        let mut work = vec![(edge, kind, n)];
        let mut top_is_new = None;
        while let Some((h, kind, n)) = work.pop() {
            let existing = self.record(h)?;
            let is_new = existing.is_none();
            let mut record = existing.unwrap_or_default();
            record.bump(kind, n);
            self.put_record(h, &record)?;
            top_is_new.get_or_insert(is_new);
            if !is_new {
                continue;
            }
            match h {
                Hyperedge::Atom(atom) => self.put(keys::root_key(atom), Vec::new()),
                Hyperedge::Edge(e) => {
                    for key in keys::perm_keys(h) {
                        self.put(key, Vec::new());
                    }
                    let mut seen = HashSet::new();
                    for child in e.items() {
                        if seen.insert(child) {
                            self.put(keys::star_key(child, h), Vec::new());
                            work.push((child, RefKind::Parent, 1));
                        }
                    }
                }
            }
        }
        Ok(top_is_new.unwrap_or(false))
    }

    fn remove(&mut self, edge: &Hyperedge) -> Result<bool> {
        let Some(mut record) = self.record(edge)? else {
            return Ok(false);
        };
        if record.primary > 0 {
            record.primary -= 1;
        } else if record.explicit > 0 {
            record.explicit -= 1;
        } else {
            return Ok(false);
        }
        if !record.is_unreferenced() {
            self.put_record(edge, &record)?;
            return Ok(true);
        }

        let mut doomed = vec![edge];
        while let Some(h) = doomed.pop() {
            self.delete(keys::edge_key(h));
            self.delete_attributes(h)?;
            match h {
                Hyperedge::Atom(atom) => self.delete(keys::root_key(atom)),
                Hyperedge::Edge(e) => {
                    for key in keys::perm_keys(h) {
                        self.delete(key);
                    }
                    let mut seen = HashSet::new();
                    for child in e.items() {
                        if !seen.insert(child) {
                            continue;
                        }
                        self.delete(keys::star_key(child, h));
                        let Some(mut child_record) = self.record(child)? else {
                            continue;
                        };
                        child_record.parents = child_record.parents.saturating_sub(1);
                        if child_record.is_unreferenced() {
                            doomed.push(child);
                        } else {
                            self.put_record(child, &child_record)?;
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    fn delete_attributes(&mut self, edge: &Hyperedge) -> Result<()> {
        let prefix = keys::attr_prefix(edge);
        let mut after: Option<Vec<u8>> = None;
        loop {
            let page = self.backend.scan(&prefix, after.as_deref(), self.page)?;
            let done = page.len() < self.page;
            after = page.last().map(|(key, _)| key.clone());
            for (key, _) in page {
                self.delete(key);
            }
            if done || after.is_none() {
                return Ok(());
            }
        }
    }

    fn into_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (key, value) in self.pending {
            match value {
                Some(value) => batch.put(key, value),
                None => batch.delete(key),
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperedge::parse;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn h(text: &str) -> Hyperedge {
        parse(text).unwrap()
    }

    fn sorted(iter: EdgeIter<'_>) -> Vec<String> {
        let mut out: Vec<String> = iter.map(|e| e.unwrap().to_string()).collect();
        out.sort();
        out
    }

    const WHEEL: &str = "(is/Pd.sc/en wheel/Cc.s/en (of/Br.ma/en part/Cc.s/en car/Cc.s/en))";

    #[test]
    fn test_add_stores_subedges() {
        let hg = Hypergraph::in_memory().unwrap();
        assert!(hg.add(&h(WHEEL), true).unwrap());

        assert!(hg.is_primary(&h(WHEEL)).unwrap());
        assert!(hg.exists(&h("car/Cc.s/en")).unwrap());
        assert!(!hg.is_primary(&h("car/Cc.s/en")).unwrap());
        assert!(hg.exists(&h("(of/Br.ma/en part/Cc.s/en car/Cc.s/en)")).unwrap());
        // 5 atoms, 2 edges
        assert_eq!(hg.all().count(), 7);
        assert_eq!(
            hg.stats().unwrap(),
            StoreStats {
                edges: 2,
                atoms: 5,
                primary: 1
            }
        );
    }

    #[test]
    fn test_add_is_idempotent() {
        let hg = Hypergraph::in_memory().unwrap();
        let edge = h("(is/P a/C b/C)");
        assert!(hg.add(&edge, true).unwrap());
        assert!(!hg.add(&edge, true).unwrap());
        assert!(hg.is_primary(&edge).unwrap());
        let all = sorted(hg.all());
        assert_eq!(all.iter().filter(|e| *e == "(is/P a/C b/C)").count(), 1);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_repeated_element_counts_one_parent() {
        let hg = Hypergraph::in_memory().unwrap();
        hg.add(&h("(and/J a/C a/C)"), true).unwrap();
        assert_eq!(hg.degree(&h("a/C")).unwrap(), 1);
        hg.add(&h("(or/J a/C b/C)"), true).unwrap();
        assert_eq!(hg.degree(&h("a/C")).unwrap(), 2);
        assert_eq!(hg.degree(&h("zzz/C")).unwrap(), 0);
    }

    #[test]
    fn test_remove_keeps_referenced_subedge() {
        let hg = Hypergraph::in_memory().unwrap();
        let inner = h("(of/Br.ma/en part/Cc.s/en car/Cc.s/en)");
        hg.add(&h(WHEEL), true).unwrap();
        hg.add(&inner, true).unwrap();
        assert!(hg.is_primary(&inner).unwrap());

        assert!(hg.remove(&inner).unwrap());
        assert!(!hg.is_primary(&inner).unwrap());
        assert!(sorted(hg.all()).contains(&inner.to_string()));

        // Only derived now: no direct reference left to drop
        assert!(!hg.remove(&inner).unwrap());
    }

    #[test]
    fn test_remove_cascades() {
        let hg = Hypergraph::in_memory().unwrap();
        hg.add(&h("(is/P a/C (of/B b/C c/C))"), true).unwrap();
        hg.add(&h("(has/P a/C d/C)"), true).unwrap();

        assert!(hg.remove(&h("(is/P a/C (of/B b/C c/C))")).unwrap());
        assert_eq!(
            sorted(hg.all()),
            vec!["(has/P a/C d/C)", "a/C", "d/C", "has/P"]
        );
        assert_eq!(hg.degree(&h("a/C")).unwrap(), 1);
        assert_eq!(hg.star(&h("a/C")).count(), 1);
        assert_eq!(hg.atoms_with_root("b").count(), 0);
    }

    #[test]
    fn test_remove_absent_edge() {
        let hg = Hypergraph::in_memory().unwrap();
        assert!(!hg.remove(&h("(is/P a/C b/C)")).unwrap());
    }

    #[test]
    fn test_multiple_references() {
        let hg = Hypergraph::in_memory().unwrap();
        let edge = h("(is/P a/C b/C)");
        hg.add(&edge, true).unwrap();
        hg.add(&edge, true).unwrap();
        hg.add(&edge, false).unwrap();

        assert!(hg.remove(&edge).unwrap());
        assert!(hg.is_primary(&edge).unwrap());
        assert!(hg.remove(&edge).unwrap());
        assert!(!hg.is_primary(&edge).unwrap());
        assert!(hg.exists(&edge).unwrap());
        assert!(hg.remove(&edge).unwrap());
        assert!(!hg.exists(&edge).unwrap());
        assert_eq!(hg.all().count(), 0);
    }

    #[test]
    fn test_star_and_root_index() {
        let hg = Hypergraph::in_memory().unwrap();
        hg.add(&h("(is/P car/C red/C)"), true).unwrap();
        hg.add(&h("(has/P car/C wheels/C)"), true).unwrap();
        hg.add(&h("car/Cp/en"), true).unwrap();

        assert_eq!(
            sorted(hg.star(&h("car/C"))),
            vec!["(has/P car/C wheels/C)", "(is/P car/C red/C)"]
        );
        assert_eq!(sorted(hg.atoms_with_root("car")), vec!["car/C", "car/Cp/en"]);
        assert_eq!(sorted(hg.all_atoms()).len(), 6);
        assert_eq!(hg.count_primary().unwrap(), 3);
        assert_eq!(sorted(hg.all_primary()).len(), 3);
    }

    #[test]
    fn test_attributes() {
        let hg = Hypergraph::in_memory().unwrap();
        let edge = h("(is/P a/C b/C)");
        assert!(!hg.set_attribute(&edge, "text", "a is b").unwrap());

        hg.add(&edge, true).unwrap();
        assert!(hg.set_attribute(&edge, "text", "a is b").unwrap());
        assert!(hg.set_attribute(&edge, "source", "doc-1").unwrap());
        assert_eq!(hg.get_attribute(&edge, "text").unwrap().as_deref(), Some("a is b"));
        assert_eq!(hg.get_attribute(&edge, "missing").unwrap(), None);
        assert_eq!(hg.attributes(&edge).unwrap().len(), 2);

        hg.remove(&edge).unwrap();
        assert!(hg.attributes(&edge).unwrap().is_empty());
    }

    #[test]
    fn test_closed_store_fails_fast() {
        let hg = Hypergraph::in_memory().unwrap();
        let edge = h("(is/P a/C b/C)");
        hg.add(&edge, true).unwrap();
        hg.close().unwrap();

        assert!(hg.is_closed());
        assert!(matches!(hg.add(&edge, true), Err(Error::StoreClosed)));
        assert!(matches!(hg.exists(&edge), Err(Error::StoreClosed)));
        assert!(matches!(hg.all().next(), Some(Err(Error::StoreClosed))));
        assert!(matches!(hg.close(), Err(Error::StoreClosed)));
    }

    #[test]
    fn test_open_errors() {
        assert!(matches!(open("ftp://x"), Err(Error::StoreOpen { .. })));

        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope").join("kb.db");
        let err = open(&missing.display().to_string()).unwrap_err();
        assert!(matches!(err, Error::StoreOpen { .. }));
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let descriptor = format!("sqlite://{}", dir.path().join("kb.db").display());
        let edge = h(WHEEL);

        let hg = open(&descriptor).unwrap();
        hg.add(&edge, true).unwrap();
        hg.set_attribute(&edge, "text", "The wheel is part of the car.").unwrap();
        hg.close().unwrap();

        let hg = open(&descriptor).unwrap();
        assert!(hg.is_primary(&edge).unwrap());
        assert_eq!(hg.all().count(), 7);
        assert_eq!(
            hg.get_attribute(&edge, "text").unwrap().as_deref(),
            Some("The wheel is part of the car.")
        );
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.db");
        let edge = h("(is/P a/C b/C)");
        {
            let hg = open(&path.display().to_string()).unwrap();
            hg.add(&edge, true).unwrap();
        }

        let config = StoreConfig::new().read_only(true);
        let hg = Hypergraph::open_with(&path.display().to_string(), config).unwrap();
        assert!(hg.is_primary(&edge).unwrap());
        assert!(matches!(hg.add(&edge, true), Err(Error::Config(_))));
    }

    #[test]
    fn test_small_pages_cover_everything() {
        let config = StoreConfig::new().scan_page_size(2);
        let hg = Hypergraph::from_descriptor(Descriptor::memory(), config).unwrap();
        for i in 0..5 {
            hg.add(&h(&format!("(is/P a{}/C b/C)", i)), true).unwrap();
        }
        // 5 edges, 5 distinct a atoms, is/P, b/C
        assert_eq!(hg.all().count(), 12);
        assert_eq!(hg.star(&h("b/C")).count(), 5);
    }

    fn fill(hg: &Hypergraph, edges: &[&str]) {
        for edge in edges {
            hg.add(&h(edge), true).unwrap();
        }
    }

    #[test]
    fn test_merge_is_order_independent() {
        let edges = [
            "(is/P a/C b/C)",
            "(is/P b/C c/C)",
            "(has/P a/C (of/B x/C y/C))",
            "(is/P a/C b/C)",
        ];

        let left = Hypergraph::in_memory().unwrap();
        fill(&left, &edges[..2]);
        let right = Hypergraph::in_memory().unwrap();
        fill(&right, &edges[2..]);

        let forward = Hypergraph::in_memory().unwrap();
        forward.merge_from(&left).unwrap();
        forward.merge_from(&right).unwrap();

        let backward = Hypergraph::in_memory().unwrap();
        let stats = backward.merge_from(&right).unwrap();
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.new_edges, 2);
        backward.merge_from(&left).unwrap();

        let direct = Hypergraph::in_memory().unwrap();
        fill(&direct, &edges);

        assert_eq!(sorted(forward.all()), sorted(direct.all()));
        assert_eq!(sorted(backward.all()), sorted(direct.all()));

        // Reference counts carry over: two removals needed
        let twice = h("(is/P a/C b/C)");
        forward.remove(&twice).unwrap();
        assert!(forward.is_primary(&twice).unwrap());
    }

    #[test]
    fn test_merge_into_self_is_rejected() {
        let hg = Hypergraph::in_memory().unwrap();
        assert!(matches!(hg.merge_from(&hg), Err(Error::Config(_))));
    }

    #[test]
    fn test_parallel_workers_then_merge() {
        let batches: Vec<Vec<String>> = (0..4)
            .map(|w| (0..10).map(|i| format!("(is/P w{}/C n{}/C)", w, i % 3)).collect())
            .collect();

        let workers: Vec<Hypergraph> = std::thread::scope(|scope| {
            let handles: Vec<_> = batches
                .iter()
                .map(|batch| {
                    scope.spawn(move || {
                        let hg = Hypergraph::in_memory().unwrap();
                        for edge in batch {
                            hg.add(&h(edge), true).unwrap();
                        }
                        hg
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let main = Hypergraph::in_memory().unwrap();
        for worker in workers.iter().rev() {
            main.merge_from(worker).unwrap();
        }
        assert_eq!(main.count_primary().unwrap(), 12);
    }

    struct LineParser;

    impl TextParser for LineParser {
        fn parse_edges(&self, text: &str) -> Result<Vec<Hyperedge>> {
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(parse)
                .collect()
        }
    }

    #[test]
    fn test_ingest() {
        let hg = Hypergraph::in_memory().unwrap();
        let added = hg
            .ingest(&LineParser, "(is/P a/C b/C)\n\n(is/P b/C c/C)\n")
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(hg.count_primary().unwrap(), 2);

        let err = hg.ingest(&LineParser, "(is/P a/C").unwrap_err();
        assert!(err.is_syntax());
    }
}

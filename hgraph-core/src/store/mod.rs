//! Persistent hyperedge storage.
//!
//! A [`Hypergraph`] keeps reference-counted hyperedges, a permutation index
//! for pattern search, a neighbor (star) index, a root index for atoms and
//! per-edge attributes. All of it lives in one ordered byte key space, so any
//! [`Backend`] able to do point reads, prefix scans and atomic batches can
//! host it:
//!
//! | descriptor              | backend                                   |
//! |-------------------------|-------------------------------------------|
//! | `path/to/kb.db`         | SQLite (default for bare paths)           |
//! | `sqlite://path/to/kb.db`| SQLite                                    |
//! | `sqlite://:memory:`     | private in-memory SQLite                  |
//! | `rocksdb://path/to/kb`  | RocksDB (cargo feature `rocksdb`)         |
//! | `memory://`             | private ordered map                       |
//!
//! # Example
//!
//! ```rust
//! use hgraph_core::{parse, store, Pattern};
//!
//! let hg = store::open("memory://").unwrap();
//! hg.add(&parse("(is/Pd.sc/en wheel/Cc.s/en (of/Br.ma/en part/Cc.s/en car/Cc.s/en))").unwrap(), true).unwrap();
//!
//! let pattern = Pattern::parse("(is/Pd.sc/en * (*))").unwrap();
//! assert_eq!(hg.search(&pattern).count(), 1);
//! hg.close().unwrap();
//! ```

pub mod backend;
mod descriptor;
mod hypergraph;
mod keys;
mod query;
pub mod schema;

pub use backend::{Backend, BatchOp, MemoryBackend, SqliteBackend, WriteBatch};
#[cfg(feature = "rocksdb")]
pub use backend::RocksBackend;
pub use descriptor::{BackendKind, Descriptor, StoreConfig};
pub use hypergraph::{open, Hypergraph, MergeStats, StoreStats, TextParser};
pub use query::{EdgeIter, MatchIter, SearchIter};

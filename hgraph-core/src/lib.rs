//! # hgraph-core
//!
//! Semantic hypergraph storage and pattern matching.
//!
//! ## Core Components
//!
//! - **Hyperedge**: Typed atoms, nested edges and their textual notation
//! - **Pattern**: Wildcards, variables and alternation over hyperedges
//! - **Store**: Persistent hypergraphs with permutation and root indexes
//! - **Counting**: Edge generalization and mergeable pattern frequencies
//!
//! ## Example
//!
//! ```rust
//! use hgraph_core::{parse, Hypergraph, Matcher, Pattern};
//!
//! let hg = Hypergraph::in_memory().unwrap();
//! hg.add(&parse("(is/Pd.sc/en sky/Cc.s/en blue/Ma/en)").unwrap(), true).unwrap();
//!
//! let pattern = Pattern::parse("(is/Pd.sc/en (var * THING) *)").unwrap();
//! let matches: Vec<_> = hg
//!     .match_pattern(&pattern, &Matcher::new())
//!     .collect::<hgraph_core::Result<_>>()
//!     .unwrap();
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].get("THING").unwrap().to_string(), "sky/Cc.s/en");
//! ```

pub mod counting;
pub mod error;
pub mod hyperedge;
pub mod pattern;
pub mod store;

// Re-exports for convenience
pub use counting::{generalize, CounterConfig, GeneralizationStrategy, LevelPolicy, PatternCounter};
pub use error::{Error, Result};
pub use hyperedge::{parse, serialize, Atom, Edge, Hyperedge, ParseOptions, TypeClass};
pub use pattern::{Bindings, Match, MatchConfig, MatchContext, Matcher, Pattern, SimilarityScorer};
pub use store::{Descriptor, Hypergraph, StoreConfig};

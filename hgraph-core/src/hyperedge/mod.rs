//! Semantic hyperedges: the recursive value type and its notation.
//!
//! A hyperedge is either an [`Atom`] or an ordered, non-empty sequence of
//! hyperedges whose first element is the connector:
//!
//! ```rust
//! use hgraph_core::hyperedge::parse;
//!
//! let edge = parse("(is/Pd.sc/en wheel/Cc.s/en (of/Br.ma/en part/Cc.s/en car/Cc.s/en))").unwrap();
//! assert_eq!(edge.depth(), 2);
//! assert_eq!(edge.connector().unwrap().to_string(), "is/Pd.sc/en");
//! assert_eq!(edge.atoms().count(), 5);
//! ```

mod atom;
mod edge;
mod notation;
pub(crate) mod proptest;

pub use atom::{Atom, TypeClass, WILDCARD_ROOT};
pub use edge::{AllAtoms, Atoms, Edge, Hyperedge, Subedges};
pub(crate) use notation::escape_root;
pub use notation::{parse, parse_with, serialize, ParseOptions, DEFAULT_MAX_DEPTH};

//! Pattern language and matching.
//!
//! A [`Pattern`] is a hyperedge with reserved forms (`*`, `*/Type`, `(*)`,
//! `(var P NAME)`, `(any P1 P2 ...)`), validated once at construction. A
//! [`Matcher`] checks patterns against candidate edges and returns one
//! [`Bindings`] environment per successful way of matching.
//!
//! ```rust
//! use hgraph_core::{parse, Matcher, Pattern};
//!
//! let pattern = Pattern::parse("(is/Pd.sc/en (var * PART) (*/Br (var * TYPE) (var * WHOLE)))").unwrap();
//! let edge = parse("(is/Pd.sc/en wheel/Cc.s/en (of/Br.ma/en part/Cc.s/en car/Cc.s/en))").unwrap();
//!
//! let results = Matcher::new().matches(&pattern, &edge);
//! assert_eq!(results[0]["WHOLE"].to_string(), "car/Cc.s/en");
//! ```

mod compile;
mod matcher;

pub(crate) use compile::{reserved_connector, PatternNode};
pub use compile::{Pattern, ANY_CONNECTOR, VAR_CONNECTOR};
pub use matcher::{Bindings, Match, MatchConfig, MatchContext, Matcher, SimilarityScorer};

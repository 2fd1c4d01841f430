//! Pattern generalization and frequency counting.
//!
//! A [`GeneralizationStrategy`] maps each concrete edge to a pattern, and a
//! [`PatternCounter`] tallies how often each pattern occurs. Counters are
//! mergeable, so large corpora can be counted in parallel partitions.
//!
//! ```rust
//! use hgraph_core::{parse, CounterConfig, LevelPolicy, PatternCounter};
//!
//! let mut counter = PatternCounter::with_config(CounterConfig {
//!     policy: LevelPolicy::new(2),
//!     count_subedges: false,
//! });
//! counter.count(&parse("(is/Pd.sc/en sky/Cc.s/en blue/Ma/en)").unwrap());
//! assert_eq!(counter.snapshot().keys().next().unwrap(), "(is/Pd.sc/en */Cc */Ma)");
//! ```

mod counter;
mod generalize;

pub use counter::{CounterConfig, PatternCounter};
pub use generalize::{generalize, GeneralizationStrategy, LevelPolicy};

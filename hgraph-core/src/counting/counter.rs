//! Pattern frequency tables.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::generalize::{GeneralizationStrategy, LevelPolicy};
use crate::error::Result;
use crate::hyperedge::Hyperedge;
use crate::store::Hypergraph;

/// Counter configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub policy: LevelPolicy,
    /// Also count every distinct nested edge of each counted edge.
    pub count_subedges: bool,
}

type Table = HashMap<Hyperedge, u64>;

/// Frequency table from generalized patterns to occurrence counts.
///
/// Counting is a sum over edges, so counters built over disjoint partitions
/// of a stream can be [merged](Self::merge) in any order.
///
/// ```rust
/// use hgraph_core::{parse, PatternCounter};
///
/// let mut counter = PatternCounter::new();
/// for text in ["(is/P a/C b/C)", "(is/P c/C d/C)", "(has/P a/C b/C)"] {
///     counter.count(&parse(text).unwrap());
/// }
/// let top = counter.most_common(1);
/// assert_eq!(top[0].0.to_string(), "(is/P */C */C)");
/// assert_eq!(top[0].1, 2);
/// ```
#[derive(Clone)]
pub struct PatternCounter {
    strategy: Arc<dyn GeneralizationStrategy>,
    count_subedges: bool,
    patterns: Table,
}

impl Default for PatternCounter {
    fn default() -> Self {
        Self::with_config(CounterConfig::default())
    }
}

impl fmt::Debug for PatternCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternCounter")
            .field("count_subedges", &self.count_subedges)
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

impl PatternCounter {
    /// Counter generalizing at level 1.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CounterConfig) -> Self {
        Self {
            strategy: Arc::new(config.policy),
            count_subedges: config.count_subedges,
            patterns: HashMap::new(),
        }
    }

    /// Counter using a custom generalization strategy.
    pub fn with_strategy(strategy: impl GeneralizationStrategy + 'static) -> Self {
        Self {
            strategy: Arc::new(strategy),
            count_subedges: false,
            patterns: HashMap::new(),
        }
    }

    pub fn count_subedges(mut self, enabled: bool) -> Self {
        self.count_subedges = enabled;
        self
    }

    /// Generalize `edge` and increment its pattern.
    pub fn count(&mut self, edge: &Hyperedge) {
        tally(
            self.strategy.as_ref(),
            self.count_subedges,
            edge,
            &mut self.patterns,
        );
    }

    pub fn count_all<I>(&mut self, edges: I)
    where
        I: IntoIterator,
        I::Item: Borrow<Hyperedge>,
    {
        for edge in edges {
            self.count(edge.borrow());
        }
    }

    /// Count `edges` on the rayon thread pool. The result equals counting
    /// them one by one.
    pub fn count_parallel(&mut self, edges: &[Hyperedge]) {
        let strategy = self.strategy.as_ref();
        let subedges = self.count_subedges;
        let table = edges
            .par_iter()
            .fold(Table::new, |mut table, edge| {
                tally(strategy, subedges, edge, &mut table);
                table
            })
            .reduce(Table::new, merge_tables);
        self.patterns = merge_tables(std::mem::take(&mut self.patterns), table);
    }

    /// Count every primary edge of a store. Returns the number of edges read.
    pub fn count_store(&mut self, hg: &Hypergraph) -> Result<u64> {
        let mut n = 0;
        for edge in hg.all_primary() {
            let edge = edge?;
            if !edge.is_atom() {
                self.count(&edge);
                n += 1;
            }
        }
        debug!(edges = n, patterns = self.patterns.len(), "counted store patterns");
        Ok(n)
    }

    /// Add the counts of `other` to this counter.
    pub fn merge(&mut self, other: &PatternCounter) {
        for (pattern, count) in &other.patterns {
            *self.patterns.entry(pattern.clone()).or_insert(0) += count;
        }
    }

    /// Occurrences of `pattern`; zero when never counted.
    pub fn get(&self, pattern: &Hyperedge) -> u64 {
        self.patterns.get(pattern).copied().unwrap_or(0)
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.patterns.values().sum()
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&Hyperedge, u64)> {
        self.patterns.iter().map(|(pattern, count)| (pattern, *count))
    }

    /// The `n` most frequent patterns, ties broken by pattern text.
    pub fn most_common(&self, n: usize) -> Vec<(Hyperedge, u64)> {
        let mut ranked: Vec<(String, &Hyperedge, u64)> = self
            .patterns
            .iter()
            .map(|(pattern, count)| (pattern.to_string(), pattern, *count))
            .collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(n)
            .map(|(_, pattern, count)| (pattern.clone(), count))
            .collect()
    }

    /// Pattern text to count, ordered by text.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.patterns
            .iter()
            .map(|(pattern, count)| (pattern.to_string(), *count))
            .collect()
    }
}

fn tally(
    strategy: &dyn GeneralizationStrategy,
    subedges: bool,
    edge: &Hyperedge,
    table: &mut Table,
) {
    if !subedges {
        *table.entry(strategy.generalize(edge)).or_insert(0) += 1;
        return;
    }
    for sub in edge.subedges().filter(|s| !s.is_atom()) {
        *table.entry(strategy.generalize(sub)).or_insert(0) += 1;
    }
}

fn merge_tables(mut into: Table, from: Table) -> Table {
    if into.len() < from.len() {
        return merge_tables(from, into);
    }
    for (pattern, count) in from {
        *into.entry(pattern).or_insert(0) += count;
    }
    into
}

//! Lazy iteration and indexed pattern search.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::backend::KeyValue;
use super::hypergraph::Hypergraph;
use super::keys::{self, EdgeRecord};
use crate::error::{Error, Result};
use crate::hyperedge::Hyperedge;
use crate::pattern::{Match, Matcher, Pattern, PatternNode};

/// Upper bound on index partitions probed for one pattern before falling
/// back to a wider partition.
const MAX_PROBES: usize = 64;

/// Paged prefix scan. Each page takes the store lock on its own, so the
/// iterator never holds it between calls to `next`.
pub(crate) struct ScanIter<'g> {
    graph: &'g Hypergraph,
    prefix: Vec<u8>,
    after: Option<Vec<u8>>,
    page: usize,
    buffer: VecDeque<KeyValue>,
    exhausted: bool,
}

impl<'g> ScanIter<'g> {
    pub(crate) fn new(graph: &'g Hypergraph, prefix: Vec<u8>, page: usize) -> Self {
        Self {
            graph,
            prefix,
            after: None,
            page,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Iterator for ScanIter<'_> {
    type Item = Result<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self
                .graph
                .scan_page(&self.prefix, self.after.as_deref(), self.page)
            {
                Ok(page) => {
                    self.exhausted = page.len() < self.page;
                    self.after = page.last().map(|(key, _)| key.clone());
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Stored edges with their reference counts.
pub(crate) struct RecordIter<'g> {
    scan: ScanIter<'g>,
}

impl<'g> RecordIter<'g> {
    pub(crate) fn new(scan: ScanIter<'g>) -> Self {
        Self { scan }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<(Hyperedge, EdgeRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.scan.next()?;
        Some(item.and_then(|(key, value)| {
            Ok((keys::decode_edge(&key, 1)?, EdgeRecord::decode(&value)?))
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeFilter {
    All,
    Atoms,
    Edges,
    Primary,
}

/// Lazy sequence of stored hyperedges.
///
/// Produced by [`Hypergraph::all`] and the other listing methods. Items are
/// fetched in pages of [`StoreConfig::scan_page_size`](super::StoreConfig)
/// keys; a failed fetch yields one error and ends the sequence.
pub struct EdgeIter<'g> {
    scan: ScanIter<'g>,
    prefix_len: usize,
    filter: EdgeFilter,
}

impl<'g> EdgeIter<'g> {
    pub(crate) fn new(scan: ScanIter<'g>, prefix_len: usize, filter: EdgeFilter) -> Self {
        Self {
            scan,
            prefix_len,
            filter,
        }
    }
}

impl Iterator for EdgeIter<'_> {
    type Item = Result<Hyperedge>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = match self.scan.next()? {
                Ok(kv) => kv,
                Err(e) => return Some(Err(e)),
            };
            let keep = match self.filter {
                EdgeFilter::All => true,
                EdgeFilter::Atoms => !keys::is_edge_key(&key),
                EdgeFilter::Edges => keys::is_edge_key(&key),
                EdgeFilter::Primary => match EdgeRecord::decode(&value) {
                    Ok(record) => record.primary > 0,
                    Err(e) => return Some(Err(e)),
                },
            };
            if keep {
                return Some(keys::decode_edge(&key, self.prefix_len));
            }
        }
    }
}

/// One way of locating candidates in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Probe {
    /// A single concrete edge.
    Exact(Hyperedge),
    /// A permutation index partition.
    Index(Vec<u8>),
    /// Every stored hyperedge passing the filter.
    Scan(EdgeFilter),
}

/// Compute the probes covering every edge `node` could match.
fn plan(node: &PatternNode, soft: bool) -> Vec<Probe> {
    match node {
        PatternNode::Literal(h) if !soft => vec![Probe::Exact(h.clone())],
        PatternNode::Literal(Hyperedge::Atom(_)) | PatternNode::Wildcard(_) => {
            vec![Probe::Scan(EdgeFilter::Atoms)]
        }
        PatternNode::Literal(Hyperedge::Edge(e)) => {
            vec![Probe::Index(keys::perm_prefix(e.len(), &[]))]
        }
        PatternNode::EdgeWildcard => vec![Probe::Scan(EdgeFilter::Edges)],
        PatternNode::Var { inner, .. } => plan(inner, soft),
        PatternNode::Any(alternatives) => {
            let mut probes: Vec<Probe> = Vec::new();
            for alternative in alternatives {
                for probe in plan(alternative, soft) {
                    if !probes.contains(&probe) {
                        probes.push(probe);
                    }
                }
            }
            if probes.len() > MAX_PROBES {
                return vec![Probe::Scan(EdgeFilter::All)];
            }
            probes
        }
        PatternNode::Edge(children) => plan_edge(children, soft),
    }
}

/// Index partitions for an edge pattern: the connector together with the
/// first fixed argument when both are fixed, otherwise a single fixed
/// position, otherwise the whole arity partition.
fn plan_edge(children: &[PatternNode], soft: bool) -> Vec<Probe> {
    let arity = children.len();
    let arity_only = vec![Probe::Index(keys::perm_prefix(arity, &[]))];
    if soft {
        return arity_only;
    }

    let fixed: Vec<(usize, Vec<&Hyperedge>)> = children
        .iter()
        .enumerate()
        .filter_map(|(pos, child)| child.concrete_values().map(|values| (pos, values)))
        .collect();

    let connector = fixed.iter().find(|(pos, _)| *pos == 0);
    let argument = fixed.iter().find(|(pos, _)| *pos > 0);
    let chosen: Vec<&(usize, Vec<&Hyperedge>)> = match (connector, argument) {
        (Some(c), Some(a)) if c.1.len() * a.1.len() <= MAX_PROBES => vec![c, a],
        (Some(c), _) if c.1.len() <= MAX_PROBES => vec![c],
        (_, Some(a)) if a.1.len() <= MAX_PROBES => vec![a],
        _ => return arity_only,
    };

    let mut combos: Vec<Vec<(usize, &Hyperedge)>> = vec![Vec::new()];
    for (pos, values) in chosen {
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |value| {
                    let mut next = combo.clone();
                    next.push((*pos, *value));
                    next
                })
            })
            .collect();
    }
    combos
        .iter()
        .map(|combo| Probe::Index(keys::perm_prefix(arity, combo)))
        .collect()
}

/// Distinct stored hyperedges reachable through a list of probes.
struct Candidates<'g> {
    graph: &'g Hypergraph,
    probes: VecDeque<Probe>,
    current: Option<EdgeIter<'g>>,
    seen: HashSet<Hyperedge>,
}

impl<'g> Candidates<'g> {
    fn new(graph: &'g Hypergraph, pattern: &Pattern, soft: bool) -> Self {
        let probes = plan(pattern.root(), soft);
        debug!(pattern = %pattern, probes = probes.len(), soft, "planned pattern search");
        Self {
            graph,
            probes: probes.into(),
            current: None,
            seen: HashSet::new(),
        }
    }

    fn open_probe(&self, probe: Probe) -> Result<EdgeIter<'g>> {
        let page = self.graph.config().scan_page_size;
        Ok(match probe {
            Probe::Index(prefix) => {
                let len = prefix.len();
                EdgeIter::new(ScanIter::new(self.graph, prefix, page), len, EdgeFilter::All)
            }
            Probe::Scan(filter) => {
                EdgeIter::new(ScanIter::new(self.graph, keys::edge_prefix(), page), 1, filter)
            }
            Probe::Exact(_) => {
                return Err(Error::Internal("exact probes are resolved directly".to_string()))
            }
        })
    }
}

impl Iterator for Candidates<'_> {
    type Item = Result<Hyperedge>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(h)) => {
                        if self.seen.insert(h.clone()) {
                            return Some(Ok(h));
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        self.current = None;
                        self.probes.clear();
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }

            match self.probes.pop_front()? {
                Probe::Exact(h) => match self.graph.exists(&h) {
                    Ok(true) if self.seen.insert(h.clone()) => return Some(Ok(h)),
                    Ok(_) => {}
                    Err(e) => {
                        self.probes.clear();
                        return Some(Err(e));
                    }
                },
                probe => match self.open_probe(probe) {
                    Ok(iter) => self.current = Some(iter),
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}

/// Stored edges matching a pattern, each yielded once.
pub struct SearchIter<'g> {
    candidates: Candidates<'g>,
    pattern: &'g Pattern,
    matcher: Matcher,
}

impl Iterator for SearchIter<'_> {
    type Item = Result<Hyperedge>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.candidates.next()? {
                Ok(h) if self.matcher.is_match(self.pattern, &h) => return Some(Ok(h)),
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Matches of a pattern against a store: one item per binding environment.
pub struct MatchIter<'g> {
    candidates: Candidates<'g>,
    pattern: &'g Pattern,
    matcher: Matcher,
    pending: VecDeque<Match>,
}

impl Iterator for MatchIter<'_> {
    type Item = Result<Match>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(m) = self.pending.pop_front() {
                return Some(Ok(m));
            }
            match self.candidates.next()? {
                Ok(h) => self.pending.extend(self.matcher.match_edge(self.pattern, &h)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Hypergraph {
    /// Stored edges matching `pattern` exactly.
    ///
    /// Candidates come from the permutation index whenever the pattern fixes
    /// the connector or an argument; every candidate is verified by the
    /// matcher before being yielded.
    pub fn search<'g>(&'g self, pattern: &'g Pattern) -> SearchIter<'g> {
        SearchIter {
            candidates: Candidates::new(self, pattern, false),
            pattern,
            matcher: Matcher::new(),
        }
    }

    /// All matches of `pattern` in the store under `matcher`.
    ///
    /// A soft matcher may equate distinct atoms, so literal positions are not
    /// used to narrow the candidate set.
    pub fn match_pattern<'g>(&'g self, pattern: &'g Pattern, matcher: &Matcher) -> MatchIter<'g> {
        MatchIter {
            candidates: Candidates::new(self, pattern, matcher.is_soft()),
            pattern,
            matcher: matcher.clone(),
            pending: VecDeque::new(),
        }
    }
}

//! Structural matching of patterns against hyperedges.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::compile::{Pattern, PatternNode};
use crate::hyperedge::{Atom, Hyperedge};

/// Variable name to bound hyperedge.
pub type Bindings = BTreeMap<String, Hyperedge>;

/// A matched edge with one consistent set of variable bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub edge: Hyperedge,
    pub bindings: Bindings,
}

impl Match {
    /// The hyperedge bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Hyperedge> {
        self.bindings.get(name)
    }
}

/// Where an atom comparison happens inside the candidate.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// The top-level candidate edge.
    pub root: &'a Hyperedge,
    /// Element indices leading from `root` to the compared atom.
    pub path: &'a [usize],
}

/// Pluggable similarity for soft atom matching.
///
/// Consulted only for non-identical atoms at literal positions. Returning
/// `None` means no opinion, which counts as a mismatch.
pub trait SimilarityScorer: Send + Sync {
    fn similar(&self, pattern: &Atom, candidate: &Atom, context: &MatchContext<'_>) -> Option<f64>;
}

impl<F> SimilarityScorer for F
where
    F: Fn(&Atom, &Atom, &MatchContext<'_>) -> Option<f64> + Send + Sync,
{
    fn similar(&self, pattern: &Atom, candidate: &Atom, context: &MatchContext<'_>) -> Option<f64> {
        self(pattern, candidate, context)
    }
}

/// Matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum similarity score for two distinct atoms to be equivalent.
    pub soft_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            soft_threshold: 0.5,
        }
    }
}

/// Matches compiled patterns against candidate hyperedges.
///
/// `any` is nondeterministic: every successful alternative yields its own
/// binding environment, so one candidate can produce several results.
#[derive(Clone, Default)]
pub struct Matcher {
    scorer: Option<Arc<dyn SimilarityScorer>>,
    config: MatchConfig,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("soft", &self.scorer.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Matcher {
    /// Exact matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable soft matching through `scorer`.
    pub fn with_scorer(mut self, scorer: impl SimilarityScorer + 'static) -> Self {
        self.scorer = Some(Arc::new(scorer));
        self
    }

    pub fn with_config(mut self, config: MatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether atom comparisons may be delegated to a scorer.
    pub fn is_soft(&self) -> bool {
        self.scorer.is_some()
    }

    /// All binding environments under which `pattern` matches `edge`.
    pub fn matches(&self, pattern: &Pattern, edge: &Hyperedge) -> Vec<Bindings> {
        let mut path = Vec::new();
        self.match_node(pattern.root(), edge, edge, &mut path, vec![Bindings::new()])
    }

    /// Whether `pattern` matches `edge` at least once.
    pub fn is_match(&self, pattern: &Pattern, edge: &Hyperedge) -> bool {
        !self.matches(pattern, edge).is_empty()
    }

    /// Matches of `pattern` against `edge`, paired with the edge.
    pub fn match_edge(&self, pattern: &Pattern, edge: &Hyperedge) -> Vec<Match> {
        self.matches(pattern, edge)
            .into_iter()
            .map(|bindings| Match {
                edge: edge.clone(),
                bindings,
            })
            .collect()
    }

    fn match_node(
        &self,
        node: &PatternNode,
        candidate: &Hyperedge,
        root: &Hyperedge,
        path: &mut Vec<usize>,
        envs: Vec<Bindings>,
    ) -> Vec<Bindings> {
        if envs.is_empty() {
            return envs;
        }
        match node {
            PatternNode::Literal(expected) => {
                if self.literal_eq(expected, candidate, root, path) {
                    envs
                } else {
                    Vec::new()
                }
            }
            PatternNode::Wildcard(constraint) => match candidate {
                Hyperedge::Atom(atom)
                    if constraint.as_ref().map_or(true, |c| accepts(c, atom)) =>
                {
                    envs
                }
                _ => Vec::new(),
            },
            PatternNode::EdgeWildcard => {
                if candidate.is_atom() {
                    Vec::new()
                } else {
                    envs
                }
            }
            PatternNode::Var { inner, name } => self
                .match_node(inner, candidate, root, path, envs)
                .into_iter()
                .filter_map(|mut env| match env.get(name) {
                    Some(bound) => (bound == candidate).then_some(env),
                    None => {
                        env.insert(name.clone(), candidate.clone());
                        Some(env)
                    }
                })
                .collect(),
            PatternNode::Any(alternatives) => {
                let mut out = Vec::new();
                for alternative in alternatives {
                    out.extend(self.match_node(alternative, candidate, root, path, envs.clone()));
                }
                out
            }
            PatternNode::Edge(children) => {
                let Hyperedge::Edge(edge) = candidate else {
                    return Vec::new();
                };
                if edge.len() != children.len() {
                    return Vec::new();
                }
                let mut envs = envs;
                for (i, (child, item)) in children.iter().zip(edge.items()).enumerate() {
                    path.push(i);
                    envs = self.match_node(child, item, root, path, envs);
                    path.pop();
                    if envs.is_empty() {
                        break;
                    }
                }
                envs
            }
        }
    }

    fn literal_eq(
        &self,
        expected: &Hyperedge,
        candidate: &Hyperedge,
        root: &Hyperedge,
        path: &mut Vec<usize>,
    ) -> bool {
        if expected == candidate {
            return true;
        }
        let Some(scorer) = &self.scorer else {
            return false;
        };
        match (expected, candidate) {
            (Hyperedge::Atom(a), Hyperedge::Atom(b)) => {
                let context = MatchContext { root, path };
                scorer
                    .similar(a, b, &context)
                    .is_some_and(|score| score >= self.config.soft_threshold)
            }
            (Hyperedge::Edge(a), Hyperedge::Edge(b)) if a.len() == b.len() => {
                a.items().iter().zip(b.items()).enumerate().all(|(i, (x, y))| {
                    path.push(i);
                    let equal = self.literal_eq(x, y, root, path);
                    path.pop();
                    equal
                })
            }
            _ => false,
        }
    }
}

/// Typed wildcard check: the candidate's type code extends the constraint's,
/// its argument roles include every constraint argument role and the language
/// agrees when the constraint names one. Morphology is ignored.
fn accepts(constraint: &Atom, atom: &Atom) -> bool {
    let argroles = atom.argroles();
    atom.type_code().starts_with(constraint.type_code())
        && constraint.argroles().chars().all(|c| argroles.contains(c))
        && constraint.lang().map_or(true, |lang| atom.lang() == Some(lang))
}

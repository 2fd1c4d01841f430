//! Pattern validation and compilation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::hyperedge::{parse, Atom, Hyperedge};

/// Connector root of a variable binder: `(var PATTERN NAME)`.
pub const VAR_CONNECTOR: &str = "var";
/// Connector root of an alternation: `(any P1 P2 ...)`.
pub const ANY_CONNECTOR: &str = "any";

/// Compiled pattern node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PatternNode {
    /// Concrete sub-hyperedge without pattern syntax.
    Literal(Hyperedge),
    /// `*` (`None`) or a typed wildcard such as `*/Cc.s`.
    Wildcard(Option<Atom>),
    /// `(*)`: any non-atomic edge.
    EdgeWildcard,
    Var {
        inner: Box<PatternNode>,
        name: String,
    },
    Any(Vec<PatternNode>),
    Edge(Vec<PatternNode>),
}

impl PatternNode {
    /// The concrete hyperedges this node can only ever match exactly, if any.
    pub(crate) fn concrete_values(&self) -> Option<Vec<&Hyperedge>> {
        match self {
            Self::Literal(h) => Some(vec![h]),
            Self::Var { inner, .. } => inner.concrete_values(),
            Self::Any(alternatives) => {
                let mut values = Vec::new();
                for alternative in alternatives {
                    values.extend(alternative.concrete_values()?);
                }
                Some(values)
            }
            Self::Wildcard(_) | Self::EdgeWildcard | Self::Edge(_) => None,
        }
    }
}

/// A validated query template.
///
/// Patterns are ordinary hyperedges in which a few forms are reserved:
///
/// - `*` matches any atom; `*/Cc.s` any atom whose type starts with `Cc` and
///   whose roles include `s`
/// - `(*)` matches any non-atomic edge
/// - `(var P NAME)` matches what `P` matches and binds the candidate to `NAME`
/// - `(any P1 P2 ...)` matches if any alternative matches, once per alternative
#[derive(Debug, Clone)]
pub struct Pattern {
    source: Hyperedge,
    root: PatternNode,
    variables: BTreeSet<String>,
}

impl Pattern {
    /// Validate and compile a pattern.
    pub fn new(source: Hyperedge) -> Result<Self> {
        let mut bound = HashMap::new();
        let mut variables = BTreeSet::new();
        let root = compile(&source, &mut bound, &mut variables)?;
        Ok(Self {
            source,
            root,
            variables,
        })
    }

    /// Parse and compile a pattern from its textual form.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(parse(text)?)
    }

    /// The pattern as written.
    pub fn as_hyperedge(&self) -> &Hyperedge {
        &self.source
    }

    /// Names of all variables, sorted.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Whether the pattern contains no wildcard, variable or alternation.
    pub fn is_concrete(&self) -> bool {
        matches!(self.root, PatternNode::Literal(_))
    }

    pub(crate) fn root(&self) -> &PatternNode {
        &self.root
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<Hyperedge> for Pattern {
    type Error = Error;

    fn try_from(source: Hyperedge) -> Result<Self> {
        Self::new(source)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.source.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = Hyperedge::deserialize(deserializer)?;
        Self::new(source).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn reserved_connector(h: &Hyperedge) -> Option<&str> {
    let atom = h.as_atom()?;
    if !atom.is_bare() {
        return None;
    }
    match atom.root() {
        VAR_CONNECTOR => Some(VAR_CONNECTOR),
        ANY_CONNECTOR => Some(ANY_CONNECTOR),
        _ => None,
    }
}

/// Compile `h`, tracking variables whose value is already fixed by a concrete
/// sub-pattern (`bound`) so that impossible rebindings fail early.
fn compile(
    h: &Hyperedge,
    bound: &mut HashMap<String, Option<Hyperedge>>,
    variables: &mut BTreeSet<String>,
) -> Result<PatternNode> {
    let edge = match h {
        Hyperedge::Atom(atom) if atom.is_wildcard() => {
            return Ok(PatternNode::Wildcard((!atom.is_bare()).then(|| atom.clone())));
        }
        Hyperedge::Atom(_) => return Ok(PatternNode::Literal(h.clone())),
        Hyperedge::Edge(edge) => edge,
    };

    match reserved_connector(edge.connector()) {
        Some(VAR_CONNECTOR) => {
            let [_, inner, name] = edge.items() else {
                return Err(Error::pattern(format!(
                    "{} expects a pattern and a variable name",
                    h
                )));
            };
            let name = match name.as_atom() {
                Some(atom) if atom.is_bare() && !atom.is_wildcard() => atom.root().to_string(),
                _ => {
                    return Err(Error::pattern(format!(
                        "variable name must be a plain atom, found {}",
                        name
                    )))
                }
            };
            let inner = compile(inner, bound, variables)?;
            let value = match &inner {
                PatternNode::Literal(value) => Some(value.clone()),
                _ => None,
            };
            match (bound.get(&name).cloned().flatten(), value) {
                (Some(existing), Some(value)) if existing != value => {
                    return Err(Error::pattern(format!(
                        "variable {} cannot be bound to both {} and {}",
                        name, existing, value
                    )));
                }
                (Some(_), _) => {}
                (None, value) => {
                    bound.insert(name.clone(), value);
                }
            }
            variables.insert(name.clone());
            Ok(PatternNode::Var {
                inner: Box::new(inner),
                name,
            })
        }
        Some(ANY_CONNECTOR) => {
            if edge.len() < 2 {
                return Err(Error::pattern(format!("{} has no alternatives", h)));
            }
            // Alternatives are independent: a variable only counts as fixed
            // afterwards if every branch fixes it to the same value.
            let mut branches = Vec::with_capacity(edge.len() - 1);
            let mut alternatives = Vec::with_capacity(edge.len() - 1);
            for arg in edge.args() {
                let mut branch = bound.clone();
                alternatives.push(compile(arg, &mut branch, variables)?);
                branches.push(branch);
            }
            let names: BTreeSet<String> = branches
                .iter()
                .flat_map(|branch| branch.keys().cloned())
                .collect();
            for name in names {
                if bound.contains_key(&name) {
                    continue;
                }
                let agreed = branches[0].get(&name).cloned().flatten().filter(|value| {
                    branches
                        .iter()
                        .all(|branch| matches!(branch.get(&name), Some(Some(v)) if v == value))
                });
                bound.insert(name, agreed);
            }
            Ok(PatternNode::Any(alternatives))
        }
        _ => {
            if edge.len() == 1 {
                if let Some(atom) = edge.connector().as_atom() {
                    if atom.is_wildcard() && atom.is_bare() {
                        return Ok(PatternNode::EdgeWildcard);
                    }
                }
            }
            let children = edge
                .items()
                .iter()
                .map(|item| compile(item, bound, variables))
                .collect::<Result<Vec<_>>>()?;
            if children.iter().all(|c| matches!(c, PatternNode::Literal(_))) {
                Ok(PatternNode::Literal(h.clone()))
            } else {
                Ok(PatternNode::Edge(children))
            }
        }
    }
}

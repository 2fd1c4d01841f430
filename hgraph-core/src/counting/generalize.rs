//! Abstraction of concrete edges into patterns.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hyperedge::{Atom, Edge, Hyperedge, WILDCARD_ROOT};
use crate::pattern::{reserved_connector, Pattern};

/// Maps a concrete edge to the pattern it is counted under.
///
/// Implementations must be deterministic: equal inputs give equal patterns.
pub trait GeneralizationStrategy: Send + Sync {
    fn generalize(&self, edge: &Hyperedge) -> Hyperedge;
}

impl<F> GeneralizationStrategy for F
where
    F: Fn(&Hyperedge) -> Hyperedge + Send + Sync,
{
    fn generalize(&self, edge: &Hyperedge) -> Hyperedge {
        self(edge)
    }
}

/// Level-based generalization.
///
/// Connectors are always kept verbatim. Argument atoms become:
///
/// | level | `wheel/Cc.s/en` becomes |
/// |-------|-------------------------|
/// | 0     | `wheel/Cc.s/en`         |
/// | 1     | `*/Cc.s`                |
/// | 2     | `*/Cc`                  |
/// | 3+    | `*/C`                   |
///
/// Untyped argument atoms become `*` from level 1 on. With `collapse_depth`
/// set, argument edges nested at least that deep are replaced by `(*)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelPolicy {
    pub level: u8,
    /// Nesting depth (1 = direct arguments) from which argument edges
    /// collapse into the edge wildcard.
    pub collapse_depth: Option<usize>,
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self {
            level: 1,
            collapse_depth: None,
        }
    }
}

impl LevelPolicy {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            collapse_depth: None,
        }
    }

    pub fn collapse_depth(mut self, depth: usize) -> Self {
        self.collapse_depth = Some(depth);
        self
    }

    fn atom(&self, atom: &Atom) -> Atom {
        if self.level == 0 {
            return atom.clone();
        }
        let Some(main) = atom.main_type() else {
            return Atom::wildcard();
        };
        match self.level {
            1 => wildcard(atom.type_code(), atom.argroles()),
            2 => wildcard(atom.type_code(), ""),
            _ => wildcard(&main.code().to_string(), ""),
        }
    }

    fn edge(&self, edge: &Edge, nesting: usize) -> Hyperedge {
        let mut items = Vec::with_capacity(edge.len());
        items.push(edge.connector().clone());
        for arg in edge.args() {
            items.push(match arg {
                Hyperedge::Atom(atom) => Hyperedge::Atom(self.atom(atom)),
                Hyperedge::Edge(inner) => {
                    if self.collapse_depth.is_some_and(|d| nesting + 1 >= d) {
                        edge_wildcard()
                    } else {
                        self.edge(inner, nesting + 1)
                    }
                }
            });
        }
        Hyperedge::Edge(Edge::from_items_unchecked(items))
    }
}

impl GeneralizationStrategy for LevelPolicy {
    fn generalize(&self, edge: &Hyperedge) -> Hyperedge {
        match edge {
            Hyperedge::Atom(_) => edge.clone(),
            Hyperedge::Edge(e) => self.edge(e, 0),
        }
    }
}

// Type code and roles come from an already valid atom
fn wildcard(type_code: &str, roles: &str) -> Atom {
    Atom::from_parts_unchecked(
        WILDCARD_ROOT.to_string(),
        type_code.to_string(),
        roles.to_string(),
        None,
    )
}

fn edge_wildcard() -> Hyperedge {
    Hyperedge::Edge(Edge::from_items_unchecked(vec![Hyperedge::Atom(
        Atom::wildcard(),
    )]))
}

/// Generalize `edge` at `level` and compile the result as a pattern.
///
/// Fails with [`Error::Pattern`] if `edge` has a plain `var` or `any`
/// connector anywhere, since the result would read as a binder or an
/// alternation instead of a literal.
///
/// ```rust
/// use hgraph_core::{generalize, parse};
///
/// let edge = parse("(is/Pd.sc/en wheel/Cc.s/en car/Cc.s/en)").unwrap();
/// assert_eq!(generalize(&edge, 1).unwrap().to_string(), "(is/Pd.sc/en */Cc.s */Cc.s)");
/// ```
pub fn generalize(edge: &Hyperedge, level: u8) -> Result<Pattern> {
    let reserved = edge
        .subedges()
        .filter_map(Hyperedge::as_edge)
        .find_map(|e| reserved_connector(e.connector()));
    if let Some(connector) = reserved {
        return Err(Error::pattern(format!(
            "{} has the reserved connector '{}' and cannot be generalized",
            edge, connector
        )));
    }
    Pattern::new(LevelPolicy::new(level).generalize(edge))
}

//! The recursive hyperedge value type and its structural operations.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::atom::{Atom, TypeClass};
use crate::error::{Error, Result};

/// Argument role marking the main element of a builder edge.
const MAIN_ROLE: char = 'm';

/// A non-leaf hyperedge: a non-empty ordered sequence whose first element is
/// the connector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    items: Vec<Hyperedge>,
}

impl Edge {
    /// Create an edge. Fails with a type error when `items` is empty.
    pub fn new(items: Vec<Hyperedge>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::type_error("an edge needs at least a connector"));
        }
        Ok(Self { items })
    }

    pub(crate) fn from_items_unchecked(items: Vec<Hyperedge>) -> Self {
        debug_assert!(!items.is_empty());
        Self { items }
    }

    pub fn items(&self) -> &[Hyperedge] {
        &self.items
    }

    pub fn connector(&self) -> &Hyperedge {
        &self.items[0]
    }

    pub fn args(&self) -> &[Hyperedge] {
        &self.items[1..]
    }

    /// Number of elements, connector included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// A semantic hyperedge: an atom or an edge of hyperedges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hyperedge {
    Atom(Atom),
    Edge(Edge),
}

impl Hyperedge {
    /// Build an edge from its elements.
    pub fn edge(items: Vec<Hyperedge>) -> Result<Self> {
        Edge::new(items).map(Self::Edge)
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Self::Atom(_))
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(atom) => Some(atom),
            Self::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Self::Atom(_) => None,
            Self::Edge(edge) => Some(edge),
        }
    }

    /// The connector of an edge. Fails with a type error on atoms.
    pub fn connector(&self) -> Result<&Hyperedge> {
        self.as_edge()
            .map(Edge::connector)
            .ok_or_else(|| Error::type_error(format!("atom {} has no connector", self)))
    }

    /// The arguments of an edge. Fails with a type error on atoms.
    pub fn args(&self) -> Result<&[Hyperedge]> {
        self.as_edge()
            .map(Edge::args)
            .ok_or_else(|| Error::type_error(format!("atom {} has no arguments", self)))
    }

    /// Number of elements of an edge, `0` for atoms.
    pub fn arity(&self) -> usize {
        self.as_edge().map_or(0, Edge::len)
    }

    /// Whether `other` is a direct element of this edge.
    pub fn contains(&self, other: &Hyperedge) -> bool {
        self.as_edge()
            .map(|e| e.items().contains(other))
            .unwrap_or(false)
    }

    /// `0` for atoms, `1 + max(depth(child))` for edges.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((h, d)) = stack.pop() {
            match h {
                Self::Atom(_) => max = max.max(d),
                Self::Edge(e) => stack.extend(e.items().iter().map(|c| (c, d + 1))),
            }
        }
        max
    }

    /// Distinct atoms, depth-first left to right. Each call starts a fresh
    /// traversal.
    pub fn atoms(&self) -> Atoms<'_> {
        Atoms {
            inner: self.all_atoms(),
            seen: HashSet::new(),
        }
    }

    /// Every atom occurrence, depth-first left to right.
    pub fn all_atoms(&self) -> AllAtoms<'_> {
        AllAtoms { stack: vec![self] }
    }

    /// Distinct sub-hyperedges, this one included, in pre-order.
    pub fn subedges(&self) -> Subedges<'_> {
        Subedges {
            stack: vec![self],
            seen: HashSet::new(),
        }
    }

    /// The first atom reached by following connectors.
    pub fn connector_atom(&self) -> &Atom {
        let mut current = self;
        loop {
            match current {
                Self::Atom(atom) => return atom,
                Self::Edge(e) => current = e.connector(),
            }
        }
    }

    /// Type inferred from the type grammar.
    ///
    /// Builders produce concepts, predicates relations, triggers specifiers;
    /// modifiers and conjunctions take the type of their first argument.
    pub fn inferred_type(&self) -> Option<TypeClass> {
        let mut current = self;
        loop {
            let edge = match current {
                Self::Atom(atom) => return atom.main_type(),
                Self::Edge(e) => e,
            };
            match edge.connector().inferred_type()? {
                TypeClass::Predicate => return Some(TypeClass::Relation),
                TypeClass::Builder | TypeClass::Concept => return Some(TypeClass::Concept),
                TypeClass::Trigger => return Some(TypeClass::Specifier),
                TypeClass::Modifier | TypeClass::Conjunction => {
                    current = edge.args().first()?;
                }
                TypeClass::Relation | TypeClass::Specifier => return None,
            }
        }
    }

    /// The principal concept atom, found by walking the connector chain.
    ///
    /// Builder edges continue into the argument carrying the main role `m`,
    /// modifier and conjunction edges into their first argument. Anything else
    /// (relations, untyped atoms, builders without a main role) yields `None`.
    pub fn main_concept(&self) -> Option<&Atom> {
        let mut current = self;
        loop {
            let edge = match current {
                Self::Atom(atom) => {
                    return (atom.main_type() == Some(TypeClass::Concept)).then_some(atom)
                }
                Self::Edge(e) => e,
            };
            current = match edge.connector().inferred_type()? {
                TypeClass::Builder => {
                    let pos = edge
                        .connector()
                        .connector_atom()
                        .argroles()
                        .chars()
                        .position(|r| r == MAIN_ROLE)?;
                    edge.args().get(pos)?
                }
                TypeClass::Modifier | TypeClass::Conjunction => edge.args().first()?,
                _ => return None,
            };
        }
    }

    /// Arguments of a builder edge tagged with the main role.
    pub fn main_concepts(&self) -> Vec<&Hyperedge> {
        let Some(edge) = self.as_edge() else {
            return Vec::new();
        };
        if edge.connector().inferred_type() != Some(TypeClass::Builder) {
            return Vec::new();
        }
        let argroles = edge.connector().connector_atom().argroles();
        argroles
            .chars()
            .zip(edge.args())
            .filter(|(role, _)| *role == MAIN_ROLE)
            .map(|(_, arg)| arg)
            .collect()
    }
}

impl From<Atom> for Hyperedge {
    fn from(atom: Atom) -> Self {
        Self::Atom(atom)
    }
}

impl From<Edge> for Hyperedge {
    fn from(edge: Edge) -> Self {
        Self::Edge(edge)
    }
}

impl fmt::Display for Hyperedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::notation::serialize(self))
    }
}

impl FromStr for Hyperedge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        super::notation::parse(s)
    }
}

impl Serialize for Hyperedge {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hyperedge {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Iterator over every atom occurrence.
pub struct AllAtoms<'a> {
    stack: Vec<&'a Hyperedge>,
}

impl<'a> Iterator for AllAtoms<'a> {
    type Item = &'a Atom;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(h) = self.stack.pop() {
            match h {
                Hyperedge::Atom(atom) => return Some(atom),
                Hyperedge::Edge(e) => self.stack.extend(e.items().iter().rev()),
            }
        }
        None
    }
}

/// Iterator over distinct atoms.
pub struct Atoms<'a> {
    inner: AllAtoms<'a>,
    seen: HashSet<&'a Atom>,
}

impl<'a> Iterator for Atoms<'a> {
    type Item = &'a Atom;

    fn next(&mut self) -> Option<Self::Item> {
        let seen = &mut self.seen;
        self.inner.find(|atom| seen.insert(*atom))
    }
}

/// Iterator over distinct sub-hyperedges.
pub struct Subedges<'a> {
    stack: Vec<&'a Hyperedge>,
    seen: HashSet<&'a Hyperedge>,
}

impl<'a> Iterator for Subedges<'a> {
    type Item = &'a Hyperedge;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(h) = self.stack.pop() {
            if !self.seen.insert(h) {
                continue;
            }
            if let Hyperedge::Edge(e) = h {
                self.stack.extend(e.items().iter().rev());
            }
            return Some(h);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperedge::parse;

    fn h(text: &str) -> Hyperedge {
        parse(text).unwrap()
    }

    #[test]
    fn test_empty_edge_rejected() {
        let err = Hyperedge::edge(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn test_connector_on_atom_is_type_error() {
        let atom = h("wheel/Cc.s/en");
        assert!(matches!(atom.connector(), Err(Error::Type(_))));
        assert!(matches!(atom.args(), Err(Error::Type(_))));
    }

    #[test]
    fn test_connector_and_args() {
        let edge = h("(is/Pd.sc/en wheel/Cc.s/en car/Cc.s/en)");
        assert_eq!(edge.connector().unwrap(), &h("is/Pd.sc/en"));
        assert_eq!(edge.args().unwrap().len(), 2);
        assert!(edge.contains(&h("car/Cc.s/en")));
        assert!(!edge.contains(&h("bus/Cc.s/en")));
    }

    #[test]
    fn test_depth() {
        assert_eq!(h("a/C").depth(), 0);
        assert_eq!(h("(a/P b/C)").depth(), 1);
        assert_eq!(h("(a/P b/C (c/B d/C (e/M f/C)))").depth(), 3);
    }

    #[test]
    fn test_atoms_are_distinct_and_restartable() {
        let edge = h("(and/J a/C (and/J a/C b/C))");
        let first: Vec<String> = edge.atoms().map(|a| a.to_string()).collect();
        assert_eq!(first, vec!["and/J", "a/C", "b/C"]);
        let second: Vec<String> = edge.atoms().map(|a| a.to_string()).collect();
        assert_eq!(first, second);
        assert_eq!(edge.all_atoms().count(), 5);
    }

    #[test]
    fn test_subedges() {
        let edge = h("(is/P a/C (of/B a/C b/C))");
        let subs: Vec<String> = edge.subedges().map(|s| s.to_string()).collect();
        assert_eq!(
            subs,
            vec![
                "(is/P a/C (of/B a/C b/C))",
                "is/P",
                "a/C",
                "(of/B a/C b/C)",
                "of/B",
                "b/C",
            ]
        );
    }

    #[test]
    fn test_inferred_type() {
        assert_eq!(h("(is/Pd.sc a/C b/C)").inferred_type(), Some(TypeClass::Relation));
        assert_eq!(h("(of/Br.ma a/C b/C)").inferred_type(), Some(TypeClass::Concept));
        assert_eq!(h("(the/Md car/Cc)").inferred_type(), Some(TypeClass::Concept));
        assert_eq!(h("(in/Tt (the/Md house/Cc))").inferred_type(), Some(TypeClass::Specifier));
        assert_eq!(h("((not/M is/Pd) a/C b/C)").inferred_type(), Some(TypeClass::Relation));
        assert_eq!(h("(x y)").inferred_type(), None);
    }

    #[test]
    fn test_main_concept() {
        let part = h("(of/Br.ma/en part/Cc.s/en (the/Md/en car/Cc.s/en))");
        assert_eq!(part.main_concept().unwrap().root(), "part");

        let whole = h("(of/Br.am/en part/Cc.s/en (the/Md/en car/Cc.s/en))");
        assert_eq!(whole.main_concept().unwrap().root(), "car");

        let modified = h("(the/Md/en wheel/Cc.s/en)");
        assert_eq!(modified.main_concept().unwrap().root(), "wheel");
    }

    #[test]
    fn test_main_concept_none_for_ill_typed() {
        assert!(h("(is/Pd.sc a/C b/C)").main_concept().is_none());
        assert!(h("(of/Br a/C b/C)").main_concept().is_none());
        assert!(h("is/Pd").main_concept().is_none());
        assert!(h("(x y)").main_concept().is_none());
    }

    #[test]
    fn test_main_concepts() {
        let edge = h("(+/B.mm/. new/Cp.s/en york/Cp.s/en)");
        let mains: Vec<String> = edge.main_concepts().iter().map(|m| m.to_string()).collect();
        assert_eq!(mains, vec!["new/Cp.s/en", "york/Cp.s/en"]);
        assert!(h("(is/P a/C)").main_concepts().is_empty());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let edge = h("(is/Pd.sc/en wheel/Cc.s/en car/Cc.s/en)");
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(json, "\"(is/Pd.sc/en wheel/Cc.s/en car/Cc.s/en)\"");
        let back: Hyperedge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, edge);
    }
}

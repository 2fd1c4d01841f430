//! Key layout of the hypergraph over an ordered byte key space.
//!
//! | prefix | key                                  | value        |
//! |--------|--------------------------------------|--------------|
//! | `v`    | edge text                            | [`EdgeRecord`] |
//! | `p`    | permutation key, `\0`, edge text     | empty        |
//! | `s`    | child text, `\0`, parent text        | empty        |
//! | `r`    | atom root, `\0`, atom text           | empty        |
//! | `a`    | edge text, `\0`, attribute name      | UTF-8 value  |
//!
//! Serialized hyperedges never contain control characters (the notation
//! escapes them in roots), so `\0`, `\x1d` and `\x1e` are safe separators.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hyperedge::{parse, Atom, Hyperedge};

pub(crate) const EDGE_PREFIX: u8 = b'v';
pub(crate) const PERM_PREFIX: u8 = b'p';
pub(crate) const STAR_PREFIX: u8 = b's';
pub(crate) const ROOT_PREFIX: u8 = b'r';
pub(crate) const ATTR_PREFIX: u8 = b'a';

const SEP: u8 = 0x00;
const POS_SEP: u8 = 0x1e;
const VALUE_SEP: u8 = 0x1d;

/// How an edge came to be referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    /// Asserted as a primary edge.
    Primary,
    /// Added directly but not as an assertion.
    Explicit,
    /// Element of another stored edge.
    Parent,
}

/// Reference counts kept per stored edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EdgeRecord {
    pub primary: u64,
    pub explicit: u64,
    pub parents: u64,
}

impl EdgeRecord {
    pub fn bump(&mut self, kind: RefKind, n: u64) {
        let counter = match kind {
            RefKind::Primary => &mut self.primary,
            RefKind::Explicit => &mut self.explicit,
            RefKind::Parent => &mut self.parents,
        };
        *counter = counter.saturating_add(n);
    }

    /// No reference of any kind is left.
    pub fn is_unreferenced(&self) -> bool {
        self.primary == 0 && self.explicit == 0 && self.parents == 0
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn tagged(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len() + 1).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.push(prefix);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEP);
        }
        key.extend_from_slice(part);
    }
    key
}

pub(crate) fn edge_key(h: &Hyperedge) -> Vec<u8> {
    tagged(EDGE_PREFIX, &[h.to_string().as_bytes()])
}

/// Prefix of every `key` for stored edges.
pub(crate) fn edge_prefix() -> Vec<u8> {
    vec![EDGE_PREFIX]
}

/// Prefix of a permutation index partition: arity plus fixed positions.
///
/// `fixed` must be sorted by position.
pub(crate) fn perm_prefix(arity: usize, fixed: &[(usize, &Hyperedge)]) -> Vec<u8> {
    let mut key = vec![PERM_PREFIX];
    key.extend_from_slice(arity.to_string().as_bytes());
    for (pos, value) in fixed {
        key.push(POS_SEP);
        key.extend_from_slice(pos.to_string().as_bytes());
        key.push(VALUE_SEP);
        key.extend_from_slice(value.to_string().as_bytes());
    }
    key.push(SEP);
    key
}

/// Permutation index entries for an edge: the arity partition, every single
/// fixed position and the connector paired with each argument.
pub(crate) fn perm_keys(h: &Hyperedge) -> Vec<Vec<u8>> {
    let Some(edge) = h.as_edge() else {
        return Vec::new();
    };
    let items = edge.items();
    let n = items.len();
    let text = h.to_string();

    let mut prefixes = Vec::with_capacity(2 * n);
    prefixes.push(perm_prefix(n, &[]));
    for (i, item) in items.iter().enumerate() {
        prefixes.push(perm_prefix(n, &[(i, item)]));
    }
    for (i, item) in items.iter().enumerate().skip(1) {
        prefixes.push(perm_prefix(n, &[(0, &items[0]), (i, item)]));
    }

    prefixes
        .into_iter()
        .map(|mut key| {
            key.extend_from_slice(text.as_bytes());
            key
        })
        .collect()
}

pub(crate) fn star_prefix(child: &Hyperedge) -> Vec<u8> {
    let mut key = tagged(STAR_PREFIX, &[child.to_string().as_bytes()]);
    key.push(SEP);
    key
}

pub(crate) fn star_key(child: &Hyperedge, parent: &Hyperedge) -> Vec<u8> {
    let mut key = star_prefix(child);
    key.extend_from_slice(parent.to_string().as_bytes());
    key
}

pub(crate) fn root_prefix(root: &str) -> Vec<u8> {
    let mut key = tagged(
        ROOT_PREFIX,
        &[crate::hyperedge::escape_root(root).as_bytes()],
    );
    key.push(SEP);
    key
}

pub(crate) fn root_key(atom: &Atom) -> Vec<u8> {
    let mut key = root_prefix(atom.root());
    key.extend_from_slice(atom.to_string().as_bytes());
    key
}

pub(crate) fn attr_prefix(h: &Hyperedge) -> Vec<u8> {
    let mut key = tagged(ATTR_PREFIX, &[h.to_string().as_bytes()]);
    key.push(SEP);
    key
}

pub(crate) fn attr_key(h: &Hyperedge, name: &str) -> Vec<u8> {
    let mut key = attr_prefix(h);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Parse the hyperedge stored after `prefix_len` bytes of `key`.
pub(crate) fn decode_edge(key: &[u8], prefix_len: usize) -> Result<Hyperedge> {
    let text = key
        .get(prefix_len..)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .ok_or_else(|| Error::store_io("corrupted key: not UTF-8"))?;
    parse(text).map_err(|e| Error::store_io(format!("corrupted key '{}': {}", text, e)))
}

/// Whether a `v` key holds an edge rather than an atom.
pub(crate) fn is_edge_key(key: &[u8]) -> bool {
    key.get(1) == Some(&b'(')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(text: &str) -> Hyperedge {
        parse(text).unwrap()
    }

    #[test]
    fn test_perm_keys_are_linear_in_arity() {
        let edge = h("(is/P a/C (of/B b/C c/C))");
        let keys = perm_keys(&edge);
        assert_eq!(keys.len(), 6);
        assert!(perm_keys(&h("a/C")).is_empty());

        let prefix = perm_prefix(3, &[(0, &h("is/P")), (2, &h("(of/B b/C c/C)"))]);
        assert!(keys.iter().any(|k| k.starts_with(&prefix)));
        assert_eq!(decode_edge(&keys[0], perm_prefix(3, &[]).len()).unwrap(), edge);
    }

    #[test]
    fn test_prefixes_do_not_collide() {
        // Arity 1 must not be a prefix of arity 12
        let one = perm_prefix(1, &[]);
        let twelve = perm_prefix(12, &[]);
        assert!(!twelve.starts_with(&one));

        let a = star_prefix(&h("a/C"));
        let a_en = star_key(&h("a/C/en"), &h("(x/P a/C/en)"));
        assert!(!a_en.starts_with(&a));
    }

    #[test]
    fn test_record_codec() {
        let mut record = EdgeRecord::default();
        assert!(record.is_unreferenced());
        record.bump(RefKind::Primary, 2);
        record.bump(RefKind::Parent, 1);
        let decoded = EdgeRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(!decoded.is_unreferenced());
    }

    #[test]
    fn test_edge_key_kind() {
        assert!(is_edge_key(&edge_key(&h("(x/P a/C)"))));
        assert!(!is_edge_key(&edge_key(&h("a/C"))));
        assert!(!is_edge_key(&edge_key(&h("%28a/C"))));
    }
}

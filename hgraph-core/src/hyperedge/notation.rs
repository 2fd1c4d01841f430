//! Textual notation: parsing and serialization.
//!
//! ```text
//! hyperedge := atom | '(' hyperedge (ws hyperedge)* ')'
//! atom      := root ['/' type ['/' lang]]
//! type      := TypeCode ['.' roles]
//! ```
//!
//! Parentheses and whitespace are structural; everything else is opaque atom
//! text. Roots escape `%`, `/`, parentheses, whitespace and control characters
//! as `%XX` byte sequences. Both directions use an explicit stack, so nesting
//! depth is bounded only by [`ParseOptions::max_depth`].

use serde::{Deserialize, Serialize};

use super::atom::{Atom, TypeClass};
use super::edge::{Edge, Hyperedge};
use crate::error::{Error, Result};

/// Default maximum edge nesting accepted by the parser.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Parser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Maximum edge nesting depth.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Parse a hyperedge with default options.
pub fn parse(text: &str) -> Result<Hyperedge> {
    parse_with(text, &ParseOptions::default())
}

/// Parse a hyperedge.
pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Hyperedge> {
    // (open paren offset, elements collected so far)
    let mut stack: Vec<(usize, Vec<Hyperedge>)> = Vec::new();
    let mut result: Option<Hyperedge> = None;

    for token in Tokenizer::new(text) {
        if result.is_some() {
            return Err(Error::syntax("unexpected input after hyperedge", token.position()));
        }
        let complete = match token {
            Token::Open(pos) => {
                if stack.len() >= options.max_depth {
                    return Err(Error::max_depth_exceeded(options.max_depth));
                }
                stack.push((pos, Vec::new()));
                continue;
            }
            Token::Close(pos) => {
                let (open, items) = stack
                    .pop()
                    .ok_or_else(|| Error::syntax("unbalanced ')'", pos))?;
                if items.is_empty() {
                    return Err(Error::syntax("empty edge", open));
                }
                Hyperedge::Edge(Edge::from_items_unchecked(items))
            }
            Token::Atom(word, pos) => Hyperedge::Atom(parse_atom(word, pos)?),
        };
        match stack.last_mut() {
            Some((_, items)) => items.push(complete),
            None => result = Some(complete),
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(Error::syntax("unbalanced '('", *open));
    }
    result.ok_or_else(|| Error::syntax("empty input", 0))
}

/// Serialize a hyperedge to its canonical textual form.
pub fn serialize(edge: &Hyperedge) -> String {
    enum Step<'a> {
        Visit(&'a Hyperedge),
        Close,
    }

    let mut out = String::new();
    let mut stack = vec![Step::Visit(edge)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Visit(h) => {
                if !out.is_empty() && !out.ends_with('(') {
                    out.push(' ');
                }
                match h {
                    Hyperedge::Atom(atom) => out.push_str(&atom.to_string()),
                    Hyperedge::Edge(e) => {
                        out.push('(');
                        stack.push(Step::Close);
                        stack.extend(e.items().iter().rev().map(Step::Visit));
                    }
                }
            }
            Step::Close => out.push(')'),
        }
    }
    out
}

/// Parse a single atom token starting at byte offset `pos`.
fn parse_atom(word: &str, pos: usize) -> Result<Atom> {
    let fields: Vec<&str> = word.split('/').collect();
    if fields.len() > 3 {
        return Err(Error::syntax(
            format!(
                "invalid atom field count in '{}': expected at most 3, found {}",
                word,
                fields.len()
            ),
            pos,
        ));
    }

    let root = unescape_root(fields[0], pos)?;
    if root.is_empty() {
        return Err(Error::syntax(format!("empty root in atom '{}'", word), pos));
    }

    let (type_code, roles) = match fields.get(1) {
        Some(segment) => segment.split_once('.').unwrap_or((*segment, "")),
        None => ("", ""),
    };
    if let Some(letter) = type_code.chars().next() {
        if TypeClass::from_code(letter).is_none() {
            return Err(Error::syntax(
                format!("unknown type class '{}' in atom '{}'", letter, word),
                pos + fields[0].len() + 1,
            ));
        }
    }

    let lang = match fields.get(2) {
        Some(lang) if lang.is_empty() => {
            return Err(Error::syntax(format!("empty language tag in atom '{}'", word), pos));
        }
        Some(lang) => Some(lang.to_string()),
        None => None,
    };
    // Fields split on '/' from a token free of whitespace and parentheses
    Ok(Atom::from_parts_unchecked(
        root,
        type_code.to_string(),
        roles.to_string(),
        lang,
    ))
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | '/' | '(' | ')') || c.is_whitespace() || c.is_control()
}

/// Escape structural characters in an atom root.
pub(crate) fn escape_root(root: &str) -> String {
    if !root.chars().any(needs_escape) {
        return root.to_string();
    }
    let mut out = String::with_capacity(root.len() + 8);
    let mut buf = [0u8; 4];
    for c in root.chars() {
        if needs_escape(c) {
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape_root(text: &str, pos: usize) -> Result<String> {
    if !text.contains('%') {
        return Ok(text.to_string());
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| Error::syntax("invalid escape sequence", pos + i))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::syntax("escaped root is not valid UTF-8", pos))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open(usize),
    Close(usize),
    Atom(&'a str, usize),
}

impl Token<'_> {
    fn position(&self) -> usize {
        match self {
            Token::Open(pos) | Token::Close(pos) | Token::Atom(_, pos) => *pos,
        }
    }
}

struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.pos..];
        let skipped = rest.len() - rest.trim_start().len();
        self.pos += skipped;

        let start = self.pos;
        let c = self.text[start..].chars().next()?;
        match c {
            '(' => {
                self.pos += 1;
                Some(Token::Open(start))
            }
            ')' => {
                self.pos += 1;
                Some(Token::Close(start))
            }
            _ => {
                let len = self.text[start..]
                    .find(|c: char| c == '(' || c == ')' || c.is_whitespace())
                    .unwrap_or(self.text.len() - start);
                self.pos += len;
                Some(Token::Atom(&self.text[start..start + len], start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_atom() {
        let h = parse("is/Pd.sc/en").unwrap();
        let atom = h.as_atom().unwrap();
        assert_eq!(atom.root(), "is");
        assert_eq!(atom.type_code(), "Pd");
        assert_eq!(atom.roles(), "sc");
        assert_eq!(atom.lang(), Some("en"));
    }

    #[test]
    fn test_parse_nested_edge() {
        let text = "(is/Pd.sc/en (the/Md/en wheel/Cc.s/en) (of/Br.ma/en part/Cc.s/en (the/Md/en car/Cc.s/en)))";
        let h = parse(text).unwrap();
        assert_eq!(h.depth(), 3);
        assert_eq!(serialize(&h), text);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let h = parse("  ( is/P\n\ta/C   b/C )  ").unwrap();
        assert_eq!(h.to_string(), "(is/P a/C b/C)");
    }

    #[test]
    fn test_unbalanced_open() {
        let err = parse("(is/P (a/B b/C)").unwrap_err();
        assert!(matches!(err, Error::Syntax { position: 0, .. }));
    }

    #[test]
    fn test_unbalanced_close() {
        let err = parse("(is/P a/C))").unwrap_err();
        assert!(matches!(err, Error::Syntax { position: 10, .. }));
    }

    #[test]
    fn test_too_many_atom_fields() {
        let err = parse("(is/P a/C/en/x)").unwrap_err();
        assert!(matches!(err, Error::Syntax { position: 6, .. }));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse("").unwrap_err().is_syntax());
        assert!(parse("()").unwrap_err().is_syntax());
        assert!(parse("/C").unwrap_err().is_syntax());
        assert!(parse("a/C/").unwrap_err().is_syntax());
    }

    #[test]
    fn test_trailing_input() {
        let err = parse("a/C b/C").unwrap_err();
        assert!(matches!(err, Error::Syntax { position: 4, .. }));
    }

    #[test]
    fn test_unknown_type_class() {
        assert!(parse("a/Xc").unwrap_err().is_syntax());
    }

    #[test]
    fn test_escaped_root_round_trip() {
        let atom = Atom::new("rock (music)/genre 100%", "Cc")
            .unwrap()
            .with_lang("en")
            .unwrap();
        let text = Hyperedge::Atom(atom.clone()).to_string();
        assert_eq!(text, "rock%20%28music%29%2Fgenre%20100%25/Cc/en");
        assert_eq!(parse(&text).unwrap(), Hyperedge::Atom(atom));
    }

    #[test]
    fn test_invalid_escape() {
        assert!(parse("a%zz/C").unwrap_err().is_syntax());
        assert!(parse("a%2/C").unwrap_err().is_syntax());
    }

    #[test]
    fn test_max_depth() {
        let deep = format!("{}a/C{}", "(x/J ".repeat(10), ")".repeat(10));
        assert!(parse_with(&deep, &ParseOptions::new().max_depth(10)).is_ok());
        let err = parse_with(&deep, &ParseOptions::new().max_depth(9)).unwrap_err();
        assert!(matches!(err, Error::MaxDepthExceeded { max_depth: 9 }));
    }

    #[test]
    fn test_deep_nesting_without_recursion() {
        let depth = 2000;
        let deep = format!("{}a/C{}", "(x/J ".repeat(depth), ")".repeat(depth));
        let h = parse_with(&deep, &ParseOptions::new().max_depth(depth)).unwrap();
        assert_eq!(h.depth(), depth);
        assert_eq!(serialize(&h), deep);
    }
}

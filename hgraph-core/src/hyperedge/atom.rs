//! Atoms: the leaves of the hyperedge model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Grammatical class encoded by the first letter of an atom's type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeClass {
    /// `C`
    Concept,
    /// `P`
    Predicate,
    /// `M`
    Modifier,
    /// `B`
    Builder,
    /// `T`
    Trigger,
    /// `J`
    Conjunction,
    /// `R`
    Relation,
    /// `S`
    Specifier,
}

impl TypeClass {
    /// Look up a class by its type letter.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'C' => Some(Self::Concept),
            'P' => Some(Self::Predicate),
            'M' => Some(Self::Modifier),
            'B' => Some(Self::Builder),
            'T' => Some(Self::Trigger),
            'J' => Some(Self::Conjunction),
            'R' => Some(Self::Relation),
            'S' => Some(Self::Specifier),
            _ => None,
        }
    }

    /// The type letter for this class.
    pub fn code(&self) -> char {
        match self {
            Self::Concept => 'C',
            Self::Predicate => 'P',
            Self::Modifier => 'M',
            Self::Builder => 'B',
            Self::Trigger => 'T',
            Self::Conjunction => 'J',
            Self::Relation => 'R',
            Self::Specifier => 'S',
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Root used by wildcard atoms in patterns.
pub const WILDCARD_ROOT: &str = "*";

/// An immutable leaf hyperedge.
///
/// The textual form is `root/TypeCode[.roles][/lang]`, e.g. `is/Pd.sc/en`:
/// root `is`, type code `Pd` (class Predicate, subtype `d`), role flags
/// `s`,`c` and language tag `en`. Role flags are kept verbatim, so extra
/// morphology segments (`Pd.sc.|f--3s-`) survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    root: String,
    type_code: String,
    roles: String,
    lang: Option<String>,
}

impl Atom {
    /// Create a typed atom.
    ///
    /// Fails if the root is empty or the type code does not start with a
    /// known class letter or contains `.`, `/`, whitespace or parentheses.
    pub fn new(root: impl Into<String>, type_code: impl Into<String>) -> Result<Self> {
        let type_code = type_code.into();
        if type_code.is_empty() {
            return Err(Error::syntax("empty type code", 0));
        }
        Self::untyped(root)?.with_type_code(type_code)
    }

    /// Create an atom without type information (`var`, `any`, `*`).
    pub fn untyped(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if root.is_empty() {
            return Err(Error::syntax("empty atom root", 0));
        }
        Ok(Self::from_parts_unchecked(root, String::new(), String::new(), None))
    }

    /// Untyped wildcard `*`.
    pub fn wildcard() -> Self {
        Self::from_parts_unchecked(WILDCARD_ROOT.to_string(), String::new(), String::new(), None)
    }

    /// Assemble an atom from fields already known to be well formed.
    pub(crate) fn from_parts_unchecked(
        root: String,
        type_code: String,
        roles: String,
        lang: Option<String>,
    ) -> Self {
        Self {
            root,
            type_code,
            roles,
            lang,
        }
    }

    fn with_type_code(mut self, type_code: String) -> Result<Self> {
        if let Some(letter) = type_code.chars().next() {
            if TypeClass::from_code(letter).is_none() {
                return Err(Error::syntax(
                    format!("unknown type class '{}' in type code '{}'", letter, type_code),
                    0,
                ));
            }
        }
        check_field("type code", &type_code, |c| c == '.')?;
        self.type_code = type_code;
        Ok(self)
    }

    /// Set the role flags. Morphology after a further `.` is kept verbatim.
    pub fn with_roles(mut self, roles: impl Into<String>) -> Result<Self> {
        let roles = roles.into();
        check_field("roles", &roles, |_| false)?;
        self.roles = roles;
        Ok(self)
    }

    /// Set the language tag. An empty tag clears it.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Result<Self> {
        let lang = lang.into();
        check_field("language tag", &lang, |_| false)?;
        self.lang = if lang.is_empty() { None } else { Some(lang) };
        Ok(self)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn type_code(&self) -> &str {
        &self.type_code
    }

    /// Role flags as written, including any `.`-separated morphology.
    pub fn roles(&self) -> &str {
        &self.roles
    }

    /// Argument roles as an ordered list of single-character markers.
    pub fn role_flags(&self) -> Vec<char> {
        self.argroles().chars().collect()
    }

    /// Argument roles: the role flags up to the first `.`.
    pub fn argroles(&self) -> &str {
        self.roles.split('.').next().unwrap_or("")
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Grammatical class from the first letter of the type code.
    pub fn main_type(&self) -> Option<TypeClass> {
        self.type_code.chars().next().and_then(TypeClass::from_code)
    }

    /// Type code without its class letter.
    pub fn subtype(&self) -> &str {
        let mut chars = self.type_code.chars();
        chars.next();
        chars.as_str()
    }

    /// Whether the root is the wildcard marker.
    pub fn is_wildcard(&self) -> bool {
        self.root == WILDCARD_ROOT
    }

    /// Whether the atom carries no type, roles or language.
    pub fn is_bare(&self) -> bool {
        self.type_code.is_empty() && self.roles.is_empty() && self.lang.is_none()
    }

    /// Same type, roles and language with a different root.
    pub fn with_root(&self, root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if root.is_empty() {
            return Err(Error::syntax("empty atom root", 0));
        }
        Ok(Self {
            root,
            ..self.clone()
        })
    }
}

/// Reject characters that would change how a field reads back from text.
fn check_field(field: &str, value: &str, also: impl Fn(char) -> bool) -> Result<()> {
    match value
        .char_indices()
        .find(|&(_, c)| matches!(c, '/' | '(' | ')') || c.is_whitespace() || also(c))
    {
        Some((position, c)) => Err(Error::syntax(
            format!("invalid character {:?} in {} '{}'", c, field, value),
            position,
        )),
        None => Ok(()),
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::notation::escape_root(&self.root))?;
        if self.is_bare() {
            return Ok(());
        }
        write!(f, "/{}", self.type_code)?;
        if !self.roles.is_empty() {
            write!(f, ".{}", self.roles)?;
        }
        if let Some(ref lang) = self.lang {
            write!(f, "/{}", lang)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperedge::parse;

    fn atom(root: &str, type_code: &str) -> Atom {
        Atom::new(root, type_code).unwrap()
    }

    #[test]
    fn test_atom_fields() {
        let atom = atom("is", "Pd")
            .with_roles("sc.|f--3s-")
            .unwrap()
            .with_lang("en")
            .unwrap();
        assert_eq!(atom.root(), "is");
        assert_eq!(atom.main_type(), Some(TypeClass::Predicate));
        assert_eq!(atom.subtype(), "d");
        assert_eq!(atom.argroles(), "sc");
        assert_eq!(atom.role_flags(), vec!['s', 'c']);
        assert_eq!(atom.lang(), Some("en"));
    }

    #[test]
    fn test_atom_display() {
        let wheel = atom("wheel", "Cc").with_roles("s").unwrap().with_lang("en").unwrap();
        assert_eq!(wheel.to_string(), "wheel/Cc.s/en");
        assert_eq!(Atom::untyped("var").unwrap().to_string(), "var");
        assert_eq!(Atom::untyped("x").unwrap().with_lang("en").unwrap().to_string(), "x//en");
        assert_eq!(Atom::untyped("x").unwrap().with_roles("sc").unwrap().to_string(), "x/.sc");
        assert_eq!(atom("a/b", "C").to_string(), "a%2Fb/C");
    }

    #[test]
    fn test_equality_uses_all_fields() {
        let a = atom("car", "Cc").with_lang("en").unwrap();
        assert_eq!(a, atom("car", "Cc").with_lang("en").unwrap());
        assert_ne!(a, atom("car", "Cc").with_lang("pt").unwrap());
        assert_ne!(a, atom("car", "Cc").with_roles("s").unwrap().with_lang("en").unwrap());
    }

    #[test]
    fn test_rejects_fields_that_do_not_read_back() {
        assert!(Atom::new("", "C").unwrap_err().is_syntax());
        assert!(Atom::untyped("").is_err());
        assert!(Atom::new("a", "").is_err());
        assert!(Atom::new("a", "C.s").is_err());
        assert!(Atom::new("a", "C/x").is_err());
        assert!(Atom::new("a", "Xc").is_err());
        assert!(Atom::new("a", "C c").is_err());
        assert!(atom("a", "C").with_roles("s/x").is_err());
        assert!(atom("a", "C").with_roles("s c").is_err());
        assert!(atom("a", "C").with_roles("(s)").is_err());
        assert!(atom("a", "C").with_lang("e n").is_err());
        assert!(atom("a", "C").with_lang("en/x").is_err());
        assert!(atom("a", "C").with_lang("e)").is_err());
        assert!(atom("a", "C").with_root("").is_err());
    }

    #[test]
    fn test_built_atoms_read_back_equal() {
        let built = [
            atom("a", "C").with_roles("s").unwrap(),
            atom("a", "C").with_roles(".x").unwrap(),
            atom("is", "Pd").with_roles("sc.|f--3s-").unwrap().with_lang("en").unwrap(),
            Atom::untyped("x").unwrap().with_lang("en").unwrap(),
            Atom::untyped("x").unwrap().with_roles("sc").unwrap(),
            atom("rock (music) 100%", "Cc"),
            Atom::wildcard(),
        ];
        for atom in built {
            let text = atom.to_string();
            assert_eq!(parse(&text).unwrap().as_atom(), Some(&atom), "{}", text);
        }
    }

    #[test]
    fn test_type_class_codes() {
        for code in ['C', 'P', 'M', 'B', 'T', 'J', 'R', 'S'] {
            let class = TypeClass::from_code(code).unwrap();
            assert_eq!(class.code(), code);
        }
        assert_eq!(TypeClass::from_code('X'), None);
    }
}

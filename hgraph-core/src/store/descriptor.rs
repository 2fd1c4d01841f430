//! Connection descriptors and store configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `scheme://location`
static DESCRIPTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://(.*)$").expect("Invalid regex")
});

/// Location that opens a private in-memory SQLite database.
const SQLITE_MEMORY: &str = ":memory:";

/// Storage backend selected by a descriptor scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `sqlite://`, also used for bare paths.
    Sqlite,
    /// `rocksdb://`, available with the `rocksdb` feature.
    RocksDb,
    /// `memory://`, a private ordered map that lives as long as the store.
    Memory,
}

impl BackendKind {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::RocksDb => "rocksdb",
            Self::Memory => "memory",
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "rocksdb" => Some(Self::RocksDb),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A parsed connection descriptor.
///
/// ```rust
/// use hgraph_core::store::{BackendKind, Descriptor};
///
/// let d = Descriptor::parse("rocksdb:///var/lib/kb").unwrap();
/// assert_eq!(d.kind(), BackendKind::RocksDb);
/// assert_eq!(d.location(), "/var/lib/kb");
///
/// // Bare paths use SQLite
/// assert_eq!(Descriptor::parse("kb.db").unwrap().kind(), BackendKind::Sqlite);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    kind: BackendKind,
    location: String,
}

impl Descriptor {
    /// Parse `scheme://location` or a bare path.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (kind, location) = match DESCRIPTOR_RE.captures(text) {
            Some(caps) => {
                let scheme = &caps[1];
                let kind = BackendKind::from_scheme(scheme).ok_or_else(|| {
                    Error::store_open(text, format!("unknown backend scheme '{}'", scheme))
                })?;
                (kind, caps[2].to_string())
            }
            None => (BackendKind::Sqlite, text.to_string()),
        };
        if location.is_empty() && kind != BackendKind::Memory {
            return Err(Error::Config(format!("descriptor '{}' has no location", text)));
        }
        Ok(Self { kind, location })
    }

    /// Descriptor for a private in-memory store.
    pub fn memory() -> Self {
        Self {
            kind: BackendKind::Memory,
            location: String::new(),
        }
    }

    /// Descriptor for a SQLite database at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: BackendKind::Sqlite,
            location: path.into().to_string_lossy().into_owned(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Whether the backend keeps nothing on disk.
    pub fn is_ephemeral(&self) -> bool {
        match self.kind {
            BackendKind::Memory => true,
            BackendKind::Sqlite => self.location == SQLITE_MEMORY,
            BackendKind::RocksDb => false,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.location)
    }
}

impl FromStr for Descriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Create the database when it does not exist yet.
    pub create_if_missing: bool,
    /// Reject every mutation.
    pub read_only: bool,
    /// Number of keys fetched per backend round trip by lazy iterators.
    pub scan_page_size: usize,
    /// SQLite `journal_mode` pragma.
    pub sqlite_journal_mode: String,
    /// SQLite busy timeout in milliseconds.
    pub sqlite_busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            scan_page_size: 256,
            sqlite_journal_mode: "WAL".to_string(),
            sqlite_busy_timeout_ms: 5000,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn scan_page_size(mut self, size: usize) -> Self {
        self.scan_page_size = size;
        self
    }

    pub fn sqlite_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.sqlite_journal_mode = mode.into();
        self
    }

    pub fn sqlite_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.sqlite_busy_timeout_ms = ms;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.scan_page_size == 0 {
            return Err(Error::Config("scan_page_size must be positive".to_string()));
        }
        Ok(())
    }
}

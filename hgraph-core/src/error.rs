//! Error types for hgraph-core.

use thiserror::Error;

/// Result type alias using hgraph-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during hypergraph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed hyperedge notation
    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// Operation invoked on the wrong hyperedge variant
    #[error("Type error: {0}")]
    Type(String),

    /// Malformed pattern
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// Backend could not be created or accessed
    #[error("Failed to open store '{descriptor}': {cause}")]
    StoreOpen { descriptor: String, cause: String },

    /// Backend I/O failure
    #[error("Store I/O error: {0}")]
    StoreIo(String),

    /// Operation on a closed store
    #[error("Store is closed")]
    StoreClosed,

    /// Nesting depth exceeded while parsing
    #[error("Maximum nesting depth {max_depth} exceeded")]
    MaxDepthExceeded { max_depth: usize },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a syntax error at a byte offset.
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Create a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    /// Create a pattern error.
    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern(message.into())
    }

    /// Create a store open error.
    pub fn store_open(descriptor: impl Into<String>, cause: impl ToString) -> Self {
        Self::StoreOpen {
            descriptor: descriptor.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a store I/O error.
    pub fn store_io(cause: impl ToString) -> Self {
        Self::StoreIo(cause.to_string())
    }

    /// Create a max depth exceeded error.
    pub fn max_depth_exceeded(max_depth: usize) -> Self {
        Self::MaxDepthExceeded { max_depth }
    }

    /// Whether this is a notation syntax error.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    /// Whether this error came from the storage layer.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Self::StoreOpen { .. } | Self::StoreIo(_) | Self::StoreClosed
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreIo(err.to_string())
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Self::StoreIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = Error::syntax("unbalanced parenthesis", 7);
        assert_eq!(
            err.to_string(),
            "Syntax error at position 7: unbalanced parenthesis"
        );
        assert!(err.is_syntax());
        assert!(!err.is_store());
    }

    #[test]
    fn test_store_errors_are_store() {
        assert!(Error::StoreClosed.is_store());
        assert!(Error::store_io("disk full").is_store());
        assert!(Error::store_open("sqlite://x", "denied").is_store());
    }
}

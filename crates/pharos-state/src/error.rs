//! Error types for the inventory store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("{collection} {id} not found")]
    NotFound { collection: &'static str, id: String },

    #[error("{collection} already holds {field}={value}")]
    DuplicateKey {
        collection: &'static str,
        field: String,
        value: String,
    },

    #[error("malformed identifier: {0}")]
    InvalidId(String),

    /// The database could not be opened or a transaction could not start.
    #[error("store unavailable: {0}")]
    Connection(String),

    /// The database rejected a table access, write, or commit.
    #[error("store rejected operation: {0}")]
    Operation(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl StateError {
    pub fn not_found(collection: &'static str, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    /// Whether this error means the target document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

//! Inventory error types.

use thiserror::Error;

use pharos_liveness::LivenessError;
use pharos_state::StateError;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// An entity or relation the caller referred to does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    InvalidYaml(String),

    #[error("{0}")]
    InvalidParam(String),

    #[error("ping from {observed} but node is registered at {registered}; re-register")]
    AddressMismatch { registered: String, observed: String },

    #[error("unsupported filter `{0}`")]
    UnsupportedFilter(String),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl From<LivenessError> for InventoryError {
    fn from(err: LivenessError) -> Self {
        match err {
            LivenessError::AddressMismatch {
                registered,
                observed,
            } => Self::AddressMismatch {
                registered,
                observed,
            },
            LivenessError::InvalidPayload(msg) => Self::InvalidPayload(msg),
            LivenessError::State(e) => Self::State(e),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

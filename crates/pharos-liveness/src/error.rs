//! Liveness tracker error types.

use thiserror::Error;

/// Errors returned to a pinging node.
#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("ping from {observed} but node is registered at {registered}; re-register")]
    AddressMismatch { registered: String, observed: String },

    #[error("{0}")]
    InvalidPayload(String),

    #[error("state store error: {0}")]
    State(#[from] pharos_state::StateError),
}

pub type LivenessResult<T> = Result<T, LivenessError>;

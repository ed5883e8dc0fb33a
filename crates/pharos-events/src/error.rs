use thiserror::Error;

use pharos_inventory::InventoryError;
use pharos_state::StateError;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    InvalidParam(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unsupported subscription option `{0}`")]
    UnsupportedOption(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type EventResult<T> = Result<T, EventError>;

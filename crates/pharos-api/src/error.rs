//! Error taxonomy and its HTTP encoding.
//!
//! Every failure leaves the API as `{"message": "<phrase>: <detail>"}` with
//! the status fixed by its [`ErrorKind`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use pharos_events::EventError;
use pharos_inventory::InventoryError;
use pharos_state::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParam,
    InvalidJson,
    InvalidYaml,
    InvalidPayload,
    InvalidMethod,
    InvalidObjectId,
    NotFoundUrl,
    NotFound,
    AddressMismatch,
    DuplicateKey,
    ConnectionError,
    OperationError,
    IoError,
    InternalServerError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidParam
            | ErrorKind::InvalidJson
            | ErrorKind::InvalidYaml
            | ErrorKind::InvalidPayload
            | ErrorKind::InvalidMethod
            | ErrorKind::InvalidObjectId => StatusCode::BAD_REQUEST,
            ErrorKind::NotFoundUrl | ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AddressMismatch | ErrorKind::DuplicateKey => StatusCode::CONFLICT,
            ErrorKind::ConnectionError | ErrorKind::OperationError => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::IoError | ErrorKind::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            ErrorKind::InvalidParam => "invalid param",
            ErrorKind::InvalidJson => "invalid json",
            ErrorKind::InvalidYaml => "invalid yaml",
            ErrorKind::InvalidPayload => "invalid payload",
            ErrorKind::InvalidMethod => "invalid method",
            ErrorKind::InvalidObjectId => "invalid object id",
            ErrorKind::NotFoundUrl => "unsupported url",
            ErrorKind::NotFound => "not found",
            ErrorKind::AddressMismatch => "address mismatch",
            ErrorKind::DuplicateKey => "duplicate key",
            ErrorKind::ConnectionError => "connection error",
            ErrorKind::OperationError => "operation error",
            ErrorKind::IoError => "io error",
            ErrorKind::InternalServerError => "internal server error",
        }
    }
}

/// A classified API failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}: {detail}", kind.phrase())]
pub struct ApiError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

// ── Conversions ──────────────────────────────────────────────────

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        let kind = match &err {
            StateError::NotFound { .. } => ErrorKind::NotFound,
            StateError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            StateError::InvalidId(_) => ErrorKind::InvalidObjectId,
            StateError::Connection(_) => ErrorKind::ConnectionError,
            StateError::Operation(_) => ErrorKind::OperationError,
            StateError::Serialize(_) | StateError::Deserialize(_) => {
                ErrorKind::InternalServerError
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        let kind = match err {
            InventoryError::State(inner) => return inner.into(),
            InventoryError::NotFound(_) => ErrorKind::NotFound,
            InventoryError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            InventoryError::InvalidYaml(_) => ErrorKind::InvalidYaml,
            InventoryError::InvalidParam(_) => ErrorKind::InvalidParam,
            InventoryError::AddressMismatch { .. } => ErrorKind::AddressMismatch,
            InventoryError::UnsupportedFilter(_) => ErrorKind::NotFoundUrl,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        let kind = match err {
            EventError::Inventory(inner) => return inner.into(),
            EventError::State(inner) => return inner.into(),
            EventError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            EventError::InvalidParam(_) => ErrorKind::InvalidParam,
            EventError::NotFound(_) => ErrorKind::NotFound,
            EventError::UnsupportedOption(_) => ErrorKind::NotFoundUrl,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_phrase_and_detail() {
        let err = ApiError::new(ErrorKind::NotFoundUrl, "");
        assert_eq!(err.to_string(), "unsupported url: ");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let cases = [
            (StateError::not_found("NODE", "x"), ErrorKind::NotFound),
            (StateError::InvalidId("x".into()), ErrorKind::InvalidObjectId),
            (StateError::Connection("down".into()), ErrorKind::ConnectionError),
            (StateError::Operation("rejected".into()), ErrorKind::OperationError),
            (StateError::Deserialize("bad".into()), ErrorKind::InternalServerError),
        ];
        for (err, kind) in cases {
            assert_eq!(ApiError::from(err).kind, kind);
        }
    }

    #[test]
    fn inventory_errors_keep_store_kind() {
        let err: ApiError =
            InventoryError::State(StateError::Operation("rejected".into())).into();
        assert_eq!(err.kind, ErrorKind::OperationError);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = InventoryError::UnsupportedFilter("color".into()).into();
        assert_eq!(err.kind, ErrorKind::NotFoundUrl);
    }

    #[test]
    fn event_errors_map_to_kinds() {
        let err: ApiError = EventError::Inventory(InventoryError::InvalidYaml("x".into())).into();
        assert_eq!(err.kind, ErrorKind::InvalidYaml);
        let err: ApiError = EventError::UnsupportedOption("x".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}

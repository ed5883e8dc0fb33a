//! Registry handlers, including push-event propagation.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::ApiState;
use crate::codec::{self, json_body, object_id};
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct AddRegistryRequest {
    pub ip: String,
}

/// GET /management/registries
pub async fn list_registries(State(state): State<ApiState>) -> ApiResult<Response> {
    codec::listing("registries", &state.inventory.list_registries()?)
}

/// POST /management/registries
pub async fn add_registry(State(state): State<ApiState>, body: Bytes) -> ApiResult<Response> {
    let request: AddRegistryRequest = json_body(&body)?;
    let registry = state.inventory.add_registry(&request.ip)?;
    Ok(codec::ok(json!({ "id": registry.id })))
}

/// GET /management/registries/{id}
pub async fn get_registry(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let registry = state.inventory.get_registry(object_id(&id)?)?;
    Ok(codec::ok(codec::view(&registry)?))
}

/// DELETE /management/registries/{id}
pub async fn delete_registry(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    state.inventory.delete_registry(object_id(&id)?)?;
    Ok(codec::empty())
}

/// POST /management/registries/events
pub async fn registry_events(State(state): State<ApiState>, body: Bytes) -> ApiResult<Response> {
    codec::json_value(&body)?;
    let report = state.events.propagate(body).await?;
    Ok((report.status(), Json(report)).into_response())
}

//! Node, node-app, and monitoring handlers.

use axum::extract::{Path, State};
use axum::response::Response;
use bytes::Bytes;
use serde_json::json;

use pharos_inventory::{AppCommand, RegisterRequest, Resource};

use crate::ApiState;
use crate::codec::{self, json_body, json_value, object_id};
use crate::error::{ApiError, ApiResult, ErrorKind};
use crate::extract::RemoteAddr;

/// GET /ping
pub async fn ping() -> Response {
    codec::empty()
}

/// Fallback for paths no route knows.
pub async fn unsupported_url() -> ApiError {
    ApiError::new(ErrorKind::NotFoundUrl, "")
}

/// Fallback for known paths hit with the wrong method.
pub async fn invalid_method() -> ApiError {
    ApiError::new(ErrorKind::InvalidMethod, "")
}

// ── Nodes ──────────────────────────────────────────────────────

/// GET /management/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> ApiResult<Response> {
    codec::listing("nodes", &state.inventory.list_nodes()?)
}

/// POST /management/nodes/register
pub async fn register_node(State(state): State<ApiState>, body: Bytes) -> ApiResult<Response> {
    let request: RegisterRequest = json_body(&body)?;
    let id = state.inventory.register(request)?;
    Ok(codec::ok(json!({ "id": id })))
}

/// GET /management/nodes/{id}
pub async fn get_node(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Response> {
    let node = state.inventory.get_node(object_id(&id)?)?;
    Ok(codec::ok(codec::view(&node)?))
}

/// DELETE /management/nodes/{id}
pub async fn unregister_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    state.inventory.unregister(object_id(&id)?)?;
    Ok(codec::empty())
}

/// POST /management/nodes/{id}/ping
pub async fn ping_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    RemoteAddr(peer): RemoteAddr,
    body: Bytes,
) -> ApiResult<Response> {
    let payload = json_value(&body)?;
    state
        .inventory
        .ping(object_id(&id)?, peer.as_deref(), &payload)?;
    Ok(codec::empty())
}

// ── Node apps ──────────────────────────────────────────────────

/// GET /management/nodes/{id}/apps
pub async fn list_node_apps(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    codec::listing("apps", &state.inventory.node_apps(object_id(&id)?)?)
}

/// POST /management/nodes/{id}/apps/deploy
pub async fn deploy_app(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let deployment = state.inventory.deploy_to_node(object_id(&id)?, body).await?;
    Ok(codec::deployed(deployment))
}

/// GET /management/nodes/{id}/apps/{app_id}
pub async fn app_info(
    State(state): State<ApiState>,
    Path((id, app_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    state.inventory.node_app(id, app_id)?;
    Ok(codec::forward(state.inventory.app_info(id, app_id).await?))
}

/// POST /management/nodes/{id}/apps/{app_id}
pub async fn update_app_info(
    State(state): State<ApiState>,
    Path((id, app_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    Ok(codec::forward(
        state.inventory.update_app_info(id, app_id, body).await?,
    ))
}

/// DELETE /management/nodes/{id}/apps/{app_id}
pub async fn undeploy_app(
    State(state): State<ApiState>,
    Path((id, app_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    Ok(codec::forward(
        state.inventory.undeploy_from_node(id, app_id).await?,
    ))
}

/// POST /management/nodes/{id}/apps/{app_id}/{start|stop|update}
pub async fn app_command(
    State(state): State<ApiState>,
    Path((id, app_id, command)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let command = parse_command(&command)?;
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    Ok(codec::forward(
        state.inventory.app_command(id, app_id, command).await?,
    ))
}

pub(crate) fn parse_command(segment: &str) -> ApiResult<AppCommand> {
    AppCommand::parse(segment).ok_or_else(|| ApiError::new(ErrorKind::NotFoundUrl, ""))
}

// ── Monitoring ─────────────────────────────────────────────────

/// GET /monitoring/nodes/{id}/resource
pub async fn node_resource(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let result = state.inventory.monitor(object_id(&id)?, Resource::Usage).await?;
    Ok(codec::forward(result))
}

/// GET /monitoring/nodes/{id}/resource/performance
pub async fn node_performance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let result = state
        .inventory
        .monitor(object_id(&id)?, Resource::Performance)
        .await?;
    Ok(codec::forward(result))
}

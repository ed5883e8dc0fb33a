//! Group handlers: CRUD, membership, and group-wide app commands.

use axum::extract::{Path, State};
use axum::response::Response;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::ApiState;
use crate::codec::{self, json_body, object_id};
use crate::error::ApiResult;
use crate::handlers::parse_command;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub nodes: Vec<String>,
}

impl MembershipRequest {
    /// Every listed id, checked before any is applied.
    fn node_ids(&self) -> ApiResult<Vec<&str>> {
        self.nodes.iter().map(|id| object_id(id)).collect()
    }
}

/// GET /management/groups
pub async fn list_groups(State(state): State<ApiState>) -> ApiResult<Response> {
    codec::listing("groups", &state.inventory.list_groups()?)
}

/// POST /management/groups/create
pub async fn create_group(State(state): State<ApiState>, body: Bytes) -> ApiResult<Response> {
    let request: CreateGroupRequest = json_body(&body)?;
    let group = state.inventory.create_group(&request.name)?;
    Ok(codec::ok(json!({ "id": group.id })))
}

/// GET /management/groups/{id}
pub async fn get_group(State(state): State<ApiState>, Path(id): Path<String>) -> ApiResult<Response> {
    let group = state.inventory.get_group(object_id(&id)?)?;
    Ok(codec::ok(codec::view(&group)?))
}

/// DELETE /management/groups/{id}
pub async fn delete_group(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    state.inventory.delete_group(object_id(&id)?)?;
    Ok(codec::empty())
}

/// GET /management/groups/{id}/nodes
pub async fn group_nodes(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    codec::listing("nodes", &state.inventory.group_nodes(object_id(&id)?)?)
}

/// POST /management/groups/{id}/join
pub async fn join_group(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let group_id = object_id(&id)?;
    let request: MembershipRequest = json_body(&body)?;
    let group = state.inventory.join_group(group_id, request.node_ids()?.as_slice())?;
    Ok(codec::ok(codec::view(&group)?))
}

/// POST /management/groups/{id}/leave
pub async fn leave_group(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let group_id = object_id(&id)?;
    let request: MembershipRequest = json_body(&body)?;
    let group = state.inventory.leave_group(group_id, request.node_ids()?.as_slice())?;
    Ok(codec::ok(codec::view(&group)?))
}

/// POST /management/groups/{id}/apps/deploy
pub async fn deploy_app(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let deployment = state.inventory.deploy_to_group(object_id(&id)?, body).await?;
    Ok(codec::group_deployed(deployment))
}

/// POST /management/groups/{id}/apps/{app_id}
pub async fn update_app_info(
    State(state): State<ApiState>,
    Path((id, app_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    Ok(codec::fan_out(
        state.inventory.update_group_app_info(id, app_id, body).await?,
    ))
}

/// DELETE /management/groups/{id}/apps/{app_id}
pub async fn undeploy_app(
    State(state): State<ApiState>,
    Path((id, app_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    Ok(codec::fan_out(
        state.inventory.undeploy_from_group(id, app_id).await?,
    ))
}

/// POST /management/groups/{id}/apps/{app_id}/{start|stop|update}
pub async fn app_command(
    State(state): State<ApiState>,
    Path((id, app_id, command)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let command = parse_command(&command)?;
    let (id, app_id) = (object_id(&id)?, object_id(&app_id)?);
    Ok(codec::fan_out(
        state.inventory.group_app_command(id, app_id, command).await?,
    ))
}

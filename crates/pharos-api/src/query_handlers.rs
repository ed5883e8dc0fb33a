//! Search and subscription handlers.
//!
//! Both take their criteria from the query string, limited to the keys
//! `groupId`, `nodeId`, `appId`, and `imageName`.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use bytes::Bytes;
use serde_json::json;

use pharos_events::{SubscriptionOptions, SubscriptionRequest};
use pharos_inventory::SearchFilter;

use crate::ApiState;
use crate::codec::{self, json_body, object_id};
use crate::error::{ApiError, ApiResult, ErrorKind};

type Pairs = Vec<(String, String)>;

fn pairs(query: Result<Query<Pairs>, QueryRejection>) -> ApiResult<Pairs> {
    query
        .map(|Query(pairs)| pairs)
        .map_err(|e| ApiError::new(ErrorKind::InvalidParam, e.body_text()))
}

fn filter(query: Result<Query<Pairs>, QueryRejection>) -> ApiResult<SearchFilter> {
    let pairs = pairs(query)?;
    Ok(SearchFilter::from_pairs(
        pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )?)
}

// ── Search ─────────────────────────────────────────────────────

/// GET /search/nodes
pub async fn search_nodes(
    State(state): State<ApiState>,
    query: Result<Query<Pairs>, QueryRejection>,
) -> ApiResult<Response> {
    codec::listing("nodes", &state.inventory.search_nodes(&filter(query)?)?)
}

/// GET /search/groups
pub async fn search_groups(
    State(state): State<ApiState>,
    query: Result<Query<Pairs>, QueryRejection>,
) -> ApiResult<Response> {
    codec::listing("groups", &state.inventory.search_groups(&filter(query)?)?)
}

/// GET /search/apps
pub async fn search_apps(
    State(state): State<ApiState>,
    query: Result<Query<Pairs>, QueryRejection>,
) -> ApiResult<Response> {
    codec::listing("apps", &state.inventory.search_apps(&filter(query)?)?)
}

// ── Notification ───────────────────────────────────────────────

/// POST /notification
pub async fn subscribe(
    State(state): State<ApiState>,
    query: Result<Query<Pairs>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Response> {
    let pairs = pairs(query)?;
    let options =
        SubscriptionOptions::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let request: SubscriptionRequest = json_body(&body)?;
    let id = state.events.subscribe(request, &options)?;
    Ok(codec::ok(json!({ "id": id })))
}

/// DELETE /notification/{id}
pub async fn unsubscribe(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    state.events.unsubscribe(object_id(&id)?)?;
    Ok(codec::empty())
}

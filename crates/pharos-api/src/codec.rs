//! Response shaping and request body decoding.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use pharos_dispatch::DispatchResult;
use pharos_inventory::{FanOutReport, GroupDeployment, NodeDeployment};
use pharos_state::is_valid_id;

use crate::error::{ApiError, ApiResult, ErrorKind};

// ── Requests ─────────────────────────────────────────────────────

/// Parse a body as JSON, then as `T`.
///
/// Unparseable input is `InvalidJson`; well-formed JSON of the wrong shape
/// is `InvalidPayload`.
pub fn json_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    let value = json_value(body)?;
    serde_json::from_value(value).map_err(|e| ApiError::new(ErrorKind::InvalidPayload, e.to_string()))
}

/// Parse a body as untyped JSON. An empty body is `{}`.
pub fn json_value(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::new(ErrorKind::InvalidJson, e.to_string()))
}

/// Reject ids that are not 24 hex characters.
pub fn object_id(id: &str) -> ApiResult<&str> {
    if is_valid_id(id) {
        Ok(id)
    } else {
        Err(ApiError::new(ErrorKind::InvalidObjectId, id))
    }
}

// ── Responses ────────────────────────────────────────────────────

/// Serialize a stored document, exposing `_id` as `id`.
pub fn view<D: Serialize>(doc: &D) -> ApiResult<Value> {
    let mut value = serde_json::to_value(doc)
        .map_err(|e| ApiError::new(ErrorKind::InternalServerError, e.to_string()))?;
    if let Some(obj) = value.as_object_mut() {
        if let Some(id) = obj.remove("_id") {
            obj.insert("id".to_string(), id);
        }
    }
    Ok(value)
}

/// `{key: [view(doc)...]}`.
pub fn listing<D: Serialize>(key: &str, docs: &[D]) -> ApiResult<Response> {
    let items = docs.iter().map(view).collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(json!({ key: items })).into_response())
}

pub fn ok(value: Value) -> Response {
    Json(value).into_response()
}

pub fn empty() -> Response {
    Json(json!({})).into_response()
}

/// Mirror a node's answer: its status on failure, `200` with its body on
/// success.
pub fn forward(result: DispatchResult) -> Response {
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        result.status
    };
    (status, Json(node_body(&result))).into_response()
}

pub fn deployed(deployment: NodeDeployment) -> Response {
    if !deployment.result.is_success() {
        return forward(deployment.result);
    }
    let mut body = Map::new();
    body.insert("id".to_string(), Value::String(deployment.app_id));
    if let Value::Object(extra) = deployment.result.json() {
        for (k, v) in extra {
            body.entry(k).or_insert(v);
        }
    }
    ok(Value::Object(body))
}

pub fn group_deployed(deployment: GroupDeployment) -> Response {
    let status = deployment.report.status();
    (
        status,
        Json(json!({ "id": deployment.app_id, "nodes": deployment.report.nodes })),
    )
        .into_response()
}

/// `200` or `207` with one entry per node.
pub fn fan_out(report: FanOutReport) -> Response {
    (report.status(), Json(report)).into_response()
}

/// Node bodies are passed through when they are JSON objects; anything
/// else is wrapped as a message.
fn node_body(result: &DispatchResult) -> Value {
    match result.json() {
        Value::Object(obj) => Value::Object(obj),
        Value::String(message) => json!({ "message": message }),
        other => json!({ "message": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharos_state::{Group, NodeId};

    #[test]
    fn decoding_distinguishes_syntax_and_shape() {
        #[derive(Debug, serde::Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }

        let err = json_body::<Named>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidJson);

        let err = json_body::<Named>(&Bytes::from_static(b"{\"name\": 1}")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPayload);

        assert_eq!(json_value(&Bytes::new()).unwrap(), json!({}));
    }

    #[test]
    fn object_ids_are_checked() {
        assert!(object_id("0123456789abcdef01234567").is_ok());
        assert_eq!(object_id("nope").unwrap_err().kind, ErrorKind::InvalidObjectId);
    }

    #[test]
    fn view_renames_id() {
        let members: Vec<NodeId> = Vec::new();
        let group = Group {
            id: "0123456789abcdef01234567".to_string(),
            name: "edge".to_string(),
            members,
        };
        assert_eq!(
            view(&group).unwrap(),
            json!({"id": "0123456789abcdef01234567", "name": "edge", "members": []})
        );
    }

    #[test]
    fn forward_mirrors_failures() {
        let resp = forward(DispatchResult::new(StatusCode::CONFLICT, "busy"));
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = forward(DispatchResult::new(StatusCode::CREATED, ""));
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

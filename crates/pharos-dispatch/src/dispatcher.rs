//! Dispatcher — issues one HTTP call per target URL, in parallel.
//!
//! The result vector is index-aligned with the input URLs. A failing
//! target (connection refused, timeout, non-2xx) produces its own
//! [`DispatchResult`] and never aborts its peers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Default per-request timeout for outbound calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("pharos-anchor/", env!("CARGO_PKG_VERSION"));

/// Outcome of a single outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub status: StatusCode,
    pub body: Bytes,
}

impl DispatchResult {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A synthesized failure carrying `{"message": ...}`.
    pub fn failure(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({ "message": message }).to_string();
        Self::new(status, body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body parsed as JSON; empty bodies become `{}`, non-JSON bodies a
    /// string.
    pub fn json(&self) -> Value {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Value::Object(Default::default());
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// Parallel HTTP fan-out.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Issue `method` against every URL; the i-th result belongs to the
    /// i-th URL.
    async fn dispatch(
        &self,
        method: Method,
        urls: &[String],
        body: Option<Bytes>,
    ) -> Vec<DispatchResult>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Dispatcher backed by a pooled `reqwest` client.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Create a dispatcher whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, method: Method, url: &str, body: Option<Bytes>) -> DispatchResult {
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(%method, %url, "dispatch timed out");
                return DispatchResult::failure(StatusCode::GATEWAY_TIMEOUT, &e.to_string());
            }
            Err(e) => {
                warn!(%method, %url, error = %e, "dispatch failed");
                return DispatchResult::failure(StatusCode::SERVICE_UNAVAILABLE, &e.to_string());
            }
        };

        let status = response.status();
        match response.bytes().await {
            Ok(body) => {
                debug!(%method, %url, %status, "dispatch completed");
                DispatchResult::new(status, body)
            }
            Err(e) => {
                warn!(%method, %url, error = %e, "failed to read dispatch response");
                DispatchResult::failure(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        method: Method,
        urls: &[String],
        body: Option<Bytes>,
    ) -> Vec<DispatchResult> {
        let calls = urls
            .iter()
            .map(|url| self.send(method.clone(), url, body.clone()));
        join_all(calls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::{get, post};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let base = serve(
            Router::new()
                .route("/ok", get(|| async { "{\"ok\":true}" }))
                .route(
                    "/missing",
                    get(|| async { (axum::http::StatusCode::NOT_FOUND, "{}") }),
                ),
        )
        .await;

        let dispatcher = HttpDispatcher::new(Duration::from_secs(5)).unwrap();
        let urls = vec![format!("{base}/missing"), format!("{base}/ok")];
        let results = dispatcher.dispatch(Method::GET, &urls, None).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, StatusCode::NOT_FOUND);
        assert_eq!(results[1].status, StatusCode::OK);
        assert_eq!(results[1].json(), serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn body_is_forwarded() {
        let base = serve(Router::new().route("/echo", post(|body: String| async move { body }))).await;

        let dispatcher = HttpDispatcher::new(Duration::from_secs(5)).unwrap();
        let results = dispatcher
            .dispatch(
                Method::POST,
                &[format!("{base}/echo")],
                Some(Bytes::from_static(b"{\"events\":[]}")),
            )
            .await;

        assert_eq!(results[0].body, Bytes::from_static(b"{\"events\":[]}"));
    }

    #[tokio::test]
    async fn unreachable_target_does_not_abort_peers() {
        let base = serve(Router::new().route("/ok", get(|| async { "" }))).await;

        let dispatcher = HttpDispatcher::new(Duration::from_secs(5)).unwrap();
        let urls = vec!["http://127.0.0.1:1/ok".to_string(), format!("{base}/ok")];
        let results = dispatcher.dispatch(Method::GET, &urls, None).await;

        assert_eq!(results[0].status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(results[0].json().get("message").is_some());
        assert!(results[1].is_success());
        assert_eq!(results[1].json(), serde_json::json!({}));
    }

    #[tokio::test]
    async fn empty_target_list() {
        let dispatcher = HttpDispatcher::new(DEFAULT_TIMEOUT).unwrap();
        assert!(dispatcher.dispatch(Method::GET, &[], None).await.is_empty());
    }

    #[test]
    fn non_json_body_is_wrapped_as_string() {
        let result = DispatchResult::new(StatusCode::OK, "plain text");
        assert_eq!(result.json(), serde_json::json!("plain text"));
    }
}

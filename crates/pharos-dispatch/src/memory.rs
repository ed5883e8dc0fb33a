//! In-process dispatcher that records calls instead of sending them.
//!
//! Used by tests across the workspace to observe fan-out and to script
//! per-host failures.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};

use crate::dispatcher::{DispatchResult, Dispatcher};

/// One observed outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Bytes>,
}

/// Records every call and answers from a per-host script.
///
/// Hosts without a scripted reply get `200 {}`.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<DispatchCall>>,
    replies: Mutex<HashMap<String, DispatchResult>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `host` with `status` and `body`.
    pub fn reply(&self, host: &str, status: StatusCode, body: &str) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string(), DispatchResult::new(status, body.to_string()));
    }

    /// Snapshot of the calls seen so far, in dispatch order.
    pub fn calls(&self) -> Vec<DispatchCall> {
        lock(&self.calls).clone()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    fn answer(&self, url: &str) -> DispatchResult {
        let replies = lock(&self.replies);
        host_of(url)
            .and_then(|host| replies.get(host).cloned())
            .unwrap_or_else(|| DispatchResult::new(StatusCode::OK, "{}"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host portion of `scheme://host:port/...`.
fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split('/').next()?;
    match authority.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => {
            Some(host.trim_start_matches('[').trim_end_matches(']'))
        }
        _ => Some(authority),
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        method: Method,
        urls: &[String],
        body: Option<Bytes>,
    ) -> Vec<DispatchResult> {
        let mut calls = lock(&self.calls);
        urls.iter()
            .map(|url| {
                calls.push(DispatchCall {
                    method: method.clone(),
                    url: url.clone(),
                    body: body.clone(),
                });
                self.answer(url)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("http://10.0.0.1:48098/api/v1"), Some("10.0.0.1"));
        assert_eq!(host_of("https://[::1]:443/x"), Some("::1"));
        assert_eq!(host_of("http://edge.local/x"), Some("edge.local"));
        assert_eq!(host_of("not a url"), None);
    }

    #[tokio::test]
    async fn records_and_scripts_replies() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.reply("10.0.0.2", StatusCode::INTERNAL_SERVER_ERROR, "{}");

        let urls = vec![
            "http://10.0.0.1:48098/api/v1/ping".to_string(),
            "http://10.0.0.2:48098/api/v1/ping".to_string(),
        ];
        let results = dispatcher.dispatch(Method::POST, &urls, None).await;

        assert_eq!(results[0].status, StatusCode::OK);
        assert_eq!(results[1].status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(dispatcher.calls().len(), 2);
        assert_eq!(dispatcher.calls()[1].url, urls[1]);
    }
}

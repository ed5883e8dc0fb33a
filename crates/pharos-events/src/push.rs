//! Registry push propagation.
//!
//! A registry notification names the pushed repositories. Every app whose
//! images include one of them is told about the push on every node that
//! runs it, with the notification forwarded untouched.

use std::collections::HashSet;

use bytes::Bytes;
use futures::future::join_all;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pharos_inventory::{Inventory, NodeOutcome};
use pharos_state::*;

use crate::error::{EventError, EventResult};

/// A registry notification envelope.
#[derive(Debug, Deserialize)]
pub struct RegistryNotification {
    pub events: Vec<RegistryEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistryEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub target: EventTarget,
    #[serde(default)]
    pub request: EventRequest,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventTarget {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub host: Option<String>,
}

impl RegistryEvent {
    /// `host/repository`, the form app images are indexed under.
    pub fn image_name(&self) -> Option<String> {
        let host = self.request.host.as_deref()?.trim_end_matches('/');
        let repository = self.target.repository.as_deref()?.trim_start_matches('/');
        if host.is_empty() || repository.is_empty() {
            return None;
        }
        Some(format!("{host}/{repository}"))
    }
}

/// Which apps were notified, and which nodes failed to take the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushReport {
    pub apps: Vec<AppId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<NodeOutcome>,
}

impl PushReport {
    pub fn status(&self) -> StatusCode {
        if self.failures.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::MULTI_STATUS
        }
    }
}

/// Forwards registry pushes to the nodes running affected apps.
#[derive(Clone)]
pub struct EventPropagator {
    inventory: Inventory,
}

impl EventPropagator {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Handle a raw registry notification.
    pub async fn propagate(&self, raw: Bytes) -> EventResult<PushReport> {
        let notification: RegistryNotification = serde_json::from_slice(&raw)
            .map_err(|e| EventError::InvalidPayload(e.to_string()))?;

        let mut images = Vec::new();
        for event in &notification.events {
            match event.image_name() {
                Some(image) if !images.contains(&image) => images.push(image),
                Some(_) => {}
                None => debug!(action = ?event.action, "registry event without host or repository skipped"),
            }
        }

        let mut seen = HashSet::new();
        let mut apps = Vec::new();
        for image in &images {
            for app in self.inventory.apps_by_image(image)? {
                if seen.insert(app.id.clone()) {
                    apps.push(app);
                }
            }
        }

        let deliveries = apps.iter().map(|app| self.notify_app(app, raw.clone()));
        let mut report = PushReport::default();
        for (app, delivered) in apps.iter().zip(join_all(deliveries).await) {
            let outcomes = delivered?;
            if outcomes.is_empty() {
                continue;
            }
            report.apps.push(app.id.clone());
            report
                .failures
                .extend(outcomes.into_iter().filter(|o| !o.is_success()));
        }

        info!(
            images = images.len(),
            apps = report.apps.len(),
            failures = report.failures.len(),
            "registry push propagated"
        );
        Ok(report)
    }

    async fn notify_app(&self, app: &App, body: Bytes) -> EventResult<Vec<NodeOutcome>> {
        let nodes = self.inventory.nodes_running(&app.id)?;
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let env = self.inventory.environment();
        let urls = env.node_urls(
            nodes.iter().map(|n| n.ip.as_str()),
            &["management", "apps", &app.id, "events"],
        );
        let results = self
            .inventory
            .dispatcher()
            .dispatch(Method::POST, &urls, Some(body))
            .await;

        Ok(nodes
            .iter()
            .zip(&results)
            .map(|(node, result)| {
                if !result.is_success() {
                    warn!(node_id = %node.id, app_id = %app.id, status = %result.status, "registry event not delivered");
                }
                NodeOutcome::new(node.id.clone(), result)
            })
            .collect())
    }
}

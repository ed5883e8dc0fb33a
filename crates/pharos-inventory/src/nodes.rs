//! Node lifecycle: register, unregister, ping, and monitoring passthrough.

use std::time::{SystemTime, UNIX_EPOCH};

use http::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use pharos_dispatch::DispatchResult;
use pharos_state::*;

use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Inventory;

/// Body of a registration request.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// Previously assigned id, when the node re-registers.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
}

impl RegisterRequest {
    pub fn from_json(body: &Value) -> InventoryResult<Self> {
        serde_json::from_value(body.clone())
            .map_err(|e| InventoryError::InvalidPayload(e.to_string()))
    }
}

/// Which monitoring resource to fetch from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Usage,
    Performance,
}

impl Resource {
    fn fragments(self) -> &'static [&'static str] {
        match self {
            Resource::Usage => &["monitoring", "resource"],
            Resource::Performance => &["monitoring", "resource", "performance"],
        }
    }
}

impl Inventory {
    /// Create a node, or refresh an existing one if the request names it.
    ///
    /// Returns the node id. A re-registration moves the node to the new
    /// address and marks it connected.
    pub fn register(&self, request: RegisterRequest) -> InventoryResult<NodeId> {
        if let Some(id) = request.id.as_deref() {
            match self.state.get::<Node>(id) {
                Ok(_) => {
                    let mut patches = vec![Patch::set("status", NodeStatus::Connected)];
                    if let Some(ip) = request.ip {
                        patches.push(Patch::set("ip", ip));
                    }
                    if let Some(config) = request.config {
                        patches.push(Patch::set("config", config));
                    }
                    self.state.update::<Node>(id, &patches)?;
                    info!(node_id = %id, "node re-registered");
                    return Ok(id.to_string());
                }
                Err(StateError::NotFound { .. } | StateError::InvalidId(_)) => {
                    debug!(node_id = %id, "unknown node id on register, creating a new node");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let ip = request
            .ip
            .filter(|ip| !ip.trim().is_empty())
            .ok_or_else(|| InventoryError::InvalidPayload("missing `ip`".to_string()))?;

        let node = self.state.insert(Node {
            id: String::new(),
            ip,
            apps: Vec::new(),
            status: NodeStatus::Connected,
            config: request.config.unwrap_or_default(),
            registered_at: epoch_secs(),
            last_ping: 0,
        })?;
        info!(node_id = %node.id, ip = %node.ip, "node registered");
        Ok(node.id)
    }

    /// Delete a node and everything that references it.
    ///
    /// Releasing the node's apps and group memberships is best-effort; the
    /// node removal itself is the commit point.
    pub fn unregister(&self, node_id: &str) -> InventoryResult<()> {
        let node = self.node(node_id)?;

        for app_id in &node.apps {
            self.detach(node_id, app_id);
        }

        match self
            .state
            .find::<Group>(&Filter::all().contains("members", node_id))
        {
            Ok(groups) => {
                for group in groups {
                    if let Err(e) = self
                        .state
                        .update::<Group>(&group.id, &[Patch::pull("members", node_id)])
                    {
                        warn!(%node_id, group_id = %group.id, error = %e, "failed to leave group on unregister");
                    }
                }
            }
            Err(e) => warn!(%node_id, error = %e, "failed to look up groups on unregister"),
        }

        self.state.remove::<Node>(node_id)?;
        self.liveness.on_node_deleted(node_id);
        info!(%node_id, "node unregistered");
        Ok(())
    }

    /// Record a heartbeat from a node.
    pub fn ping(&self, node_id: &str, ip: Option<&str>, body: &Value) -> InventoryResult<()> {
        self.node(node_id)?;
        self.liveness.on_ping(node_id, ip, body)?;
        Ok(())
    }

    pub fn get_node(&self, node_id: &str) -> InventoryResult<Node> {
        self.node(node_id)
    }

    pub fn list_nodes(&self) -> InventoryResult<Vec<Node>> {
        Ok(self.state.list::<Node>()?)
    }

    /// Fetch resource usage from a node.
    pub async fn monitor(&self, node_id: &str, resource: Resource) -> InventoryResult<DispatchResult> {
        let node = self.node(node_id)?;
        Ok(self
            .send_to(&node, Method::GET, resource.fragments(), None)
            .await)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

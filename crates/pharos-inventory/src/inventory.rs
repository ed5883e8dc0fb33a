//! The inventory handle shared by every use-case.

use std::sync::Arc;

use bytes::Bytes;
use http::Method;

use pharos_dispatch::{DispatchResult, Dispatcher, Environment};
use pharos_liveness::LivenessTracker;
use pharos_state::*;

use crate::error::{InventoryError, InventoryResult};
use crate::report::{FanOutReport, NodeOutcome};

/// Node, group, app, and registry use-cases over one state store.
///
/// Cheap to clone; every clone shares the store, dispatcher, and liveness
/// timers.
#[derive(Clone)]
pub struct Inventory {
    pub(crate) state: StateStore,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) env: Environment,
    pub(crate) liveness: LivenessTracker,
}

impl Inventory {
    pub fn new(
        state: StateStore,
        dispatcher: Arc<dyn Dispatcher>,
        env: Environment,
        liveness: LivenessTracker,
    ) -> Self {
        Self {
            state,
            dispatcher,
            env,
            liveness,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub fn environment(&self) -> Environment {
        self.env
    }

    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    // ── Dispatch helpers ─────────────────────────────────────────

    /// Send one request to a single node.
    pub(crate) async fn send_to(
        &self,
        node: &Node,
        method: Method,
        fragments: &[&str],
        body: Option<Bytes>,
    ) -> DispatchResult {
        let url = self.env.node_url(&node.ip, fragments);
        self.dispatcher
            .dispatch(method, &[url], body)
            .await
            .pop()
            .unwrap_or_else(|| {
                DispatchResult::failure(http::StatusCode::INTERNAL_SERVER_ERROR, "no dispatch result")
            })
    }

    /// Send the same request to every node in parallel; results follow
    /// `nodes` order.
    pub(crate) async fn send_to_all(
        &self,
        nodes: &[Node],
        method: Method,
        fragments: &[&str],
        body: Option<Bytes>,
    ) -> Vec<DispatchResult> {
        if nodes.is_empty() {
            return Vec::new();
        }
        let urls = self
            .env
            .node_urls(nodes.iter().map(|n| n.ip.as_str()), fragments);
        self.dispatcher.dispatch(method, &urls, body).await
    }

    /// Fan a command out to `nodes` and collect a report.
    pub(crate) async fn command_all(
        &self,
        nodes: &[Node],
        method: Method,
        fragments: &[&str],
        body: Option<Bytes>,
    ) -> FanOutReport {
        let results = self.send_to_all(nodes, method, fragments, body).await;
        nodes
            .iter()
            .zip(&results)
            .map(|(node, result)| NodeOutcome::new(node.id.clone(), result))
            .collect()
    }

    /// Resolve a group's members, skipping ids that no longer exist.
    pub(crate) fn members(&self, group: &Group) -> InventoryResult<Vec<Node>> {
        let mut nodes = Vec::with_capacity(group.members.len());
        for id in &group.members {
            match self.state.get::<Node>(id) {
                Ok(node) => nodes.push(node),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(group_id = %group.id, node_id = %id, "group member no longer exists");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(nodes)
    }

    /// Look up a node, mapping a missing node to a domain error.
    pub(crate) fn node(&self, node_id: &str) -> InventoryResult<Node> {
        self.state.get::<Node>(node_id).map_err(|e| missing(e, "node", node_id))
    }

    pub(crate) fn group(&self, group_id: &str) -> InventoryResult<Group> {
        self.state
            .get::<Group>(group_id)
            .map_err(|e| missing(e, "group", group_id))
    }
}

/// Turn a store `NotFound` into an inventory `NotFound` naming the entity.
pub(crate) fn missing(err: StateError, what: &str, id: &str) -> InventoryError {
    if err.is_not_found() {
        InventoryError::NotFound(format!("{what} {id} does not exist"))
    } else {
        InventoryError::State(err)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use pharos_dispatch::RecordingDispatcher;
    use serde_json::Map;

    pub struct Harness {
        pub inventory: Inventory,
        pub dispatcher: Arc<RecordingDispatcher>,
    }

    pub fn harness() -> Harness {
        let state = StateStore::open_in_memory().unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let liveness = LivenessTracker::new(state.clone());
        let inventory = Inventory::new(
            state,
            dispatcher.clone(),
            Environment::direct(),
            liveness,
        );
        Harness {
            inventory,
            dispatcher,
        }
    }

    impl Harness {
        pub fn state(&self) -> &StateStore {
            self.inventory.state()
        }

        pub fn add_node(&self, ip: &str) -> Node {
            self.state()
                .insert(Node {
                    id: String::new(),
                    ip: ip.to_string(),
                    apps: Vec::new(),
                    status: NodeStatus::Connected,
                    config: Map::new(),
                    registered_at: 0,
                    last_ping: 0,
                })
                .unwrap()
        }

        pub fn add_group(&self, name: &str, members: &[&Node]) -> Group {
            self.state()
                .insert(Group {
                    id: String::new(),
                    name: name.to_string(),
                    members: members.iter().map(|n| n.id.clone()).collect(),
                })
                .unwrap()
        }
    }

    pub const COMPOSE: &str = "\
services:
  web:
    image: dummy_host/dummy_repository:latest
";
}

//! App lifecycle: deploy, undeploy, update, and lifecycle commands.
//!
//! An app's `refcnt` always equals the number of nodes whose `apps` set
//! lists it. Deploy reserves one reference per target up front and gives
//! back one for every target that did not end up running the app.

use bytes::Bytes;
use http::Method;
use tracing::{debug, info, warn};

use pharos_dispatch::DispatchResult;
use pharos_state::*;

use crate::description::AppDescription;
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Inventory;
use crate::report::{FanOutReport, NodeOutcome};

/// A state-neutral command forwarded to the node agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Start,
    Stop,
    Update,
}

impl AppCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            AppCommand::Start => "start",
            AppCommand::Stop => "stop",
            AppCommand::Update => "update",
        }
    }

    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "start" => Some(AppCommand::Start),
            "stop" => Some(AppCommand::Stop),
            "update" => Some(AppCommand::Update),
            _ => None,
        }
    }
}

/// Outcome of deploying to one node.
#[derive(Debug, Clone)]
pub struct NodeDeployment {
    pub app_id: AppId,
    pub result: DispatchResult,
}

/// Outcome of deploying to every member of a group.
#[derive(Debug, Clone)]
pub struct GroupDeployment {
    pub app_id: AppId,
    pub report: FanOutReport,
}

const DEPLOY: &[&str] = &["management", "apps", "deploy"];

impl Inventory {
    // ── Deploy ───────────────────────────────────────────────────

    pub async fn deploy_to_node(&self, node_id: &str, raw: Bytes) -> InventoryResult<NodeDeployment> {
        let node = self.node(node_id)?;
        let (desc, mut results) = self.deploy(std::slice::from_ref(&node), raw).await?;
        let result = results.pop().unwrap_or_else(|| {
            DispatchResult::failure(http::StatusCode::INTERNAL_SERVER_ERROR, "no dispatch result")
        });
        Ok(NodeDeployment {
            app_id: desc.id,
            result,
        })
    }

    pub async fn deploy_to_group(&self, group_id: &str, raw: Bytes) -> InventoryResult<GroupDeployment> {
        let group = self.group(group_id)?;
        let nodes = self.members(&group)?;
        let (desc, results) = self.deploy(&nodes, raw).await?;
        Ok(GroupDeployment {
            app_id: desc.id,
            report: outcomes(&nodes, &results),
        })
    }

    async fn deploy(
        &self,
        nodes: &[Node],
        raw: Bytes,
    ) -> InventoryResult<(AppDescription, Vec<DispatchResult>)> {
        let desc = AppDescription::parse(&raw)?;
        if nodes.is_empty() {
            return Ok((desc, Vec::new()));
        }

        self.retain_app(&desc, nodes.len() as u64)?;
        let results = self.send_to_all(nodes, Method::POST, DEPLOY, Some(raw)).await;

        let mut unused = 0usize;
        for (node, result) in nodes.iter().zip(&results) {
            if !result.is_success() {
                warn!(node_id = %node.id, app_id = %desc.id, status = %result.status, "deploy rejected by node");
                unused += 1;
                continue;
            }
            match self
                .state
                .update_changed::<Node>(&node.id, &[Patch::add_to_set("apps", desc.id.as_str())])
            {
                Ok((_, true)) => info!(node_id = %node.id, app_id = %desc.id, "app deployed"),
                Ok((_, false)) => {
                    debug!(node_id = %node.id, app_id = %desc.id, "app already deployed on node");
                    unused += 1;
                }
                Err(e) => {
                    warn!(node_id = %node.id, app_id = %desc.id, error = %e, "failed to record deployment");
                    unused += 1;
                }
            }
        }
        for _ in 0..unused {
            self.release_app(&desc.id);
        }

        Ok((desc, results))
    }

    /// Take `count` references on an app, creating it on first use.
    fn retain_app(&self, desc: &AppDescription, count: u64) -> InventoryResult<()> {
        let by = i64::try_from(count)
            .map_err(|_| InventoryError::InvalidParam("too many deployment targets".to_string()))?;
        let increment = [Patch::inc("refcnt", by)];

        match self.state.update::<App>(&desc.id, &increment) {
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let created = self.state.insert(App {
            id: desc.id.clone(),
            images: desc.images.clone(),
            services: desc.services.clone(),
            refcnt: count,
        });
        match created {
            Ok(_) => {
                debug!(app_id = %desc.id, refcnt = count, "app created");
                Ok(())
            }
            // Lost a race with a concurrent deploy of the same app.
            Err(StateError::DuplicateKey { .. }) => {
                self.state.update::<App>(&desc.id, &increment)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop one reference on an app, deleting it with the last one.
    fn release_app(&self, app_id: &str) {
        match self.state.decrement_or_remove::<App>(app_id, "refcnt") {
            Ok(Some(app)) => debug!(%app_id, refcnt = app.refcnt, "app released"),
            Ok(None) => info!(%app_id, "app removed"),
            Err(e) => warn!(%app_id, error = %e, "failed to release app"),
        }
    }

    // ── Undeploy ─────────────────────────────────────────────────

    pub async fn undeploy_from_node(&self, node_id: &str, app_id: &str) -> InventoryResult<DispatchResult> {
        let node = self.node(node_id)?;
        ensure_deployed(&node, app_id)?;

        let result = self
            .send_to(&node, Method::DELETE, &["management", "apps", app_id], None)
            .await;
        if result.is_success() {
            self.detach(&node.id, app_id);
        } else {
            warn!(%node_id, %app_id, status = %result.status, "undeploy rejected by node");
        }
        Ok(result)
    }

    pub async fn undeploy_from_group(&self, group_id: &str, app_id: &str) -> InventoryResult<FanOutReport> {
        let nodes = self.members_running(group_id, app_id)?;
        let results = self
            .send_to_all(&nodes, Method::DELETE, &["management", "apps", app_id], None)
            .await;
        for (node, result) in nodes.iter().zip(&results) {
            if result.is_success() {
                self.detach(&node.id, app_id);
            }
        }
        Ok(outcomes(&nodes, &results))
    }

    /// Forget that `node_id` runs `app_id`, dropping the app reference the
    /// edge held. Only the caller that actually removes the edge releases.
    pub(crate) fn detach(&self, node_id: &str, app_id: &str) {
        match self
            .state
            .update_changed::<Node>(node_id, &[Patch::pull("apps", app_id)])
        {
            Ok((_, true)) => {
                info!(%node_id, %app_id, "app detached from node");
                self.release_app(app_id);
            }
            Ok((_, false)) => debug!(%node_id, %app_id, "app already detached"),
            Err(e) => warn!(%node_id, %app_id, error = %e, "failed to record undeploy"),
        }
    }

    // ── Update info ──────────────────────────────────────────────

    /// Push a new description for an app already on the node. The app keeps
    /// its id and reference count.
    pub async fn update_app_info(
        &self,
        node_id: &str,
        app_id: &str,
        raw: Bytes,
    ) -> InventoryResult<DispatchResult> {
        let desc = AppDescription::parse(&raw)?;
        let node = self.node(node_id)?;
        ensure_deployed(&node, app_id)?;

        let result = self
            .send_to(&node, Method::POST, &["management", "apps", app_id], Some(raw))
            .await;
        if result.is_success() {
            self.refresh_app(app_id, &desc);
        }
        Ok(result)
    }

    pub async fn update_group_app_info(
        &self,
        group_id: &str,
        app_id: &str,
        raw: Bytes,
    ) -> InventoryResult<FanOutReport> {
        let desc = AppDescription::parse(&raw)?;
        let nodes = self.members_running(group_id, app_id)?;
        let results = self
            .send_to_all(&nodes, Method::POST, &["management", "apps", app_id], Some(raw))
            .await;
        if results.iter().any(DispatchResult::is_success) {
            self.refresh_app(app_id, &desc);
        }
        Ok(outcomes(&nodes, &results))
    }

    fn refresh_app(&self, app_id: &str, desc: &AppDescription) {
        let patches = [
            Patch::set("images", desc.images.clone()),
            Patch::set("services", desc.services.clone()),
        ];
        match self.state.update::<App>(app_id, &patches) {
            Ok(_) => info!(%app_id, "app description updated"),
            Err(e) => warn!(%app_id, error = %e, "failed to update app description"),
        }
    }

    // ── Passthrough ──────────────────────────────────────────────

    pub async fn app_command(
        &self,
        node_id: &str,
        app_id: &str,
        command: AppCommand,
    ) -> InventoryResult<DispatchResult> {
        let node = self.node(node_id)?;
        Ok(self
            .send_to(&node, Method::POST, &["management", "apps", app_id, command.as_str()], None)
            .await)
    }

    pub async fn group_app_command(
        &self,
        group_id: &str,
        app_id: &str,
        command: AppCommand,
    ) -> InventoryResult<FanOutReport> {
        let nodes = self.members_running(group_id, app_id)?;
        Ok(self
            .command_all(&nodes, Method::POST, &["management", "apps", app_id, command.as_str()], None)
            .await)
    }

    /// Ask the node for the app's runtime information.
    pub async fn app_info(&self, node_id: &str, app_id: &str) -> InventoryResult<DispatchResult> {
        let node = self.node(node_id)?;
        Ok(self
            .send_to(&node, Method::GET, &["management", "apps", app_id], None)
            .await)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Apps deployed on a node.
    pub fn node_apps(&self, node_id: &str) -> InventoryResult<Vec<App>> {
        let node = self.node(node_id)?;
        let mut apps = Vec::with_capacity(node.apps.len());
        for app_id in &node.apps {
            match self.state.get::<App>(app_id) {
                Ok(app) => apps.push(app),
                Err(e) if e.is_not_found() => {
                    warn!(%node_id, %app_id, "node lists an app that does not exist");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(apps)
    }

    /// One app, provided it is deployed on the node.
    pub fn node_app(&self, node_id: &str, app_id: &str) -> InventoryResult<App> {
        let node = self.node(node_id)?;
        ensure_deployed(&node, app_id)?;
        self.state
            .get::<App>(app_id)
            .map_err(|e| crate::inventory::missing(e, "app", app_id))
    }

    pub fn apps_by_image(&self, image: &str) -> InventoryResult<Vec<App>> {
        Ok(self
            .state
            .find::<App>(&Filter::all().contains("images", image))?)
    }

    pub fn list_apps(&self) -> InventoryResult<Vec<App>> {
        Ok(self.state.list::<App>()?)
    }

    /// Nodes whose `apps` set lists `app_id`.
    pub fn nodes_running(&self, app_id: &str) -> InventoryResult<Vec<Node>> {
        Ok(self
            .state
            .find::<Node>(&Filter::all().contains("apps", app_id))?)
    }

    fn members_running(&self, group_id: &str, app_id: &str) -> InventoryResult<Vec<Node>> {
        let group = self.group(group_id)?;
        let mut nodes = self.members(&group)?;
        nodes.retain(|node| node.apps.iter().any(|id| id == app_id));
        Ok(nodes)
    }
}

fn ensure_deployed(node: &Node, app_id: &str) -> InventoryResult<()> {
    if node.apps.iter().any(|id| id == app_id) {
        Ok(())
    } else {
        Err(InventoryError::NotFound(format!(
            "app {app_id} is not deployed on node {}",
            node.id
        )))
    }
}

fn outcomes(nodes: &[Node], results: &[DispatchResult]) -> FanOutReport {
    nodes
        .iter()
        .zip(results)
        .map(|(node, result)| NodeOutcome::new(node.id.clone(), result))
        .collect()
}

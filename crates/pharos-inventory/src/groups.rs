//! Group lifecycle and membership.

use tracing::info;

use pharos_state::*;

use crate::error::{InventoryError, InventoryResult};
use crate::inventory::{Inventory, missing};

impl Inventory {
    pub fn create_group(&self, name: &str) -> InventoryResult<Group> {
        if name.trim().is_empty() {
            return Err(InventoryError::InvalidParam("group name must not be empty".to_string()));
        }
        let group = self.state.insert(Group {
            id: String::new(),
            name: name.to_string(),
            members: Vec::new(),
        })?;
        info!(group_id = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    pub fn get_group(&self, group_id: &str) -> InventoryResult<Group> {
        self.group(group_id)
    }

    pub fn list_groups(&self) -> InventoryResult<Vec<Group>> {
        Ok(self.state.list::<Group>()?)
    }

    pub fn delete_group(&self, group_id: &str) -> InventoryResult<()> {
        self.state
            .remove::<Group>(group_id)
            .map_err(|e| missing(e, "group", group_id))?;
        info!(%group_id, "group deleted");
        Ok(())
    }

    /// Add nodes to a group in one update. The group and every node must
    /// exist; otherwise nothing changes. Joining twice is a no-op.
    pub fn join_group<S: AsRef<str>>(&self, group_id: &str, node_ids: &[S]) -> InventoryResult<Group> {
        for node_id in node_ids {
            self.node(node_id.as_ref())?;
        }
        let patches: Vec<Patch> = node_ids
            .iter()
            .map(|id| Patch::add_to_set("members", id.as_ref()))
            .collect();
        let group = self
            .state
            .update::<Group>(group_id, &patches)
            .map_err(|e| missing(e, "group", group_id))?;
        info!(%group_id, nodes = node_ids.len(), "nodes joined group");
        Ok(group)
    }

    /// Remove nodes from a group in one update. Leaving a group the node is
    /// not part of is a no-op.
    pub fn leave_group<S: AsRef<str>>(&self, group_id: &str, node_ids: &[S]) -> InventoryResult<Group> {
        let patches: Vec<Patch> = node_ids
            .iter()
            .map(|id| Patch::pull("members", id.as_ref()))
            .collect();
        let group = self
            .state
            .update::<Group>(group_id, &patches)
            .map_err(|e| missing(e, "group", group_id))?;
        info!(%group_id, nodes = node_ids.len(), "nodes left group");
        Ok(group)
    }

    /// The group's member nodes.
    pub fn group_nodes(&self, group_id: &str) -> InventoryResult<Vec<Node>> {
        let group = self.group(group_id)?;
        self.members(&group)
    }
}

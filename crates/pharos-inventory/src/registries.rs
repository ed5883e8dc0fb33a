//! Container registries whose push events are propagated to nodes.

use tracing::info;

use pharos_state::*;

use crate::error::{InventoryError, InventoryResult};
use crate::inventory::{Inventory, missing};

impl Inventory {
    /// Record a registry. Addresses are unique.
    pub fn add_registry(&self, ip: &str) -> InventoryResult<Registry> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(InventoryError::InvalidParam("registry ip must not be empty".to_string()));
        }
        let registry = self.state.insert(Registry {
            id: String::new(),
            ip: ip.to_string(),
        })?;
        info!(registry_id = %registry.id, ip = %registry.ip, "registry added");
        Ok(registry)
    }

    pub fn get_registry(&self, registry_id: &str) -> InventoryResult<Registry> {
        self.state
            .get::<Registry>(registry_id)
            .map_err(|e| missing(e, "registry", registry_id))
    }

    pub fn list_registries(&self) -> InventoryResult<Vec<Registry>> {
        Ok(self.state.list::<Registry>()?)
    }

    pub fn delete_registry(&self, registry_id: &str) -> InventoryResult<()> {
        self.state
            .remove::<Registry>(registry_id)
            .map_err(|e| missing(e, "registry", registry_id))?;
        info!(%registry_id, "registry deleted");
        Ok(())
    }
}

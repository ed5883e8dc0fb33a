//! Process wiring: one state store, one dispatcher, one liveness tracker,
//! shared by every request.

use std::sync::Arc;

use axum::Router;
use tracing::info;

use pharos_api::{ApiState, build_router};
use pharos_dispatch::{Dispatcher, HttpDispatcher};
use pharos_inventory::Inventory;
use pharos_liveness::LivenessTracker;
use pharos_state::StateStore;

use crate::config::Config;

const DB_FILE: &str = "pharos-anchor.redb";

pub struct Application {
    api: ApiState,
    liveness: LivenessTracker,
}

impl Application {
    /// Open the store and build the dispatcher described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let state = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(DB_FILE);
                let state = StateStore::open(&path)?;
                info!(path = ?path, "state store opened");
                state
            }
            None => {
                info!("using in-memory state store");
                StateStore::open_in_memory()?
            }
        };

        let dispatcher = HttpDispatcher::new(config.dispatch_timeout)?;
        info!(timeout = ?config.dispatch_timeout, "dispatcher initialized");

        Ok(Self::new(state, Arc::new(dispatcher), config))
    }

    pub fn new(state: StateStore, dispatcher: Arc<dyn Dispatcher>, config: &Config) -> Self {
        let liveness = LivenessTracker::new(state.clone());
        let inventory = Inventory::new(state, dispatcher, config.environment, liveness.clone());
        info!(
            scheme = config.environment.scheme(),
            node_port = config.environment.node_port(),
            base = config.environment.base_path(),
            "environment configured"
        );
        Self {
            api: ApiState::new(inventory),
            liveness,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.api.clone())
    }

    /// Stop background work before exit.
    pub fn shutdown(&self) {
        self.liveness.stop_all();
    }
}

//! pharos-events — registry push propagation and subscription records.
//!
//! ```text
//! registry ──push──▶ EventPropagator::propagate
//!                      imageName = host/repository
//!                      └─▶ apps with that image ─▶ nodes running them
//!                            └─▶ POST /management/apps/{appId}/events
//! ```

pub mod error;
pub mod push;
pub mod subscription;

pub use error::{EventError, EventResult};
pub use push::{EventPropagator, PushReport, RegistryEvent, RegistryNotification};
pub use subscription::{EventKind, SubscriptionOptions, SubscriptionRequest};

#[cfg(test)]
mod test_support {
    use std::sync::Arc;

    use pharos_dispatch::{Environment, RecordingDispatcher};
    use pharos_inventory::Inventory;
    use pharos_liveness::LivenessTracker;
    use pharos_state::*;
    use serde_json::Map;

    use crate::EventPropagator;

    pub struct Harness {
        pub propagator: EventPropagator,
        pub dispatcher: Arc<RecordingDispatcher>,
    }

    pub fn harness() -> Harness {
        let state = StateStore::open_in_memory().unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let inventory = Inventory::new(
            state.clone(),
            dispatcher.clone(),
            Environment::direct(),
            LivenessTracker::new(state),
        );
        Harness {
            propagator: EventPropagator::new(inventory),
            dispatcher,
        }
    }

    impl Harness {
        pub fn state(&self) -> &StateStore {
            self.propagator.inventory().state()
        }

        pub fn node(&self, ip: &str) -> Node {
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

        /// Insert an app with one image, deployed on `nodes`.
        pub fn app(&self, image: &str, nodes: &[&Node]) -> App {
            let app = self
                .state()
                .insert(App {
                    id: new_id(),
                    images: vec![image.to_string()],
                    services: vec!["web".to_string()],
                    refcnt: nodes.len() as u64,
                })
                .unwrap();
            for node in nodes {
                self.state()
                    .update::<Node>(&node.id, &[Patch::add_to_set("apps", app.id.as_str())])
                    .unwrap();
            }
            app
        }
    }
}

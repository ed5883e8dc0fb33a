//! pharos-inventory — node, group, app, and registry use-cases.
//!
//! # Architecture
//!
//! ```text
//! Inventory (Clone)
//!   ├── StateStore         — entities and relations
//!   ├── Arc<dyn Dispatcher> — commands to node agents
//!   ├── Environment         — node URL construction
//!   └── LivenessTracker     — heartbeat timers
//! ```
//!
//! Node-scoped commands return the node's own [`DispatchResult`]; group-scoped
//! commands return a [`FanOutReport`] with one outcome per member.
//!
//! [`DispatchResult`]: pharos_dispatch::DispatchResult

pub mod apps;
pub mod description;
pub mod error;
pub mod groups;
pub mod inventory;
pub mod nodes;
pub mod registries;
pub mod report;
pub mod search;

pub use apps::{AppCommand, GroupDeployment, NodeDeployment};
pub use description::{AppDescription, app_id, strip_tag};
pub use error::{InventoryError, InventoryResult};
pub use inventory::Inventory;
pub use nodes::{RegisterRequest, Resource};
pub use report::{FanOutReport, NodeOutcome};
pub use search::SearchFilter;

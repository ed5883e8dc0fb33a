//! pharos-liveness — heartbeat watchdog for edge nodes.
//!
//! # Architecture
//!
//! ```text
//! LivenessTracker
//!   ├── Mutex<NodeId → TimerSlot { generation, JoinHandle }>
//!   ├── on_ping()         → cancel + restart countdown (interval + 3 min)
//!   ├── countdown expiry  → status = disconnected (if still current)
//!   └── on_node_deleted() → cancel countdown
//! ```
//!
//! Timer records live only in memory; a restarted anchor learns about
//! nodes again from their next ping. Store failures during status writes
//! are logged and never reported back to the pinging node.

pub mod error;
pub mod tracker;

pub use error::{LivenessError, LivenessResult};
pub use tracker::{LivenessTracker, NETWORK_LATENCY_GRACE_MINUTES};

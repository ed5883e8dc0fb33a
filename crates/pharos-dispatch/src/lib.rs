//! pharos-dispatch — outbound command fan-out to edge nodes.
//!
//! # Architecture
//!
//! ```text
//! Environment (REVERSE_PROXY / SECURED, fixed at startup)
//!   └── node_url(ip, fragments) → scheme://ip:port/base/fragments
//!
//! Dispatcher (trait)
//!   ├── HttpDispatcher      — pooled reqwest client, parallel join
//!   └── RecordingDispatcher — in-process double for tests
//! ```
//!
//! Every target yields exactly one [`DispatchResult`]; the result vector
//! preserves input order and a failed target never aborts the others.

pub mod dispatcher;
pub mod env;
pub mod memory;

pub use dispatcher::{DEFAULT_TIMEOUT, DispatchError, DispatchResult, Dispatcher, HttpDispatcher};
pub use env::{DEFAULT_NODE_PORT, Environment, EnvironmentError};
pub use memory::{DispatchCall, RecordingDispatcher};

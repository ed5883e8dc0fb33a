//! pharos-state — the anchor's inventory store.
//!
//! Backed by [redb](https://docs.rs/redb), holds the authoritative state of
//! nodes, groups, applications, registries, and notification subscriptions.
//!
//! # Architecture
//!
//! Every entity type implements [`Document`] and lives in one redb table.
//! Documents are stored as JSON keyed by their `_id`, which lets a single
//! [`Filter`] / [`Patch`] implementation serve all collections:
//!
//! - `Filter::eq` / `Filter::contains` for equality and array membership
//! - `Patch::set` / `add_to_set` / `pull` / `inc` for atomic field updates
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod id;
pub mod query;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use id::{is_valid_id, new_id};
pub use query::{Condition, Filter, Patch};
pub use store::StateStore;
pub use types::*;

//! redb table definitions for the inventory store.
//!
//! Every collection uses `&str` keys (the document `_id`) and `&[u8]`
//! values holding the JSON-serialized document.

use redb::TableDefinition;

/// Edge nodes keyed by `_id`.
pub const NODE: TableDefinition<&str, &[u8]> = TableDefinition::new("NODE");

/// Deployed applications keyed by description hash.
pub const APP: TableDefinition<&str, &[u8]> = TableDefinition::new("APP");

/// Node groups keyed by `_id`.
pub const GROUP: TableDefinition<&str, &[u8]> = TableDefinition::new("GROUP");

/// Container registries keyed by `_id`.
pub const REGISTRY: TableDefinition<&str, &[u8]> = TableDefinition::new("REGISTRY");

/// App-scoped subscription events keyed by fingerprint.
pub const APP_EVENT: TableDefinition<&str, &[u8]> = TableDefinition::new("APP_EVENT");

/// Node-scoped subscription events keyed by fingerprint.
pub const NODE_EVENT: TableDefinition<&str, &[u8]> = TableDefinition::new("NODE_EVENT");

/// Notification subscribers keyed by `_id`.
pub const SUBSCRIBER: TableDefinition<&str, &[u8]> = TableDefinition::new("SUBSCRIBER");

//! Domain types for the inventory store.
//!
//! Each entity is stored as a JSON document carrying its identifier under
//! `_id`. Set-valued fields are plain arrays; the store's `AddToSet` and
//! `Pull` patches keep them duplicate-free.

use redb::TableDefinition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tables;

/// Identifier of an edge node.
pub type NodeId = String;

/// Identifier of an application (hash of its description).
pub type AppId = String;

/// Identifier of a node group.
pub type GroupId = String;

/// Identifier of a subscription event (fingerprint of its options).
pub type EventId = String;

/// Identifier of a notification subscriber.
pub type SubscriberId = String;

/// The collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Node,
    App,
    Group,
    Registry,
    AppEvent,
    NodeEvent,
    Subscriber,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Node,
        Collection::App,
        Collection::Group,
        Collection::Registry,
        Collection::AppEvent,
        Collection::NodeEvent,
        Collection::Subscriber,
    ];

    /// Stored collection name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Node => "NODE",
            Collection::App => "APP",
            Collection::Group => "GROUP",
            Collection::Registry => "REGISTRY",
            Collection::AppEvent => "APP_EVENT",
            Collection::NodeEvent => "NODE_EVENT",
            Collection::Subscriber => "SUBSCRIBER",
        }
    }

    pub(crate) fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Collection::Node => tables::NODE,
            Collection::App => tables::APP,
            Collection::Group => tables::GROUP,
            Collection::Registry => tables::REGISTRY,
            Collection::AppEvent => tables::APP_EVENT,
            Collection::NodeEvent => tables::NODE_EVENT,
            Collection::Subscriber => tables::SUBSCRIBER,
        }
    }

    /// Fields whose value must be unique across the collection.
    pub fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Registry => &["ip"],
            _ => &[],
        }
    }
}

/// A typed document that lives in exactly one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

macro_rules! document {
    ($ty:ty, $collection:expr) => {
        impl Document for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

// ── Node ──────────────────────────────────────────────────────────

/// Liveness status recorded for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Connected,
    Disconnected,
}

impl From<NodeStatus> for Value {
    fn from(status: NodeStatus) -> Self {
        match status {
            NodeStatus::Connected => Value::from("connected"),
            NodeStatus::Disconnected => Value::from("disconnected"),
        }
    }
}

/// A registered edge node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    #[serde(rename = "_id", default)]
    pub id: NodeId,
    pub ip: String,
    #[serde(default)]
    pub apps: Vec<AppId>,
    pub status: NodeStatus,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Unix timestamp of registration.
    #[serde(default)]
    pub registered_at: u64,
    /// Unix timestamp of the last accepted ping.
    #[serde(default)]
    pub last_ping: u64,
}

document!(Node, Collection::Node);

// ── App ───────────────────────────────────────────────────────────

/// An application deployed on at least one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct App {
    #[serde(rename = "_id", default)]
    pub id: AppId,
    /// Image names without tag, prefixed by their registry if any.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    /// Number of nodes the app is deployed on.
    pub refcnt: u64,
}

document!(App, Collection::App);

// ── Group ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    #[serde(rename = "_id", default)]
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<NodeId>,
}

document!(Group, Collection::Group);

// ── Registry ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub ip: String,
}

document!(Registry, Collection::Registry);

// ── Subscriptions ─────────────────────────────────────────────────

/// Subscription event scoped to applications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppEvent {
    #[serde(rename = "_id", default)]
    pub id: EventId,
    #[serde(default)]
    pub subscribers: Vec<SubscriberId>,
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

document!(AppEvent, Collection::AppEvent);

/// Subscription event scoped to nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeEvent {
    #[serde(rename = "_id", default)]
    pub id: EventId,
    #[serde(default)]
    pub subscribers: Vec<SubscriberId>,
}

document!(NodeEvent, Collection::NodeEvent);

/// A callback endpoint interested in one or more events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscriber {
    #[serde(rename = "_id", default)]
    pub id: SubscriberId,
    pub url: String,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(rename = "eventIds", default)]
    pub event_ids: Vec<EventId>,
}

document!(Subscriber, Collection::Subscriber);

//! Subscription records.
//!
//! A subscription is keyed by a fingerprint of its options, so equal
//! subscriptions share one event entity and each caller gets its own
//! subscriber record. An event lives exactly as long as it has at least
//! one subscriber.

use std::collections::BTreeMap;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use pharos_inventory::SearchFilter;
use pharos_state::id::ID_LEN;
use pharos_state::*;

use crate::error::{EventError, EventResult};
use crate::push::EventPropagator;

/// Body of a subscription request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRequest {
    pub url: String,
    #[serde(default)]
    pub status: Vec<String>,
}

/// Whether a subscription watches apps or nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    App,
    Node,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            EventKind::App => "app",
            EventKind::Node => "node",
        }
    }
}

/// Canonical subscription options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    options: BTreeMap<String, String>,
}

impl SubscriptionOptions {
    /// Accept only the search filter keys; later duplicates win.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> EventResult<Self> {
        let mut options = BTreeMap::new();
        for (key, value) in pairs {
            if !SearchFilter::KEYS.contains(&key) {
                return Err(EventError::UnsupportedOption(key.to_string()));
            }
            options.insert(key.to_string(), value.to_string());
        }
        Ok(Self { options })
    }

    /// App subscriptions name an app or an image; everything else watches
    /// nodes.
    pub fn kind(&self) -> EventKind {
        if self.options.contains_key("appId") || self.options.contains_key("imageName") {
            EventKind::App
        } else {
            EventKind::Node
        }
    }

    /// Deterministic event id for these options.
    ///
    /// Every part is length-prefixed, so values containing `&` or `=` cannot
    /// alias a different set of options.
    pub fn fingerprint(&self) -> EventId {
        let mut hasher = Sha256::new();
        let parts = self
            .options
            .iter()
            .flat_map(|(key, value)| [key.as_str(), value.as_str()]);
        for part in std::iter::once(self.kind().as_str()).chain(parts) {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        hex::encode(&hasher.finalize()[..ID_LEN / 2])
    }

    fn filter(&self) -> EventResult<SearchFilter> {
        Ok(SearchFilter::from_pairs(
            self.options.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )?)
    }
}

impl EventPropagator {
    /// Record a subscriber and attach it to the event for `options`.
    pub fn subscribe(
        &self,
        request: SubscriptionRequest,
        options: &SubscriptionOptions,
    ) -> EventResult<SubscriberId> {
        if request.url.trim().is_empty() {
            return Err(EventError::InvalidParam("subscription url must not be empty".to_string()));
        }

        let event_id = options.fingerprint();
        let subscriber = self.state().insert(Subscriber {
            id: String::new(),
            url: request.url,
            status: request.status,
            event_ids: vec![event_id.clone()],
        })?;

        let attached = match options.kind() {
            EventKind::App => {
                let nodes: Vec<NodeId> = self
                    .inventory()
                    .search_nodes(&options.filter()?)?
                    .into_iter()
                    .map(|n| n.id)
                    .collect();
                self.attach_app_event(&event_id, &subscriber.id, nodes)
            }
            EventKind::Node => self.attach_node_event(&event_id, &subscriber.id),
        };
        if let Err(e) = attached {
            if let Err(cleanup) = self.state().remove::<Subscriber>(&subscriber.id) {
                warn!(subscriber_id = %subscriber.id, error = %cleanup, "failed to roll back subscriber");
            }
            return Err(e);
        }

        info!(subscriber_id = %subscriber.id, %event_id, kind = options.kind().as_str(), "subscription registered");
        Ok(subscriber.id)
    }

    /// Remove a subscriber, deleting events it was the last subscriber of.
    pub fn unsubscribe(&self, subscriber_id: &str) -> EventResult<()> {
        let subscriber = match self.state().get::<Subscriber>(subscriber_id) {
            Ok(s) => s,
            Err(e) if e.is_not_found() => {
                return Err(EventError::NotFound(format!("subscriber {subscriber_id} does not exist")));
            }
            Err(e) => return Err(e.into()),
        };

        self.detach::<AppEvent>(&subscriber.id)?;
        self.detach::<NodeEvent>(&subscriber.id)?;

        self.state().remove::<Subscriber>(&subscriber.id)?;
        info!(%subscriber_id, "subscription removed");
        Ok(())
    }

    pub fn subscriber(&self, subscriber_id: &str) -> EventResult<Subscriber> {
        Ok(self.state().get::<Subscriber>(subscriber_id)?)
    }

    fn state(&self) -> &StateStore {
        self.inventory().state()
    }

    fn attach_app_event(&self, event_id: &str, subscriber_id: &str, nodes: Vec<NodeId>) -> EventResult<()> {
        let patches = [
            Patch::add_to_set("subscribers", subscriber_id),
            Patch::set("nodes", nodes.clone()),
        ];
        self.upsert(event_id, &patches, || AppEvent {
            id: event_id.to_string(),
            subscribers: vec![subscriber_id.to_string()],
            nodes: nodes.clone(),
        })
    }

    fn attach_node_event(&self, event_id: &str, subscriber_id: &str) -> EventResult<()> {
        let patches = [Patch::add_to_set("subscribers", subscriber_id)];
        self.upsert(event_id, &patches, || NodeEvent {
            id: event_id.to_string(),
            subscribers: vec![subscriber_id.to_string()],
        })
    }

    /// Patch an existing event or create it.
    fn upsert<D: Document>(
        &self,
        event_id: &str,
        patches: &[Patch],
        create: impl Fn() -> D,
    ) -> EventResult<()> {
        match self.state().update::<D>(event_id, patches) {
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        match self.state().insert(create()) {
            Ok(_) => {
                debug!(collection = D::COLLECTION.name(), %event_id, "event created");
                Ok(())
            }
            Err(StateError::DuplicateKey { .. }) => {
                self.state().update::<D>(event_id, patches)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn detach<D: Document>(&self, subscriber_id: &str) -> EventResult<()> {
        let events = self
            .state()
            .find::<D>(&Filter::all().contains("subscribers", subscriber_id))?;
        for event in events {
            match self
                .state()
                .pull_or_remove::<D>(event.id(), "subscribers", subscriber_id)
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(collection = D::COLLECTION.name(), event_id = %event.id(), "event removed");
                }
                // Emptied and removed by a concurrent unsubscribe.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;

    fn options(pairs: &[(&str, &str)]) -> SubscriptionOptions {
        SubscriptionOptions::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn request(url: &str) -> SubscriptionRequest {
        SubscriptionRequest {
            url: url.to_string(),
            status: vec!["running".to_string()],
        }
    }

    #[test]
    fn fingerprint_ignores_option_order() {
        let a = options(&[("groupId", "g"), ("nodeId", "n")]);
        let b = options(&[("nodeId", "n"), ("groupId", "g")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), ID_LEN);
        assert_ne!(a.fingerprint(), options(&[("groupId", "g")]).fingerprint());
    }

    #[test]
    fn separators_inside_values_do_not_alias() {
        let packed = options(&[("appId", "x&nodeId=y")]);
        let split = options(&[("appId", "x"), ("nodeId", "y")]);
        assert_ne!(packed.fingerprint(), split.fingerprint());
    }

    #[test]
    fn aliasing_queries_get_separate_events() {
        let h = harness();
        let packed = options(&[("appId", "x&nodeId=y")]);
        let split = options(&[("appId", "x"), ("nodeId", "y")]);

        let s1 = h.propagator.subscribe(request("http://a/cb"), &packed).unwrap();
        let s2 = h.propagator.subscribe(request("http://b/cb"), &split).unwrap();

        assert_eq!(h.state().list::<AppEvent>().unwrap().len(), 2);
        let first: AppEvent = h.state().get(&packed.fingerprint()).unwrap();
        assert_eq!(first.subscribers, vec![s1]);
        let second: AppEvent = h.state().get(&split.fingerprint()).unwrap();
        assert_eq!(second.subscribers, vec![s2]);
    }

    #[test]
    fn kind_follows_options() {
        assert_eq!(options(&[("appId", "a")]).kind(), EventKind::App);
        assert_eq!(options(&[("imageName", "i"), ("nodeId", "n")]).kind(), EventKind::App);
        assert_eq!(options(&[("nodeId", "n")]).kind(), EventKind::Node);
        assert_eq!(options(&[]).kind(), EventKind::Node);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = SubscriptionOptions::from_pairs([("color", "red")]).unwrap_err();
        assert!(matches!(err, EventError::UnsupportedOption(_)));
    }

    #[test]
    fn equal_options_share_one_event() {
        let h = harness();
        let opts = options(&[("nodeId", "n1")]);

        let s1 = h.propagator.subscribe(request("http://a/cb"), &opts).unwrap();
        let s2 = h.propagator.subscribe(request("http://b/cb"), &opts).unwrap();
        assert_ne!(s1, s2);

        let event: NodeEvent = h.state().get(&opts.fingerprint()).unwrap();
        assert_eq!(event.subscribers, vec![s1.clone(), s2.clone()]);

        let subscriber = h.propagator.subscriber(&s1).unwrap();
        assert_eq!(subscriber.event_ids, vec![opts.fingerprint()]);
        assert_eq!(subscriber.status, vec!["running"]);
    }

    #[test]
    fn app_event_resolves_nodes() {
        let h = harness();
        let n1 = h.node("10.0.0.1");
        h.node("10.0.0.2");
        let app = h.app("host/repo", &[&n1]);
        let opts = options(&[("appId", app.id.as_str())]);

        h.propagator.subscribe(request("http://a/cb"), &opts).unwrap();

        let event: AppEvent = h.state().get(&opts.fingerprint()).unwrap();
        assert_eq!(event.nodes, vec![n1.id]);
        assert!(h.state().list::<NodeEvent>().unwrap().is_empty());
    }

    #[test]
    fn last_unsubscribe_removes_event() {
        let h = harness();
        let opts = options(&[("imageName", "host/repo")]);
        let s1 = h.propagator.subscribe(request("http://a/cb"), &opts).unwrap();
        let s2 = h.propagator.subscribe(request("http://b/cb"), &opts).unwrap();

        h.propagator.unsubscribe(&s1).unwrap();
        let event: AppEvent = h.state().get(&opts.fingerprint()).unwrap();
        assert_eq!(event.subscribers, vec![s2.clone()]);

        h.propagator.unsubscribe(&s2).unwrap();
        assert!(h.state().get::<AppEvent>(&opts.fingerprint()).unwrap_err().is_not_found());
        assert!(h.state().list::<Subscriber>().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_unknown_is_not_found() {
        let h = harness();
        let err = h.propagator.unsubscribe("0123456789abcdef01234567").unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }

    #[test]
    fn empty_url_is_rejected() {
        let h = harness();
        let err = h.propagator.subscribe(request(" "), &options(&[])).unwrap_err();
        assert!(matches!(err, EventError::InvalidParam(_)));
        assert!(h.state().list::<Subscriber>().unwrap().is_empty());
    }
}

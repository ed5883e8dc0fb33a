//! Liveness tracker — one countdown task per pinging node.
//!
//! Every accepted ping replaces the node's countdown. When a countdown
//! runs out the node is marked `disconnected`; the next ping after that
//! marks it `connected` again.
//!
//! All timer bookkeeping happens under one mutex. Each countdown carries a
//! generation number and only acts if its generation is still the current
//! one when it fires, so a ping that lands while a countdown is waking up
//! always wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use pharos_state::*;

use crate::error::{LivenessError, LivenessResult};

/// Minutes added to the node's reporting interval before it is declared
/// disconnected.
pub const NETWORK_LATENCY_GRACE_MINUTES: u64 = 3;

const MINUTE: Duration = Duration::from_secs(60);

/// A running countdown for one node.
struct TimerSlot {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    next_generation: u64,
    slots: HashMap<NodeId, TimerSlot>,
}

struct Inner {
    state: StateStore,
    timers: Mutex<Timers>,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by a countdown task when its deadline passes.
    fn expire(&self, node_id: &str, generation: u64) {
        let mut timers = self.timers();
        match timers.slots.get(node_id) {
            Some(slot) if slot.generation == generation => {
                timers.slots.remove(node_id);
            }
            _ => return,
        }

        match self
            .state
            .update::<Node>(node_id, &[Patch::set("status", NodeStatus::Disconnected)])
        {
            Ok(_) => info!(%node_id, "node disconnected"),
            Err(e) => error!(%node_id, error = %e, "failed to mark node disconnected"),
        }
    }
}

/// Tracks node heartbeats and flips node status on expiry.
#[derive(Clone)]
pub struct LivenessTracker {
    inner: Arc<Inner>,
}

impl LivenessTracker {
    pub fn new(state: StateStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                timers: Mutex::new(Timers::default()),
            }),
        }
    }

    /// Process a ping from `node_id`.
    ///
    /// `ip` is the address the ping arrived from, when known; it must match
    /// the registered address. `payload` must carry an integer `interval`
    /// in minutes, as a number or a decimal string.
    pub fn on_ping(&self, node_id: &str, ip: Option<&str>, payload: &Value) -> LivenessResult<()> {
        let node: Node = self.inner.state.get(node_id)?;
        if let Some(ip) = ip {
            if node.ip != ip {
                return Err(LivenessError::AddressMismatch {
                    registered: node.ip,
                    observed: ip.to_string(),
                });
            }
        }

        let interval = parse_interval(payload)?;
        let timeout = Duration::from_secs(
            interval
                .saturating_add(NETWORK_LATENCY_GRACE_MINUTES)
                .saturating_mul(MINUTE.as_secs()),
        );

        let mut timers = self.inner.timers();
        let mut patches = vec![Patch::set("last_ping", epoch_secs())];
        match timers.slots.remove(node_id) {
            Some(previous) => previous.handle.abort(),
            None => {
                // Re-read under the lock: an expiry may have landed since
                // the lookup above.
                let current: Node = self.inner.state.get(node_id)?;
                if current.status == NodeStatus::Disconnected {
                    patches.push(Patch::set("status", NodeStatus::Connected));
                    info!(%node_id, "node reconnected");
                }
            }
        }
        if let Err(e) = self.inner.state.update::<Node>(node_id, &patches) {
            error!(%node_id, error = %e, "failed to record ping");
        }

        let generation = timers.next_generation;
        timers.next_generation += 1;

        let inner = Arc::clone(&self.inner);
        let owned_id = node_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            inner.expire(&owned_id, generation);
        });
        timers.slots.insert(node_id.to_string(), TimerSlot { generation, handle });

        debug!(%node_id, interval, ?timeout, "ping accepted");
        Ok(())
    }

    /// Forget a deleted node, cancelling its countdown if any.
    pub fn on_node_deleted(&self, node_id: &str) {
        if let Some(slot) = self.inner.timers().slots.remove(node_id) {
            slot.handle.abort();
            debug!(%node_id, "liveness timer cancelled");
        }
    }

    /// Whether a countdown is running for `node_id`.
    pub fn is_tracking(&self, node_id: &str) -> bool {
        self.inner.timers().slots.contains_key(node_id)
    }

    /// Number of running countdowns.
    pub fn tracked(&self) -> usize {
        self.inner.timers().slots.len()
    }

    /// Cancel every countdown (for graceful shutdown).
    pub fn stop_all(&self) {
        let mut timers = self.inner.timers();
        for (_, slot) in timers.slots.drain() {
            slot.handle.abort();
        }
        info!("all liveness timers stopped");
    }
}

/// Extract the reporting interval (minutes) from a ping payload.
fn parse_interval(payload: &Value) -> LivenessResult<u64> {
    let raw = payload
        .get("interval")
        .ok_or_else(|| LivenessError::InvalidPayload("missing `interval`".to_string()))?;

    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        LivenessError::InvalidPayload(format!("`interval` must be a non-negative integer, got {raw}"))
    })
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn setup() -> (StateStore, LivenessTracker, String) {
        let state = StateStore::open_in_memory().unwrap();
        let node = state
            .insert(Node {
                id: String::new(),
                ip: "127.0.0.1".to_string(),
                apps: Vec::new(),
                status: NodeStatus::Connected,
                config: Map::new(),
                registered_at: 0,
                last_ping: 0,
            })
            .unwrap();
        let tracker = LivenessTracker::new(state.clone());
        (state, tracker, node.id)
    }

    fn status(state: &StateStore, id: &str) -> NodeStatus {
        state.get::<Node>(id).unwrap().status
    }

    async fn wait(minutes: u64, seconds: u64) {
        tokio::time::sleep(Duration::from_secs(minutes * 60 + seconds)).await;
    }

    #[test]
    fn interval_parsing() {
        assert_eq!(parse_interval(&json!({"interval": "1"})).unwrap(), 1);
        assert_eq!(parse_interval(&json!({"interval": 5})).unwrap(), 5);
        assert!(parse_interval(&json!({})).is_err());
        assert!(parse_interval(&json!({"interval": "soon"})).is_err());
        assert!(parse_interval(&json!({"interval": -1})).is_err());
        assert!(parse_interval(&json!({"interval": 1.5})).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ping_unknown_node_is_not_found() {
        let (_, tracker, _) = setup();
        let err = tracker
            .on_ping("0123456789abcdef01234567", None, &json!({"interval": "1"}))
            .unwrap_err();
        assert!(matches!(err, LivenessError::State(e) if e.is_not_found()));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_from_other_address_is_rejected() {
        let (_, tracker, id) = setup();
        let err = tracker
            .on_ping(&id, Some("10.9.9.9"), &json!({"interval": "1"}))
            .unwrap_err();
        assert!(matches!(err, LivenessError::AddressMismatch { .. }));
        assert!(!tracker.is_tracking(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_without_interval_is_rejected() {
        let (_, tracker, id) = setup();
        let err = tracker.on_ping(&id, None, &json!({})).unwrap_err();
        assert!(matches!(err, LivenessError::InvalidPayload(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_past_interval_plus_grace_disconnects() {
        let (state, tracker, id) = setup();
        let payload = json!({"interval": "1"});

        tracker.on_ping(&id, Some("127.0.0.1"), &payload).unwrap();
        wait(0, 30).await;
        tracker.on_ping(&id, Some("127.0.0.1"), &payload).unwrap();
        assert_eq!(status(&state, &id), NodeStatus::Connected);

        // Deadline is 4 minutes after the second ping.
        wait(3, 50).await;
        assert_eq!(status(&state, &id), NodeStatus::Connected);

        wait(1, 0).await;
        assert_eq!(status(&state, &id), NodeStatus::Disconnected);
        assert!(!tracker.is_tracking(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn regular_pings_keep_node_connected() {
        let (state, tracker, id) = setup();
        let payload = json!({"interval": "1"});

        for _ in 0..10 {
            tracker.on_ping(&id, None, &payload).unwrap();
            wait(3, 0).await;
            assert_eq!(status(&state, &id), NodeStatus::Connected);
        }
        assert_eq!(tracker.tracked(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ping_after_expiry_reconnects() {
        let (state, tracker, id) = setup();
        let payload = json!({"interval": 1});

        tracker.on_ping(&id, None, &payload).unwrap();
        wait(5, 0).await;
        assert_eq!(status(&state, &id), NodeStatus::Disconnected);

        tracker.on_ping(&id, None, &payload).unwrap();
        assert_eq!(status(&state, &id), NodeStatus::Connected);
        assert!(tracker.is_tracking(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn ping_records_timestamp() {
        let (state, tracker, id) = setup();
        tracker.on_ping(&id, None, &json!({"interval": "2"})).unwrap();
        assert!(state.get::<Node>(&id).unwrap().last_ping > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_node_timer_is_cancelled() {
        let (state, tracker, id) = setup();
        tracker.on_ping(&id, None, &json!({"interval": "1"})).unwrap();
        assert!(tracker.is_tracking(&id));

        tracker.on_node_deleted(&id);
        assert!(!tracker.is_tracking(&id));

        wait(10, 0).await;
        assert_eq!(status(&state, &id), NodeStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_clears_timers() {
        let (_, tracker, id) = setup();
        tracker.on_ping(&id, None, &json!({"interval": "1"})).unwrap();

        tracker.stop_all();
        assert_eq!(tracker.tracked(), 0);
    }
}

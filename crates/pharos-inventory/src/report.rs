//! Per-node outcomes of a group-wide command.

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use pharos_dispatch::DispatchResult;
use pharos_state::NodeId;

/// What one node answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutcome {
    pub id: NodeId,
    pub code: u16,
    pub body: Value,
}

impl NodeOutcome {
    pub fn new(id: impl Into<NodeId>, result: &DispatchResult) -> Self {
        Self {
            id: id.into(),
            code: result.status.as_u16(),
            body: result.json(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Aggregated outcome of a command sent to several nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanOutReport {
    pub nodes: Vec<NodeOutcome>,
}

impl FanOutReport {
    pub fn all_succeeded(&self) -> bool {
        self.nodes.iter().all(NodeOutcome::is_success)
    }

    /// `200` when every node succeeded (or there were none), otherwise
    /// `207 Multi-Status`.
    pub fn status(&self) -> StatusCode {
        if self.all_succeeded() {
            StatusCode::OK
        } else {
            StatusCode::MULTI_STATUS
        }
    }
}

impl FromIterator<NodeOutcome> for FanOutReport {
    fn from_iter<I: IntoIterator<Item = NodeOutcome>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

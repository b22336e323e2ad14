//! Mutable per-element state and the step outcome applied by commit.

use serde::{Deserialize, Serialize};

use crate::node::NodeKind;

/// Element lifecycle. Elements never return to `Configured` except through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Configured,
    Active,
}

/// Committed state of a node.
///
/// `throughput` is the supply output, the machine throughput, the delivered
/// quantity at a demand node, or the net charge of a storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeState {
    pub throughput: f64,
    pub level: Option<f64>,
    pub unmet: f64,
}

impl NodeState {
    pub(crate) fn initial(kind: &NodeKind) -> Self {
        let level = match kind {
            NodeKind::Storage(p) => Some(p.initial_level),
            _ => None,
        };
        Self {
            throughput: 0.0,
            level,
            unmet: 0.0,
        }
    }
}

/// Values the dispatcher proposes for one node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub throughput: f64,
    pub level: Option<f64>,
    pub unmet: f64,
}

impl From<NodeOutcome> for NodeState {
    fn from(o: NodeOutcome) -> Self {
        Self {
            throughput: o.throughput,
            level: o.level,
            unmet: o.unmet,
        }
    }
}

/// Proposed values for one step, indexed by arena slot.
///
/// Tombstoned slots hold `None`. Commit rejects the outcome unless both vectors
/// match the arena lengths and every live element has a value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: usize,
    pub nodes: Vec<Option<NodeOutcome>>,
    pub edge_flows: Vec<Option<f64>>,
}

impl StepOutcome {
    pub fn new(step: usize, node_slots: usize, edge_slots: usize) -> Self {
        Self {
            step,
            nodes: vec![None; node_slots],
            edge_flows: vec![None; edge_slots],
        }
    }
}

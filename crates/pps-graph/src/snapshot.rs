//! Immutable per-step records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::PlantGraph;
use crate::node::NodeKindTag;
use crate::signal::{Signal, SignalTarget, StepParameters};

/// State of one node at a committed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub kind: NodeKindTag,
    pub throughput: f64,
    pub level: Option<f64>,
    pub unmet: f64,
    /// Signal values in effect for the step.
    pub signals: BTreeMap<Signal, f64>,
}

/// State of one edge at a committed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub name: String,
    pub source: String,
    pub destination: String,
    pub commodity: String,
    /// Flow leaving the source.
    pub flow: f64,
    /// Flow arriving at the destination after losses.
    pub delivered: f64,
    pub efficiency: f64,
}

/// Record of every live node and edge after one committed step.
///
/// Snapshots are owned by the simulation history and never change after they
/// are appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    step: usize,
    timestamp: Option<NaiveDateTime>,
    objective: f64,
    nodes: Vec<NodeSnapshot>,
    edges: Vec<EdgeSnapshot>,
}

impl Snapshot {
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    /// Objective value of the dispatch solve that produced this step.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn nodes(&self) -> &[NodeSnapshot] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeSnapshot] {
        &self.edges
    }

    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn edge(&self, name: &str) -> Option<&EdgeSnapshot> {
        self.edges.iter().find(|e| e.name == name)
    }

    /// Value a signal took at this step.
    pub fn observed(&self, target: &SignalTarget) -> Option<f64> {
        match target {
            SignalTarget::Node { name, signal } => self.node(name)?.signals.get(signal).copied(),
            SignalTarget::Edge { name, signal } => match signal {
                Signal::Efficiency => self.edge(name).map(|e| e.efficiency),
                _ => None,
            },
        }
    }
}

impl PlantGraph {
    /// Capture the current committed state.
    pub fn snapshot(
        &self,
        step: usize,
        timestamp: Option<NaiveDateTime>,
        objective: f64,
        params: &StepParameters,
    ) -> Snapshot {
        let nodes = self
            .nodes()
            .map(|node| {
                let signals = node
                    .kind()
                    .signals()
                    .iter()
                    .filter_map(|s| Some((*s, node.signal_value(*s, params)?)))
                    .collect();
                let state = node.state();
                NodeSnapshot {
                    name: node.name().to_string(),
                    kind: node.tag(),
                    throughput: state.throughput,
                    level: state.level,
                    unmet: state.unmet,
                    signals,
                }
            })
            .collect();

        let edges = self
            .edges()
            .map(|edge| {
                let efficiency = edge.efficiency_for(params);
                EdgeSnapshot {
                    name: edge.name().to_string(),
                    source: edge.source_name().to_string(),
                    destination: edge.destination_name().to_string(),
                    commodity: edge.commodity().to_string(),
                    flow: edge.flow(),
                    delivered: edge.flow() * efficiency,
                    efficiency,
                }
            })
            .collect();

        Snapshot {
            step,
            timestamp,
            objective,
            nodes,
            edges,
        }
    }
}

//! Per-step parameter overrides.
//!
//! A signal is a node or edge parameter that can change from one step to the
//! next (a demand, a price, a weather-dependent availability, an efficiency).
//! Predictive models produce a value per bound signal; everything unbound keeps
//! its configured value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::node::NodeKindTag;

/// Parameter kinds that can be overridden per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Requested quantity at a demand node.
    Demand,
    /// Unit price at a supply (cost) or demand (revenue) node.
    Price,
    /// Maximum output of a supply node.
    Availability,
    /// Conversion efficiency of a machine or transfer efficiency of an edge.
    Efficiency,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Demand => "demand",
            Signal::Price => "price",
            Signal::Availability => "availability",
            Signal::Efficiency => "efficiency",
        }
    }

    /// Whether a node of the given kind exposes this signal.
    pub fn applies_to_node(self, kind: NodeKindTag) -> bool {
        matches!(
            (kind, self),
            (NodeKindTag::Supply, Signal::Price | Signal::Availability)
                | (NodeKindTag::Demand, Signal::Demand | Signal::Price)
                | (NodeKindTag::Machine, Signal::Efficiency)
        )
    }

    /// Whether edges expose this signal.
    pub fn applies_to_edge(self) -> bool {
        self == Signal::Efficiency
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The element and parameter a predictive model is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum SignalTarget {
    Node { name: String, signal: Signal },
    Edge { name: String, signal: Signal },
}

impl SignalTarget {
    pub fn node(name: impl Into<String>, signal: Signal) -> Self {
        SignalTarget::Node {
            name: name.into(),
            signal,
        }
    }

    pub fn edge(name: impl Into<String>, signal: Signal) -> Self {
        SignalTarget::Edge {
            name: name.into(),
            signal,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SignalTarget::Node { name, .. } | SignalTarget::Edge { name, .. } => name,
        }
    }

    pub fn signal(&self) -> Signal {
        match self {
            SignalTarget::Node { signal, .. } | SignalTarget::Edge { signal, .. } => *signal,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, SignalTarget::Node { .. })
    }
}

impl fmt::Display for SignalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalTarget::Node { name, signal } => write!(f, "node '{}'.{}", name, signal),
            SignalTarget::Edge { name, signal } => write!(f, "edge '{}'.{}", name, signal),
        }
    }
}

/// Values in effect for one step, keyed by element name then signal.
///
/// Ordered maps keep iteration deterministic so two runs with identical inputs
/// build identical dispatch problems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParameters {
    nodes: BTreeMap<String, BTreeMap<Signal, f64>>,
    edges: BTreeMap<String, BTreeMap<Signal, f64>>,
}

impl StepParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, target: &SignalTarget, value: f64) {
        let map = match target {
            SignalTarget::Node { .. } => &mut self.nodes,
            SignalTarget::Edge { .. } => &mut self.edges,
        };
        map.entry(target.name().to_string())
            .or_default()
            .insert(target.signal(), value);
    }

    pub fn get(&self, target: &SignalTarget) -> Option<f64> {
        match target {
            SignalTarget::Node { name, signal } => self.node(name, *signal),
            SignalTarget::Edge { name, signal } => self.edge(name, *signal),
        }
    }

    pub fn node(&self, name: &str, signal: Signal) -> Option<f64> {
        self.nodes.get(name)?.get(&signal).copied()
    }

    pub fn edge(&self, name: &str, signal: Signal) -> Option<f64> {
        self.edges.get(name)?.get(&signal).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.values().map(|m| m.len()).sum::<usize>()
            + self.edges.values().map(|m| m.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all overrides as (target, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (SignalTarget, f64)> + '_ {
        let nodes = self.nodes.iter().flat_map(|(name, m)| {
            m.iter()
                .map(move |(s, v)| (SignalTarget::node(name.clone(), *s), *v))
        });
        let edges = self.edges.iter().flat_map(|(name, m)| {
            m.iter()
                .map(move |(s, v)| (SignalTarget::edge(name.clone(), *s), *v))
        });
        nodes.chain(edges)
    }
}

impl FromIterator<(SignalTarget, f64)> for StepParameters {
    fn from_iter<I: IntoIterator<Item = (SignalTarget, f64)>>(iter: I) -> Self {
        let mut params = StepParameters::new();
        for (target, value) in iter {
            params.set(&target, value);
        }
        params
    }
}

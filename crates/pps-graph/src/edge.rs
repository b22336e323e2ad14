//! Directed commodity flows between nodes.

use pps_core::{EdgeId, NodeId};

use crate::signal::{Signal, StepParameters};
use crate::state::Lifecycle;

/// Everything needed to add an edge to a [`crate::PlantGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    /// Defaults to `"source->destination"`.
    pub name: Option<String>,
    pub source: String,
    pub destination: String,
    pub commodity: String,
    pub min_flow: f64,
    pub max_flow: f64,
    pub efficiency: f64,
    pub cost: f64,
}

impl EdgeSpec {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        commodity: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            source: source.into(),
            destination: destination.into(),
            commodity: commodity.into(),
            min_flow: 0.0,
            max_flow: f64::INFINITY,
            efficiency: 1.0,
            cost: 0.0,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_bounds(mut self, min_flow: f64, max_flow: f64) -> Self {
        self.min_flow = min_flow;
        self.max_flow = max_flow;
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.source, self.destination))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub(crate) name: String,
    pub(crate) source: NodeId,
    pub(crate) destination: NodeId,
    pub(crate) source_name: String,
    pub(crate) destination_name: String,
    pub(crate) commodity: String,
    pub(crate) min_flow: f64,
    pub(crate) max_flow: f64,
    pub(crate) efficiency: f64,
    pub(crate) cost: f64,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) flow: f64,
    pub(crate) history: Vec<f64>,
}

impl Edge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min_flow, self.max_flow)
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Flow leaving the source at the last committed step.
    pub fn flow(&self) -> f64 {
        self.flow
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Transfer efficiency in effect for a step.
    pub fn efficiency_for(&self, params: &StepParameters) -> f64 {
        params
            .edge(&self.name, Signal::Efficiency)
            .unwrap_or(self.efficiency)
    }

    pub(crate) fn reset(&mut self) {
        self.lifecycle = Lifecycle::Configured;
        self.flow = 0.0;
        self.history.clear();
    }
}

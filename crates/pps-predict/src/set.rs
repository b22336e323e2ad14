//! Model bindings and per-step parallel evaluation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use pps_core::ensure_finite;
use pps_graph::{PlantGraph, SignalTarget, Snapshot, TopologyError};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{PredictionError, PredictionResult};
use crate::model::{PredictionContext, PredictiveModel};

/// A model bound to one node or edge signal.
#[derive(Clone)]
pub struct Binding {
    pub target: SignalTarget,
    pub model: Arc<dyn PredictiveModel>,
}

/// All bindings of a plant.
#[derive(Clone, Default)]
pub struct PredictorSet {
    bindings: Vec<Binding>,
}

impl PredictorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, target: SignalTarget, model: impl PredictiveModel + 'static) -> &mut Self {
        self.bind_shared(target, Arc::new(model))
    }

    pub fn bind_shared(&mut self, target: SignalTarget, model: Arc<dyn PredictiveModel>) -> &mut Self {
        self.bindings.push(Binding { target, model });
        self
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Check every binding against the graph: the element must exist, expose
    /// the signal, and be bound at most once.
    pub fn validate_against(&self, graph: &PlantGraph) -> Vec<TopologyError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for binding in &self.bindings {
            let target = &binding.target;
            let invalid = |reason: String| TopologyError::InvalidBinding {
                target: target.to_string(),
                reason,
            };

            if !seen.insert(target.clone()) {
                out.push(invalid("bound more than once".into()));
                continue;
            }
            match target {
                SignalTarget::Node { name, signal } => match graph.node_by_name(name) {
                    None => out.push(invalid(format!("no node named '{name}'"))),
                    Some(node) if !signal.applies_to_node(node.tag()) => out.push(invalid(format!(
                        "{} nodes have no '{}' signal",
                        node.tag().as_str(),
                        signal
                    ))),
                    Some(_) => {}
                },
                SignalTarget::Edge { name, signal } => match graph.edge_by_name(name) {
                    None => out.push(invalid(format!("no edge named '{name}'"))),
                    Some(_) if !signal.applies_to_edge() => {
                        out.push(invalid(format!("edges have no '{signal}' signal")))
                    }
                    Some(_) => {}
                },
            }
        }
        out
    }

    /// Evaluate every binding for `step`, in parallel.
    ///
    /// Snapshots at or after `step` are hidden from the models. Results are in
    /// binding order. The first failing binding fails the whole step.
    pub fn evaluate(
        &self,
        step: usize,
        timestamp: Option<NaiveDateTime>,
        history: &[Snapshot],
    ) -> PredictionResult<Vec<(SignalTarget, f64)>> {
        let values = self
            .bindings
            .par_iter()
            .map(|b| evaluate_one(b, step, timestamp, history))
            .collect::<PredictionResult<Vec<_>>>()?;
        debug!(step, bindings = values.len(), "predictions evaluated");
        Ok(values)
    }
}

fn evaluate_one(
    binding: &Binding,
    step: usize,
    timestamp: Option<NaiveDateTime>,
    history: &[Snapshot],
) -> PredictionResult<(SignalTarget, f64)> {
    let ctx = PredictionContext::new(step, timestamp, &binding.target, history);
    let mean = binding.model.predict(&ctx)?.mean();
    let value = ensure_finite(mean, "prediction").map_err(|_| PredictionError::NonFinite {
        target: binding.target.to_string(),
        step,
        value: mean,
    })?;
    Ok((binding.target.clone(), value))
}

impl std::fmt::Debug for PredictorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| &b.target))
            .finish()
    }
}

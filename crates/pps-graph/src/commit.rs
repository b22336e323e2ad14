//! The commit protocol: the only way state changes on a sealed graph.
//!
//! Commit runs in two phases. The first checks every proposed value against the
//! declared bounds and the per-kind balance equations without touching the
//! graph; the second applies them. A rejected outcome leaves the graph exactly
//! as it was.

use pps_core::{Tolerances, nearly_equal, within_bounds};

use crate::error::CommitError;
use crate::graph::PlantGraph;
use crate::node::{Node, NodeKind};
use crate::signal::{Signal, StepParameters};
use crate::state::{Lifecycle, NodeOutcome, StepOutcome};

impl PlantGraph {
    /// Apply a step outcome after re-checking it.
    ///
    /// `params` must be the overrides the outcome was computed with, so demand,
    /// availability and efficiencies are checked against the values the
    /// dispatcher actually used.
    pub fn commit(
        &mut self,
        outcome: &StepOutcome,
        params: &StepParameters,
        tol: Tolerances,
    ) -> Result<(), CommitError> {
        self.check_outcome(outcome, params, tol)?;

        for (slot, edge) in self.edges.iter_mut().enumerate() {
            if let (Some(edge), Some(Some(flow))) = (edge.as_mut(), outcome.edge_flows.get(slot)) {
                edge.flow = *flow;
                edge.history.push(*flow);
                edge.lifecycle = Lifecycle::Active;
            }
        }
        for (slot, node) in self.nodes.iter_mut().enumerate() {
            if let (Some(node), Some(Some(values))) = (node.as_mut(), outcome.nodes.get(slot)) {
                node.state = (*values).into();
                node.history.push(node.state);
                node.lifecycle = Lifecycle::Active;
            }
        }
        self.committed_steps += 1;
        Ok(())
    }

    fn check_outcome(
        &self,
        outcome: &StepOutcome,
        params: &StepParameters,
        tol: Tolerances,
    ) -> Result<(), CommitError> {
        if outcome.step != self.committed_steps {
            return Err(CommitError::OutOfOrder {
                expected: self.committed_steps,
                got: outcome.step,
            });
        }
        if outcome.nodes.len() != self.node_slots() {
            return Err(CommitError::ShapeMismatch {
                what: "nodes",
                expected: self.node_slots(),
                got: outcome.nodes.len(),
            });
        }
        if outcome.edge_flows.len() != self.edge_slots() {
            return Err(CommitError::ShapeMismatch {
                what: "edge flows",
                expected: self.edge_slots(),
                got: outcome.edge_flows.len(),
            });
        }

        for edge in self.edges() {
            let element = format!("edge '{}'", edge.name());
            let flow = outcome.edge_flows[edge.id().slot()]
                .ok_or_else(|| CommitError::MissingValue {
                    element: element.clone(),
                })?;
            let (min, max) = edge.bounds();
            check_bound(&element, "flow", flow, min, max, tol)?;
            let efficiency = edge.efficiency_for(params);
            if !(efficiency > 0.0 && efficiency <= 1.0) {
                return Err(CommitError::InvalidParameter {
                    element,
                    parameter: "efficiency",
                    value: efficiency,
                    expected: "must lie in (0, 1]",
                });
            }
        }

        for node in self.nodes() {
            let values = outcome.nodes[node.id().slot()].ok_or_else(|| CommitError::MissingValue {
                element: format!("node '{}'", node.name()),
            })?;
            self.check_node(node, &values, outcome, params, tol)?;
        }
        Ok(())
    }

    fn check_node(
        &self,
        node: &Node,
        values: &NodeOutcome,
        outcome: &StepOutcome,
        params: &StepParameters,
        tol: Tolerances,
    ) -> Result<(), CommitError> {
        let element = format!("node '{}'", node.name());
        let flow_of = |slot: usize| outcome.edge_flows[slot].unwrap_or(0.0);

        // Delivered inflow and raw outflow, restricted to one commodity.
        let inflow = |commodity: &str| -> f64 {
            self.inbound_edges(node.id())
                .iter()
                .filter_map(|e| self.edge(*e))
                .filter(|e| e.commodity() == commodity)
                .map(|e| flow_of(e.id().slot()) * e.efficiency_for(params))
                .sum()
        };
        let outflow = |commodity: &str| -> f64 {
            self.outbound_edges(node.id())
                .iter()
                .filter_map(|e| self.edge(*e))
                .filter(|e| e.commodity() == commodity)
                .map(|e| flow_of(e.id().slot()))
                .sum()
        };

        match node.kind() {
            NodeKind::Supply(p) => {
                let availability = params
                    .node(node.name(), Signal::Availability)
                    .unwrap_or(p.max_output);
                check_bound(&element, "throughput", values.throughput, p.min_output, availability, tol)?;
                check_balance(node, &p.commodity, outflow(&p.commodity), values.throughput, tol)?;
            }
            NodeKind::Demand(p) => {
                let demand = params.node(node.name(), Signal::Demand).unwrap_or(p.demand);
                let max_unmet = if p.unmet_penalty.is_some() { demand } else { 0.0 };
                check_bound(&element, "unmet", values.unmet, 0.0, max_unmet, tol)?;
                let delivered = inflow(&p.commodity);
                check_balance(node, &p.commodity, delivered + values.unmet, demand, tol)?;
                check_balance(node, &p.commodity, values.throughput, delivered, tol)?;
            }
            NodeKind::Machine(p) => {
                check_bound(
                    &element,
                    "throughput",
                    values.throughput,
                    p.min_throughput,
                    p.max_throughput,
                    tol,
                )?;
                check_balance(node, &p.input, inflow(&p.input), values.throughput, tol)?;
                let efficiency = params.node(node.name(), Signal::Efficiency).unwrap_or(1.0);
                if !(efficiency.is_finite() && efficiency >= 0.0) {
                    return Err(CommitError::InvalidParameter {
                        element,
                        parameter: "efficiency",
                        value: efficiency,
                        expected: "must be non-negative",
                    });
                }
                if let Some((lo, hi)) = p.setpoints.as_ref().and_then(|c| c.range()) {
                    check_bound(&element, "setpoint", values.throughput, lo, hi, tol)?;
                }
                for commodity in p.output_commodities() {
                    let produced = efficiency * p.produced(commodity, values.throughput).unwrap_or(0.0);
                    check_balance(node, commodity, outflow(commodity), produced, tol)?;
                }
            }
            NodeKind::Storage(p) => {
                let level = values.level.ok_or_else(|| CommitError::MissingValue {
                    element: format!("{} level", element),
                })?;
                check_bound(&element, "level", level, p.min_level, p.max_level, tol)?;

                let charge = inflow(&p.commodity);
                let discharge = outflow(&p.commodity);
                if let Some(rate) = p.max_charge {
                    check_bound(&element, "charge", charge, 0.0, rate, tol)?;
                }
                if let Some(rate) = p.max_discharge {
                    check_bound(&element, "discharge", discharge, 0.0, rate, tol)?;
                }

                let previous = node.state().level.unwrap_or(p.initial_level);
                let expected = (1.0 - p.dissipation) * previous + charge - discharge;
                check_balance(node, &p.commodity, level, expected, tol)?;
            }
        }
        Ok(())
    }
}

fn check_bound(
    element: &str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    tol: Tolerances,
) -> Result<(), CommitError> {
    if value.is_finite() && within_bounds(value, min, max, tol) {
        Ok(())
    } else {
        Err(CommitError::OutOfBounds {
            element: element.to_string(),
            field,
            value,
            min,
            max,
        })
    }
}

fn check_balance(
    node: &Node,
    commodity: &str,
    actual: f64,
    expected: f64,
    tol: Tolerances,
) -> Result<(), CommitError> {
    if nearly_equal(actual, expected, tol) {
        Ok(())
    } else {
        Err(CommitError::Imbalance {
            node: node.name().to_string(),
            commodity: commodity.to_string(),
            residual: actual - expected,
        })
    }
}

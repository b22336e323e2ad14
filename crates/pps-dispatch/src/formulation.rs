//! Translation between a plant graph and a [`DispatchProblem`].
//!
//! Variables: one flow per live edge, one throughput per supply and machine,
//! one level per storage, one unmet slack per penalized demand.
//!
//! Rows:
//! - supply: Σ out = throughput
//! - demand: Σ eff·in + unmet = demand
//! - machine: Σ eff·in = throughput, and Σ out(c) = ratio_c · efficiency · throughput;
//!   a machine with a setpoint curve instead picks weights λ_k ≥ 0 with Σ λ_k = 1,
//!   throughput = Σ λ_k · x_k and Σ out(c) = efficiency · Σ λ_k · y_ck
//! - storage: level − Σ eff·in + Σ out = (1 − dissipation) · previous level,
//!   plus optional charge and discharge rate rows

use pps_core::snap_to_bounds;
use pps_graph::{NodeKind, NodeOutcome, PlantGraph, Signal, StepOutcome, StepParameters};

use crate::error::DispatchErrorReason;
use crate::options::ObjectiveWeights;
use crate::problem::{Assignment, DispatchProblem, Sense, VarId};

#[derive(Debug, Clone, Copy, Default)]
struct NodeVars {
    throughput: Option<VarId>,
    level: Option<VarId>,
    unmet: Option<VarId>,
}

#[derive(Debug)]
pub(crate) struct Formulation {
    pub problem: DispatchProblem,
    edge_vars: Vec<Option<VarId>>,
    edge_efficiency: Vec<f64>,
    node_vars: Vec<Option<NodeVars>>,
}

pub(crate) fn formulate(
    graph: &PlantGraph,
    params: &StepParameters,
    step: usize,
    weights: &ObjectiveWeights,
) -> Result<Formulation, DispatchErrorReason> {
    let mut problem = DispatchProblem::new(step);
    let mut edge_vars = vec![None; graph.edge_slots()];
    let mut edge_efficiency = vec![1.0; graph.edge_slots()];
    let mut node_vars = vec![None; graph.node_slots()];

    for edge in graph.edges() {
        let (min, max) = edge.bounds();
        let name = format!("flow[{}]", edge.name());
        check_bounds(&name, min, max)?;
        let var = problem.add_variable(name, min, max);
        problem.add_objective(var, weights.cost * edge.cost());

        let efficiency = fraction(&format!("efficiency[{}]", edge.name()), edge.efficiency_for(params))?;
        edge_vars[edge.id().slot()] = Some(var);
        edge_efficiency[edge.id().slot()] = efficiency;
    }

    for node in graph.nodes() {
        let name = node.name();
        // (flow var, delivered fraction) for inbound edges; flow var for outbound
        let inbound: Vec<(VarId, f64, &str)> = graph
            .inbound_edges(node.id())
            .iter()
            .filter_map(|e| graph.edge(*e))
            .filter_map(|e| {
                let slot = e.id().slot();
                Some((edge_vars[slot]?, edge_efficiency[slot], e.commodity()))
            })
            .collect();
        let outbound: Vec<(VarId, &str)> = graph
            .outbound_edges(node.id())
            .iter()
            .filter_map(|e| graph.edge(*e))
            .filter_map(|e| Some((edge_vars[e.id().slot()]?, e.commodity())))
            .collect();
        let delivered = |commodity: &str, sign: f64| -> Vec<(VarId, f64)> {
            inbound
                .iter()
                .filter(|(_, _, c)| *c == commodity)
                .map(|(v, eff, _)| (*v, sign * eff))
                .collect()
        };
        let leaving = |commodity: &str, sign: f64| -> Vec<(VarId, f64)> {
            outbound
                .iter()
                .filter(|(_, c)| *c == commodity)
                .map(|(v, _)| (*v, sign))
                .collect()
        };

        let mut vars = NodeVars::default();
        match node.kind() {
            NodeKind::Supply(p) => {
                let availability = non_negative(
                    &format!("availability[{name}]"),
                    params.node(name, Signal::Availability).unwrap_or(p.max_output),
                )?;
                let price = finite(
                    &format!("price[{name}]"),
                    params.node(name, Signal::Price).unwrap_or(p.price),
                )?;
                if availability < p.min_output {
                    // minimum output cannot be met this step
                    return Err(DispatchErrorReason::Infeasible);
                }
                let thr = problem.add_variable(format!("throughput[{name}]"), p.min_output, availability);
                let mut terms = leaving(&p.commodity, 1.0);
                terms.push((thr, -1.0));
                problem.add_constraint(format!("balance[{name}]"), terms, Sense::Eq, 0.0);
                problem.add_objective(thr, weights.cost * price);
                vars.throughput = Some(thr);
            }
            NodeKind::Demand(p) => {
                let demand = finite(
                    &format!("demand[{name}]"),
                    params.node(name, Signal::Demand).unwrap_or(p.demand),
                )?;
                if demand < 0.0 {
                    return Err(DispatchErrorReason::Formulation {
                        what: format!("negative demand {demand} at '{name}'"),
                    });
                }
                let price = finite(
                    &format!("price[{name}]"),
                    params.node(name, Signal::Price).unwrap_or(p.price),
                )?;
                let mut terms = delivered(&p.commodity, 1.0);
                for (var, eff) in &terms {
                    problem.add_objective(*var, -weights.cost * price * eff);
                }
                if let Some(penalty) = p.unmet_penalty {
                    let unmet = problem.add_variable(format!("unmet[{name}]"), 0.0, demand);
                    problem.add_objective(unmet, weights.unmet_demand * penalty);
                    terms.push((unmet, 1.0));
                    vars.unmet = Some(unmet);
                }
                problem.add_constraint(format!("balance[{name}]"), terms, Sense::Eq, demand);
            }
            NodeKind::Machine(p) => {
                let efficiency = non_negative(
                    &format!("efficiency[{name}]"),
                    params.node(name, Signal::Efficiency).unwrap_or(1.0),
                )?;
                check_bounds(name, p.min_throughput, p.max_throughput)?;
                let thr = problem.add_variable(
                    format!("throughput[{name}]"),
                    p.min_throughput,
                    p.max_throughput,
                );
                let mut terms = delivered(&p.input, 1.0);
                terms.push((thr, -1.0));
                problem.add_constraint(format!("input[{name}]"), terms, Sense::Eq, 0.0);
                match &p.setpoints {
                    None => {
                        for o in &p.outputs {
                            let mut terms = leaving(&o.commodity, 1.0);
                            terms.push((thr, -o.ratio * efficiency));
                            problem.add_constraint(
                                format!("output[{name}.{}]", o.commodity),
                                terms,
                                Sense::Eq,
                                0.0,
                            );
                        }
                    }
                    Some(curve) => {
                        // convex combination of breakpoints; exact on concave curves
                        let lambdas: Vec<VarId> = (0..curve.input.len())
                            .map(|k| problem.add_variable(format!("setpoint[{name}.{k}]"), 0.0, 1.0))
                            .collect();
                        problem.add_constraint(
                            format!("setpoint[{name}]"),
                            lambdas.iter().map(|w| (*w, 1.0)).collect(),
                            Sense::Eq,
                            1.0,
                        );
                        let mut terms = vec![(thr, 1.0)];
                        terms.extend(lambdas.iter().zip(&curve.input).map(|(w, x)| (*w, -x)));
                        problem.add_constraint(format!("operating[{name}]"), terms, Sense::Eq, 0.0);
                        for o in &curve.outputs {
                            if o.values.len() != lambdas.len() {
                                return Err(DispatchErrorReason::Formulation {
                                    what: format!("setpoint curve of '{name}' for '{}'", o.commodity),
                                });
                            }
                            let mut terms = leaving(&o.commodity, 1.0);
                            terms.extend(
                                lambdas
                                    .iter()
                                    .zip(&o.values)
                                    .map(|(w, y)| (*w, -y * efficiency)),
                            );
                            problem.add_constraint(
                                format!("output[{name}.{}]", o.commodity),
                                terms,
                                Sense::Eq,
                                0.0,
                            );
                        }
                    }
                }
                problem.add_objective(thr, weights.cost * p.cost);
                vars.throughput = Some(thr);
            }
            NodeKind::Storage(p) => {
                check_bounds(name, p.min_level, p.max_level)?;
                let level = problem.add_variable(format!("level[{name}]"), p.min_level, p.max_level);
                let previous = node.state().level.unwrap_or(p.initial_level);

                let mut terms = vec![(level, 1.0)];
                terms.extend(delivered(&p.commodity, -1.0));
                terms.extend(leaving(&p.commodity, 1.0));
                problem.add_constraint(
                    format!("evolution[{name}]"),
                    terms,
                    Sense::Eq,
                    (1.0 - p.dissipation) * previous,
                );
                if let Some(rate) = p.max_charge {
                    problem.add_constraint(
                        format!("charge[{name}]"),
                        delivered(&p.commodity, 1.0),
                        Sense::Le,
                        rate,
                    );
                }
                if let Some(rate) = p.max_discharge {
                    problem.add_constraint(
                        format!("discharge[{name}]"),
                        leaving(&p.commodity, 1.0),
                        Sense::Le,
                        rate,
                    );
                }
                problem.add_objective(level, -weights.storage_value);
                vars.level = Some(level);
            }
        }
        node_vars[node.id().slot()] = Some(vars);
    }

    Ok(Formulation {
        problem,
        edge_vars,
        edge_efficiency,
        node_vars,
    })
}

impl Formulation {
    /// Read the assignment back into per-slot values, snapping near-bound
    /// values onto their bounds.
    pub fn extract(&self, graph: &PlantGraph, values: &Assignment, epsilon: f64) -> StepOutcome {
        let snapped = |var: VarId| {
            let def = self.problem.variable(var);
            snap_to_bounds(values.value(var), def.lower, def.upper, epsilon)
        };

        let mut outcome = StepOutcome::new(self.problem.step, graph.node_slots(), graph.edge_slots());
        for (slot, var) in self.edge_vars.iter().enumerate() {
            outcome.edge_flows[slot] = var.map(snapped);
        }
        let flow = |slot: usize| outcome.edge_flows[slot].unwrap_or(0.0);

        let mut nodes = vec![None; graph.node_slots()];
        for node in graph.nodes() {
            let Some(vars) = self.node_vars[node.id().slot()] else {
                continue;
            };
            let inflow: f64 = graph
                .inbound_edges(node.id())
                .iter()
                .map(|e| flow(e.slot()) * self.edge_efficiency[e.slot()])
                .sum();
            let outflow: f64 = graph
                .outbound_edges(node.id())
                .iter()
                .map(|e| flow(e.slot()))
                .sum();

            let throughput = match node.kind() {
                NodeKind::Supply(_) | NodeKind::Machine(_) => vars.throughput.map_or(0.0, snapped),
                NodeKind::Demand(_) => inflow,
                NodeKind::Storage(_) => inflow - outflow,
            };
            nodes[node.id().slot()] = Some(NodeOutcome {
                throughput,
                level: vars.level.map(snapped),
                unmet: vars.unmet.map_or(0.0, snapped),
            });
        }
        outcome.nodes = nodes;
        outcome
    }
}

fn finite(what: &str, value: f64) -> Result<f64, DispatchErrorReason> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DispatchErrorReason::Formulation {
            what: format!("{what} is not finite ({value})"),
        })
    }
}

/// Transfer efficiencies live in (0, 1]; anything above 1 would create energy.
fn fraction(what: &str, value: f64) -> Result<f64, DispatchErrorReason> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(DispatchErrorReason::Formulation {
            what: format!("{what} = {value} outside (0, 1]"),
        })
    }
}

fn non_negative(what: &str, value: f64) -> Result<f64, DispatchErrorReason> {
    let value = finite(what, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(DispatchErrorReason::Formulation {
            what: format!("{what} = {value} is negative"),
        })
    }
}

fn check_bounds(what: &str, min: f64, max: f64) -> Result<(), DispatchErrorReason> {
    if min.is_finite() && min <= max {
        Ok(())
    } else {
        Err(DispatchErrorReason::Formulation {
            what: format!("{what}: bounds [{min}, {max}]"),
        })
    }
}

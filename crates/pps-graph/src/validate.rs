//! Whole-graph validation.
//!
//! Every check appends to a single list so the caller sees all problems at once.

use crate::edge::Edge;
use crate::error::TopologyError;
use crate::graph::PlantGraph;
use crate::node::{MachineParams, Node, NodeKind, SetpointCurve};

pub(crate) fn collect_violations(graph: &PlantGraph) -> Vec<TopologyError> {
    let mut out = Vec::new();
    for edge in graph.edges() {
        check_edge(graph, edge, &mut out);
    }
    for node in graph.nodes() {
        check_node(node, &mut out);
        check_connectivity(graph, node, &mut out);
    }
    out
}

fn check_edge(graph: &PlantGraph, edge: &Edge, out: &mut Vec<TopologyError>) {
    if graph.node(edge.source).is_none() {
        out.push(TopologyError::DanglingEdge {
            edge: edge.name.clone(),
            missing: edge.source_name.clone(),
        });
    }
    if graph.node(edge.destination).is_none() {
        out.push(TopologyError::DanglingEdge {
            edge: edge.name.clone(),
            missing: edge.destination_name.clone(),
        });
    }

    let element = format!("edge '{}'", edge.name);
    check_range(&element, ("min_flow", edge.min_flow), ("max_flow", edge.max_flow), out);
    if !(edge.efficiency > 0.0 && edge.efficiency <= 1.0) {
        out.push(TopologyError::InvalidCoefficient {
            element: element.clone(),
            field: "efficiency",
            value: edge.efficiency,
            expected: "must lie in (0, 1]",
        });
    }
    check_finite(&element, "cost", edge.cost, out);
}

fn check_node(node: &Node, out: &mut Vec<TopologyError>) {
    let element = format!("node '{}'", node.name);
    match &node.kind {
        NodeKind::Supply(p) => {
            check_range(&element, ("min_output", p.min_output), ("max_output", p.max_output), out);
            check_finite(&element, "price", p.price, out);
        }
        NodeKind::Demand(p) => {
            check_non_negative(&element, "demand", p.demand, out);
            check_finite(&element, "price", p.price, out);
            if let Some(penalty) = p.unmet_penalty {
                check_non_negative(&element, "unmet_penalty", penalty, out);
            }
        }
        NodeKind::Machine(p) => {
            check_range(
                &element,
                ("min_throughput", p.min_throughput),
                ("max_throughput", p.max_throughput),
                out,
            );
            check_finite(&element, "cost", p.cost, out);
            if p.output_commodities().is_empty() {
                out.push(TopologyError::EmptyConversion {
                    node: node.name.clone(),
                });
            }
            if let Some(curve) = &p.setpoints {
                if !p.outputs.is_empty() {
                    out.push(TopologyError::AmbiguousConversion {
                        node: node.name.clone(),
                    });
                }
                check_curve(node, p, curve, out);
            }
            for o in &p.outputs {
                if !(o.ratio.is_finite() && o.ratio > 0.0) {
                    out.push(TopologyError::InvalidCoefficient {
                        element: element.clone(),
                        field: "ratio",
                        value: o.ratio,
                        expected: "must be positive",
                    });
                }
            }
        }
        NodeKind::Storage(p) => {
            check_range(&element, ("min_level", p.min_level), ("max_level", p.max_level), out);
            if p.max_level.is_infinite() {
                out.push(TopologyError::InvalidCoefficient {
                    element: element.clone(),
                    field: "max_level",
                    value: p.max_level,
                    expected: "must be finite",
                });
            }
            if !(0.0..=1.0).contains(&p.dissipation) {
                out.push(TopologyError::InvalidCoefficient {
                    element: element.clone(),
                    field: "dissipation",
                    value: p.dissipation,
                    expected: "must lie in [0, 1]",
                });
            }
            if !(p.min_level..=p.max_level).contains(&p.initial_level) {
                out.push(TopologyError::InitialLevelOutOfBounds {
                    node: node.name.clone(),
                    level: p.initial_level,
                    min: p.min_level,
                    max: p.max_level,
                });
            }
            if let Some(rate) = p.max_charge {
                check_non_negative(&element, "max_charge", rate, out);
            }
            if let Some(rate) = p.max_discharge {
                check_non_negative(&element, "max_discharge", rate, out);
            }
        }
    }
}

fn check_connectivity(graph: &PlantGraph, node: &Node, out: &mut Vec<TopologyError>) {
    let has_inflow = |commodity: &str| {
        graph
            .inbound_edges(node.id)
            .iter()
            .filter_map(|e| graph.edge(*e))
            .any(|e| e.commodity == commodity)
    };
    let has_outflow = |commodity: &str| {
        graph
            .outbound_edges(node.id)
            .iter()
            .filter_map(|e| graph.edge(*e))
            .any(|e| e.commodity == commodity)
    };

    match &node.kind {
        NodeKind::Demand(p) if !has_inflow(&p.commodity) => {
            out.push(TopologyError::MissingInflow {
                node: node.name.clone(),
                commodity: p.commodity.clone(),
            });
        }
        NodeKind::Machine(p) => {
            if !has_inflow(&p.input) {
                out.push(TopologyError::MissingInflow {
                    node: node.name.clone(),
                    commodity: p.input.clone(),
                });
            }
            for commodity in p.output_commodities() {
                if !has_outflow(commodity) {
                    out.push(TopologyError::MissingOutflow {
                        node: node.name.clone(),
                        commodity: commodity.to_string(),
                    });
                }
            }
        }
        _ => {}
    }
}

fn check_curve(node: &Node, p: &MachineParams, curve: &SetpointCurve, out: &mut Vec<TopologyError>) {
    let element = format!("node '{}'", node.name);
    let increasing = curve.input.windows(2).all(|w| w[0] < w[1]);
    match curve.range() {
        Some((lo, hi)) if increasing && lo.is_finite() && hi.is_finite() && lo >= 0.0 => {
            // the machine runs where its bounds and its curve overlap
            let min = p.min_throughput.max(lo);
            let max = p.max_throughput.min(hi);
            if min > max {
                out.push(TopologyError::InvertedBounds {
                    element: element.clone(),
                    min,
                    max,
                });
            }
        }
        Some((lo, _)) => out.push(TopologyError::InvalidCoefficient {
            element: element.clone(),
            field: "setpoints.input",
            value: lo,
            expected: "must be finite, non-negative and strictly increasing",
        }),
        None if !curve.outputs.is_empty() => out.push(TopologyError::EmptyConversion {
            node: node.name.clone(),
        }),
        None => {}
    }
    for o in &curve.outputs {
        if o.values.len() != curve.input.len() {
            out.push(TopologyError::CurveShape {
                node: node.name.clone(),
                commodity: o.commodity.clone(),
                expected: curve.input.len(),
                got: o.values.len(),
            });
        }
        if let Some(bad) = o.values.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            out.push(TopologyError::InvalidCoefficient {
                element: element.clone(),
                field: "setpoints.values",
                value: *bad,
                expected: "must be finite and non-negative",
            });
        }
    }
}

fn check_range(
    element: &str,
    (min_field, min): (&'static str, f64),
    (max_field, max): (&'static str, f64),
    out: &mut Vec<TopologyError>,
) {
    check_non_negative(element, min_field, min, out);
    check_non_negative(element, max_field, max, out);
    if min > max {
        out.push(TopologyError::InvertedBounds {
            element: element.to_string(),
            min,
            max,
        });
    }
}

fn check_non_negative(element: &str, field: &'static str, value: f64, out: &mut Vec<TopologyError>) {
    if value.is_nan() {
        out.push(TopologyError::InvalidCoefficient {
            element: element.to_string(),
            field,
            value,
            expected: "must be a number",
        });
    } else if value < 0.0 {
        out.push(TopologyError::NegativeCapacity {
            element: element.to_string(),
            field,
            value,
        });
    }
}

fn check_finite(element: &str, field: &'static str, value: f64, out: &mut Vec<TopologyError>) {
    if !value.is_finite() {
        out.push(TopologyError::InvalidCoefficient {
            element: element.to_string(),
            field,
            value,
            expected: "must be finite",
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::edge::EdgeSpec;
    use crate::error::TopologyError;
    use crate::graph::PlantGraph;
    use crate::node::{
        DemandParams, MachineParams, NodeSpec, SetpointCurve, StorageParams, SupplyParams,
    };

    #[test]
    fn reports_every_violation_at_once() {
        let mut g = PlantGraph::new();
        g.add_node(NodeSpec::new("grid", SupplyParams::new("power", 100.0)))
            .unwrap();
        g.add_node(NodeSpec::new("town", DemandParams::new("power", 60.0)))
            .unwrap();
        g.add_node(NodeSpec::new(
            "tank",
            StorageParams::new("power", 10.0)
                .with_initial_level(20.0)
                .with_dissipation(1.5),
        ))
        .unwrap();
        g.add_edge(
            EdgeSpec::new("grid", "town", "power")
                .with_bounds(-1.0, 50.0)
                .with_efficiency(1.2),
        )
        .unwrap();

        let err = g.validate().unwrap_err();
        assert!(err.contains(|v| matches!(v, TopologyError::NegativeCapacity { field: "min_flow", .. })));
        assert!(err.contains(|v| matches!(v, TopologyError::InvalidCoefficient { field: "efficiency", .. })));
        assert!(err.contains(|v| matches!(v, TopologyError::InvalidCoefficient { field: "dissipation", .. })));
        assert!(err.contains(|v| matches!(v, TopologyError::InitialLevelOutOfBounds { .. })));
        assert_eq!(err.violations.len(), 4);
    }

    #[test]
    fn machine_without_edges_reports_inflow_and_each_outflow() {
        let mut g = PlantGraph::new();
        g.add_node(NodeSpec::new(
            "chp",
            MachineParams::new("gas", 10.0)
                .with_output("power", 0.4)
                .with_output("heat", 0.5),
        ))
        .unwrap();
        let violations = g.violations();
        assert_eq!(violations.len(), 3);
        assert!(matches!(violations[0], TopologyError::MissingInflow { .. }));
        assert!(matches!(violations[1], TopologyError::MissingOutflow { .. }));
    }

    #[test]
    fn empty_machine_reported() {
        let mut g = PlantGraph::new();
        g.add_node(NodeSpec::new("m", MachineParams::new("gas", 10.0)))
            .unwrap();
        assert!(
            g.violations()
                .iter()
                .any(|v| matches!(v, TopologyError::EmptyConversion { .. }))
        );
    }

    fn curve_machine(machine: MachineParams) -> PlantGraph {
        let mut g = PlantGraph::new();
        g.add_node(NodeSpec::new("gas", SupplyParams::new("gas", 100.0)))
            .unwrap();
        g.add_node(NodeSpec::new("gen", machine)).unwrap();
        g.add_node(NodeSpec::new("town", DemandParams::new("power", 10.0)))
            .unwrap();
        g.add_edge(EdgeSpec::new("gas", "gen", "gas")).unwrap();
        g.add_edge(EdgeSpec::new("gen", "town", "power")).unwrap();
        g
    }

    #[test]
    fn well_formed_curve_passes() {
        let g = curve_machine(MachineParams::new("gas", 40.0).with_setpoints(
            SetpointCurve::new(vec![0.0, 10.0, 40.0]).with_output("power", vec![0.0, 4.0, 13.0]),
        ));
        assert_eq!(g.violations(), vec![]);
    }

    #[test]
    fn malformed_curve_reports_each_problem() {
        let g = curve_machine(
            MachineParams::new("gas", 40.0)
                .with_output("power", 0.4)
                .with_setpoints(
                    SetpointCurve::new(vec![10.0, 5.0, 40.0])
                        .with_output("power", vec![4.0, -1.0]),
                ),
        );
        let violations = g.violations();
        assert!(violations.contains(&TopologyError::AmbiguousConversion { node: "gen".into() }));
        assert!(violations.iter().any(|v| matches!(
            v,
            TopologyError::InvalidCoefficient { field: "setpoints.input", .. }
        )));
        assert!(violations.contains(&TopologyError::CurveShape {
            node: "gen".into(),
            commodity: "power".into(),
            expected: 3,
            got: 2,
        }));
        assert!(violations.iter().any(|v| matches!(
            v,
            TopologyError::InvalidCoefficient { field: "setpoints.values", value, .. } if *value == -1.0
        )));
    }

    #[test]
    fn curve_outside_throughput_bounds_is_inverted() {
        let g = curve_machine(MachineParams::new("gas", 5.0).with_setpoints(
            SetpointCurve::new(vec![10.0, 20.0]).with_output("power", vec![4.0, 9.0]),
        ));
        assert!(g.violations().iter().any(|v| matches!(
            v,
            TopologyError::InvertedBounds { min, max, .. } if *min == 10.0 && *max == 5.0
        )));
    }
}

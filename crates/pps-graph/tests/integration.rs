//! Integration tests for pps-graph.

use pps_core::Tolerances;
use pps_graph::{
    DemandParams, EdgeSpec, GraphError, Lifecycle, NodeOutcome, NodeSpec, PlantGraph,
    StepOutcome, StepParameters, StorageParams, SupplyParams, TopologyError,
};
use proptest::prelude::*;

fn storage_loop() -> PlantGraph {
    // grid -> tank -> town, with a tank <-> buffer loop
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("grid", SupplyParams::new("heat", 50.0)))
        .unwrap();
    g.add_node(NodeSpec::new(
        "tank",
        StorageParams::new("heat", 100.0).with_initial_level(20.0),
    ))
    .unwrap();
    g.add_node(NodeSpec::new(
        "buffer",
        StorageParams::new("heat", 10.0),
    ))
    .unwrap();
    g.add_node(NodeSpec::new("town", DemandParams::new("heat", 5.0)))
        .unwrap();
    g.add_edge(EdgeSpec::new("grid", "tank", "heat")).unwrap();
    g.add_edge(EdgeSpec::new("tank", "buffer", "heat")).unwrap();
    g.add_edge(EdgeSpec::new("buffer", "tank", "heat")).unwrap();
    g.add_edge(EdgeSpec::new("tank", "town", "heat")).unwrap();
    g
}

#[test]
fn cycles_are_valid() {
    let g = storage_loop();
    assert!(g.validate().is_ok());
    let tank = g.node_id("tank").unwrap();
    assert_eq!(g.inbound_edges(tank).len(), 2);
    assert_eq!(g.outbound_edges(tank).len(), 2);
}

#[test]
fn dangling_edge_reported_by_name() {
    let mut g = storage_loop();
    g.remove_node("buffer").unwrap();

    let err = g.validate().unwrap_err();
    let dangling: Vec<_> = err
        .violations
        .iter()
        .filter_map(|v| match v {
            TopologyError::DanglingEdge { edge, missing } => Some((edge.as_str(), missing.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        dangling,
        vec![("tank->buffer", "buffer"), ("buffer->tank", "buffer")]
    );
    assert!(err.to_string().contains("tank->buffer"));
    assert!(g.node_by_name("buffer").is_none());
    assert_eq!(g.node_slots(), 4);
}

#[test]
fn validation_is_idempotent() {
    let g = storage_loop();
    assert!(g.validate().is_ok());
    assert!(g.validate().is_ok());

    let mut broken = storage_loop();
    broken.remove_node("grid").unwrap();
    let first = broken.violations();
    let second = broken.violations();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn sealed_graph_rejects_setters_but_accepts_commit() {
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("grid", SupplyParams::new("power", 100.0)))
        .unwrap();
    g.add_node(NodeSpec::new("town", DemandParams::new("power", 60.0)))
        .unwrap();
    g.add_edge(EdgeSpec::new("grid", "town", "power")).unwrap();
    g.seal();

    let err = g.set_node_bounds("grid", 0.0, 10.0).unwrap_err();
    match err {
        GraphError::Locked(lock) => {
            assert_eq!(lock.operation, "set_node_bounds");
            assert!(lock.element.contains("grid"));
        }
        other => panic!("expected lock error, got {other:?}"),
    }

    let mut outcome = StepOutcome::new(0, g.node_slots(), g.edge_slots());
    outcome.edge_flows[0] = Some(60.0);
    outcome.nodes[0] = Some(NodeOutcome {
        throughput: 60.0,
        ..Default::default()
    });
    outcome.nodes[1] = Some(NodeOutcome {
        throughput: 60.0,
        ..Default::default()
    });
    g.commit(&outcome, &StepParameters::new(), Tolerances::default())
        .unwrap();
    assert_eq!(g.edge_by_name("grid->town").unwrap().lifecycle(), Lifecycle::Active);

    g.reset_state();
    assert_eq!(g.committed_steps(), 0);
    assert!(g.edge_by_name("grid->town").unwrap().history().is_empty());
    assert!(g.is_sealed());
}

proptest! {
    #[test]
    fn commit_rejects_flows_above_capacity(cap in 1.0_f64..1000.0, excess in 0.01_f64..100.0) {
        let mut g = PlantGraph::new();
        g.add_node(NodeSpec::new("grid", SupplyParams::new("power", 10_000.0))).unwrap();
        g.add_node(NodeSpec::new("town", DemandParams::new("power", cap + excess))).unwrap();
        g.add_edge(EdgeSpec::new("grid", "town", "power").with_bounds(0.0, cap)).unwrap();
        g.seal();

        let flow = cap + excess;
        let mut outcome = StepOutcome::new(0, 2, 1);
        outcome.edge_flows[0] = Some(flow);
        outcome.nodes[0] = Some(NodeOutcome { throughput: flow, ..Default::default() });
        outcome.nodes[1] = Some(NodeOutcome { throughput: flow, ..Default::default() });

        let before = g.clone();
        prop_assert!(g.commit(&outcome, &StepParameters::new(), Tolerances::default()).is_err());
        prop_assert_eq!(g.committed_steps(), before.committed_steps());
        prop_assert_eq!(g.edge_by_name("grid->town").unwrap().flow(), 0.0);
    }
}

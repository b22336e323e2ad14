//! End-to-end resolver tests against the bundled minilp backend.

use std::thread;
use std::time::Duration;

use pps_core::Tolerances;
use pps_dispatch::{
    Assignment, BackendError, DispatchErrorReason, DispatchOptions, DispatchProblem,
    DispatchResolver, ObjectiveWeights, OptimizationBackend,
};
use pps_graph::{
    DemandParams, EdgeSpec, MachineParams, NodeSpec, PlantGraph, SetpointCurve, Signal,
    SignalTarget, StepParameters, StorageParams, SupplyParams,
};

fn line(supply: f64, demand: f64) -> PlantGraph {
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("grid", SupplyParams::new("power", supply)))
        .unwrap();
    g.add_node(NodeSpec::new("town", DemandParams::new("power", demand)))
        .unwrap();
    g.add_edge(EdgeSpec::new("grid", "town", "power")).unwrap();
    g
}

#[test]
fn two_node_line_serves_demand_exactly() {
    let g = line(100.0, 60.0);
    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let result = resolver.resolve(&g, &StepParameters::new(), 0).unwrap();

    let edge = g.edge_by_name("grid->town").unwrap();
    let flow = result.outcome.edge_flows[edge.id().slot()].unwrap();
    assert!((flow - 60.0).abs() < 1e-9);
    assert_eq!(result.variables, 2);
    assert_eq!(result.constraints, 2);
}

#[test]
fn strict_demand_above_capacity_is_infeasible() {
    let g = line(50.0, 60.0);
    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let err = resolver.resolve(&g, &StepParameters::new(), 4).unwrap_err();
    assert_eq!(err.reason, DispatchErrorReason::Infeasible);
    assert_eq!(err.step_index, 4);
}

#[test]
fn penalized_demand_reports_shortfall() {
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("grid", SupplyParams::new("power", 50.0)))
        .unwrap();
    g.add_node(NodeSpec::new(
        "town",
        DemandParams::new("power", 60.0).with_unmet_penalty(1000.0),
    ))
    .unwrap();
    g.add_edge(EdgeSpec::new("grid", "town", "power").with_efficiency(0.8))
        .unwrap();

    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let result = resolver.resolve(&g, &StepParameters::new(), 0).unwrap();
    let town = g.node_id("town").unwrap();
    let node = result.outcome.nodes[town.slot()].unwrap();
    // 50 leaves the grid, 40 arrives
    assert!((node.throughput - 40.0).abs() < 1e-6);
    assert!((node.unmet - 20.0).abs() < 1e-6);
}

#[test]
fn machine_conversion_and_cost_ordering() {
    // Power can come from an expensive grid or from a cheap gas-fired machine.
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new(
        "grid",
        SupplyParams::new("power", 100.0).with_price(50.0),
    ))
    .unwrap();
    g.add_node(NodeSpec::new("gas", SupplyParams::new("gas", 100.0).with_price(10.0)))
        .unwrap();
    g.add_node(NodeSpec::new(
        "turbine",
        MachineParams::new("gas", 40.0).with_output("power", 0.5),
    ))
    .unwrap();
    g.add_node(NodeSpec::new("town", DemandParams::new("power", 30.0)))
        .unwrap();
    g.add_edge(EdgeSpec::new("grid", "town", "power")).unwrap();
    g.add_edge(EdgeSpec::new("gas", "turbine", "gas")).unwrap();
    g.add_edge(EdgeSpec::new("turbine", "town", "power")).unwrap();
    assert!(g.validate().is_ok());

    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let result = resolver.resolve(&g, &StepParameters::new(), 0).unwrap();
    let flow = |name: &str| {
        let e = g.edge_by_name(name).unwrap();
        result.outcome.edge_flows[e.id().slot()].unwrap()
    };
    // gas power costs 20 per unit against 50 from the grid, until the turbine saturates
    assert!((flow("turbine->town") - 20.0).abs() < 1e-6);
    assert!((flow("gas->turbine") - 40.0).abs() < 1e-6);
    assert!((flow("grid->town") - 10.0).abs() < 1e-6);
    assert!((result.objective - (40.0 * 10.0 + 10.0 * 50.0)).abs() < 1e-6);
}

fn curve_plant(demand: f64) -> PlantGraph {
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("gas", SupplyParams::new("gas", 100.0).with_price(1.0)))
        .unwrap();
    // marginal yield falls from 0.5 to 0.3 per unit of gas
    g.add_node(NodeSpec::new(
        "engine",
        MachineParams::new("gas", 40.0).with_setpoints(
            SetpointCurve::new(vec![10.0, 20.0, 40.0]).with_output("power", vec![4.0, 9.0, 15.0]),
        ),
    ))
    .unwrap();
    g.add_node(NodeSpec::new("town", DemandParams::new("power", demand)))
        .unwrap();
    g.add_edge(EdgeSpec::new("gas", "engine", "gas")).unwrap();
    g.add_edge(EdgeSpec::new("engine", "town", "power")).unwrap();
    g
}

#[test]
fn setpoint_curve_machine_runs_on_its_curve() {
    let mut g = curve_plant(12.0);
    assert!(g.validate().is_ok());
    g.seal();

    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let params = StepParameters::new();
    let result = resolver.resolve(&g, &params, 0).unwrap();
    let engine = g.node_id("engine").unwrap();
    let throughput = result.outcome.nodes[engine.slot()].unwrap().throughput;
    // 12 units of power sit between the 20 and 40 breakpoints
    assert!((throughput - 30.0).abs() < 1e-6, "{throughput}");
    assert!((result.objective - 30.0).abs() < 1e-6);

    g.commit(&result.outcome, &params, Tolerances::default())
        .unwrap();
    assert_eq!(g.committed_steps(), 1);
}

#[test]
fn setpoint_curve_scales_with_predicted_efficiency() {
    let g = curve_plant(6.0);
    let mut params = StepParameters::new();
    params.set(&SignalTarget::node("engine", Signal::Efficiency), 0.5);

    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let result = resolver.resolve(&g, &params, 0).unwrap();
    let engine = g.node_id("engine").unwrap();
    let throughput = result.outcome.nodes[engine.slot()].unwrap().throughput;
    assert!((throughput - 30.0).abs() < 1e-6, "{throughput}");

    params.set(&SignalTarget::node("town", Signal::Demand), 8.0);
    // 16 raw units are past the top of the curve
    let err = resolver.resolve(&g, &params, 0).unwrap_err();
    assert_eq!(err.reason, DispatchErrorReason::Infeasible);
}

#[test]
fn storage_fills_then_rejects_overflow() {
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("boiler", SupplyParams::new("heat", 100.0)))
        .unwrap();
    g.add_node(NodeSpec::new(
        "tank",
        StorageParams::new("heat", 100.0).with_initial_level(50.0),
    ))
    .unwrap();
    g.add_edge(EdgeSpec::new("boiler", "tank", "heat").with_bounds(10.0, 10.0))
        .unwrap();
    g.seal();

    let resolver = DispatchResolver::minilp(DispatchOptions::default());
    let params = StepParameters::new();
    for step in 0..5 {
        let result = resolver.resolve(&g, &params, step).unwrap();
        g.commit(&result.outcome, &params, Tolerances::default())
            .unwrap();
    }
    assert_eq!(g.node_by_name("tank").unwrap().state().level, Some(100.0));

    let err = resolver.resolve(&g, &params, 5).unwrap_err();
    assert_eq!(err.reason, DispatchErrorReason::Infeasible);
    assert_eq!(g.node_by_name("tank").unwrap().state().level, Some(100.0));
}

#[test]
fn storage_value_weight_keeps_energy_in_the_tank() {
    let mut g = PlantGraph::new();
    g.add_node(NodeSpec::new("pv", SupplyParams::new("power", 30.0)))
        .unwrap();
    g.add_node(NodeSpec::new("battery", StorageParams::new("power", 100.0)))
        .unwrap();
    g.add_edge(EdgeSpec::new("pv", "battery", "power")).unwrap();

    let options = DispatchOptions::default().with_weights(ObjectiveWeights {
        storage_value: 1.0,
        ..Default::default()
    });
    let resolver = DispatchResolver::minilp(options);
    let mut params = StepParameters::new();
    params.set(&SignalTarget::node("pv", Signal::Availability), 12.5);
    let result = resolver.resolve(&g, &params, 0).unwrap();
    let battery = g.node_id("battery").unwrap();
    let level = result.outcome.nodes[battery.slot()].unwrap().level.unwrap();
    assert!((level - 12.5).abs() < 1e-9);
}

struct SlowBackend;

impl OptimizationBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn solve(&self, problem: &DispatchProblem) -> Result<Assignment, BackendError> {
        thread::sleep(Duration::from_millis(500));
        Ok(Assignment::new(vec![0.0; problem.variables.len()]))
    }
}

#[test]
fn solve_past_time_limit_times_out() {
    let g = line(100.0, 60.0);
    let limit = Duration::from_millis(20);
    let resolver = DispatchResolver::new(SlowBackend, DispatchOptions::default().with_time_limit(limit));
    let err = resolver.resolve(&g, &StepParameters::new(), 2).unwrap_err();
    assert_eq!(err.reason, DispatchErrorReason::Timeout { limit });
    assert_eq!(err.step_index, 2);
}

struct BrokenBackend;

impl OptimizationBackend for BrokenBackend {
    fn name(&self) -> &str {
        "broken"
    }

    fn solve(&self, _problem: &DispatchProblem) -> Result<Assignment, BackendError> {
        Err(BackendError::Failed {
            message: "license expired".into(),
        })
    }
}

#[test]
fn backend_failure_is_reported() {
    let g = line(100.0, 60.0);
    let resolver = DispatchResolver::new(BrokenBackend, DispatchOptions::default());
    let err = resolver.resolve(&g, &StepParameters::new(), 0).unwrap_err();
    assert!(matches!(
        err.reason,
        DispatchErrorReason::Backend { ref message } if message.contains("license")
    ));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn feasible_line_commits_cleanly(
            capacity in 1.0f64..500.0,
            share in 0.0f64..1.0,
            efficiency in 0.5f64..1.0,
        ) {
            let demand = capacity * efficiency * share;
            let mut g = PlantGraph::new();
            g.add_node(NodeSpec::new("grid", SupplyParams::new("power", capacity).with_price(1.0)))
                .unwrap();
            g.add_node(NodeSpec::new("town", DemandParams::new("power", demand)))
                .unwrap();
            g.add_edge(EdgeSpec::new("grid", "town", "power").with_efficiency(efficiency))
                .unwrap();

            let params = StepParameters::new();
            let resolver = DispatchResolver::minilp(DispatchOptions::default());
            let result = resolver.resolve(&g, &params, 0).unwrap();
            let flow = result.outcome.edge_flows[0].unwrap();
            prop_assert!((flow * efficiency - demand).abs() < 1e-6);
            prop_assert!(g.commit(&result.outcome, &params, Tolerances::default()).is_ok());
        }
    }
}

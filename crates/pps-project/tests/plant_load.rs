use std::path::PathBuf;

use pps_graph::{NodeKindTag, TopologyError};
use pps_project::*;
use pps_sim::{SimError, SimState};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn district_plant_runs_to_its_horizon() {
    let spec = load_yaml(&data("chp_district.yaml")).unwrap();
    let plant = build_plant(&spec).unwrap();
    assert_eq!(plant.graph.node_count(), 6);
    assert_eq!(plant.graph.nodes_of_kind(NodeKindTag::Demand).count(), 2);
    assert_eq!(plant.predictors.len(), 4);
    assert_eq!(plant.options.clock.horizon(), Some(24));

    let mut sim = plant.into_simulation().unwrap();
    let snaps = sim.run(24).unwrap();
    assert_eq!(snaps.len(), 24);
    assert_eq!(sim.state(), &SimState::Completed);

    let last = sim.history().last().unwrap();
    assert_eq!(
        last.timestamp().map(|t| t.to_string()),
        Some("2024-01-01 23:00:00".to_string())
    );
    for snap in sim.history() {
        let level = snap.node("tank").unwrap().level.unwrap();
        assert!((-1e-9..=150.0 + 1e-9).contains(&level));
    }

    let out = sim.output();
    assert_eq!(out.demands["district"][..6], [70.0, 85.0, 110.0, 120.0, 95.0, 60.0]);
    assert!(out.storage_levels.contains_key("tank"));
    assert!(out.throughputs.contains_key("chp"));
}

#[test]
fn district_plant_refuses_to_run_past_horizon() {
    let spec = load_yaml(&data("chp_district.yaml")).unwrap();
    let mut sim = build_plant(&spec).unwrap().into_simulation().unwrap();
    assert!(matches!(
        sim.run(25),
        Err(SimError::HorizonExceeded { horizon: 24, .. })
    ));
}

#[test]
fn commodity_mismatch_surfaces_at_build() {
    let mut spec = load_yaml(&data("chp_district.yaml")).unwrap();
    spec.edges.push(EdgeDef::new("gas", "district", "gas"));
    let err = build_plant(&spec).unwrap_err();
    assert!(matches!(
        err,
        ProjectError::Graph(pps_graph::GraphError::Topology(
            TopologyError::CommodityMismatch { .. }
        ))
    ));
}

#[test]
fn binding_to_unknown_edge_is_rejected() {
    let mut spec = load_yaml(&data("chp_district.yaml")).unwrap();
    spec.bindings[3].target =
        pps_graph::SignalTarget::edge("chp->nowhere", pps_graph::Signal::Efficiency);
    assert!(matches!(
        validate_spec(&spec),
        Err(ValidationError::MissingReference { .. })
    ));
}

#[test]
fn fitted_model_without_samples_is_rejected() {
    let mut spec = load_yaml(&data("chp_district.yaml")).unwrap();
    spec.bindings[1].model = ModelDef::Fitted {
        features: vec![pps_predict::Feature::Bias, pps_predict::Feature::Step],
        observations: vec![],
        warmup: None,
    };
    assert!(matches!(
        validate_spec(&spec),
        Err(ValidationError::InvalidValue { .. })
    ));
}

#[test]
fn setpoint_machine_loads_from_yaml_and_runs() {
    let yaml = r#"
version: 1
name: engine
nodes:
  - { name: gas, kind: supply, commodity: gas, max_output: 100, price: 1 }
  - name: engine
    kind: machine
    input: gas
    max_throughput: 40
    setpoints:
      input: [10, 20, 40]
      outputs:
        - { commodity: power, values: [4, 9, 15] }
  - { name: town, kind: demand, commodity: power, demand: 12 }
edges:
  - { from: gas, to: engine, commodity: gas }
  - { from: engine, to: town, commodity: power }
clock:
  horizon: 3
"#;
    let spec: PlantSpec = serde_yaml::from_str(yaml).unwrap();
    validate_spec(&spec).unwrap();
    let mut sim = build_plant(&spec).unwrap().into_simulation().unwrap();
    sim.run(3).unwrap();

    let out = sim.output();
    let throughput = &out.throughputs["engine"];
    assert_eq!(throughput.len(), 3);
    for x in throughput {
        assert!((x - 30.0).abs() < 1e-6, "{x}");
    }
}

#[test]
fn machine_with_ratios_and_curve_is_rejected_at_build() {
    let yaml = r#"
version: 1
name: engine
nodes:
  - { name: gas, kind: supply, commodity: gas, max_output: 100 }
  - name: engine
    kind: machine
    input: gas
    max_throughput: 40
    outputs: [{ commodity: power, ratio: 0.4 }]
    setpoints:
      input: [10, 40]
      outputs: [{ commodity: power, values: [4, 15] }]
  - { name: town, kind: demand, commodity: power, demand: 12 }
edges:
  - { from: gas, to: engine, commodity: gas }
  - { from: engine, to: town, commodity: power }
"#;
    let spec: PlantSpec = serde_yaml::from_str(yaml).unwrap();
    let err = build_plant(&spec).unwrap_err();
    let ProjectError::Topology(invalid) = err else {
        panic!("expected a topology error, got {err:?}");
    };
    assert!(invalid.contains(|v| matches!(v, TopologyError::AmbiguousConversion { .. })));
}

//! Generated plant files survive serialization and build into runnable plants.

use pps_graph::{DemandParams, Signal, SignalTarget, StorageParams, SupplyParams};
use pps_predict::SeriesMode;
use pps_project::*;
use pps_sim::SimState;
use proptest::prelude::*;

fn line_spec(
    capacity: f64,
    efficiency: f64,
    tank: f64,
    demands: Vec<f64>,
    penalty: Option<f64>,
) -> PlantSpec {
    let mut spec = PlantSpec::new("generated");
    let mut town = DemandParams::new("power", demands[0]);
    town.unmet_penalty = penalty;
    spec.nodes = vec![
        NodeDef {
            name: "grid".to_string(),
            kind: SupplyParams::new("power", capacity).with_price(1.0).into(),
        },
        NodeDef {
            name: "battery".to_string(),
            kind: StorageParams::new("power", tank).into(),
        },
        NodeDef {
            name: "town".to_string(),
            kind: town.into(),
        },
    ];
    let mut feeder = EdgeDef::new("grid", "town", "power");
    feeder.efficiency = efficiency;
    spec.edges = vec![
        feeder,
        EdgeDef::new("grid", "battery", "power"),
        EdgeDef::new("battery", "town", "power"),
    ];
    spec.bindings = vec![BindingDef {
        target: SignalTarget::node("town", Signal::Demand),
        model: ModelDef::TimeSeries {
            values: demands,
            mode: SeriesMode::Cyclic,
        },
    }];
    spec
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn generated_specs_roundtrip_through_yaml_and_json(
        capacity in 0.0_f64..1e6,
        efficiency in 0.01_f64..=1.0,
        tank in 0.0_f64..1e4,
        demands in prop::collection::vec(0.0_f64..1e3, 1..8),
        penalty in prop::option::of(0.0_f64..1e4),
        horizon in prop::option::of(1_usize..100),
    ) {
        let mut spec = line_spec(capacity, efficiency, tank, demands, penalty);
        spec.clock.horizon = horizon;
        validate_spec(&spec).unwrap();

        let yaml = serde_yaml::to_string(&spec).unwrap();
        let from_yaml: PlantSpec = serde_yaml::from_str(&yaml).unwrap();
        prop_assert_eq!(&from_yaml, &spec);

        let json = serde_json::to_string(&spec).unwrap();
        let from_json: PlantSpec = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&from_json, &spec);
    }

    #[test]
    fn penalized_plants_always_complete(
        capacity in 0.0_f64..500.0,
        efficiency in 0.05_f64..=1.0,
        demands in prop::collection::vec(0.0_f64..300.0, 1..6),
        steps in 1_usize..12,
    ) {
        let spec = line_spec(capacity, efficiency, 50.0, demands, Some(1000.0));
        let mut sim = build_plant(&spec).unwrap().into_simulation().unwrap();
        prop_assert_eq!(sim.run(steps).unwrap().len(), steps);
        prop_assert_eq!(sim.state(), &SimState::Completed);

        let out = sim.output();
        let demand = &out.demands["town"];
        let unmet = &out.unmet_demand["town"];
        prop_assert_eq!(demand.len(), steps);
        for (d, u) in demand.iter().zip(unmet) {
            prop_assert!(*u >= -1e-6 && *u <= d + 1e-6, "unmet {} of {}", u, d);
        }
    }
}

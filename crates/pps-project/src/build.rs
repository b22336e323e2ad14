//! Turn a validated [`PlantSpec`] into runnable engine objects.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use pps_dispatch::{DispatchOptions, DispatchResolver};
use pps_graph::{EdgeSpec, NodeSpec, PlantGraph};
use pps_predict::{
    Constant, LinearModel, Noisy, PredictionResult, PredictiveModel, PredictorSet, TimeSeries,
};
use pps_sim::{SimOptions, SimResult, Simulation, SimulationClock};

use crate::schema::{ClockDef, DispatchDef, EdgeDef, ModelDef, PlantSpec};
use crate::validate::validate_spec;
use crate::{ProjectError, ProjectResult};

/// Everything [`Simulation::new`] needs.
#[derive(Debug)]
pub struct Plant {
    pub graph: PlantGraph,
    pub predictors: PredictorSet,
    pub resolver: DispatchResolver,
    pub options: SimOptions,
}

impl Plant {
    pub fn into_simulation(self) -> SimResult<Simulation> {
        Simulation::new(self.graph, self.predictors, self.resolver, self.options)
    }
}

pub fn build_plant(spec: &PlantSpec) -> ProjectResult<Plant> {
    validate_spec(spec)?;

    let mut graph = PlantGraph::new();
    for node in &spec.nodes {
        graph.add_node(NodeSpec::new(node.name.clone(), node.kind.clone()))?;
    }
    for edge in &spec.edges {
        graph.add_edge(edge_spec(edge))?;
    }
    graph.validate()?;

    let mut predictors = PredictorSet::new();
    for binding in &spec.bindings {
        let model = build_model(&binding.model)?;
        predictors.bind_shared(binding.target.clone(), model);
    }

    Ok(Plant {
        graph,
        predictors,
        resolver: DispatchResolver::minilp(dispatch_options(&spec.dispatch)),
        options: SimOptions {
            tolerances: spec.tolerances,
            clock: clock(&spec.clock)?,
        },
    })
}

fn edge_spec(def: &EdgeDef) -> EdgeSpec {
    let mut spec = EdgeSpec::new(def.from.clone(), def.to.clone(), def.commodity.clone())
        .with_bounds(def.min_flow, def.max_flow.unwrap_or(f64::INFINITY))
        .with_efficiency(def.efficiency)
        .with_cost(def.cost);
    if let Some(name) = &def.name {
        spec = spec.named(name.clone());
    }
    spec
}

pub fn build_model(def: &ModelDef) -> PredictionResult<Arc<dyn PredictiveModel>> {
    let model: Arc<dyn PredictiveModel> = match def {
        ModelDef::Constant { value } => Arc::new(Constant::new(*value)),
        ModelDef::TimeSeries { values, mode } => Arc::new(TimeSeries::new(values.clone(), *mode)?),
        ModelDef::Linear {
            features,
            coefficients,
            warmup,
        } => {
            let model = LinearModel::new(features.clone(), coefficients.clone())?;
            Arc::new(match warmup {
                Some(w) => model.with_warmup(*w),
                None => model,
            })
        }
        ModelDef::Fitted {
            features,
            observations,
            warmup,
        } => {
            let model = LinearModel::fit(features.clone(), observations)?;
            Arc::new(match warmup {
                Some(w) => model.with_warmup(*w),
                None => model,
            })
        }
        ModelDef::Noisy {
            inner,
            std_dev,
            seed,
            floor,
        } => {
            let noisy = Noisy::new(build_model(inner)?, *std_dev, *seed)?;
            Arc::new(match floor {
                Some(f) => noisy.with_floor(*f),
                None => noisy,
            })
        }
    };
    Ok(model)
}

fn dispatch_options(def: &DispatchDef) -> DispatchOptions {
    let mut options = DispatchOptions::default().with_weights(def.weights);
    if let Some(eps) = def.epsilon {
        options.epsilon = eps;
    }
    if let Some(secs) = def.time_limit_secs {
        options = options.with_time_limit(Duration::from_secs_f64(secs));
    }
    options
}

fn clock(def: &ClockDef) -> ProjectResult<SimulationClock> {
    let duration = TimeDelta::try_minutes(def.step_minutes).ok_or_else(|| {
        ProjectError::Build {
            what: format!("step of {} minutes is out of range", def.step_minutes),
        }
    })?;
    let mut clock = SimulationClock::new().with_step_duration(duration);
    if let Some(h) = def.horizon {
        clock = clock.with_horizon(h);
    }
    if let Some(start) = def.start {
        clock = clock.starting_at(start);
    }
    Ok(clock)
}

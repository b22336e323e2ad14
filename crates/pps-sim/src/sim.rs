//! The run loop: predict, dispatch, commit, record.

use pps_core::Tolerances;
use pps_dispatch::DispatchResolver;
use pps_graph::{InvalidTopologyError, PlantGraph, Snapshot, StepParameters};
use pps_predict::PredictorSet;
use tracing::{debug, info, warn};

use crate::clock::SimulationClock;
use crate::error::{SimError, SimResult};
use crate::memo::PredictionMemo;
use crate::output::SimulationOutput;

/// Options for simulation runs.
#[derive(Clone, Debug, Default)]
pub struct SimOptions {
    /// Tolerances used to re-check each dispatch result at commit.
    pub tolerances: Tolerances,
    pub clock: SimulationClock,
}

impl SimOptions {
    pub fn with_clock(mut self, clock: SimulationClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }
}

/// Run state of a [`Simulation`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SimState {
    #[default]
    Idle,
    /// At least one step committed, more may follow.
    Running,
    /// Every requested step committed.
    Completed,
    /// Stopped by the contained error; history up to the failure is kept.
    Halted(SimError),
}

impl SimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimState::Idle => "idle",
            SimState::Running => "running",
            SimState::Completed => "completed",
            SimState::Halted(_) => "halted",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SimState::Completed | SimState::Halted(_))
    }
}

/// Owns a sealed plant and advances it step by step.
pub struct Simulation {
    graph: PlantGraph,
    predictors: PredictorSet,
    resolver: DispatchResolver,
    options: SimOptions,
    clock: SimulationClock,
    memo: PredictionMemo,
    history: Vec<Snapshot>,
    state: SimState,
}

impl Simulation {
    /// Validate the graph and the model bindings, then seal the graph.
    ///
    /// Every violation is reported at once; nothing can run on an invalid plant.
    pub fn new(
        mut graph: PlantGraph,
        predictors: PredictorSet,
        resolver: DispatchResolver,
        options: SimOptions,
    ) -> SimResult<Self> {
        let mut violations = graph.violations();
        violations.extend(predictors.validate_against(&graph));
        if !violations.is_empty() {
            return Err(InvalidTopologyError { violations }.into());
        }

        // A graph handed over mid-run starts again from its initial levels.
        graph.reset_state();
        graph.seal();
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            bindings = predictors.len(),
            backend = resolver.backend_name(),
            "simulation configured"
        );

        let mut clock = options.clock;
        clock.rewind();
        Ok(Self {
            graph,
            predictors,
            resolver,
            options,
            clock,
            memo: PredictionMemo::new(),
            history: Vec::new(),
            state: SimState::Idle,
        })
    }

    /// Run `num_steps` steps, ending in `Completed` or `Halted`.
    ///
    /// Returns the snapshots committed by this call.
    pub fn run(&mut self, num_steps: usize) -> SimResult<&[Snapshot]> {
        self.ensure_runnable()?;
        let first = self.clock.step();
        if let Some(horizon) = self.clock.horizon() {
            let last = first + num_steps;
            if last > horizon {
                return Err(SimError::HorizonExceeded {
                    step: last - 1,
                    horizon,
                });
            }
        }

        info!(first_step = first, num_steps, "simulation run started");
        let before = self.history.len();
        for _ in 0..num_steps {
            self.advance()?;
        }
        self.state = SimState::Completed;
        info!(
            steps = self.history.len() - before,
            "simulation run completed"
        );
        Ok(&self.history[before..])
    }

    /// Advance a single step and stay `Running`.
    pub fn step(&mut self) -> SimResult<&Snapshot> {
        self.ensure_runnable()?;
        let step = self.clock.step();
        if let Some(horizon) = self.clock.horizon().filter(|_| !self.clock.allows(step)) {
            return Err(SimError::HorizonExceeded { step, horizon });
        }
        self.advance()?;
        let last = self.history.len() - 1;
        Ok(&self.history[last])
    }

    /// Evaluate the predictions of the upcoming step ahead of running it.
    ///
    /// The values are memoized and reused by the next `run` or `step`.
    pub fn preview(&mut self, step: usize) -> SimResult<StepParameters> {
        self.ensure_runnable()?;
        let next = self.clock.step();
        if step != next {
            return Err(SimError::NotUpcoming {
                requested: step,
                next,
            });
        }
        self.parameters_for(step)
    }

    /// Back to `Idle` at step 0 with initial storage levels and no history.
    pub fn reset(&mut self) {
        self.graph.reset_state();
        self.history.clear();
        self.memo.clear();
        self.clock.rewind();
        self.state = SimState::Idle;
        debug!("simulation reset");
    }

    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    pub fn graph(&self) -> &PlantGraph {
        &self.graph
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn predictors(&self) -> &PredictorSet {
        &self.predictors
    }

    pub fn memo(&self) -> &PredictionMemo {
        &self.memo
    }

    /// Per-series tables over the recorded history.
    pub fn output(&self) -> SimulationOutput {
        SimulationOutput::from_history(&self.history)
    }

    /// Hand back the (still sealed) graph with its committed state.
    pub fn into_graph(self) -> PlantGraph {
        self.graph
    }

    fn ensure_runnable(&self) -> SimResult<()> {
        if self.state.is_finished() {
            Err(SimError::NeedsReset {
                state: self.state.as_str(),
            })
        } else {
            Ok(())
        }
    }

    /// One step; on failure the run halts and the error is returned.
    fn advance(&mut self) -> SimResult<()> {
        let step = self.clock.step();
        match self.try_advance(step) {
            Ok(()) => {
                self.state = SimState::Running;
                Ok(())
            }
            Err(err) => {
                warn!(step, error = %err, "simulation halted");
                self.state = SimState::Halted(err.clone());
                Err(err)
            }
        }
    }

    fn try_advance(&mut self, step: usize) -> SimResult<()> {
        let params = self.parameters_for(step)?;
        let result = self.resolver.resolve(&self.graph, &params, step)?;
        self.graph
            .commit(&result.outcome, &params, self.options.tolerances)?;

        let snapshot = self.graph.snapshot(
            step,
            self.clock.timestamp(step),
            result.objective,
            &params,
        );
        self.history.push(snapshot);
        self.memo.evict_through(step);
        self.clock.advance();
        debug!(step, objective = result.objective, solve_time = ?result.solve_time, "step committed");
        Ok(())
    }

    fn parameters_for(&mut self, step: usize) -> SimResult<StepParameters> {
        if let Some(params) = self.memo.parameters(step) {
            return Ok(params);
        }
        let values = self
            .predictors
            .evaluate(step, self.clock.timestamp(step), &self.history)?;
        self.memo.record(step, values);
        Ok(self.memo.parameters(step).unwrap_or_default())
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state)
            .field("step", &self.clock.step())
            .field("history", &self.history.len())
            .field("resolver", &self.resolver)
            .finish()
    }
}

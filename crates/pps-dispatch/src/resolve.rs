//! Per-step dispatch: formulate, solve, read back.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use pps_graph::{PlantGraph, StepOutcome, StepParameters};
use tracing::{debug, warn};

use crate::backend::{MinilpBackend, OptimizationBackend};
use crate::error::{BackendError, DispatchError, DispatchErrorReason};
use crate::formulation::formulate;
use crate::options::DispatchOptions;
use crate::problem::{Assignment, DispatchProblem};

/// Solved step, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub step: usize,
    pub outcome: StepOutcome,
    pub objective: f64,
    pub variables: usize,
    pub constraints: usize,
    pub solve_time: Duration,
}

/// Builds and solves one [`DispatchProblem`] per step.
///
/// The resolver only borrows the graph, so nothing can be committed while a
/// solve is outstanding.
#[derive(Clone)]
pub struct DispatchResolver {
    backend: Arc<dyn OptimizationBackend>,
    options: DispatchOptions,
}

impl DispatchResolver {
    pub fn new(backend: impl OptimizationBackend + 'static, options: DispatchOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            options,
        }
    }

    pub fn minilp(options: DispatchOptions) -> Self {
        Self::new(MinilpBackend, options)
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The problem `resolve` would solve, without solving it.
    pub fn build_problem(
        &self,
        graph: &PlantGraph,
        params: &StepParameters,
        step: usize,
    ) -> Result<DispatchProblem, DispatchError> {
        formulate(graph, params, step, &self.options.weights)
            .map(|f| f.problem)
            .map_err(|reason| DispatchError::new(reason, step))
    }

    pub fn resolve(
        &self,
        graph: &PlantGraph,
        params: &StepParameters,
        step: usize,
    ) -> Result<DispatchResult, DispatchError> {
        let formulation = formulate(graph, params, step, &self.options.weights)
            .map_err(|reason| DispatchError::new(reason, step))?;
        let variables = formulation.problem.variables.len();
        let constraints = formulation.problem.constraints.len();
        debug!(step, variables, constraints, backend = self.backend.name(), "dispatch problem built");

        let started = Instant::now();
        let solved = match self.options.time_limit {
            None => self
                .backend
                .solve(&formulation.problem)
                .map_err(|e| DispatchError::from_backend(e, step)),
            Some(limit) => {
                self.solve_with_limit(Arc::new(formulation.problem.clone()), limit, step)
            }
        };
        let solve_time = started.elapsed();

        let assignment = solved.inspect_err(|e| warn!(step, error = %e, "dispatch failed"))?;
        if assignment.len() != variables {
            return Err(DispatchError::new(
                DispatchErrorReason::Backend {
                    message: format!(
                        "backend returned {} values for {} variables",
                        assignment.len(),
                        variables
                    ),
                },
                step,
            ));
        }

        let objective = formulation.problem.evaluate_objective(&assignment);
        let outcome = formulation.extract(graph, &assignment, self.options.epsilon);
        debug!(step, objective, ?solve_time, "dispatch solved");

        Ok(DispatchResult {
            step,
            outcome,
            objective,
            variables,
            constraints,
            solve_time,
        })
    }

    /// Solve on a worker thread and give up after `limit`.
    ///
    /// A timed-out worker is detached; its eventual result is dropped.
    fn solve_with_limit(
        &self,
        problem: Arc<DispatchProblem>,
        limit: Duration,
        step: usize,
    ) -> Result<Assignment, DispatchError> {
        let (tx, rx) = mpsc::channel::<Result<Assignment, BackendError>>();
        let backend = Arc::clone(&self.backend);
        thread::Builder::new()
            .name(format!("dispatch-step-{step}"))
            .spawn(move || {
                let _ = tx.send(backend.solve(&problem));
            })
            .map_err(|e| {
                DispatchError::new(
                    DispatchErrorReason::Backend {
                        message: format!("failed to spawn solver thread: {e}"),
                    },
                    step,
                )
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result.map_err(|e| DispatchError::from_backend(e, step)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(DispatchError::new(DispatchErrorReason::Timeout { limit }, step))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DispatchError::new(
                DispatchErrorReason::Backend {
                    message: "solver thread terminated without a result".into(),
                },
                step,
            )),
        }
    }
}

impl std::fmt::Debug for DispatchResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchResolver")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .finish()
    }
}

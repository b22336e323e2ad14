//! The optimization-backend seam and the bundled `minilp` adapter.

use good_lp::solvers::minilp::minilp;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};

use crate::error::BackendError;
use crate::problem::{Assignment, DispatchProblem, Sense};

/// Solves a [`DispatchProblem`] to optimality (minimization).
pub trait OptimizationBackend: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, problem: &DispatchProblem) -> Result<Assignment, BackendError>;
}

/// Pure-Rust simplex solver through `good_lp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinilpBackend;

impl OptimizationBackend for MinilpBackend {
    fn name(&self) -> &str {
        "minilp"
    }

    fn solve(&self, problem: &DispatchProblem) -> Result<Assignment, BackendError> {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = problem
            .variables
            .iter()
            .map(|def| {
                let mut v = variable().min(def.lower);
                if def.upper.is_finite() {
                    v = v.max(def.upper);
                }
                vars.add(v)
            })
            .collect();

        let mut objective = Expression::from(0.0);
        for (var, coefficient) in &problem.objective {
            objective += *coefficient * handles[var.0];
        }

        let mut model = vars.minimise(objective).using(minilp);
        for c in &problem.constraints {
            let mut lhs = Expression::from(0.0);
            for (var, coefficient) in &c.terms {
                lhs += *coefficient * handles[var.0];
            }
            let rhs = c.rhs;
            model = model.with(match c.sense {
                Sense::Eq => constraint!(lhs == rhs),
                Sense::Le => constraint!(lhs <= rhs),
                Sense::Ge => constraint!(lhs >= rhs),
            });
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => BackendError::Infeasible,
            ResolutionError::Unbounded => BackendError::Unbounded,
            other => BackendError::Failed {
                message: other.to_string(),
            },
        })?;

        Ok(Assignment::new(
            handles.iter().map(|v| solution.value(*v)).collect(),
        ))
    }
}

//! pps-dispatch: per-step dispatch optimization for ppsim.
//!
//! Provides:
//! - `DispatchProblem`, a backend-neutral linear program
//! - The `OptimizationBackend` seam and a `good_lp`/`minilp` implementation
//! - `DispatchResolver`, which formulates a plant graph, solves it under an
//!   optional time limit and reads the solution back as a `StepOutcome`

pub mod backend;
pub mod error;
mod formulation;
pub mod options;
pub mod problem;
pub mod resolve;

pub use backend::{MinilpBackend, OptimizationBackend};
pub use error::{BackendError, DispatchError, DispatchErrorReason};
pub use options::{DispatchOptions, ObjectiveWeights};
pub use problem::{Assignment, DispatchProblem, LinearConstraint, Sense, VarId, VariableDef};
pub use resolve::{DispatchResolver, DispatchResult};

//! Error types for simulation runs.

use pps_dispatch::DispatchError;
use pps_graph::{CommitError, InvalidTopologyError, StateLockError};
use pps_predict::PredictionError;
use thiserror::Error;

/// Everything that can stop a simulation from starting or advancing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Topology(#[from] InvalidTopologyError),

    #[error(transparent)]
    Locked(#[from] StateLockError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error("Simulation is {state}; call reset() before running again")]
    NeedsReset { state: &'static str },

    #[error("Step {step} is past the horizon of {horizon} steps")]
    HorizonExceeded { step: usize, horizon: usize },

    #[error("Cannot preview step {requested}: the next step is {next}")]
    NotUpcoming { requested: usize, next: usize },
}

pub type SimResult<T> = Result<T, SimError>;

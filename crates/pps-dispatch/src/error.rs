//! Error types for dispatch resolution.

use std::time::Duration;
use thiserror::Error;

/// Why a backend could not produce an assignment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("problem is infeasible")]
    Infeasible,

    #[error("problem is unbounded")]
    Unbounded,

    #[error("backend failure: {message}")]
    Failed { message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchErrorReason {
    #[error("infeasible")]
    Infeasible,

    #[error("unbounded")]
    Unbounded,

    #[error("no solution within {limit:?}")]
    Timeout { limit: Duration },

    #[error("backend error: {message}")]
    Backend { message: String },

    /// The graph could not be turned into a problem (e.g. an inconsistent
    /// bound that validation should have caught).
    #[error("formulation error: {what}")]
    Formulation { what: String },
}

/// A failed dispatch solve. Always fatal for the step.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Dispatch failed at step {step_index}: {reason}")]
pub struct DispatchError {
    pub reason: DispatchErrorReason,
    pub step_index: usize,
}

impl DispatchError {
    pub fn new(reason: DispatchErrorReason, step_index: usize) -> Self {
        Self { reason, step_index }
    }

    pub(crate) fn from_backend(err: BackendError, step_index: usize) -> Self {
        let reason = match err {
            BackendError::Infeasible => DispatchErrorReason::Infeasible,
            BackendError::Unbounded => DispatchErrorReason::Unbounded,
            BackendError::Failed { message } => DispatchErrorReason::Backend { message },
        };
        Self::new(reason, step_index)
    }
}

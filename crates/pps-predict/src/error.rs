//! Error types for predictive evaluation.

use pps_core::CoreError;
use thiserror::Error;

pub type PredictionResult<T> = Result<T, PredictionError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// The model itself reported a failure.
    #[error("Prediction for {target} at step {step} failed: {message}")]
    Failed {
        target: String,
        step: usize,
        message: String,
    },

    #[error("Prediction for {target} at step {step} is not finite: {value}")]
    NonFinite {
        target: String,
        step: usize,
        value: f64,
    },

    /// A lagged feature asked for a step that is not in the history.
    #[error("Prediction for {target} at step {step} needs the value from step {needed}, which is not committed")]
    MissingHistory {
        target: String,
        step: usize,
        needed: usize,
    },

    #[error("Invalid model: {what}")]
    InvalidModel { what: String },

    #[error("Model fit failed: {what}")]
    Fit { what: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

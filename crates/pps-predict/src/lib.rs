//! pps-predict: predictive models feeding per-step plant parameters.
//!
//! Provides:
//! - The `PredictiveModel` trait and its causal `PredictionContext`
//! - Built-in variants: constant, time series, linear regression, seeded noise, closures
//! - `PredictorSet`, which evaluates every binding of a step in parallel

pub mod error;
pub mod model;
pub mod models;
pub mod set;

pub use error::{PredictionError, PredictionResult};
pub use model::{Prediction, PredictionContext, PredictiveModel};
pub use models::{
    Constant, Feature, FnModel, LinearModel, Noisy, Observation, SeriesMode, TimeSeries,
};
pub use set::{Binding, PredictorSet};

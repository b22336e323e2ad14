//! The predictive-model interface.

use chrono::{NaiveDateTime, Timelike};
use pps_graph::{SignalTarget, Snapshot};
use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, PredictionResult};

/// Output of a model: a point value or a distribution summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    Value(f64),
    Distribution { mean: f64, std_dev: f64 },
}

impl Prediction {
    /// Value the dispatcher uses.
    pub fn mean(&self) -> f64 {
        match *self {
            Prediction::Value(v) => v,
            Prediction::Distribution { mean, .. } => mean,
        }
    }

    pub fn std_dev(&self) -> f64 {
        match *self {
            Prediction::Value(_) => 0.0,
            Prediction::Distribution { std_dev, .. } => std_dev,
        }
    }
}

/// Everything a model may look at when predicting one target for one step.
///
/// `history` only holds snapshots of steps strictly before `step`, so a model
/// cannot observe the step it is predicting.
#[derive(Debug, Clone, Copy)]
pub struct PredictionContext<'a> {
    pub step: usize,
    pub timestamp: Option<NaiveDateTime>,
    pub target: &'a SignalTarget,
    pub history: &'a [Snapshot],
}

impl<'a> PredictionContext<'a> {
    pub fn new(
        step: usize,
        timestamp: Option<NaiveDateTime>,
        target: &'a SignalTarget,
        history: &'a [Snapshot],
    ) -> Self {
        let committed = history.partition_point(|s| s.step() < step);
        Self {
            step,
            timestamp,
            target,
            history: &history[..committed],
        }
    }

    /// Observed value of the target `lag` steps ago (`lag >= 1`).
    pub fn lagged(&self, lag: usize) -> PredictionResult<f64> {
        let missing = || PredictionError::MissingHistory {
            target: self.target.to_string(),
            step: self.step,
            needed: self.step.saturating_sub(lag),
        };
        if lag == 0 || lag > self.step {
            return Err(missing());
        }
        let wanted = self.step - lag;
        self.history
            .iter()
            .rev()
            .find(|s| s.step() == wanted)
            .and_then(|s| s.observed(self.target))
            .ok_or_else(missing)
    }

    /// Fractional hour of day, if the clock carries wall time.
    pub fn hour_of_day(&self) -> Option<f64> {
        self.timestamp
            .map(|t| t.hour() as f64 + t.minute() as f64 / 60.0)
    }

    /// Error helper for model implementations.
    pub fn fail(&self, message: impl Into<String>) -> PredictionError {
        PredictionError::Failed {
            target: self.target.to_string(),
            step: self.step,
            message: message.into(),
        }
    }
}

/// Maps a context to a predicted value for one node or edge signal.
///
/// Implementations must be deterministic in their inputs: the same context
/// yields the same prediction.
pub trait PredictiveModel: Send + Sync {
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction>;
}

impl<M: PredictiveModel + ?Sized> PredictiveModel for Box<M> {
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        (**self).predict(ctx)
    }
}

impl<M: PredictiveModel + ?Sized> PredictiveModel for std::sync::Arc<M> {
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        (**self).predict(ctx)
    }
}

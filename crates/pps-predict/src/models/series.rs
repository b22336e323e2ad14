use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, PredictionResult};
use crate::model::{Prediction, PredictionContext, PredictiveModel};

/// Behavior past the end of a [`TimeSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMode {
    /// Repeat the last value.
    #[default]
    HoldLast,
    /// Wrap around to the start (daily or weekly profiles).
    Cyclic,
}

/// Per-step table of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    values: Vec<f64>,
    mode: SeriesMode,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>, mode: SeriesMode) -> PredictionResult<Self> {
        if values.is_empty() {
            return Err(PredictionError::InvalidModel {
                what: "time series has no values".into(),
            });
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(PredictionError::InvalidModel {
                what: format!("time series contains non-finite value {v}"),
            });
        }
        Ok(Self { values, mode })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn mode(&self) -> SeriesMode {
        self.mode
    }

    pub fn value_at(&self, step: usize) -> f64 {
        let n = self.values.len();
        let idx = match self.mode {
            SeriesMode::HoldLast => step.min(n - 1),
            SeriesMode::Cyclic => step % n,
        };
        self.values[idx]
    }
}

impl PredictiveModel for TimeSeries {
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        Ok(Prediction::Value(self.value_at(ctx.step)))
    }
}

use serde::{Deserialize, Serialize};

use crate::error::PredictionResult;
use crate::model::{Prediction, PredictionContext, PredictiveModel};

/// Same value at every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl PredictiveModel for Constant {
    fn predict(&self, _ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        Ok(Prediction::Value(self.value))
    }
}

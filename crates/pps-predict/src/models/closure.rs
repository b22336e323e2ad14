use std::fmt;

use crate::error::PredictionResult;
use crate::model::{Prediction, PredictionContext, PredictiveModel};

/// Adapter turning a closure into a model.
pub struct FnModel<F> {
    f: F,
}

impl<F> FnModel<F>
where
    F: Fn(&PredictionContext<'_>) -> PredictionResult<Prediction> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> PredictiveModel for FnModel<F>
where
    F: Fn(&PredictionContext<'_>) -> PredictionResult<Prediction> + Send + Sync,
{
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        (self.f)(ctx)
    }
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnModel")
    }
}

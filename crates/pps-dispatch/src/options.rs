use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relative weight of each objective term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    /// Operating cost net of demand revenue.
    pub cost: f64,
    /// Penalty on unserved demand (scales each node's own unmet penalty).
    pub unmet_demand: f64,
    /// Reward per unit of stored level at the end of the step.
    pub storage_value: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            cost: 1.0,
            unmet_demand: 1.0,
            storage_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Solver values this close to a bound are snapped onto it.
    pub epsilon: f64,
    /// Wall-clock limit per solve; `None` solves on the calling thread.
    pub time_limit: Option<Duration>,
    pub weights: ObjectiveWeights,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-7,
            time_limit: None,
            weights: ObjectiveWeights::default(),
        }
    }
}

impl DispatchOptions {
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }
}

use std::collections::{BTreeSet, HashMap};

use pps_graph::{SignalTarget, StepParameters};

/// Prediction values keyed by (step, target).
///
/// A step is either fully evaluated or absent: values are recorded for every
/// binding of a step at once, so a hit never mixes cached and fresh values.
#[derive(Debug, Clone, Default)]
pub struct PredictionMemo {
    values: HashMap<(usize, SignalTarget), f64>,
    steps: BTreeSet<usize>,
}

impl PredictionMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: usize, values: impl IntoIterator<Item = (SignalTarget, f64)>) {
        for (target, value) in values {
            self.values.insert((step, target), value);
        }
        self.steps.insert(step);
    }

    pub fn contains_step(&self, step: usize) -> bool {
        self.steps.contains(&step)
    }

    pub fn get(&self, step: usize, target: &SignalTarget) -> Option<f64> {
        self.values.get(&(step, target.clone())).copied()
    }

    /// Overrides for `step`, if it was evaluated.
    pub fn parameters(&self, step: usize) -> Option<StepParameters> {
        if !self.contains_step(step) {
            return None;
        }
        Some(
            self.values
                .iter()
                .filter(|((s, _), _)| *s == step)
                .map(|((_, target), value)| (target.clone(), *value))
                .collect(),
        )
    }

    /// Drop every entry for steps up to and including `step`.
    pub fn evict_through(&mut self, step: usize) {
        self.values.retain(|(s, _), _| *s > step);
        self.steps = self.steps.split_off(&(step + 1));
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.steps.clear();
    }

    /// Number of evaluated steps held.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

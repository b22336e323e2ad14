//! Linear regression on time features and lagged observations.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use chrono::{NaiveDateTime, Timelike};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, PredictionResult};
use crate::model::{Prediction, PredictionContext, PredictiveModel};

/// Regressor column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feature {
    Bias,
    Step,
    /// sin(2π · hour / 24); needs a timestamped clock.
    HourSin,
    HourCos,
    /// Observed target value `lag` steps earlier.
    Lag { lag: usize },
}

/// One training sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub step: usize,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    pub value: f64,
}

/// `y = Σ coefficient_i · feature_i`, fit by least squares.
///
/// A fitted model predicts a distribution whose spread is the training
/// residual standard deviation. Until every lag is available, `warmup` is
/// returned instead; without a warmup value the step fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    features: Vec<Feature>,
    coefficients: Vec<f64>,
    #[serde(default)]
    residual_std: f64,
    #[serde(default)]
    warmup: Option<f64>,
}

impl LinearModel {
    pub fn new(features: Vec<Feature>, coefficients: Vec<f64>) -> PredictionResult<Self> {
        if features.len() != coefficients.len() {
            return Err(PredictionError::InvalidModel {
                what: format!(
                    "{} features but {} coefficients",
                    features.len(),
                    coefficients.len()
                ),
            });
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PredictionError::InvalidModel {
                what: "non-finite coefficient".into(),
            });
        }
        Ok(Self {
            features,
            coefficients,
            residual_std: 0.0,
            warmup: None,
        })
    }

    /// Least-squares fit on a series of observations of the target itself.
    ///
    /// Samples whose lags reach before the first observation are skipped.
    pub fn fit(features: Vec<Feature>, observations: &[Observation]) -> PredictionResult<Self> {
        if features.is_empty() {
            return Err(PredictionError::Fit {
                what: "no features".into(),
            });
        }
        let by_step: BTreeMap<usize, f64> =
            observations.iter().map(|o| (o.step, o.value)).collect();

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for obs in observations {
            let lag = |k: usize| {
                obs.step
                    .checked_sub(k)
                    .filter(|_| k > 0)
                    .and_then(|s| by_step.get(&s).copied())
            };
            let hour = obs.timestamp.map(hour_of);
            let row: Option<Vec<f64>> = features
                .iter()
                .map(|f| evaluate(*f, obs.step, hour, &lag))
                .collect::<Result<_, FeatureGap>>()
                .ok();
            if let Some(row) = row {
                rows.extend(row);
                targets.push(obs.value);
            }
        }

        let n = targets.len();
        let p = features.len();
        if n < p {
            return Err(PredictionError::Fit {
                what: format!("{n} usable samples for {p} features"),
            });
        }
        if rows.iter().chain(&targets).any(|v| !v.is_finite()) {
            return Err(PredictionError::Fit {
                what: "training data contains non-finite values".into(),
            });
        }

        let x = DMatrix::from_row_slice(n, p, &rows);
        let y = DVector::from_vec(targets);
        let beta = x
            .clone()
            .svd(true, true)
            .solve(&y, 1e-12)
            .map_err(|e| PredictionError::Fit { what: e.to_string() })?;

        let residuals = &y - &x * &beta;
        let dof = if n > p { n - p } else { n };
        let residual_std = (residuals.norm_squared() / dof as f64).sqrt();

        Ok(Self {
            features,
            coefficients: beta.iter().copied().collect(),
            residual_std,
            warmup: None,
        })
    }

    pub fn with_warmup(mut self, value: f64) -> Self {
        self.warmup = Some(value);
        self
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }
}

impl PredictiveModel for LinearModel {
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        let hour = ctx.hour_of_day();
        let mut mean = 0.0;
        for (feature, coefficient) in self.features.iter().zip(&self.coefficients) {
            let value = match evaluate(*feature, ctx.step, hour, |k| ctx.lagged(k).ok()) {
                Ok(v) => v,
                Err(FeatureGap::Lag(k)) => {
                    return match self.warmup {
                        Some(w) => Ok(Prediction::Value(w)),
                        None => Err(PredictionError::MissingHistory {
                            target: ctx.target.to_string(),
                            step: ctx.step,
                            needed: ctx.step.saturating_sub(k),
                        }),
                    };
                }
                Err(FeatureGap::Timestamp) => {
                    return Err(ctx.fail("hour-of-day feature needs a timestamped clock"));
                }
            };
            mean += coefficient * value;
        }

        if self.residual_std > 0.0 {
            Ok(Prediction::Distribution {
                mean,
                std_dev: self.residual_std,
            })
        } else {
            Ok(Prediction::Value(mean))
        }
    }
}

enum FeatureGap {
    Lag(usize),
    Timestamp,
}

fn hour_of(t: NaiveDateTime) -> f64 {
    t.hour() as f64 + t.minute() as f64 / 60.0
}

fn evaluate(
    feature: Feature,
    step: usize,
    hour: Option<f64>,
    lag: impl Fn(usize) -> Option<f64>,
) -> Result<f64, FeatureGap> {
    match feature {
        Feature::Bias => Ok(1.0),
        Feature::Step => Ok(step as f64),
        Feature::HourSin => hour
            .map(|h| (TAU * h / 24.0).sin())
            .ok_or(FeatureGap::Timestamp),
        Feature::HourCos => hour
            .map(|h| (TAU * h / 24.0).cos())
            .ok_or(FeatureGap::Timestamp),
        Feature::Lag { lag: k } => lag(k).ok_or(FeatureGap::Lag(k)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pps_graph::{Signal, SignalTarget};

    fn obs(values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(step, value)| Observation {
                step,
                timestamp: None,
                value: *value,
            })
            .collect()
    }

    #[test]
    fn recovers_a_linear_trend() {
        let data: Vec<f64> = (0..20).map(|s| 5.0 + 2.0 * s as f64).collect();
        let model = LinearModel::fit(vec![Feature::Bias, Feature::Step], &obs(&data)).unwrap();
        assert!((model.coefficients()[0] - 5.0).abs() < 1e-9);
        assert!((model.coefficients()[1] - 2.0).abs() < 1e-9);
        assert!(model.residual_std() < 1e-9);

        let target = SignalTarget::node("town", Signal::Demand);
        let ctx = PredictionContext::new(30, None, &target, &[]);
        let p = model.predict(&ctx).unwrap();
        assert!((p.mean() - 65.0).abs() < 1e-6);
    }

    #[test]
    fn autoregressive_fit_skips_warmup_rows() {
        // x_t = 0.5 x_{t-1} + 10
        let mut data = vec![0.0];
        for _ in 0..15 {
            let last = *data.last().unwrap();
            data.push(0.5 * last + 10.0);
        }
        let model =
            LinearModel::fit(vec![Feature::Bias, Feature::Lag { lag: 1 }], &obs(&data)).unwrap();
        assert!((model.coefficients()[0] - 10.0).abs() < 1e-6);
        assert!((model.coefficients()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_lag_uses_warmup_or_fails() {
        let model = LinearModel::new(vec![Feature::Lag { lag: 1 }], vec![1.0]).unwrap();
        let target = SignalTarget::node("town", Signal::Demand);
        let ctx = PredictionContext::new(0, None, &target, &[]);
        assert!(matches!(
            model.predict(&ctx),
            Err(PredictionError::MissingHistory { .. })
        ));
        let model = model.with_warmup(42.0);
        assert_eq!(model.predict(&ctx).unwrap(), Prediction::Value(42.0));
    }

    #[test]
    fn too_few_samples_is_a_fit_error() {
        let err = LinearModel::fit(vec![Feature::Bias, Feature::Step], &obs(&[1.0])).unwrap_err();
        assert!(matches!(err, PredictionError::Fit { .. }));
    }

    #[test]
    fn hour_feature_needs_timestamp() {
        let model = LinearModel::new(vec![Feature::HourSin], vec![1.0]).unwrap();
        let target = SignalTarget::node("pv", Signal::Availability);
        let ctx = PredictionContext::new(0, None, &target, &[]);
        assert!(matches!(model.predict(&ctx), Err(PredictionError::Failed { .. })));
    }
}

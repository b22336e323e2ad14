use pps_graph::SignalTarget;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::error::{PredictionError, PredictionResult};
use crate::model::{Prediction, PredictionContext, PredictiveModel};

/// Adds Gaussian noise to another model's mean.
///
/// The generator is re-seeded from `(seed, step, target)` on every call, so a
/// given step draws the same noise no matter how many steps ran before it or
/// in which order bindings were evaluated.
pub struct Noisy<M> {
    inner: M,
    normal: Normal<f64>,
    seed: u64,
    floor: Option<f64>,
}

impl<M: PredictiveModel> Noisy<M> {
    pub fn new(inner: M, std_dev: f64, seed: u64) -> PredictionResult<Self> {
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(PredictionError::InvalidModel {
                what: format!("noise std_dev must be finite and non-negative, got {std_dev}"),
            });
        }
        let normal = Normal::new(0.0, std_dev).map_err(|e| PredictionError::InvalidModel {
            what: format!("noise std_dev {std_dev}: {e}"),
        })?;
        Ok(Self {
            inner,
            normal,
            seed,
            floor: None,
        })
    }

    /// Clamp noisy values from below (e.g. 0 for availabilities).
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn std_dev(&self) -> f64 {
        self.normal.std_dev()
    }

    fn rng_for(&self, ctx: &PredictionContext<'_>) -> StdRng {
        StdRng::seed_from_u64(stream_seed(self.seed, ctx.step, ctx.target))
    }
}

/// Seed for one (seed, step, target) stream.
///
/// FNV-1a over the target followed by splitmix64 finalization, so the value
/// does not depend on the toolchain's hasher.
pub(crate) fn stream_seed(seed: u64, step: usize, target: &SignalTarget) -> u64 {
    let element: &[u8] = if target.is_node() { b"node" } else { b"edge" };
    let mut h = fnv1a(FNV_OFFSET, element);
    h = fnv1a(h, &[0]);
    h = fnv1a(h, target.name().as_bytes());
    h = fnv1a(h, &[0]);
    h = fnv1a(h, target.signal().as_str().as_bytes());
    splitmix64(splitmix64(seed ^ h) ^ step as u64)
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(mut h: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl<M: PredictiveModel> PredictiveModel for Noisy<M> {
    fn predict(&self, ctx: &PredictionContext<'_>) -> PredictionResult<Prediction> {
        let mean = self.inner.predict(ctx)?.mean();
        let mut rng = self.rng_for(ctx);
        let mut value = mean + self.normal.sample(&mut rng);
        if let Some(floor) = self.floor {
            value = value.max(floor);
        }
        Ok(Prediction::Value(value))
    }
}

use crate::CoreError;

/// Floating point type used throughout the engine.
pub type Real = f64;

/// Absolute/relative tolerance pair used for every bound and balance check.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-6,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Effective tolerance when comparing against `scale`.
    pub fn around(&self, scale: Real) -> Real {
        self.abs + self.rel * scale.abs()
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Whether `v` lies in `[lo, hi]` up to `tol`. An infinite `hi` is unbounded.
pub fn within_bounds(v: Real, lo: Real, hi: Real, tol: Tolerances) -> bool {
    v >= lo - tol.around(lo) && (hi.is_infinite() || v <= hi + tol.around(hi))
}

/// Snap `v` onto `lo` or `hi` when it is within `epsilon` of either bound.
///
/// Solver output carries round-off; without snapping, a storage level sitting at
/// its capacity drifts a little further each step.
pub fn snap_to_bounds(v: Real, lo: Real, hi: Real, epsilon: Real) -> Real {
    if (v - lo).abs() <= epsilon {
        lo
    } else if hi.is_finite() && (v - hi).abs() <= epsilon {
        hi
    } else {
        v
    }
}

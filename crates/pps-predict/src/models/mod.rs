//! Built-in model variants.

mod closure;
mod constant;
mod linear;
mod noisy;
mod series;

pub use closure::FnModel;
pub use constant::Constant;
pub use linear::{Feature, LinearModel, Observation};
pub use noisy::Noisy;
pub use series::{SeriesMode, TimeSeries};

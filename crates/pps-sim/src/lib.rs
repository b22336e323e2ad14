//! Discrete-time simulation of power plants.
//!
//! Provides:
//! - `SimulationClock` for step counting, horizons and timestamps
//! - `Simulation`, the predict / dispatch / commit / record loop
//! - A memo table for predictions, keyed by (step, target)
//! - `SimulationOutput` tables for reporting

pub mod clock;
pub mod error;
pub mod memo;
pub mod output;
pub mod sim;

pub use clock::SimulationClock;
pub use error::{SimError, SimResult};
pub use memo::PredictionMemo;
pub use output::{Series, SimulationOutput};
pub use sim::{SimOptions, SimState, Simulation};

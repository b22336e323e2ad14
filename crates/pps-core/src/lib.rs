//! pps-core: stable foundation for ppsim.
//!
//! Contains:
//! - numeric (Real + tolerances + bound snapping)
//! - ids (compact arena handles for nodes and edges)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;

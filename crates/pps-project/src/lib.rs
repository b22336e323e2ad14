//! pps-project: plant file format, validation and plant construction.

pub mod build;
pub mod schema;
pub mod validate;

use pps_graph::{GraphError, InvalidTopologyError};
use pps_predict::PredictionError;

pub use build::{Plant, build_model, build_plant};
pub use schema::*;
pub use validate::{ValidationError, validate_spec};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Topology(#[from] InvalidTopologyError),

    #[error("Model error: {0}")]
    Model(#[from] PredictionError),

    #[error("Build error: {what}")]
    Build { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<PlantSpec> {
    let content = std::fs::read_to_string(path)?;
    let spec: PlantSpec = serde_yaml::from_str(&content)?;
    validate_spec(&spec)?;
    Ok(spec)
}

pub fn save_yaml(path: &std::path::Path, spec: &PlantSpec) -> ProjectResult<()> {
    validate_spec(spec)?;
    let content = serde_yaml::to_string(spec)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<PlantSpec> {
    let content = std::fs::read_to_string(path)?;
    let spec: PlantSpec = serde_json::from_str(&content)?;
    validate_spec(&spec)?;
    Ok(spec)
}

pub fn save_json(path: &std::path::Path, spec: &PlantSpec) -> ProjectResult<()> {
    validate_spec(spec)?;
    let content = serde_json::to_string_pretty(spec)?;
    std::fs::write(path, content)?;
    Ok(())
}

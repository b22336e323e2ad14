//! Structural checks on a plant file.
//!
//! These run before anything is built. Physical consistency (commodities,
//! bounds, connectivity) is checked by the graph itself when the plant is built.

use std::collections::HashSet;

use crate::schema::{LATEST_VERSION, ModelDef, PlantSpec};
use pps_graph::SignalTarget;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_spec(spec: &PlantSpec) -> Result<(), ValidationError> {
    if spec.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: spec.version,
        });
    }

    let mut node_names = HashSet::new();
    for node in &spec.nodes {
        if node.name.is_empty() {
            return Err(invalid("node name", "\"\"", "must not be empty"));
        }
        if !node_names.insert(node.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: node.name.clone(),
                context: "nodes".to_string(),
            });
        }
    }

    let mut edge_names = HashSet::new();
    for edge in &spec.edges {
        let name = edge.resolved_name();
        for endpoint in [&edge.from, &edge.to] {
            if !node_names.contains(endpoint.as_str()) {
                return Err(ValidationError::MissingReference {
                    name: endpoint.clone(),
                    context: format!("edge '{name}'"),
                });
            }
        }
        if let Some(max) = edge.max_flow {
            finite(&format!("edge '{name}'.max_flow"), max)?;
        }
        finite(&format!("edge '{name}'.min_flow"), edge.min_flow)?;
        finite(&format!("edge '{name}'.efficiency"), edge.efficiency)?;
        finite(&format!("edge '{name}'.cost"), edge.cost)?;
        if !edge_names.insert(name.clone()) {
            return Err(ValidationError::DuplicateName {
                name,
                context: "edges".to_string(),
            });
        }
    }

    for binding in &spec.bindings {
        let (known, kind) = match &binding.target {
            SignalTarget::Node { name, .. } => (node_names.contains(name.as_str()), "node"),
            SignalTarget::Edge { name, .. } => (edge_names.contains(name), "edge"),
        };
        if !known {
            return Err(ValidationError::MissingReference {
                name: binding.target.name().to_string(),
                context: format!("binding {kind}"),
            });
        }
        validate_model(&binding.target.to_string(), &binding.model)?;
    }

    if spec.clock.step_minutes <= 0 {
        return Err(invalid(
            "clock.step_minutes",
            spec.clock.step_minutes,
            "must be positive",
        ));
    }
    if let Some(limit) = spec.dispatch.time_limit_secs {
        if !(limit.is_finite() && limit > 0.0) {
            return Err(invalid("dispatch.time_limit_secs", limit, "must be positive"));
        }
    }
    if let Some(eps) = spec.dispatch.epsilon {
        if !(eps.is_finite() && eps >= 0.0) {
            return Err(invalid("dispatch.epsilon", eps, "must be non-negative"));
        }
    }
    let w = &spec.dispatch.weights;
    for (field, value) in [
        ("dispatch.weights.cost", w.cost),
        ("dispatch.weights.unmet_demand", w.unmet_demand),
        ("dispatch.weights.storage_value", w.storage_value),
    ] {
        finite(field, value)?;
    }
    if !(spec.tolerances.abs >= 0.0 && spec.tolerances.rel >= 0.0) {
        return Err(invalid(
            "tolerances",
            format!("{:?}", spec.tolerances),
            "must be non-negative",
        ));
    }

    Ok(())
}

fn validate_model(target: &str, model: &ModelDef) -> Result<(), ValidationError> {
    let field = |name: &str| format!("binding {target}.{name}");
    match model {
        ModelDef::Constant { value } => finite(&field("value"), *value).map(|_| ()),
        ModelDef::TimeSeries { values, .. } => {
            if values.is_empty() {
                return Err(invalid(&field("values"), "[]", "needs at least one value"));
            }
            values.iter().try_for_each(|v| finite(&field("values"), *v).map(|_| ()))
        }
        ModelDef::Linear {
            features,
            coefficients,
            ..
        } => {
            if features.len() != coefficients.len() {
                return Err(invalid(
                    &field("coefficients"),
                    coefficients.len(),
                    &format!("expected one per feature ({})", features.len()),
                ));
            }
            Ok(())
        }
        ModelDef::Fitted {
            features,
            observations,
            ..
        } => {
            if features.is_empty() {
                return Err(invalid(&field("features"), "[]", "needs at least one feature"));
            }
            if observations.len() < features.len() {
                return Err(invalid(
                    &field("observations"),
                    observations.len(),
                    "fewer observations than features",
                ));
            }
            Ok(())
        }
        ModelDef::Noisy { inner, std_dev, .. } => {
            if !(std_dev.is_finite() && *std_dev >= 0.0) {
                return Err(invalid(&field("std_dev"), std_dev, "must be non-negative"));
            }
            validate_model(target, inner)
        }
    }
}

fn finite(field: &str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

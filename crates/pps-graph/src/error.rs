//! Graph-specific error types.

use std::fmt;
use thiserror::Error;

/// A single topology violation.
///
/// Returned directly by `add_node`/`add_edge` and collected in bulk by
/// [`crate::PlantGraph::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Node '{name}' already exists")]
    DuplicateNode { name: String },

    #[error("Edge {from} -> {to} carrying '{commodity}' already exists")]
    DuplicateEdge {
        from: String,
        to: String,
        commodity: String,
    },

    #[error("Edge name '{name}' is already used")]
    DuplicateEdgeName { name: String },

    #[error("Node '{name}' does not exist")]
    UnknownNode { name: String },

    #[error("Edge '{name}' does not exist")]
    UnknownEdge { name: String },

    #[error("Edge '{edge}': node '{node}' does not {direction} commodity '{commodity}'")]
    CommodityMismatch {
        edge: String,
        node: String,
        commodity: String,
        direction: &'static str,
    },

    #[error("Edge '{edge}' is dangling: endpoint '{missing}' was removed")]
    DanglingEdge { edge: String, missing: String },

    #[error("Edge '{edge}' connects a node to itself")]
    SelfLoop { edge: String },

    #[error("{element}: {field} must be non-negative, got {value}")]
    NegativeCapacity {
        element: String,
        field: &'static str,
        value: f64,
    },

    #[error("{element}: lower bound {min} exceeds upper bound {max}")]
    InvertedBounds { element: String, min: f64, max: f64 },

    #[error("{element}: {field} = {value} ({expected})")]
    InvalidCoefficient {
        element: String,
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("Storage '{node}': initial level {level} outside [{min}, {max}]")]
    InitialLevelOutOfBounds {
        node: String,
        level: f64,
        min: f64,
        max: f64,
    },

    #[error("Machine '{node}' declares no output commodity")]
    EmptyConversion { node: String },

    #[error("Machine '{node}' declares both output ratios and a setpoint curve")]
    AmbiguousConversion { node: String },

    #[error("Machine '{node}': setpoint curve for '{commodity}' has {got} values for {expected} breakpoints")]
    CurveShape {
        node: String,
        commodity: String,
        expected: usize,
        got: usize,
    },

    #[error("Node '{node}' has no inbound edge for commodity '{commodity}'")]
    MissingInflow { node: String, commodity: String },

    #[error("Node '{node}' has no outbound edge for commodity '{commodity}'")]
    MissingOutflow { node: String, commodity: String },

    #[error("{element} does not support parameter '{parameter}'")]
    UnsupportedParameter {
        element: String,
        parameter: &'static str,
    },

    #[error("The {arena} arena is full")]
    ArenaFull { arena: &'static str },

    #[error("Binding for {target} is invalid: {reason}")]
    InvalidBinding { target: String, reason: String },
}

/// Aggregate of every topology violation found during validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidTopologyError {
    pub violations: Vec<TopologyError>,
}

impl InvalidTopologyError {
    /// Whether any violation matches the predicate.
    pub fn contains(&self, pred: impl Fn(&TopologyError) -> bool) -> bool {
        self.violations.iter().any(pred)
    }
}

impl fmt::Display for InvalidTopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid topology ({} violations)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n  - {}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidTopologyError {}

/// Mutation attempted on a sealed graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{element} is locked: '{operation}' is rejected once the plant is configured")]
pub struct StateLockError {
    pub element: String,
    pub operation: &'static str,
}

/// A step result that cannot be committed. Nothing is mutated when this is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    #[error("Commit out of order: expected step {expected}, got {got}")]
    OutOfOrder { expected: usize, got: usize },

    #[error("Shape mismatch for {what}: expected {expected} entries, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Missing value for {element}")]
    MissingValue { element: String },

    #[error("{element}: {field} = {value} outside [{min}, {max}]")]
    OutOfBounds {
        element: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{element}: {parameter} = {value} ({expected})")]
    InvalidParameter {
        element: String,
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("{node}: balance of '{commodity}' off by {residual}")]
    Imbalance {
        node: String,
        commodity: String,
        residual: f64,
    },
}

/// Umbrella error for graph operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Invalid(#[from] InvalidTopologyError),

    #[error(transparent)]
    Locked(#[from] StateLockError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

pub type GraphResult<T> = Result<T, GraphError>;

//! pps-graph: plant topology layer for ppsim.
//!
//! Provides:
//! - Node and edge arenas indexed by integer handles (storage loops allowed)
//! - Whole-graph validation reporting every violation at once
//! - Per-step parameter overrides fed by predictive models
//! - The commit protocol and immutable step snapshots
//!
//! # Example
//!
//! ```
//! use pps_graph::{DemandParams, EdgeSpec, NodeSpec, PlantGraph, SupplyParams};
//!
//! let mut graph = PlantGraph::new();
//! graph.add_node(NodeSpec::new("grid", SupplyParams::new("power", 100.0))).unwrap();
//! graph.add_node(NodeSpec::new("town", DemandParams::new("power", 60.0))).unwrap();
//! graph.add_edge(EdgeSpec::new("grid", "town", "power")).unwrap();
//!
//! assert!(graph.validate().is_ok());
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_count(), 1);
//! ```

pub mod commit;
pub mod edge;
pub mod error;
pub mod graph;
pub mod node;
pub mod signal;
pub mod snapshot;
pub mod state;
pub(crate) mod validate;

pub use edge::{Edge, EdgeSpec};
pub use error::{
    CommitError, GraphError, GraphResult, InvalidTopologyError, StateLockError, TopologyError,
};
pub use graph::{EdgeFilter, PlantGraph};
pub use node::{
    ConversionRatio, CurveOutput, DemandParams, MachineParams, Node, NodeKind, NodeKindTag,
    NodeSpec, SetpointCurve, StorageParams, SupplyParams,
};
pub use signal::{Signal, SignalTarget, StepParameters};
pub use snapshot::{EdgeSnapshot, NodeSnapshot, Snapshot};
pub use state::{Lifecycle, NodeOutcome, NodeState, StepOutcome};

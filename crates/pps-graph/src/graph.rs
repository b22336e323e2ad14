//! The plant graph: node and edge arenas plus adjacency.

use std::collections::{BTreeSet, HashMap, HashSet};

use pps_core::{EdgeId, NodeId};

use crate::edge::{Edge, EdgeSpec};
use crate::error::{GraphResult, InvalidTopologyError, StateLockError, TopologyError};
use crate::node::{Node, NodeKind, NodeKindTag, NodeSpec};
use crate::state::Lifecycle;
use crate::validate;

/// Directed multigraph of plant elements.
///
/// Nodes and edges live in arenas indexed by [`NodeId`]/[`EdgeId`]. Removed
/// elements leave a tombstone so handles stay stable. Cycles are allowed.
///
/// Once sealed, the graph only changes through [`PlantGraph::commit`] and
/// [`PlantGraph::reset_state`]; every configuration setter fails with
/// [`StateLockError`].
#[derive(Debug, Clone, Default)]
pub struct PlantGraph {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) edges: Vec<Option<Edge>>,
    node_names: HashMap<String, NodeId>,
    edge_names: HashMap<String, EdgeId>,
    edge_keys: HashSet<(NodeId, NodeId, String)>,
    /// Per node slot, edges in insertion order.
    inbound: Vec<Vec<EdgeId>>,
    outbound: Vec<Vec<EdgeId>>,
    incident: Vec<Vec<EdgeId>>,
    sealed: bool,
    pub(crate) committed_steps: usize,
}

impl PlantGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> GraphResult<NodeId> {
        self.ensure_unsealed(format!("node '{}'", spec.name), "add_node")?;
        if self.node_names.contains_key(&spec.name) {
            return Err(TopologyError::DuplicateNode { name: spec.name }.into());
        }

        let id = NodeId::from_index(arena_index(self.nodes.len(), "node")?);
        self.node_names.insert(spec.name.clone(), id);
        self.nodes.push(Some(Node::new(id, spec)));
        self.inbound.push(Vec::new());
        self.outbound.push(Vec::new());
        self.incident.push(Vec::new());
        Ok(id)
    }

    pub fn add_edge(&mut self, spec: EdgeSpec) -> GraphResult<EdgeId> {
        let name = spec.resolved_name();
        self.ensure_unsealed(format!("edge '{}'", name), "add_edge")?;

        let source = self.require_node(&spec.source)?;
        let destination = self.require_node(&spec.destination)?;
        if source == destination {
            return Err(TopologyError::SelfLoop { edge: name }.into());
        }

        let emits = self
            .node(source)
            .is_some_and(|n| n.kind().emits(&spec.commodity));
        if !emits {
            return Err(TopologyError::CommodityMismatch {
                edge: name,
                node: spec.source,
                commodity: spec.commodity,
                direction: "emit",
            }
            .into());
        }
        let accepts = self
            .node(destination)
            .is_some_and(|n| n.kind().accepts(&spec.commodity));
        if !accepts {
            return Err(TopologyError::CommodityMismatch {
                edge: name,
                node: spec.destination,
                commodity: spec.commodity,
                direction: "accept",
            }
            .into());
        }

        let key = (source, destination, spec.commodity.clone());
        if self.edge_keys.contains(&key) {
            return Err(TopologyError::DuplicateEdge {
                from: spec.source,
                to: spec.destination,
                commodity: spec.commodity,
            }
            .into());
        }
        if self.edge_names.contains_key(&name) {
            return Err(TopologyError::DuplicateEdgeName { name }.into());
        }

        let id = EdgeId::from_index(arena_index(self.edges.len(), "edge")?);
        self.edge_keys.insert(key);
        self.edge_names.insert(name.clone(), id);
        self.outbound[source.slot()].push(id);
        self.inbound[destination.slot()].push(id);
        self.incident[source.slot()].push(id);
        self.incident[destination.slot()].push(id);
        self.edges.push(Some(Edge {
            id,
            name,
            source,
            destination,
            source_name: spec.source,
            destination_name: spec.destination,
            commodity: spec.commodity,
            min_flow: spec.min_flow,
            max_flow: spec.max_flow,
            efficiency: spec.efficiency,
            cost: spec.cost,
            lifecycle: Lifecycle::Configured,
            flow: 0.0,
            history: Vec::new(),
        }));
        Ok(id)
    }

    /// Remove a node, leaving a tombstone.
    ///
    /// Edges touching the node are kept and reported as dangling by
    /// [`PlantGraph::validate`] until they are removed too.
    pub fn remove_node(&mut self, name: &str) -> GraphResult<()> {
        self.ensure_unsealed(format!("node '{}'", name), "remove_node")?;
        let id = self.require_node(name)?;
        self.node_names.remove(name);
        self.nodes[id.slot()] = None;
        Ok(())
    }

    pub fn remove_edge(&mut self, name: &str) -> GraphResult<()> {
        self.ensure_unsealed(format!("edge '{}'", name), "remove_edge")?;
        let id = self
            .edge_names
            .remove(name)
            .ok_or_else(|| TopologyError::UnknownEdge { name: name.into() })?;
        if let Some(edge) = self.edges[id.slot()].take() {
            self.edge_keys
                .remove(&(edge.source, edge.destination, edge.commodity));
            self.outbound[edge.source.slot()].retain(|e| *e != id);
            self.inbound[edge.destination.slot()].retain(|e| *e != id);
            self.incident[edge.source.slot()].retain(|e| *e != id);
            self.incident[edge.destination.slot()].retain(|e| *e != id);
        }
        Ok(())
    }

    /// Set throughput bounds (supply, machine) or level bounds (storage).
    pub fn set_node_bounds(&mut self, name: &str, min: f64, max: f64) -> GraphResult<()> {
        let element = format!("node '{}'", name);
        self.ensure_unsealed(element.clone(), "set_node_bounds")?;
        if min > max {
            return Err(TopologyError::InvertedBounds { element, min, max }.into());
        }
        let node = self.node_mut_by_name(name)?;
        match &mut node.kind {
            NodeKind::Supply(p) => {
                p.min_output = min;
                p.max_output = max;
            }
            NodeKind::Machine(p) => {
                p.min_throughput = min;
                p.max_throughput = max;
            }
            NodeKind::Storage(p) => {
                p.min_level = min;
                p.max_level = max;
            }
            NodeKind::Demand(_) => {
                return Err(TopologyError::UnsupportedParameter {
                    element,
                    parameter: "bounds",
                }
                .into());
            }
        }
        Ok(())
    }

    /// Set the initial (and current) level of a storage node.
    pub fn set_storage_level(&mut self, name: &str, level: f64) -> GraphResult<()> {
        let element = format!("node '{}'", name);
        self.ensure_unsealed(element.clone(), "set_storage_level")?;
        let node = self.node_mut_by_name(name)?;
        match &mut node.kind {
            NodeKind::Storage(p) => {
                p.initial_level = level;
                node.state.level = Some(level);
                Ok(())
            }
            _ => Err(TopologyError::UnsupportedParameter {
                element,
                parameter: "level",
            }
            .into()),
        }
    }

    pub fn set_edge_bounds(&mut self, name: &str, min_flow: f64, max_flow: f64) -> GraphResult<()> {
        let element = format!("edge '{}'", name);
        self.ensure_unsealed(element.clone(), "set_edge_bounds")?;
        if min_flow > max_flow {
            return Err(TopologyError::InvertedBounds {
                element,
                min: min_flow,
                max: max_flow,
            }
            .into());
        }
        let edge = self.edge_mut_by_name(name)?;
        edge.min_flow = min_flow;
        edge.max_flow = max_flow;
        Ok(())
    }

    pub fn set_edge_efficiency(&mut self, name: &str, efficiency: f64) -> GraphResult<()> {
        self.ensure_unsealed(format!("edge '{}'", name), "set_edge_efficiency")?;
        self.edge_mut_by_name(name)?.efficiency = efficiency;
        Ok(())
    }

    /// Lock the configuration. Called by the simulation after validation.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Unlock the configuration, discarding all committed state.
    pub fn reopen(&mut self) {
        self.reset_state();
        self.sealed = false;
    }

    /// Return every element to `Configured`, restore initial storage levels and
    /// clear per-element history.
    pub fn reset_state(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.reset();
        }
        for edge in self.edges.iter_mut().flatten() {
            edge.reset();
        }
        self.committed_steps = 0;
    }

    /// Number of steps committed since construction or the last reset.
    pub fn committed_steps(&self) -> usize {
        self.committed_steps
    }

    /// Check whole-graph invariants, reporting every violation.
    pub fn validate(&self) -> Result<(), InvalidTopologyError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(InvalidTopologyError { violations })
        }
    }

    pub fn violations(&self) -> Vec<TopologyError> {
        validate::collect_violations(self)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot())?.as_ref()
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node(self.node_id(name)?)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    /// Live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    /// Arena length including tombstones.
    pub fn node_slots(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes_of_kind(&self, tag: NodeKindTag) -> impl Iterator<Item = &Node> {
        self.nodes().filter(move |n| n.tag() == tag)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.slot())?.as_ref()
    }

    pub fn edge_by_name(&self, name: &str) -> Option<&Edge> {
        self.edge(*self.edge_names.get(name)?)
    }

    /// Live edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_names.len()
    }

    pub fn edge_slots(&self) -> usize {
        self.edges.len()
    }

    /// Inbound and outbound edges of a node, in insertion order.
    pub fn incident_edges(&self, id: NodeId) -> &[EdgeId] {
        self.adjacency(&self.incident, id)
    }

    pub fn inbound_edges(&self, id: NodeId) -> &[EdgeId] {
        self.adjacency(&self.inbound, id)
    }

    pub fn outbound_edges(&self, id: NodeId) -> &[EdgeId] {
        self.adjacency(&self.outbound, id)
    }

    /// Nodes sharing an edge with `id`, deduplicated, in edge insertion order.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.incident_edges(id)
            .iter()
            .filter_map(|e| self.edge(*e))
            .map(|e| if e.source == id { e.destination } else { e.source })
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Every commodity named by a live node or edge.
    pub fn commodities(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for node in self.nodes() {
            let kind = node.kind();
            for c in kind.commodities_in().into_iter().chain(kind.commodities_out()) {
                set.insert(c.to_string());
            }
        }
        for edge in self.edges() {
            set.insert(edge.commodity.clone());
        }
        set
    }

    pub fn edges_filtered<'a>(&'a self, filter: &'a EdgeFilter) -> impl Iterator<Item = &'a Edge> {
        self.edges().filter(move |e| filter.matches(e))
    }

    fn adjacency<'a>(&self, lists: &'a [Vec<EdgeId>], id: NodeId) -> &'a [EdgeId] {
        if self.node(id).is_none() {
            return &[];
        }
        lists.get(id.slot()).map(Vec::as_slice).unwrap_or(&[])
    }

    fn ensure_unsealed(&self, element: String, operation: &'static str) -> Result<(), StateLockError> {
        if self.sealed {
            Err(StateLockError { element, operation })
        } else {
            Ok(())
        }
    }

    fn require_node(&self, name: &str) -> Result<NodeId, TopologyError> {
        self.node_id(name)
            .ok_or_else(|| TopologyError::UnknownNode { name: name.into() })
    }

    fn node_mut_by_name(&mut self, name: &str) -> Result<&mut Node, TopologyError> {
        let id = self.require_node(name)?;
        self.nodes[id.slot()]
            .as_mut()
            .ok_or_else(|| TopologyError::UnknownNode { name: name.into() })
    }

    fn edge_mut_by_name(&mut self, name: &str) -> Result<&mut Edge, TopologyError> {
        let id = self
            .edge_names
            .get(name)
            .copied()
            .ok_or_else(|| TopologyError::UnknownEdge { name: name.into() })?;
        self.edges[id.slot()]
            .as_mut()
            .ok_or_else(|| TopologyError::UnknownEdge { name: name.into() })
    }
}

/// Next arena slot, refusing slots an [`pps_core::Id`] cannot represent.
pub(crate) fn arena_index(len: usize, arena: &'static str) -> Result<u32, TopologyError> {
    u32::try_from(len)
        .ok()
        .filter(|index| *index < u32::MAX)
        .ok_or(TopologyError::ArenaFull { arena })
}

/// Edge query by endpoint names and commodity. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    pub sources: BTreeSet<String>,
    pub destinations: BTreeSet<String>,
    pub commodities: BTreeSet<String>,
}

impl EdgeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_node(mut self, name: impl Into<String>) -> Self {
        self.sources.insert(name.into());
        self
    }

    pub fn to_node(mut self, name: impl Into<String>) -> Self {
        self.destinations.insert(name.into());
        self
    }

    pub fn carrying(mut self, commodity: impl Into<String>) -> Self {
        self.commodities.insert(commodity.into());
        self
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        fn accepts(set: &BTreeSet<String>, value: &str) -> bool {
            set.is_empty() || set.contains(value)
        }
        accepts(&self.sources, &edge.source_name)
            && accepts(&self.destinations, &edge.destination_name)
            && accepts(&self.commodities, &edge.commodity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::node::{DemandParams, MachineParams, StorageParams, SupplyParams};

    fn chp_plant() -> PlantGraph {
        let mut g = PlantGraph::new();
        g.add_node(NodeSpec::new("gas", SupplyParams::new("gas", 200.0)))
            .unwrap();
        g.add_node(NodeSpec::new(
            "chp",
            MachineParams::new("gas", 100.0)
                .with_output("power", 0.4)
                .with_output("heat", 0.5),
        ))
        .unwrap();
        g.add_node(NodeSpec::new("tank", StorageParams::new("heat", 50.0)))
            .unwrap();
        g.add_node(NodeSpec::new("town", DemandParams::new("power", 30.0)))
            .unwrap();
        g.add_edge(EdgeSpec::new("gas", "chp", "gas")).unwrap();
        g.add_edge(EdgeSpec::new("chp", "town", "power")).unwrap();
        g.add_edge(EdgeSpec::new("chp", "tank", "heat")).unwrap();
        g
    }

    #[test]
    fn adjacency_preserves_insertion_order() {
        let g = chp_plant();
        let chp = g.node_id("chp").unwrap();
        let names: Vec<_> = g
            .incident_edges(chp)
            .iter()
            .map(|e| g.edge(*e).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["gas->chp", "chp->town", "chp->tank"]);
        assert_eq!(g.inbound_edges(chp).len(), 1);
        assert_eq!(g.outbound_edges(chp).len(), 2);

        let neighbors: Vec<_> = g
            .neighbors(chp)
            .into_iter()
            .map(|n| g.node(n).unwrap().name().to_string())
            .collect();
        assert_eq!(neighbors, vec!["gas", "town", "tank"]);
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut g = chp_plant();
        let err = g
            .add_node(NodeSpec::new("gas", SupplyParams::new("gas", 1.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Topology(TopologyError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn duplicate_edge_triple_rejected() {
        let mut g = chp_plant();
        let err = g
            .add_edge(EdgeSpec::new("gas", "chp", "gas").named("second"))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Topology(TopologyError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn missing_endpoint_rejected() {
        let mut g = chp_plant();
        let err = g.add_edge(EdgeSpec::new("gas", "nowhere", "gas")).unwrap_err();
        assert_eq!(
            err,
            GraphError::Topology(TopologyError::UnknownNode {
                name: "nowhere".into()
            })
        );
    }

    #[test]
    fn commodity_mismatch_rejected() {
        let mut g = chp_plant();
        // the tank stores heat, not power
        let err = g.add_edge(EdgeSpec::new("chp", "tank", "power")).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Topology(TopologyError::CommodityMismatch {
                direction: "accept",
                ..
            })
        ));
        let err = g.add_edge(EdgeSpec::new("town", "chp", "gas")).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Topology(TopologyError::CommodityMismatch {
                direction: "emit",
                ..
            })
        ));
    }

    #[test]
    fn edge_filter_queries() {
        let g = chp_plant();
        let from_chp = EdgeFilter::new().from_node("chp");
        assert_eq!(g.edges_filtered(&from_chp).count(), 2);

        let heat = EdgeFilter::new().from_node("chp").carrying("heat");
        let names: Vec<_> = g.edges_filtered(&heat).map(|e| e.name()).collect();
        assert_eq!(names, vec!["chp->tank"]);

        assert_eq!(g.edges_filtered(&EdgeFilter::new()).count(), 3);
    }

    #[test]
    fn commodities_and_kinds() {
        let g = chp_plant();
        let c: Vec<_> = g.commodities().into_iter().collect();
        assert_eq!(c, vec!["gas", "heat", "power"]);
        assert_eq!(g.nodes_of_kind(NodeKindTag::Storage).count(), 1);
    }

    #[test]
    fn removed_edge_leaves_adjacency() {
        let mut g = chp_plant();
        g.remove_edge("chp->tank").unwrap();
        let chp = g.node_id("chp").unwrap();
        assert_eq!(g.outbound_edges(chp).len(), 1);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.edge_slots(), 3);
        // the triple is free again
        g.add_edge(EdgeSpec::new("chp", "tank", "heat")).unwrap();
    }

    #[test]
    fn setters_rejected_once_sealed() {
        let mut g = chp_plant();
        g.set_edge_bounds("gas->chp", 0.0, 80.0).unwrap();
        g.seal();

        let err = g.set_edge_bounds("gas->chp", 0.0, 90.0).unwrap_err();
        assert!(matches!(err, GraphError::Locked(_)));
        assert!(matches!(
            g.set_storage_level("tank", 10.0).unwrap_err(),
            GraphError::Locked(_)
        ));
        assert!(matches!(
            g.add_node(NodeSpec::new("x", SupplyParams::new("gas", 1.0)))
                .unwrap_err(),
            GraphError::Locked(_)
        ));
        assert_eq!(g.edge_by_name("gas->chp").unwrap().bounds(), (0.0, 80.0));

        g.reopen();
        g.set_edge_bounds("gas->chp", 0.0, 90.0).unwrap();
    }

    #[test]
    fn bounds_setter_rejects_demand_and_inverted() {
        let mut g = chp_plant();
        assert!(matches!(
            g.set_node_bounds("town", 0.0, 1.0).unwrap_err(),
            GraphError::Topology(TopologyError::UnsupportedParameter { .. })
        ));
        assert!(matches!(
            g.set_node_bounds("chp", 5.0, 1.0).unwrap_err(),
            GraphError::Topology(TopologyError::InvertedBounds { .. })
        ));
        g.set_node_bounds("tank", 5.0, 60.0).unwrap();
    }

    #[test]
    fn arena_index_stops_before_id_overflow() {
        assert_eq!(arena_index(0, "node"), Ok(0));
        assert_eq!(arena_index(41, "edge"), Ok(41));
        let last = u32::MAX as usize - 1;
        assert_eq!(arena_index(last, "node"), Ok(u32::MAX - 1));
        assert_eq!(
            arena_index(last + 1, "node"),
            Err(TopologyError::ArenaFull { arena: "node" })
        );
        assert_eq!(
            arena_index(usize::MAX, "edge"),
            Err(TopologyError::ArenaFull { arena: "edge" })
        );
    }
}

//! Plant nodes: supplies, demand points, machines and storage units.

use pps_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::signal::{Signal, StepParameters};
use crate::state::{Lifecycle, NodeState};

/// Discriminant of [`NodeKind`], used for queries and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindTag {
    Supply,
    Demand,
    Machine,
    Storage,
}

impl NodeKindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKindTag::Supply => "supply",
            NodeKindTag::Demand => "demand",
            NodeKindTag::Machine => "machine",
            NodeKindTag::Storage => "storage",
        }
    }
}

/// External source of one commodity, bought at a unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyParams {
    pub commodity: String,
    #[serde(default)]
    pub min_output: f64,
    pub max_output: f64,
    #[serde(default)]
    pub price: f64,
}

impl SupplyParams {
    pub fn new(commodity: impl Into<String>, max_output: f64) -> Self {
        Self {
            commodity: commodity.into(),
            min_output: 0.0,
            max_output,
            price: 0.0,
        }
    }

    pub fn with_min_output(mut self, min_output: f64) -> Self {
        self.min_output = min_output;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }
}

/// Consumer of one commodity.
///
/// With `unmet_penalty = None` the demand is strict: a step that cannot serve it
/// in full is infeasible. With a penalty, shortfall is allowed and priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandParams {
    pub commodity: String,
    pub demand: f64,
    /// Revenue per delivered unit.
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub unmet_penalty: Option<f64>,
}

impl DemandParams {
    pub fn new(commodity: impl Into<String>, demand: f64) -> Self {
        Self {
            commodity: commodity.into(),
            demand,
            price: 0.0,
            unmet_penalty: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_unmet_penalty(mut self, penalty: f64) -> Self {
        self.unmet_penalty = Some(penalty);
        self
    }
}

/// Output produced per unit of machine throughput.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRatio {
    pub commodity: String,
    pub ratio: f64,
}

/// Piecewise-linear operating curve of a machine.
///
/// `input` holds throughput breakpoints in increasing order; each output lists
/// the quantity produced at every breakpoint. Between breakpoints the output is
/// interpolated linearly. The machine cannot run outside `[input[0], input[n-1]]`,
/// so a curve that should allow switching off starts with a breakpoint at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointCurve {
    pub input: Vec<f64>,
    pub outputs: Vec<CurveOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveOutput {
    pub commodity: String,
    pub values: Vec<f64>,
}

impl SetpointCurve {
    pub fn new(input: Vec<f64>) -> Self {
        Self {
            input,
            outputs: Vec::new(),
        }
    }

    pub fn with_output(mut self, commodity: impl Into<String>, values: Vec<f64>) -> Self {
        self.outputs.push(CurveOutput {
            commodity: commodity.into(),
            values,
        });
        self
    }

    /// Lowest and highest throughput on the curve.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((*self.input.first()?, *self.input.last()?))
    }

    pub fn values_for(&self, commodity: &str) -> Option<&[f64]> {
        self.outputs
            .iter()
            .find(|o| o.commodity == commodity)
            .map(|o| o.values.as_slice())
    }

    /// Output of `commodity` at `throughput`, clamped to the curve's range.
    pub fn interpolate(&self, commodity: &str, throughput: f64) -> Option<f64> {
        let values = self.values_for(commodity)?;
        let (lo, hi) = self.range()?;
        if values.len() != self.input.len() {
            return None;
        }
        let x = throughput.clamp(lo, hi);
        let upper = self.input.partition_point(|b| *b < x);
        if upper == 0 {
            return values.first().copied();
        }
        let (x0, x1) = (self.input[upper - 1], self.input[upper]);
        let (y0, y1) = (values[upper - 1], values[upper]);
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

/// Converts one input commodity into one or more outputs.
///
/// Outputs are either fixed `ratios` of throughput or a [`SetpointCurve`];
/// a machine declares one or the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineParams {
    pub input: String,
    #[serde(default)]
    pub outputs: Vec<ConversionRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setpoints: Option<SetpointCurve>,
    #[serde(default)]
    pub min_throughput: f64,
    pub max_throughput: f64,
    /// Operating cost per unit of throughput.
    #[serde(default)]
    pub cost: f64,
}

impl MachineParams {
    pub fn new(input: impl Into<String>, max_throughput: f64) -> Self {
        Self {
            input: input.into(),
            outputs: Vec::new(),
            setpoints: None,
            min_throughput: 0.0,
            max_throughput,
            cost: 0.0,
        }
    }

    pub fn with_output(mut self, commodity: impl Into<String>, ratio: f64) -> Self {
        self.outputs.push(ConversionRatio {
            commodity: commodity.into(),
            ratio,
        });
        self
    }

    pub fn with_setpoints(mut self, curve: SetpointCurve) -> Self {
        self.setpoints = Some(curve);
        self
    }

    pub fn with_min_throughput(mut self, min_throughput: f64) -> Self {
        self.min_throughput = min_throughput;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Output commodities in declaration order.
    pub fn output_commodities(&self) -> Vec<&str> {
        match &self.setpoints {
            Some(curve) => curve.outputs.iter().map(|o| o.commodity.as_str()).collect(),
            None => self.outputs.iter().map(|o| o.commodity.as_str()).collect(),
        }
    }

    /// Quantity of `commodity` produced at `throughput`, before efficiency.
    pub fn produced(&self, commodity: &str, throughput: f64) -> Option<f64> {
        match &self.setpoints {
            Some(curve) => curve.interpolate(commodity, throughput),
            None => self
                .outputs
                .iter()
                .find(|o| o.commodity == commodity)
                .map(|o| o.ratio * throughput),
        }
    }
}

/// Buffer for one commodity with a bounded level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageParams {
    pub commodity: String,
    #[serde(default)]
    pub min_level: f64,
    pub max_level: f64,
    #[serde(default)]
    pub initial_level: f64,
    /// Fraction of the stored level lost per step.
    #[serde(default)]
    pub dissipation: f64,
    #[serde(default)]
    pub max_charge: Option<f64>,
    #[serde(default)]
    pub max_discharge: Option<f64>,
}

impl StorageParams {
    pub fn new(commodity: impl Into<String>, max_level: f64) -> Self {
        Self {
            commodity: commodity.into(),
            min_level: 0.0,
            max_level,
            initial_level: 0.0,
            dissipation: 0.0,
            max_charge: None,
            max_discharge: None,
        }
    }

    pub fn with_min_level(mut self, min_level: f64) -> Self {
        self.min_level = min_level;
        self
    }

    pub fn with_initial_level(mut self, level: f64) -> Self {
        self.initial_level = level;
        self
    }

    pub fn with_dissipation(mut self, dissipation: f64) -> Self {
        self.dissipation = dissipation;
        self
    }

    pub fn with_rates(mut self, max_charge: Option<f64>, max_discharge: Option<f64>) -> Self {
        self.max_charge = max_charge;
        self.max_discharge = max_discharge;
        self
    }
}

/// Kind-specific node parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Supply(SupplyParams),
    Demand(DemandParams),
    Machine(MachineParams),
    Storage(StorageParams),
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Supply(_) => NodeKindTag::Supply,
            NodeKind::Demand(_) => NodeKindTag::Demand,
            NodeKind::Machine(_) => NodeKindTag::Machine,
            NodeKind::Storage(_) => NodeKindTag::Storage,
        }
    }

    /// Commodities this node accepts on inbound edges.
    pub fn commodities_in(&self) -> Vec<&str> {
        match self {
            NodeKind::Supply(_) => Vec::new(),
            NodeKind::Demand(p) => vec![p.commodity.as_str()],
            NodeKind::Machine(p) => vec![p.input.as_str()],
            NodeKind::Storage(p) => vec![p.commodity.as_str()],
        }
    }

    /// Commodities this node emits on outbound edges.
    pub fn commodities_out(&self) -> Vec<&str> {
        match self {
            NodeKind::Supply(p) => vec![p.commodity.as_str()],
            NodeKind::Demand(_) => Vec::new(),
            NodeKind::Machine(p) => p.output_commodities(),
            NodeKind::Storage(p) => vec![p.commodity.as_str()],
        }
    }

    pub fn accepts(&self, commodity: &str) -> bool {
        self.commodities_in().contains(&commodity)
    }

    pub fn emits(&self, commodity: &str) -> bool {
        self.commodities_out().contains(&commodity)
    }

    /// Configured value of a signal, if this kind exposes it.
    pub fn default_signal(&self, signal: Signal) -> Option<f64> {
        match (self, signal) {
            (NodeKind::Supply(p), Signal::Price) => Some(p.price),
            (NodeKind::Supply(p), Signal::Availability) => Some(p.max_output),
            (NodeKind::Demand(p), Signal::Demand) => Some(p.demand),
            (NodeKind::Demand(p), Signal::Price) => Some(p.price),
            (NodeKind::Machine(_), Signal::Efficiency) => Some(1.0),
            _ => None,
        }
    }

    /// Signals exposed by this kind, in declaration order.
    pub fn signals(&self) -> &'static [Signal] {
        match self {
            NodeKind::Supply(_) => &[Signal::Price, Signal::Availability],
            NodeKind::Demand(_) => &[Signal::Demand, Signal::Price],
            NodeKind::Machine(_) => &[Signal::Efficiency],
            NodeKind::Storage(_) => &[],
        }
    }
}

impl From<SupplyParams> for NodeKind {
    fn from(p: SupplyParams) -> Self {
        NodeKind::Supply(p)
    }
}

impl From<DemandParams> for NodeKind {
    fn from(p: DemandParams) -> Self {
        NodeKind::Demand(p)
    }
}

impl From<MachineParams> for NodeKind {
    fn from(p: MachineParams) -> Self {
        NodeKind::Machine(p)
    }
}

impl From<StorageParams> for NodeKind {
    fn from(p: StorageParams) -> Self {
        NodeKind::Storage(p)
    }
}

/// Everything needed to add a node to a [`crate::PlantGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<NodeKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) state: NodeState,
    pub(crate) history: Vec<NodeState>,
}

impl Node {
    pub(crate) fn new(id: NodeId, spec: NodeSpec) -> Self {
        let state = NodeState::initial(&spec.kind);
        Self {
            id,
            name: spec.name,
            kind: spec.kind,
            lifecycle: Lifecycle::Configured,
            state,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// States committed so far, oldest first.
    pub fn history(&self) -> &[NodeState] {
        &self.history
    }

    /// Value of `signal` in effect for a step: the override if present, the
    /// configured value otherwise.
    pub fn signal_value(&self, signal: Signal, params: &StepParameters) -> Option<f64> {
        let default = self.kind.default_signal(signal)?;
        Some(params.node(&self.name, signal).unwrap_or(default))
    }

    pub(crate) fn reset(&mut self) {
        self.lifecycle = Lifecycle::Configured;
        self.state = NodeState::initial(&self.kind);
        self.history.clear();
    }
}

//! Plant file schema.

use chrono::NaiveDateTime;
use pps_core::Tolerances;
use pps_dispatch::ObjectiveWeights;
use pps_graph::{NodeKind, SignalTarget};
use pps_predict::{Feature, Observation, SeriesMode};
use serde::{Deserialize, Serialize};

pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantSpec {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    #[serde(default)]
    pub bindings: Vec<BindingDef>,
    #[serde(default)]
    pub clock: ClockDef,
    #[serde(default)]
    pub dispatch: DispatchDef,
    #[serde(default)]
    pub tolerances: Tolerances,
}

impl PlantSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: LATEST_VERSION,
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            bindings: Vec::new(),
            clock: ClockDef::default(),
            dispatch: DispatchDef::default(),
            tolerances: Tolerances::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeDef {
    /// Defaults to `"<from>-><to>"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub from: String,
    pub to: String,
    pub commodity: String,
    #[serde(default)]
    pub min_flow: f64,
    /// Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_flow: Option<f64>,
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    #[serde(default)]
    pub cost: f64,
}

impl EdgeDef {
    pub fn new(from: impl Into<String>, to: impl Into<String>, commodity: impl Into<String>) -> Self {
        Self {
            name: None,
            from: from.into(),
            to: to.into(),
            commodity: commodity.into(),
            min_flow: 0.0,
            max_flow: None,
            efficiency: default_efficiency(),
            cost: 0.0,
        }
    }

    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.from, self.to))
    }
}

fn default_efficiency() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BindingDef {
    pub target: SignalTarget,
    pub model: ModelDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelDef {
    Constant {
        value: f64,
    },
    TimeSeries {
        values: Vec<f64>,
        #[serde(default)]
        mode: SeriesMode,
    },
    Linear {
        features: Vec<Feature>,
        coefficients: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warmup: Option<f64>,
    },
    /// Linear model fit by least squares when the plant is built.
    Fitted {
        features: Vec<Feature>,
        observations: Vec<Observation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warmup: Option<f64>,
    },
    Noisy {
        inner: Box<ModelDef>,
        std_dev: f64,
        seed: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        floor: Option<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClockDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,
}

impl Default for ClockDef {
    fn default() -> Self {
        Self {
            horizon: None,
            start: None,
            step_minutes: default_step_minutes(),
        }
    }
}

fn default_step_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DispatchDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,
    #[serde(default)]
    pub weights: ObjectiveWeights,
}

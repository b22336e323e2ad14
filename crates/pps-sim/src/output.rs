//! Column-oriented view of a run, for reporting and plotting collaborators.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use pps_graph::{NodeKindTag, Signal, Snapshot};
use serde::{Deserialize, Serialize};

/// One value per recorded step for each named element.
pub type Series = BTreeMap<String, Vec<f64>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub steps: Vec<usize>,
    pub timestamps: Vec<Option<NaiveDateTime>>,
    pub objective: Vec<f64>,
    /// Flow leaving the source of each edge.
    pub edge_flows: Series,
    /// Supply output and machine input.
    pub throughputs: Series,
    pub storage_levels: Series,
    pub demands: Series,
    pub unmet_demand: Series,
    pub supply_prices: Series,
    pub demand_prices: Series,
}

impl SimulationOutput {
    pub fn from_history(history: &[Snapshot]) -> Self {
        let mut out = Self::default();
        for snap in history {
            out.steps.push(snap.step());
            out.timestamps.push(snap.timestamp());
            out.objective.push(snap.objective());

            for edge in snap.edges() {
                push(&mut out.edge_flows, &edge.name, edge.flow);
            }
            for node in snap.nodes() {
                let signal = |s: Signal| node.signals.get(&s).copied().unwrap_or(0.0);
                match node.kind {
                    NodeKindTag::Supply => {
                        push(&mut out.throughputs, &node.name, node.throughput);
                        push(&mut out.supply_prices, &node.name, signal(Signal::Price));
                    }
                    NodeKindTag::Machine => {
                        push(&mut out.throughputs, &node.name, node.throughput);
                    }
                    NodeKindTag::Storage => {
                        push(&mut out.storage_levels, &node.name, node.level.unwrap_or(0.0));
                    }
                    NodeKindTag::Demand => {
                        push(&mut out.demands, &node.name, signal(Signal::Demand));
                        push(&mut out.unmet_demand, &node.name, node.unmet);
                        push(&mut out.demand_prices, &node.name, signal(Signal::Price));
                    }
                }
            }
        }
        out
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn push(series: &mut Series, name: &str, value: f64) {
    series.entry(name.to_string()).or_default().push(value);
}

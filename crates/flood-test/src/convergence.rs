//! End-to-end convergence scenarios
//!
//! Start a cluster, wire a topology, broadcast values at different entry
//! nodes, let the network settle and compare what every node reads.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use flood_core::{FloodResult, NodeId, Value};
use flood_runtime::NodeConfig;

use crate::{topology, ChaosConfig, ChaosStats, Cluster, Topology};

// ============================================================================
// SCENARIO
// ============================================================================

/// Cluster shape
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Line,
    Ring,
    /// Row-major grid of the given width
    Grid(usize),
    Star,
}

impl Shape {
    pub fn build(self, nodes: &[NodeId]) -> Topology {
        match self {
            Shape::Line => topology::line(nodes),
            Shape::Ring => topology::ring(nodes),
            Shape::Grid(width) => topology::grid(nodes, width),
            Shape::Star => topology::star(nodes),
        }
    }
}

/// One convergence run
#[derive(Clone, Debug)]
pub struct Scenario {
    pub nodes: usize,
    pub shape: Shape,
    /// Value `i` enters the cluster at node `i % nodes`
    pub values: Vec<Value>,
    pub chaos: ChaosConfig,
    pub config: NodeConfig,
}

impl Scenario {
    pub fn new(nodes: usize, shape: Shape) -> Self {
        Scenario {
            nodes,
            shape,
            values: (0..nodes as Value * 3).collect(),
            chaos: ChaosConfig::reliable(),
            config: NodeConfig::default(),
        }
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn with_chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = chaos;
        self
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn run(&self) -> FloodResult<ConvergenceReport> {
        let cluster =
            Cluster::start_with(self.nodes, self.chaos.clone(), self.config.clone()).await?;
        let ids = cluster.node_ids();
        cluster.assign(&self.shape.build(&ids)).await?;

        for (i, value) in self.values.iter().enumerate() {
            cluster.broadcast(ids[i % ids.len()].as_str(), *value).await?;
        }
        cluster.settle().await?;

        let mut views = BTreeMap::new();
        for id in &ids {
            views.insert(id.clone(), cluster.read(id.as_str()).await?);
        }

        let report = ConvergenceReport {
            expected: self.values.iter().copied().collect(),
            views,
            peer_messages: cluster.network().peer_messages().len(),
            chaos: cluster.network().chaos_stats(),
        };
        info!(
            nodes = self.nodes,
            shape = ?self.shape,
            values = self.values.len(),
            peer_messages = report.peer_messages,
            converged = report.converged(),
            "scenario finished"
        );
        Ok(report)
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// What every node ended up with
#[derive(Clone, Debug)]
pub struct ConvergenceReport {
    pub expected: BTreeSet<Value>,
    /// `read_ok` contents per node
    pub views: BTreeMap<NodeId, Vec<Value>>,
    pub peer_messages: usize,
    pub chaos: ChaosStats,
}

impl ConvergenceReport {
    /// Every node reads exactly the broadcast values
    pub fn converged(&self) -> bool {
        self.views
            .values()
            .all(|view| view.iter().copied().collect::<BTreeSet<_>>() == self.expected)
    }

    /// Values each node is still missing, omitting complete nodes
    pub fn missing(&self) -> BTreeMap<NodeId, Vec<Value>> {
        self.views
            .iter()
            .filter_map(|(node, view)| {
                let have: BTreeSet<Value> = view.iter().copied().collect();
                let missing: Vec<Value> = self.expected.difference(&have).copied().collect();
                (!missing.is_empty()).then(|| (node.clone(), missing))
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

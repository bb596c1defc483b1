//! Job model as constructed from the scheduler's queue and job queries.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Requested placement topology for a multi-node job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    CoLocated,
    Spread,
    Partitioned,
    #[default]
    Any,
}

/// Resource envelope requested for the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    pub node_count: u32,
    /// 0 means unspecified; the analyzer applies the default.
    pub cpus_per_node: u32,
    pub memory_mib_per_node: u64,
    pub accelerator_count: u32,
    pub accelerator_type: Option<String>,
    pub wall_clock_minutes: Option<u64>,
    /// Task count declared to the scheduler, when present.
    pub task_count: Option<u32>,
}

impl Default for ResourceEnvelope {
    fn default() -> Self {
        Self {
            node_count: 1,
            cpus_per_node: 0,
            memory_mib_per_node: 0,
            accelerator_count: 0,
            accelerator_type: None,
            wall_clock_minutes: None,
            task_count: None,
        }
    }
}

/// A batch job as seen by the engine.
///
/// Constructed from a scheduler query (or a default when the queue has
/// nothing to say about the requested nodes), mutated only by
/// [`crate::analyze`], read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub partition: String,
    /// Logical node names the scheduler asked to bring up, in request order.
    pub node_names: Vec<String>,
    pub resources: ResourceEnvelope,
    pub script: String,
    pub env: HashMap<String, String>,
    /// Feature tokens, e.g. `fabric-required`, `no-fabric`, `fabric-preferred`.
    pub features: HashSet<String>,

    // Derived by the analyzer.
    pub tightly_coupled: bool,
    pub process_count: u32,
    pub topology: Topology,
}

impl Job {
    /// A job with nothing known beyond the nodes being requested.
    pub fn default_for_nodes(node_names: Vec<String>, partition: &str) -> Self {
        let node_count = node_names.len() as u32;
        Self {
            id: String::new(),
            name: String::new(),
            partition: partition.to_string(),
            node_names,
            resources: ResourceEnvelope {
                node_count,
                ..ResourceEnvelope::default()
            },
            script: String::new(),
            env: HashMap::new(),
            features: HashSet::new(),
            tightly_coupled: false,
            process_count: 0,
            topology: Topology::Any,
        }
    }

    pub fn has_feature(&self, token: &str) -> bool {
        self.features.contains(token)
    }

    pub fn wants_accelerators(&self) -> bool {
        self.resources.accelerator_count > 0
    }
}

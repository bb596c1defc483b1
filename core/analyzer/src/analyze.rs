//! Classification entry point.

use crate::detect;
use crate::job::{Job, Topology};
use crate::requirements::{
    FabricDemand, InstanceRequirements, PlacementStrategy, PricingPreference,
};
use thiserror::Error;
use tracing::debug;

/// Default CPUs per node when the envelope does not say.
const DEFAULT_CPUS_PER_NODE: u32 = 4;

/// Nodes / processes at or above which the fabric is mandatory.
const FABRIC_REQUIRED_NODES: u32 = 16;
const FABRIC_REQUIRED_PROCS: u32 = 64;
/// Nodes / processes at or above which the fabric is preferred.
const FABRIC_PREFERRED_NODES: u32 = 4;
const FABRIC_PREFERRED_PROCS: u32 = 16;

/// Memory-per-CPU above which memory-heavy families are selected, in MiB.
const MEMORY_HEAVY_MIB_PER_CPU: u64 = 4 * 1024;

/// Node count at or above which HPC-class families are prepended.
const HPC_FAMILY_NODES: u32 = 8;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("job requests no nodes")]
    NoNodes,
    #[error("node count {node_count} does not cover {name_count} requested node names")]
    NodeCountMismatch { node_count: u32, name_count: u32 },
}

/// Classify a job and derive its instance requirements.
///
/// Mutates the job's derived flags (`tightly_coupled`, `process_count`,
/// `topology`); everything else on the job is left untouched.
pub fn analyze(job: &mut Job) -> Result<InstanceRequirements, ClassificationError> {
    if job.resources.node_count == 0 && job.node_names.is_empty() {
        return Err(ClassificationError::NoNodes);
    }
    if job.resources.node_count == 0 {
        job.resources.node_count = job.node_names.len() as u32;
    }
    let node_count = job.resources.node_count;
    let name_count = job.node_names.len() as u32;
    if name_count > 0 && name_count > node_count {
        return Err(ClassificationError::NodeCountMismatch { node_count, name_count });
    }

    let cpus = if job.resources.cpus_per_node == 0 {
        DEFAULT_CPUS_PER_NODE
    } else {
        job.resources.cpus_per_node
    };

    let (tight, confidence) = detect::classify(job, cpus);
    job.tightly_coupled = tight;
    job.process_count = detect::declared_task_count(job).unwrap_or(node_count);
    debug!(
        job = %job.id,
        tightly_coupled = tight,
        confidence,
        processes = job.process_count,
        "classified job"
    );

    let fabric = fabric_demand(job, tight, node_count, job.process_count);
    job.topology = derive_topology(job, tight, fabric);

    let families = select_families(job, fabric, node_count, cpus);
    let placement = if node_count < 2 {
        None
    } else {
        match job.topology {
            Topology::CoLocated => Some(PlacementStrategy::CoLocated),
            Topology::Spread => Some(PlacementStrategy::Spread),
            Topology::Partitioned => Some(PlacementStrategy::Partitioned),
            Topology::Any => None,
        }
    };

    Ok(InstanceRequirements {
        min_cpus: cpus,
        min_memory_mib: job.resources.memory_mib_per_node,
        accelerator_count: job.resources.accelerator_count,
        accelerator_type: job.resources.accelerator_type.clone(),
        fabric,
        families,
        excluded_shapes: Vec::new(),
        explicit_shapes: Vec::new(),
        placement,
        pricing: PricingPreference {
            prefer_preemptible: job.has_feature("preemptible"),
            max_preemptible_price: None,
            allow_mixed: true,
        },
        enhanced_networking: fabric != FabricDemand::Disabled,
        requires_gang: tight && fabric == FabricDemand::Required,
        node_count,
    })
}

/// Fabric demand from feature tokens and scale thresholds.
///
/// `fabric-required` and `no-fabric` are absolute. `fabric-preferred` sets a
/// floor of Preferred but the required-scale threshold still wins above it.
/// Without tokens the scale ladder applies only to tightly coupled jobs; an
/// independent job has no use for the fabric.
fn fabric_demand(job: &Job, tight: bool, nodes: u32, processes: u32) -> FabricDemand {
    let by_scale = if nodes >= FABRIC_REQUIRED_NODES || processes >= FABRIC_REQUIRED_PROCS {
        FabricDemand::Required
    } else if nodes >= FABRIC_PREFERRED_NODES || processes >= FABRIC_PREFERRED_PROCS {
        FabricDemand::Preferred
    } else if nodes >= 2 {
        FabricDemand::Optional
    } else {
        FabricDemand::Disabled
    };

    if job.has_feature("fabric-required") {
        FabricDemand::Required
    } else if job.has_feature("no-fabric") {
        FabricDemand::Disabled
    } else if job.has_feature("fabric-preferred") {
        if by_scale == FabricDemand::Required {
            FabricDemand::Required
        } else {
            FabricDemand::Preferred
        }
    } else if tight {
        by_scale
    } else {
        FabricDemand::Disabled
    }
}

fn derive_topology(job: &Job, tight: bool, fabric: FabricDemand) -> Topology {
    if job.has_feature("spread") {
        Topology::Spread
    } else if job.has_feature("partitioned") {
        Topology::Partitioned
    } else if tight || matches!(fabric, FabricDemand::Required | FabricDemand::Preferred) {
        Topology::CoLocated
    } else {
        Topology::Any
    }
}

/// Family preference list.
fn select_families(job: &Job, fabric: FabricDemand, nodes: u32, cpus: u32) -> Vec<String> {
    let mut families: Vec<&str> = Vec::new();

    if job.wants_accelerators() {
        families.extend(burst_catalog::accelerator_families());
    }

    match fabric {
        FabricDemand::Required | FabricDemand::Preferred => {
            if nodes >= HPC_FAMILY_NODES {
                families.extend(burst_catalog::hpc_families());
            }
            let memory_heavy = cpus > 0
                && job.resources.memory_mib_per_node / u64::from(cpus) > MEMORY_HEAVY_MIB_PER_CPU;
            if memory_heavy {
                families.extend(burst_catalog::memory_fabric_families());
            } else {
                families.extend(burst_catalog::compute_fabric_families());
            }
        }
        FabricDemand::Optional | FabricDemand::Disabled => {
            families.extend(burst_catalog::general_families());
        }
    }

    families.into_iter().map(str::to_string).collect()
}

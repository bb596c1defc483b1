//! Building a Job from the scheduler's queue.
//!
//! The resume path, absent an execution plan, asks the scheduler which job
//! requested the nodes and reconstructs enough of it to classify. When the
//! queue has nothing to say, a default job covering the node list is used.

use burst_analyzer::{Job, ResourceEnvelope, Topology};
use burst_binder::{parse_memory_mib, SchedulerClient};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// `squeue` time spec (`D-HH:MM:SS`, `HH:MM:SS`, `MM:SS`) to minutes.
pub fn parse_time_limit_minutes(spec: &str) -> Option<u64> {
    let (days, clock) = match spec.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().ok()?, rest),
        None => (0, spec),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes) = match parts.as_slice() {
        [h, m, _s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?),
        [m, _s] => (0, m.parse::<u64>().ok()?),
        _ => return None,
    };
    Some(days * 24 * 60 + hours * 60 + minutes)
}

/// Accelerator count from a `TresPerNode` spec like `gres:gpu:4`.
fn parse_accelerators(tres: &str) -> (u32, Option<String>) {
    let mut parts = tres.split(':');
    if parts.next() != Some("gres") || parts.next() != Some("gpu") {
        return (0, None);
    }
    match (parts.next(), parts.next()) {
        // gres:gpu:<count>
        (Some(count), None) if count.chars().all(|c| c.is_ascii_digit()) => {
            (count.parse().unwrap_or(0), None)
        }
        // gres:gpu:<type>:<count>
        (Some(kind), Some(count)) => (count.parse().unwrap_or(1), Some(kind.to_string())),
        (Some(kind), None) => (1, Some(kind.to_string())),
        _ => (1, None),
    }
}

/// Query the scheduler for the job occupying `nodes` and build a [`Job`].
pub async fn query_job<C: SchedulerClient + ?Sized>(
    scheduler: &C,
    nodes: &[String],
    partition: &str,
) -> Job {
    let node_list = nodes.join(",");
    let queued = match scheduler.jobs_on_nodes(&node_list).await {
        Ok(queued) => queued,
        Err(e) => {
            warn!("queue query failed, using default job: {e}");
            return Job::default_for_nodes(nodes.to_vec(), partition);
        }
    };
    let Some(entry) = queued.first() else {
        debug!(nodes = nodes.len(), "no queued job on requested nodes, using default");
        return Job::default_for_nodes(nodes.to_vec(), partition);
    };

    let detail = match scheduler.job_detail(&entry.id).await {
        Ok(detail) => detail,
        Err(e) => {
            warn!(job = %entry.id, "job detail query failed: {e}");
            HashMap::new()
        }
    };

    let features: HashSet<String> = detail
        .get("Features")
        .filter(|f| f.as_str() != "(null)")
        .map(|f| {
            f.split(['&', '|', ','])
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let (accelerator_count, accelerator_type) = detail
        .get("TresPerNode")
        .map(|t| parse_accelerators(t))
        .unwrap_or((0, None));

    let node_count = entry.node_count.max(nodes.len() as u32);
    Job {
        id: entry.id.clone(),
        name: entry.name.clone(),
        partition: entry.partition.clone(),
        node_names: nodes.to_vec(),
        resources: ResourceEnvelope {
            node_count,
            cpus_per_node: entry.cpu_count / node_count.max(1),
            memory_mib_per_node: parse_memory_mib(&entry.memory).unwrap_or(0),
            accelerator_count,
            accelerator_type,
            wall_clock_minutes: parse_time_limit_minutes(&entry.time_left),
            task_count: None,
        },
        script: detail.get("Command").cloned().unwrap_or_default(),
        env: HashMap::new(),
        features,
        tightly_coupled: false,
        process_count: 0,
        topology: Topology::Any,
    }
}

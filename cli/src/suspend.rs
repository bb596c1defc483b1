//! Suspend: tear down the instances behind a set of logical nodes.

use crate::SUSPEND_TIMEOUT;
use anyhow::{bail, Context, Result};
use burst_binder::SchedulerClient;
use burst_fleet::{CloudProvider, FleetProvisioner};
use tracing::info;

#[derive(Debug, Clone)]
pub struct SuspendRequest {
    pub node_list: String,
    pub dry_run: bool,
}

pub async fn run<P, C>(
    provisioner: &FleetProvisioner<P>,
    scheduler: &C,
    request: &SuspendRequest,
) -> Result<usize>
where
    P: CloudProvider,
    C: SchedulerClient + ?Sized,
{
    let nodes = scheduler
        .expand_hostlist(&request.node_list)
        .await
        .context("expanding node list")?;

    if request.dry_run {
        println!("dry run: would terminate instances for {} nodes", nodes.len());
        println!("  nodes: {}", nodes.join(","));
        return Ok(nodes.len());
    }

    info!(nodes = nodes.len(), "suspending");
    match tokio::time::timeout(SUSPEND_TIMEOUT, provisioner.terminate(&nodes)).await {
        Ok(result) => result.context("terminating instances")?,
        Err(_) => bail!("suspend timed out after {SUSPEND_TIMEOUT:?}"),
    }
    Ok(nodes.len())
}

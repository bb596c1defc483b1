//! Validation entry points: config file, execution plan, integration.

use anyhow::{Context, Result};
use burst_binder::SchedulerClient;
use burst_config::Config;
use burst_fleet::{CloudProvider, MANAGED_BY_TAG};
use std::path::Path;

pub fn validate_config(path: &Path) -> Result<()> {
    let config = Config::load(path)
        .with_context(|| format!("config {} is invalid", path.display()))?;
    let groups = config.all_node_groups().len();
    println!(
        "config valid: {} partitions, {} node groups, region {}",
        config.scheduler.partitions.len(),
        groups,
        config.cloud.region
    );
    Ok(())
}

pub fn validate_plan(path: &Path) -> Result<()> {
    let (plan, report) = burst_plan::load_file(path)
        .with_context(|| format!("execution plan {} is invalid", path.display()))?;
    println!(
        "execution plan valid: {} shapes, {} subnets",
        plan.instance_shapes.len(),
        plan.subnets.len()
    );
    for rule in &report.passed {
        println!("  ok: {rule}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

/// Check that the scheduler CLI answers and cloud credentials resolve.
pub async fn validate_integration<P, C>(provider: &P, scheduler: &C) -> Result<()>
where
    P: CloudProvider,
    C: SchedulerClient + ?Sized,
{
    scheduler
        .expand_hostlist("localhost")
        .await
        .context("scheduler CLI is not answering")?;
    println!("scheduler CLI: ok");

    provider
        .instances_by_tag(MANAGED_BY_TAG.0, &[MANAGED_BY_TAG.1.to_string()], &["running"])
        .await
        .context("cloud API call failed; check credentials and region")?;
    println!("cloud API: ok");
    Ok(())
}

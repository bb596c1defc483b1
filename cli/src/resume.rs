//! Resume: provision cloud capacity for a set of logical nodes.

use crate::jobquery::query_job;
use crate::RESUME_TIMEOUT;
use anyhow::{bail, Context, Result};
use burst_analyzer::{InstanceRequirements, Job};
use burst_binder::{group_by_node_group, push_bindings, SchedulerClient};
use burst_config::{Config, PricingMode};
use burst_fleet::{
    select_shapes, CloudProvider, FleetProvisioner, GangCoordinator, LaunchSettings, LIVE_STATES,
};
use burst_plan::{ExecutionPlan, ProvisioningInput};
use burst_pricing::{MockPriceTable, PricingStrategy, ShapePriceSource};
use std::path::Path;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ResumeRequest {
    /// Compact hostlist syntax, e.g. `hpc-od-[001-032]`.
    pub node_list: String,
    pub execution_plan: Option<PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct ResumeSummary {
    pub groups: usize,
    pub nodes: usize,
    pub bindings: usize,
}

pub async fn run<P, C>(
    config: &Config,
    provisioner: &FleetProvisioner<P>,
    scheduler: &C,
    request: &ResumeRequest,
) -> Result<ResumeSummary>
where
    P: CloudProvider,
    C: SchedulerClient + ?Sized,
{
    let nodes = scheduler
        .expand_hostlist(&request.node_list)
        .await
        .context("expanding node list")?;
    let groups = group_by_node_group(&nodes);
    if groups.is_empty() {
        bail!("no resumable nodes in {:?}", request.node_list);
    }

    let supplied = match &request.execution_plan {
        Some(path) => {
            let (plan, report) = burst_plan::load_file(path)
                .with_context(|| format!("loading execution plan {}", path.display()))?;
            for warning in &report.warnings {
                warn!("execution plan: {warning}");
            }
            Some(plan)
        }
        None => None,
    };

    let mut summary = ResumeSummary { groups: groups.len(), nodes: nodes.len(), bindings: 0 };

    for ((partition, node_group), group_nodes) in groups {
        let group_cfg = config
            .node_group(&partition, &node_group)
            .context("resolving node group")?;
        if group_nodes.len() as u32 > group_cfg.max_nodes {
            bail!(
                "{} nodes requested for {partition}/{node_group}, max is {}",
                group_nodes.len(),
                group_cfg.max_nodes
            );
        }

        let job = query_job(scheduler, &group_nodes, &partition).await;
        let (plan, plan_is_authoritative) = match &supplied {
            Some(plan) => (plan.clone(), true),
            None => match advisor_plan(config, &job.id)? {
                Some(plan) => (plan, true),
                None => (ExecutionPlan::synthesise(group_cfg, &config.pricing), false),
            },
        };

        let node_count = group_nodes.len() as u32;
        let mut input = if plan_is_authoritative {
            ProvisioningInput::Supplied(plan.clone())
        } else {
            ProvisioningInput::Analyzed(job.clone())
        };
        let mut reqs = input.requirements(node_count).context("deriving requirements")?;

        // The pricing policy keys off the classified job; for a supplied
        // plan the parallel block is the classification.
        let job_view = match &input {
            ProvisioningInput::Analyzed(classified) => classified.clone(),
            ProvisioningInput::Supplied(plan) => {
                let mut view = job.clone();
                view.tightly_coupled = plan.parallel.is_tight;
                view.process_count = plan.parallel.process_count;
                view
            }
        };

        merge_config_pricing(&mut reqs, group_cfg.pricing_mode, config, &plan);
        if reqs.explicit_shapes.is_empty() && !plan.instance_shapes.is_empty() {
            reqs.explicit_shapes = plan.instance_shapes.clone();
        }

        let strategy = burst_pricing::strategy(&job_view, &reqs);
        let shapes = select_shapes(&reqs);
        if shapes.is_empty() {
            bail!("no candidate shapes for {partition}/{node_group}");
        }
        burst_pricing::validate_ceiling(&strategy, &shapes, &MockPriceTable)
            .context("price ceiling validation")?;

        let settings = LaunchSettings {
            partition: partition.clone(),
            node_group: node_group.clone(),
            job_id: job_view.id.clone(),
            launch_template: plan.launch_template.clone(),
            subnets: plan.subnets.clone(),
            security_groups: plan.security_groups.clone(),
            instance_role: plan.instance_role.clone(),
            user_data: plan.user_data.clone(),
            extra_tags: plan.tags.clone(),
        };
        if settings.subnets.is_empty() {
            bail!("no subnets configured for {partition}/{node_group}");
        }

        if request.dry_run {
            print_dry_run(&group_nodes, &job_view, &reqs, &strategy, &settings, &shapes, &plan);
            continue;
        }

        info!(
            partition = %partition,
            node_group = %node_group,
            nodes = group_nodes.len(),
            gang = reqs.requires_gang,
            "provisioning"
        );
        let gang = GangCoordinator::new(provisioner);
        let response = match tokio::time::timeout(
            RESUME_TIMEOUT,
            gang.provision(&group_nodes, &reqs, &strategy, &settings),
        )
        .await
        {
            Ok(result) => {
                result.with_context(|| format!("provisioning {partition}/{node_group}"))?
            }
            Err(_) => {
                cleanup_by_job(provisioner, &settings.job_id).await;
                bail!("resume timed out after {RESUME_TIMEOUT:?} for {partition}/{node_group}");
            }
        };

        let report = push_bindings(scheduler, &response.bindings).await;
        if !report.all_pushed() {
            // Per-node push failures are not fatal once instances run.
            warn!(
                failed = report.failures.len(),
                "some node address updates failed"
            );
        }
        summary.bindings += response.bindings.len();
    }

    Ok(summary)
}

/// Fold the node group's pricing mode and the global pricing defaults into
/// the requirements.
fn merge_config_pricing(
    reqs: &mut InstanceRequirements,
    mode: PricingMode,
    config: &Config,
    plan: &ExecutionPlan,
) {
    if mode == PricingMode::Preemptible || config.pricing.prefer_preemptible {
        reqs.pricing.prefer_preemptible = true;
    }
    if reqs.pricing.max_preemptible_price.is_none() {
        reqs.pricing.max_preemptible_price = plan
            .pricing
            .price_ceiling
            .or(config.pricing.default_price_ceiling);
    }
}

/// A plan produced by the external advisor for this job, when present.
fn advisor_plan(config: &Config, job_id: &str) -> Result<Option<ExecutionPlan>> {
    if !config.advisor.enabled || job_id.is_empty() {
        return Ok(None);
    }
    let Some(dir) = &config.advisor.plan_dir else {
        return Ok(None);
    };
    let path = Path::new(dir).join(format!("{job_id}.json"));
    if !path.exists() {
        return Ok(None);
    }
    let (plan, report) = burst_plan::load_file(&path)
        .with_context(|| format!("loading advisor plan {}", path.display()))?;
    for warning in &report.warnings {
        warn!("advisor plan: {warning}");
    }
    info!(job = %job_id, "using advisor execution plan");
    Ok(Some(plan))
}

/// Cancellation cleanup: tear down whatever this job's launch created, found
/// by tag rather than remembered ids.
async fn cleanup_by_job<P: CloudProvider>(provisioner: &FleetProvisioner<P>, job_id: &str) {
    if job_id.is_empty() {
        warn!("cannot clean up by job tag: job id unknown");
        return;
    }
    let provider = provisioner.provider();
    match provider
        .instances_by_tag("burst:job-id", &[job_id.to_string()], LIVE_STATES)
        .await
    {
        Ok(ids) if !ids.is_empty() => {
            warn!(instances = ids.len(), "cleaning up timed-out launch");
            if let Err(e) = provider.terminate_instances(&ids).await {
                warn!("cleanup terminate failed: {e}");
            }
        }
        Ok(_) => {}
        Err(e) => warn!("cleanup lookup failed: {e}"),
    }
}

/// Print the launch the engine would execute.
#[allow(clippy::too_many_arguments)]
fn print_dry_run(
    nodes: &[String],
    job: &Job,
    reqs: &InstanceRequirements,
    strategy: &PricingStrategy,
    settings: &LaunchSettings,
    shapes: &[String],
    plan: &ExecutionPlan,
) {
    let hourly = strategy
        .price_ceiling
        .or_else(|| MockPriceTable.price(&shapes[0]))
        .unwrap_or(0.0);
    let duration_hours = plan
        .cost
        .max_duration_hours
        .or_else(|| job.resources.wall_clock_minutes.map(|m| m as f64 / 60.0))
        .unwrap_or(1.0);
    let estimated_cost = hourly * nodes.len() as f64 * duration_hours;

    println!("dry run: {}/{}", settings.partition, settings.node_group);
    println!("  nodes ({}): {}", nodes.len(), nodes.join(","));
    println!("  shapes: {}", shapes.join(","));
    println!(
        "  pricing: {:.0}% preemptible, mixed={}, ceiling={}",
        strategy.preemptible_ratio * 100.0,
        strategy.allow_mixed,
        strategy
            .price_ceiling
            .map(|c| format!("${c:.3}/h"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  subnets: {}", settings.subnets.join(","));
    println!(
        "  placement: {}",
        reqs.placement
            .map(|p| format!("{p:?}"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  gang: {}", reqs.requires_gang);
    println!("  estimated cost: ${estimated_cost:.2} ({duration_hours:.1}h)");
}

//! State sweep: repair stuck nodes and observe preemptions.

use crate::SWEEP_TIMEOUT;
use anyhow::{bail, Context, Result};
use burst_binder::{decide, is_managed_node, ReconcileStats, SchedulerClient, StateReconciler};
use burst_config::Config;
use burst_fleet::{CloudProvider, MANAGED_BY_TAG};
use burst_pricing::{InstanceStateSource, InterruptionMonitor};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn run<P, C>(
    config: &Config,
    provider: Arc<P>,
    scheduler: &C,
    dry_run: bool,
) -> Result<ReconcileStats>
where
    P: CloudProvider + InstanceStateSource,
    C: SchedulerClient + ?Sized,
{
    let managed: Vec<(String, String)> = config
        .all_node_groups()
        .into_iter()
        .map(|(p, g)| (p.name.clone(), g.name.clone()))
        .collect();

    if dry_run {
        // A faithful preview applies the same managed-group filter as the
        // real sweep and reports the transitions it would have made.
        let views = scheduler.node_states(&[]).await.context("reading node states")?;
        let mut stats = ReconcileStats::default();
        for view in &views {
            if !is_managed_node(&view.name, &managed) {
                continue;
            }
            stats.examined += 1;
            if let Some(action) = decide(view) {
                stats.transitioned += 1;
                println!(
                    "dry run: {} ({}) -> {}{}",
                    view.name,
                    view.tokens.join("+"),
                    action.state(),
                    action.reason().map(|r| format!(" reason={r}")).unwrap_or_default()
                );
            }
        }
        return Ok(stats);
    }

    let reconciler = StateReconciler::new(scheduler);
    let stats = match tokio::time::timeout(SWEEP_TIMEOUT, reconciler.sweep(&managed)).await {
        Ok(result) => result.context("state sweep")?,
        Err(_) => bail!("state sweep timed out after {SWEEP_TIMEOUT:?}"),
    };
    info!(
        examined = stats.examined,
        transitioned = stats.transitioned,
        failed = stats.failed,
        "state sweep complete"
    );

    observe_preemptions(provider).await?;
    Ok(stats)
}

/// One bounded interruption-monitoring pass over every managed instance.
/// Events are logged; reacting to them is an external concern.
async fn observe_preemptions<P>(provider: Arc<P>) -> Result<()>
where
    P: CloudProvider + InstanceStateSource,
{
    let ids = provider
        .instances_by_tag(
            MANAGED_BY_TAG.0,
            &[MANAGED_BY_TAG.1.to_string()],
            &["running", "shutting-down"],
        )
        .await
        .context("listing managed instances")?;
    if ids.is_empty() {
        return Ok(());
    }

    let statuses = provider.describe_instances(&ids).await.context("describing instances")?;
    // The Name tag is the logical node name; instances without one cannot
    // be attributed to a node and are not tracked.
    let tracked: Vec<(String, String)> = statuses
        .iter()
        .filter_map(|s| s.name_tag.clone().map(|name| (s.id.clone(), name)))
        .collect();
    if tracked.is_empty() {
        return Ok(());
    }

    let (monitor, mut events) =
        InterruptionMonitor::spawn(provider, tracked, Duration::from_secs(1));
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(3), events.recv()).await {
        info!(
            instance = %event.instance_id,
            node = %event.node_name,
            reason = %event.reason,
            "preemption event"
        );
    }
    monitor.shutdown().await;
    Ok(())
}

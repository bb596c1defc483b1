//! Fleet composition, launch, verification, and binding.

use crate::placement::PlacementGroupManager;
use crate::provider::CloudProvider;
use crate::types::{
    FleetResponse, FleetSpec, InstanceBinding, InstanceStatus, LaunchOverride, LaunchSettings,
};
use crate::{FleetError, LIVE_STATES, MANAGED_BY_TAG, NODE_NAME_TAG};
use burst_analyzer::InstanceRequirements;
use burst_catalog::SizeTier;
use burst_pricing::PricingStrategy;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded wait for instances to reach running state.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Gang launches get longer because partial success is worthless.
const GANG_VERIFY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const VERIFY_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// A failed launch attempt, carrying whatever instances came up before the
/// failure so the caller can tear them down.
#[derive(Debug)]
pub struct LaunchFailure {
    pub error: FleetError,
    pub launched: Vec<String>,
}

impl LaunchFailure {
    fn before_launch(error: FleetError) -> Self {
        Self { error, launched: Vec::new() }
    }
}

/// Candidate shapes for a launch.
///
/// An explicit shape list from a plan is used verbatim. Otherwise shapes
/// come from the allowed families crossed with the size matrix; accelerator
/// families preempt normal sizing. Family order is stable and, within a
/// family, larger sizes come before smaller ones.
pub fn select_shapes(reqs: &InstanceRequirements) -> Vec<String> {
    let mut shapes: Vec<String> = if !reqs.explicit_shapes.is_empty() {
        reqs.explicit_shapes.clone()
    } else {
        let tier = SizeTier::classify(reqs.min_memory_mib, reqs.min_cpus);
        let mut out = Vec::new();
        for family in &reqs.families {
            if let Some(shape) = burst_catalog::accelerator_shape(family) {
                out.push(shape.to_string());
            } else {
                out.extend(burst_catalog::shapes_for(family, tier));
            }
        }
        out
    };
    shapes.retain(|s| !reqs.excluded_shapes.contains(s));
    shapes
}

/// Launches fleets and maps the result onto logical node names.
pub struct FleetProvisioner<P: CloudProvider> {
    provider: P,
    verify_timeout: Duration,
    gang_verify_timeout: Duration,
    poll_interval: Duration,
}

impl<P: CloudProvider> FleetProvisioner<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            verify_timeout: VERIFY_TIMEOUT,
            gang_verify_timeout: GANG_VERIFY_TIMEOUT,
            poll_interval: VERIFY_POLL_INTERVAL,
        }
    }

    /// Same provisioner with shortened waits; test hook.
    pub fn with_timeouts(mut self, verify: Duration, gang_verify: Duration, poll: Duration) -> Self {
        self.verify_timeout = verify;
        self.gang_verify_timeout = gang_verify;
        self.poll_interval = poll;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Provision instances for the given nodes, cleaning up on failure.
    ///
    /// Gang launches go through [`crate::GangCoordinator`] instead, which
    /// owns the rollback so that exactly one teardown is issued.
    pub async fn provision(
        &self,
        nodes: &[String],
        reqs: &InstanceRequirements,
        strategy: &PricingStrategy,
        settings: &LaunchSettings,
    ) -> Result<FleetResponse, FleetError> {
        match self.launch(nodes, reqs, strategy, settings).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                if !failure.launched.is_empty() {
                    warn!(
                        instances = failure.launched.len(),
                        "launch failed, terminating partial capacity"
                    );
                    if let Err(e) = self.provider.terminate_instances(&failure.launched).await {
                        warn!("cleanup terminate failed: {e}");
                    }
                }
                Err(failure.error)
            }
        }
    }

    /// Raw launch path: compose, launch, verify, bind, tag. Does not clean
    /// up on failure; the error carries the launched ids for the caller.
    pub async fn launch(
        &self,
        nodes: &[String],
        reqs: &InstanceRequirements,
        strategy: &PricingStrategy,
        settings: &LaunchSettings,
    ) -> Result<FleetResponse, LaunchFailure> {
        let shapes = select_shapes(reqs);
        if shapes.is_empty() {
            return Err(LaunchFailure::before_launch(FleetError::provider(
                false,
                "no candidate instance shapes",
            )));
        }

        let placement_group = match reqs.placement {
            Some(placement) if nodes.len() >= 2 => {
                let manager = PlacementGroupManager::new(&self.provider);
                Some(
                    manager
                        .ensure(&settings.partition, &settings.node_group, placement)
                        .await
                        .map_err(LaunchFailure::before_launch)?,
                )
            }
            _ => None,
        };

        let spec = compose_spec(nodes, strategy, settings, &shapes, placement_group);
        info!(
            nodes = nodes.len(),
            shapes = shapes.len(),
            overrides = spec.overrides.len(),
            spot = spec.spot_capacity,
            on_demand = spec.on_demand_capacity,
            "launching fleet"
        );

        let outcome = self
            .provider
            .create_fleet(&spec)
            .await
            .map_err(LaunchFailure::before_launch)?;
        for failed in &outcome.errors {
            warn!(shape = %failed.shape, code = %failed.code, "fleet override failed: {}", failed.message);
        }
        if outcome.instance_ids.len() < nodes.len() {
            let message = format!(
                "fleet fulfilled {} of {} instances",
                outcome.instance_ids.len(),
                nodes.len()
            );
            return Err(LaunchFailure {
                error: FleetError::provider(true, message),
                launched: outcome.instance_ids,
            });
        }

        let verify_timeout = if reqs.requires_gang {
            self.gang_verify_timeout
        } else {
            self.verify_timeout
        };
        let statuses = match self.wait_running(&outcome.instance_ids, verify_timeout).await {
            Ok(statuses) => statuses,
            Err(error) => {
                return Err(LaunchFailure { error, launched: outcome.instance_ids });
            }
        };
        info!(instances = statuses.len(), "all instances running");

        let bindings = match bind(nodes, &outcome.instance_ids, &statuses) {
            Ok(bindings) => bindings,
            Err(error) => {
                return Err(LaunchFailure { error, launched: outcome.instance_ids });
            }
        };

        // Tagging happens after verification and before anything is pushed
        // to the scheduler. Failures degrade later lookups, not this launch.
        for binding in &bindings {
            let tags = vec![
                ("Name".to_string(), binding.node_name.clone()),
                (NODE_NAME_TAG.to_string(), binding.node_name.clone()),
                (MANAGED_BY_TAG.0.to_string(), MANAGED_BY_TAG.1.to_string()),
            ];
            if let Err(e) = self
                .provider
                .create_tags(std::slice::from_ref(&binding.instance_id), &tags)
                .await
            {
                warn!(instance = %binding.instance_id, node = %binding.node_name, "tagging failed: {e}");
            }
        }

        Ok(FleetResponse { bindings, failed: outcome.errors })
    }

    /// Tear down whatever instances are bound to the given logical nodes.
    /// Finding nothing is success; suspend must be idempotent.
    pub async fn terminate(&self, nodes: &[String]) -> Result<(), FleetError> {
        let ids = self
            .provider
            .instances_by_tag(NODE_NAME_TAG, nodes, LIVE_STATES)
            .await?;
        if ids.is_empty() {
            info!(nodes = nodes.len(), "no live instances to terminate");
            return Ok(());
        }
        info!(instances = ids.len(), "terminating instances");
        self.provider.terminate_instances(&ids).await
    }

    /// Poll until every id reaches running state, bounded by `timeout`.
    async fn wait_running(
        &self,
        ids: &[String],
        timeout: Duration,
    ) -> Result<Vec<InstanceStatus>, FleetError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let statuses = self.provider.describe_instances(ids).await?;
            for status in &statuses {
                if matches!(status.state.as_str(), "shutting-down" | "terminated") {
                    return Err(FleetError::provider(
                        true,
                        format!("instance {} died while waiting for running state", status.id),
                    ));
                }
            }
            let running: Vec<&str> = statuses
                .iter()
                .filter(|s| s.state == "running")
                .map(|s| s.id.as_str())
                .collect();
            if running.len() == ids.len() {
                return Ok(statuses);
            }
            if tokio::time::Instant::now() >= deadline {
                let pending = ids
                    .iter()
                    .filter(|id| !running.contains(&id.as_str()))
                    .cloned()
                    .collect();
                return Err(FleetError::LaunchTimeout { pending });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Compose the instant-fleet request: overrides are the outer product of
/// shapes and subnets, each with unit weight.
fn compose_spec(
    nodes: &[String],
    strategy: &PricingStrategy,
    settings: &LaunchSettings,
    shapes: &[String],
    placement_group: Option<String>,
) -> FleetSpec {
    let total = nodes.len() as u32;
    let spot = (f64::from(total) * strategy.preemptible_ratio).floor() as u32;
    let mut overrides = Vec::with_capacity(shapes.len() * settings.subnets.len());
    for shape in shapes {
        for subnet in &settings.subnets {
            overrides.push(LaunchOverride {
                shape: shape.clone(),
                subnet: subnet.clone(),
                weight: 1.0,
            });
        }
    }

    let mut tags = vec![
        (MANAGED_BY_TAG.0.to_string(), MANAGED_BY_TAG.1.to_string()),
        ("burst:partition".to_string(), settings.partition.clone()),
        ("burst:node-group".to_string(), settings.node_group.clone()),
        ("burst:job-id".to_string(), settings.job_id.clone()),
    ];
    for (key, value) in &settings.extra_tags {
        tags.push((key.clone(), value.clone()));
    }

    FleetSpec {
        total_capacity: total,
        spot_capacity: spot,
        on_demand_capacity: total - spot,
        prefer_preemptible: strategy.preemptible_ratio >= 0.5,
        price_ceiling: strategy.price_ceiling,
        launch_template: settings.launch_template.clone(),
        overrides,
        placement_group,
        tags,
    }
}

/// Map instances onto the ordered node list, index-aligned.
fn bind(
    nodes: &[String],
    ids: &[String],
    statuses: &[InstanceStatus],
) -> Result<Vec<InstanceBinding>, FleetError> {
    let mut bindings = Vec::with_capacity(nodes.len());
    for (node, id) in nodes.iter().zip(ids) {
        let status = statuses
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| FleetError::provider(true, format!("no status for instance {id}")))?;
        let private_address = status.private_address.clone().ok_or_else(|| {
            FleetError::provider(true, format!("instance {id} has no private address"))
        })?;
        bindings.push(InstanceBinding {
            node_name: node.clone(),
            instance_id: id.clone(),
            private_address,
            public_address: status.public_address.clone(),
            state: status.state.clone(),
            launched_at: status.launched_at.unwrap_or_else(Utc::now),
        });
    }
    Ok(bindings)
}

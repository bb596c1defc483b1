//! Gang scheduling coordinator.
//!
//! Wraps the fleet provisioner in an all-or-nothing transaction: pre-flight
//! capacity check, atomic instant launch, verify-all-running, and mandatory
//! rollback on any failure path. A half-populated gang is never returned.

use crate::provider::CloudProvider;
use crate::provision::{select_shapes, FleetProvisioner};
use crate::types::{FleetResponse, LaunchSettings};
use crate::FleetError;
use burst_analyzer::InstanceRequirements;
use burst_pricing::PricingStrategy;
use tracing::{error, info};

pub struct GangCoordinator<'a, P: CloudProvider> {
    provisioner: &'a FleetProvisioner<P>,
}

impl<'a, P: CloudProvider> GangCoordinator<'a, P> {
    pub fn new(provisioner: &'a FleetProvisioner<P>) -> Self {
        Self { provisioner }
    }

    /// Provision the nodes, atomically when the requirements demand a gang,
    /// straight through the normal path otherwise.
    pub async fn provision(
        &self,
        nodes: &[String],
        reqs: &InstanceRequirements,
        strategy: &PricingStrategy,
        settings: &LaunchSettings,
    ) -> Result<FleetResponse, FleetError> {
        if !reqs.requires_gang {
            return self.provisioner.provision(nodes, reqs, strategy, settings).await;
        }

        self.preflight(reqs, settings).await?;
        info!(nodes = nodes.len(), "gang launch starting");

        match self.provisioner.launch(nodes, reqs, strategy, settings).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                if !failure.launched.is_empty() {
                    info!(
                        instances = failure.launched.len(),
                        "gang failed, rolling back all launched instances"
                    );
                    if let Err(e) = self
                        .provisioner
                        .provider()
                        .terminate_instances(&failure.launched)
                        .await
                    {
                        error!("gang rollback terminate failed: {e}");
                    }
                }
                Err(FleetError::GangFailed(failure.error.to_string()))
            }
        }
    }

    /// Pre-flight: at least one (subnet, shape) pair must be offered.
    async fn preflight(
        &self,
        reqs: &InstanceRequirements,
        settings: &LaunchSettings,
    ) -> Result<(), FleetError> {
        let shapes = select_shapes(reqs);
        for subnet in &settings.subnets {
            for shape in &shapes {
                if self.provisioner.provider().shape_offered(shape, subnet).await? {
                    return Ok(());
                }
            }
        }
        Err(FleetError::InsufficientCapacity)
    }
}

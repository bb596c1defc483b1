//! Cloud provider abstraction.

use crate::types::{FleetOutcome, FleetSpec, InstanceStatus};
use crate::FleetError;
use async_trait::async_trait;
use burst_analyzer::PlacementStrategy;

/// The cloud operations the engine performs. Implemented by the EC2 adapter
/// in production and by an in-memory double in tests.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Launch an instant fleet. Returns the ids that were created plus any
    /// per-override errors; a partially fulfilled fleet is a valid outcome.
    async fn create_fleet(&self, spec: &FleetSpec) -> Result<FleetOutcome, FleetError>;

    /// Current status of the given instances. Unknown ids are omitted.
    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<InstanceStatus>, FleetError>;

    /// Ids of instances carrying `tag_key` with one of `values`, restricted
    /// to the given instance states.
    async fn instances_by_tag(
        &self,
        tag_key: &str,
        values: &[String],
        states: &[&str],
    ) -> Result<Vec<String>, FleetError>;

    /// Apply tags to instances. Retry-safe.
    async fn create_tags(
        &self,
        ids: &[String],
        tags: &[(String, String)],
    ) -> Result<(), FleetError>;

    /// Bulk terminate. Ids that no longer exist are not an error.
    async fn terminate_instances(&self, ids: &[String]) -> Result<(), FleetError>;

    /// Create the placement group if it does not already exist.
    async fn ensure_placement_group(
        &self,
        name: &str,
        strategy: PlacementStrategy,
    ) -> Result<(), FleetError>;

    /// Whether a shape is offered in the subnet's availability zone.
    async fn shape_offered(&self, shape: &str, subnet: &str) -> Result<bool, FleetError>;
}

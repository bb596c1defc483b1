//! Placement-group management.

use crate::provider::CloudProvider;
use crate::FleetError;
use burst_analyzer::PlacementStrategy;
use tracing::info;

/// Group name for a (partition, node-group) pair.
pub fn placement_group_name(partition: &str, node_group: &str) -> String {
    format!("{partition}-{node_group}-pg")
}

/// Idempotently ensures named placement groups exist.
///
/// Groups are shared across launches in the same (partition, node-group)
/// and may race with a sibling invocation; "already exists" is success.
/// The engine never destroys a group.
pub struct PlacementGroupManager<'a, P: CloudProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: CloudProvider + ?Sized> PlacementGroupManager<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Ensure the group exists with the required strategy and return its
    /// name.
    pub async fn ensure(
        &self,
        partition: &str,
        node_group: &str,
        strategy: PlacementStrategy,
    ) -> Result<String, FleetError> {
        let name = placement_group_name(partition, node_group);
        self.provider.ensure_placement_group(&name, strategy).await?;
        info!(group = %name, ?strategy, "placement group ensured");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_name() {
        assert_eq!(placement_group_name("hpc", "od"), "hpc-od-pg");
    }
}

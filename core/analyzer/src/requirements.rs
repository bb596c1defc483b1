//! Instance requirements emitted by classification or imported from a plan.

use serde::{Deserialize, Serialize};

/// How badly the workload wants the low-latency fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FabricDemand {
    Required,
    Preferred,
    Optional,
    Disabled,
}

/// Placement-group strategy for a multi-node launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementStrategy {
    CoLocated,
    Partitioned,
    Spread,
}

/// Pricing preference carried into the fleet request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PricingPreference {
    pub prefer_preemptible: bool,
    /// Ceiling for preemptible bids, in USD per instance-hour.
    pub max_preemptible_price: Option<f64>,
    /// Whether mixing preemptible and on-demand capacity is acceptable.
    pub allow_mixed: bool,
}

/// What the fleet provisioner needs to know to compose a launch.
///
/// Derived from a [`crate::Job`] by [`crate::analyze`], or imported from an
/// execution plan. Downstream code consumes only this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRequirements {
    pub min_cpus: u32,
    pub min_memory_mib: u64,
    pub accelerator_count: u32,
    pub accelerator_type: Option<String>,
    pub fabric: FabricDemand,
    /// Allowed instance-shape families, in preference order.
    pub families: Vec<String>,
    /// Shapes that must not be launched even if a family allows them.
    pub excluded_shapes: Vec<String>,
    /// Explicit shape list from a plan; used verbatim when non-empty.
    pub explicit_shapes: Vec<String>,
    pub placement: Option<PlacementStrategy>,
    pub pricing: PricingPreference,
    pub enhanced_networking: bool,
    /// All-or-nothing launch semantics.
    pub requires_gang: bool,
    pub node_count: u32,
}

impl InstanceRequirements {
    /// Invariant check: `fabric == Required` implies at least one allowed
    /// family supports the fabric, and a multi-node constrained topology
    /// carries a placement strategy.
    pub fn check_invariants(&self) -> bool {
        let fabric_ok = self.fabric != FabricDemand::Required
            || self
                .families
                .iter()
                .any(|f| burst_catalog::family(f).map(|r| r.supports_fabric).unwrap_or(false))
            || self
                .explicit_shapes
                .iter()
                .any(|s| burst_catalog::shape_supports_fabric(s));
        let placement_ok = self.node_count < 2 || self.placement.is_some() || !self.requires_gang;
        fabric_ok && placement_ok
    }
}

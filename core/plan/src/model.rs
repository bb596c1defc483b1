//! Execution plan data model.

use burst_analyzer::{
    FabricDemand, InstanceRequirements, PlacementStrategy, PricingPreference,
};
use burst_config::{NodeGroupConfig, PricingMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pricing mode for a planned launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanPricingMode {
    Preemptible,
    OnDemand,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPricing {
    pub mode: PlanPricingMode,
    #[serde(default)]
    pub price_ceiling: Option<f64>,
}

/// Launch template handle: a name or an id, at least one of which is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTemplateRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl LaunchTemplateRef {
    pub fn by_name(name: &str) -> Self {
        // A lt- prefix is how the provider spells template ids.
        if name.starts_with("lt-") {
            Self { name: None, id: Some(name.to_string()) }
        } else {
            Self { name: Some(name.to_string()), id: None }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelBlock {
    #[serde(default)]
    pub is_tight: bool,
    #[serde(default)]
    pub process_count: u32,
    #[serde(default)]
    pub requires_gang: bool,
    #[serde(default)]
    pub fabric_required: bool,
    #[serde(default)]
    pub fabric_generation: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostConstraints {
    #[serde(default)]
    pub max_total: Option<f64>,
    #[serde(default)]
    pub max_hourly: Option<f64>,
    #[serde(default)]
    pub max_duration_hours: Option<f64>,
    #[serde(default)]
    pub auto_terminate_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkBlock {
    #[serde(default)]
    pub placement_strategy: Option<PlacementStrategy>,
    #[serde(default)]
    pub placement_group_name: Option<String>,
    #[serde(default)]
    pub enhanced_networking: bool,
    #[serde(default)]
    pub preferred_availability_zones: Vec<String>,
    #[serde(default)]
    pub single_az: bool,
    #[serde(default)]
    pub latency_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub decision_factors: Vec<String>,
}

/// The externally-produced plan, authoritative when supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub should_provision: bool,
    pub instance_shapes: Vec<String>,
    pub pricing: PlanPricing,
    pub subnets: Vec<String>,
    #[serde(default)]
    pub launch_template: LaunchTemplateRef,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub instance_role: Option<String>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub parallel: ParallelBlock,
    #[serde(default)]
    pub cost: CostConstraints,
    #[serde(default)]
    pub network: NetworkBlock,
    #[serde(default)]
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ExecutionPlan {
    /// Convert to the requirements shape the fleet provisioner consumes.
    pub fn to_requirements(&self, node_count: u32) -> InstanceRequirements {
        let families = self
            .instance_shapes
            .iter()
            .filter_map(|s| burst_catalog::family_of_shape(s))
            .map(str::to_string)
            .collect::<Vec<_>>();

        let fabric = if self.parallel.fabric_required {
            FabricDemand::Required
        } else if self.network.enhanced_networking {
            FabricDemand::Optional
        } else {
            FabricDemand::Disabled
        };

        InstanceRequirements {
            min_cpus: 0,
            min_memory_mib: 0,
            accelerator_count: 0,
            accelerator_type: None,
            fabric,
            families,
            excluded_shapes: Vec::new(),
            explicit_shapes: self.instance_shapes.clone(),
            placement: self.network.placement_strategy,
            pricing: PricingPreference {
                prefer_preemptible: matches!(
                    self.pricing.mode,
                    PlanPricingMode::Preemptible | PlanPricingMode::Mixed
                ),
                max_preemptible_price: self.pricing.price_ceiling,
                allow_mixed: self.pricing.mode == PlanPricingMode::Mixed,
            },
            enhanced_networking: self.network.enhanced_networking,
            requires_gang: self.parallel.requires_gang
                || (self.parallel.is_tight && self.parallel.fabric_required),
            node_count,
        }
    }

    /// Standalone mode: synthesise a plan from the static config of the
    /// matched node group. An empty shape list here means "derive shapes
    /// from the analyzer's requirements"; synthesised plans are trusted and
    /// skip the external-plan validation rules.
    pub fn synthesise(
        group: &NodeGroupConfig,
        pricing: &burst_config::PricingConfig,
    ) -> Self {
        let mode = match group.pricing_mode {
            PricingMode::Preemptible => PlanPricingMode::Preemptible,
            PricingMode::OnDemand if pricing.prefer_preemptible => PlanPricingMode::Mixed,
            PricingMode::OnDemand => PlanPricingMode::OnDemand,
        };
        ExecutionPlan {
            should_provision: true,
            instance_shapes: group.instance_shapes.clone(),
            pricing: PlanPricing {
                mode,
                price_ceiling: pricing.default_price_ceiling,
            },
            subnets: group.subnets.clone(),
            launch_template: LaunchTemplateRef::by_name(&group.launch_template),
            security_groups: group.security_groups.clone(),
            instance_role: group.instance_role.clone(),
            user_data: None,
            parallel: ParallelBlock::default(),
            cost: CostConstraints::default(),
            network: NetworkBlock::default(),
            metadata: PlanMetadata::default(),
            tags: group.tags.clone(),
        }
    }
}

//! Provisioning input: analyzed job or supplied plan.

use crate::model::ExecutionPlan;
use burst_analyzer::{ClassificationError, InstanceRequirements, Job};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

/// Where the instance requirements come from.
///
/// Downstream code never branches on this again; it consumes only the
/// [`InstanceRequirements`] synthesised from either arm.
#[derive(Debug, Clone)]
pub enum ProvisioningInput {
    /// No external plan: classify the job ourselves.
    Analyzed(Job),
    /// An external plan was supplied and is authoritative.
    Supplied(ExecutionPlan),
}

impl ProvisioningInput {
    /// Resolve to instance requirements for a launch of `node_count` nodes.
    pub fn requirements(&mut self, node_count: u32) -> Result<InstanceRequirements, InputError> {
        match self {
            ProvisioningInput::Analyzed(job) => Ok(burst_analyzer::analyze(job)?),
            ProvisioningInput::Supplied(plan) => Ok(plan.to_requirements(node_count)),
        }
    }

    /// The plan to draw launch settings from, when one was supplied.
    pub fn supplied_plan(&self) -> Option<&ExecutionPlan> {
        match self {
            ProvisioningInput::Supplied(plan) => Some(plan),
            ProvisioningInput::Analyzed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LaunchTemplateRef, NetworkBlock, ParallelBlock, PlanPricing, PlanPricingMode};
    use burst_analyzer::PlacementStrategy;

    #[test]
    fn test_supplied_plan_wins_over_independent_looking_job() {
        // The job script looks like a plain serial run; the plan says tight
        // gang with fabric. The plan's answer must come through.
        let plan = ExecutionPlan {
            should_provision: true,
            instance_shapes: vec!["hpc6a.48xlarge".to_string()],
            pricing: PlanPricing { mode: PlanPricingMode::OnDemand, price_ceiling: None },
            subnets: vec!["subnet-aaa".to_string()],
            launch_template: LaunchTemplateRef::by_name("burst-lt"),
            security_groups: vec![],
            instance_role: None,
            user_data: None,
            parallel: ParallelBlock {
                is_tight: true,
                requires_gang: true,
                fabric_required: true,
                ..ParallelBlock::default()
            },
            network: NetworkBlock {
                placement_strategy: Some(PlacementStrategy::CoLocated),
                enhanced_networking: true,
                ..NetworkBlock::default()
            },
            cost: Default::default(),
            metadata: Default::default(),
            tags: Default::default(),
        };

        let mut input = ProvisioningInput::Supplied(plan);
        let reqs = input.requirements(2).unwrap();
        assert!(reqs.requires_gang);
        assert_eq!(reqs.explicit_shapes.len(), 1);
    }

    #[test]
    fn test_analyzed_job_classifies() {
        let job = Job::default_for_nodes(
            vec!["hpc-od-001".to_string(), "hpc-od-002".to_string()],
            "hpc",
        );
        let mut input = ProvisioningInput::Analyzed(job);
        let reqs = input.requirements(2).unwrap();
        assert!(!reqs.requires_gang);
        assert_eq!(reqs.node_count, 2);
    }
}

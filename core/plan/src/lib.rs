//! Execution plans
//!
//! An execution plan is an externally-produced, authoritative description of
//! what the engine should provision. When one is supplied it wins over the
//! job analyzer's own classification. When none is supplied the engine runs
//! in standalone mode and synthesises a plan from the static config of the
//! matched (partition, node-group).

pub mod input;
pub mod loader;
pub mod model;

pub use input::{InputError, ProvisioningInput};
pub use loader::{load, load_file, PlanError, ValidationReport};
pub use model::{
    CostConstraints, ExecutionPlan, LaunchTemplateRef, NetworkBlock, ParallelBlock,
    PlanMetadata, PlanPricing, PlanPricingMode,
};

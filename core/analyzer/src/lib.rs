//! Job analysis and capability classification
//!
//! Takes the scheduler's view of a job (script, resource envelope, feature
//! tokens) and decides what kind of cloud capacity it needs: whether the
//! workload is tightly coupled, how badly it wants the low-latency fabric,
//! which instance families are acceptable, and what placement constraint to
//! apply.

pub mod detect;
pub mod job;
pub mod requirements;

mod analyze;

pub use analyze::{analyze, ClassificationError};
pub use detect::Detection;
pub use job::{Job, ResourceEnvelope, Topology};
pub use requirements::{
    FabricDemand, InstanceRequirements, PlacementStrategy, PricingPreference,
};

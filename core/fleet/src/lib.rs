//! Fleet provisioning
//!
//! Turns instance requirements plus launch settings into a single instant
//! fleet request, waits for the capacity to come up, and binds launched
//! instances to the scheduler's logical node names. Gang-scheduled launches
//! wrap the same path in an all-or-nothing transaction with capacity
//! pre-checks and rollback.
//!
//! The cloud is reached only through the [`CloudProvider`] trait; the AWS
//! SDK lives behind the [`ec2::Ec2Cloud`] adapter.

pub mod ec2;
pub mod gang;
pub mod placement;
pub mod provider;
pub mod provision;
pub mod types;

pub use gang::GangCoordinator;
pub use placement::PlacementGroupManager;
pub use provider::CloudProvider;
pub use provision::{select_shapes, FleetProvisioner, LaunchFailure};
pub use types::{
    FailedInstance, FleetOutcome, FleetResponse, FleetSpec, InstanceBinding, InstanceStatus,
    LaunchOverride, LaunchSettings,
};

use thiserror::Error;

/// Marker tag: which system manages an instance.
pub const MANAGED_BY_TAG: (&str, &str) = ("burst:managed-by", "cloudburst");
/// Tag key carrying the logical node name, used for lookups.
pub const NODE_NAME_TAG: &str = "burst:node-name";
/// Instance states a node-name lookup considers live.
pub const LIVE_STATES: &[&str] = &["pending", "running", "shutting-down", "stopping", "stopped"];

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("provider error (recoverable: {recoverable}): {message}")]
    Provider { recoverable: bool, message: String },
    #[error("no (shape, subnet) pair offers capacity")]
    InsufficientCapacity,
    #[error("{} instances did not reach running state in time", pending.len())]
    LaunchTimeout { pending: Vec<String> },
    #[error("gang provisioning failed: {0}")]
    GangFailed(String),
}

impl FleetError {
    pub fn provider(recoverable: bool, message: impl Into<String>) -> Self {
        FleetError::Provider { recoverable, message: message.into() }
    }
}

//! Fleet request/response types and instance bindings.

use burst_plan::LaunchTemplateRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One (shape, subnet) launch override, unit weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchOverride {
    pub shape: String,
    pub subnet: String,
    pub weight: f64,
}

/// A composed instant-fleet request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSpec {
    pub total_capacity: u32,
    pub spot_capacity: u32,
    pub on_demand_capacity: u32,
    pub prefer_preemptible: bool,
    /// Ceiling for preemptible bids, USD per instance-hour.
    pub price_ceiling: Option<f64>,
    pub launch_template: LaunchTemplateRef,
    pub overrides: Vec<LaunchOverride>,
    pub placement_group: Option<String>,
    /// Tags applied at the instance resource level at launch.
    pub tags: Vec<(String, String)>,
}

/// Per-override launch failure reported by the fleet API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedInstance {
    pub shape: String,
    pub code: String,
    pub message: String,
}

/// What the fleet API produced.
#[derive(Debug, Clone, Default)]
pub struct FleetOutcome {
    pub instance_ids: Vec<String>,
    pub errors: Vec<FailedInstance>,
}

/// State snapshot of one instance.
#[derive(Debug, Clone)]
pub struct InstanceStatus {
    pub id: String,
    pub state: String,
    pub shape: Option<String>,
    pub private_address: Option<String>,
    pub public_address: Option<String>,
    pub name_tag: Option<String>,
    pub launched_at: Option<DateTime<Utc>>,
}

/// The live mapping from a logical node to a cloud instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceBinding {
    pub node_name: String,
    pub instance_id: String,
    pub private_address: String,
    pub public_address: Option<String>,
    pub state: String,
    pub launched_at: DateTime<Utc>,
}

/// Launch settings drawn from the plan or the node-group config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSettings {
    pub partition: String,
    pub node_group: String,
    pub job_id: String,
    pub launch_template: LaunchTemplateRef,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub instance_role: Option<String>,
    pub user_data: Option<String>,
    pub extra_tags: HashMap<String, String>,
}

/// Result of a successful provisioning call: one binding per requested
/// node, plus any per-override errors the fleet API reported along the way.
#[derive(Debug, Clone)]
pub struct FleetResponse {
    pub bindings: Vec<InstanceBinding>,
    pub failed: Vec<FailedInstance>,
}

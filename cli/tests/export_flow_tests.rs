//! Performance export against an in-memory cloud and a scripted scheduler.

use async_trait::async_trait;
use burst_analyzer::PlacementStrategy;
use burst_binder::{BinderError, NodeStateView, QueuedJob, SchedulerClient};
use burst_cli::export::{self, ExportFormat, ExportRequest};
use burst_fleet::{CloudProvider, FleetError, FleetOutcome, FleetSpec, InstanceStatus};
use std::collections::HashMap;

/// Cloud double holding the instances tagged with the exported job id.
struct MockCloud {
    ids: Vec<String>,
    shape: String,
}

#[async_trait]
impl CloudProvider for MockCloud {
    async fn create_fleet(&self, _spec: &FleetSpec) -> Result<FleetOutcome, FleetError> {
        Ok(FleetOutcome::default())
    }

    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<InstanceStatus>, FleetError> {
        Ok(ids
            .iter()
            .map(|id| InstanceStatus {
                id: id.clone(),
                state: "running".to_string(),
                shape: Some(self.shape.clone()),
                private_address: Some("10.0.0.1".to_string()),
                public_address: None,
                name_tag: None,
                launched_at: Some(chrono::Utc::now()),
            })
            .collect())
    }

    async fn instances_by_tag(
        &self,
        _tag_key: &str,
        _values: &[String],
        _states: &[&str],
    ) -> Result<Vec<String>, FleetError> {
        Ok(self.ids.clone())
    }

    async fn create_tags(
        &self,
        _ids: &[String],
        _tags: &[(String, String)],
    ) -> Result<(), FleetError> {
        Ok(())
    }

    async fn terminate_instances(&self, _ids: &[String]) -> Result<(), FleetError> {
        Ok(())
    }

    async fn ensure_placement_group(
        &self,
        _name: &str,
        _strategy: PlacementStrategy,
    ) -> Result<(), FleetError> {
        Ok(())
    }

    async fn shape_offered(&self, _shape: &str, _subnet: &str) -> Result<bool, FleetError> {
        Ok(true)
    }
}

struct ScriptedScheduler {
    detail: HashMap<String, String>,
}

#[async_trait]
impl SchedulerClient for ScriptedScheduler {
    async fn expand_hostlist(&self, list: &str) -> Result<Vec<String>, BinderError> {
        Ok(list.split(',').map(str::to_string).collect())
    }

    async fn update_node_address(&self, _node: &str, _address: &str) -> Result<(), BinderError> {
        Ok(())
    }

    async fn node_states(&self, _names: &[String]) -> Result<Vec<NodeStateView>, BinderError> {
        Ok(Vec::new())
    }

    async fn update_node_state(
        &self,
        _node: &str,
        _state: &str,
        _reason: Option<&str>,
    ) -> Result<(), BinderError> {
        Ok(())
    }

    async fn jobs_on_nodes(&self, _node_list: &str) -> Result<Vec<QueuedJob>, BinderError> {
        Ok(Vec::new())
    }

    async fn job_detail(&self, _job_id: &str) -> Result<HashMap<String, String>, BinderError> {
        Ok(self.detail.clone())
    }
}

fn scheduler() -> ScriptedScheduler {
    ScriptedScheduler {
        detail: HashMap::from([
            ("JobName".to_string(), "climate-model".to_string()),
            ("Partition".to_string(), "hpc".to_string()),
            ("NumNodes".to_string(), "32".to_string()),
            ("RunTime".to_string(), "10:00:00".to_string()),
        ]),
    }
}

fn cloud() -> MockCloud {
    MockCloud {
        ids: vec!["i-0000001".to_string(), "i-0000002".to_string()],
        shape: "hpc6a.48xlarge".to_string(),
    }
}

fn request(dir: &std::path::Path, format: ExportFormat, ceiling: Option<f64>) -> ExportRequest {
    ExportRequest {
        job_id: "42".to_string(),
        output_dir: dir.to_path_buf(),
        format,
        anonymize: false,
        price_ceiling: ceiling,
    }
}

#[tokio::test]
async fn test_reconciliation_cost_is_ceiling_times_nodes_times_duration() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(dir.path(), ExportFormat::Reconciliation, Some(2.0));

    let path = export::run(&cloud(), &scheduler(), &request).await.unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    // $2.00/h ceiling x 32 nodes x 10 hours.
    assert_eq!(record["estimated_cost"].as_f64().unwrap(), 640.0);
    assert_eq!(record["node_count"].as_u64().unwrap(), 32);
    assert_eq!(record["duration_hours"].as_f64().unwrap(), 10.0);
    assert_eq!(record["job_id"].as_str().unwrap(), "42");
    // The reconciliation subset carries no instance detail.
    assert!(record.get("instance_shapes").is_none());
}

#[tokio::test]
async fn test_cost_falls_back_to_shape_price_without_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let request = request(dir.path(), ExportFormat::Json, None);

    let path = export::run(&cloud(), &scheduler(), &request).await.unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    // hpc6a.48xlarge mock price is 0.72 x 96 = $69.12/h.
    let expected = 69.12 * 32.0 * 10.0;
    let cost = record["estimated_cost"].as_f64().unwrap();
    assert!((cost - expected).abs() < 1e-6, "{cost} vs {expected}");
    assert_eq!(
        record["instance_shapes"],
        serde_json::json!(["hpc6a.48xlarge", "hpc6a.48xlarge"])
    );
}

#[tokio::test]
async fn test_anonymize_blanks_job_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut request = request(dir.path(), ExportFormat::StructuredCompact, Some(1.0));
    request.anonymize = true;

    let path = export::run(&cloud(), &scheduler(), &request).await.unwrap();
    let body = std::fs::read_to_string(&path).unwrap();
    assert_eq!(body.lines().count(), 1);
    let record: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(record["job_name"].is_null());
    assert!(!body.contains("climate-model"));
}

#[tokio::test]
async fn test_no_instances_and_no_ceiling_costs_zero() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = MockCloud { ids: Vec::new(), shape: String::new() };
    let request = request(dir.path(), ExportFormat::Json, None);

    let path = export::run(&cloud, &scheduler(), &request).await.unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(record["estimated_cost"].as_f64().unwrap(), 0.0);
}

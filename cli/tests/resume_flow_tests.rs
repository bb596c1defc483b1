//! Resume flow against an in-memory cloud and a scripted scheduler.

use async_trait::async_trait;
use burst_analyzer::PlacementStrategy;
use burst_binder::{BinderError, NodeStateView, QueuedJob, SchedulerClient};
use burst_cli::resume::{self, ResumeRequest};
use burst_config::Config;
use burst_fleet::{
    CloudProvider, FleetError, FleetOutcome, FleetProvisioner, FleetSpec, InstanceStatus,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const CONFIG: &str = r#"
cloud:
  region: us-east-1
scheduler:
  bin_dir: /usr/bin
  partitions:
    - name: hpc
      node_groups:
        - name: od
          max_nodes: 64
          pricing_mode: on-demand
          launch_template: burst-lt
          subnets: [subnet-aaa, subnet-bbb]
          security_groups: [sg-ccc]
        - name: spot
          max_nodes: 64
          pricing_mode: preemptible
          launch_template: burst-lt
          subnets: [subnet-aaa]
"#;

#[derive(Default)]
struct MockCloud {
    next_id: AtomicUsize,
    fleet_calls: AtomicUsize,
    last_spec: Mutex<Option<FleetSpec>>,
    placement_groups: Mutex<Vec<(String, PlacementStrategy)>>,
    instances: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CloudProvider for MockCloud {
    async fn create_fleet(&self, spec: &FleetSpec) -> Result<FleetOutcome, FleetError> {
        self.fleet_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        let mut ids = Vec::new();
        let mut instances = self.instances.lock().unwrap();
        for _ in 0..spec.total_capacity {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("i-{n:07}");
            instances.insert(id.clone(), "running".to_string());
            ids.push(id);
        }
        Ok(FleetOutcome { instance_ids: ids, errors: Vec::new() })
    }

    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<InstanceStatus>, FleetError> {
        let instances = self.instances.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                instances.get(id).map(|state| InstanceStatus {
                    id: id.clone(),
                    state: state.clone(),
                    shape: Some("c6i.2xlarge".to_string()),
                    private_address: Some("10.0.0.1".to_string()),
                    public_address: None,
                    name_tag: None,
                    launched_at: Some(chrono::Utc::now()),
                })
            })
            .collect())
    }

    async fn instances_by_tag(
        &self,
        _tag_key: &str,
        _values: &[String],
        _states: &[&str],
    ) -> Result<Vec<String>, FleetError> {
        Ok(Vec::new())
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
        name: &str,
        strategy: PlacementStrategy,
    ) -> Result<(), FleetError> {
        self.placement_groups
            .lock()
            .unwrap()
            .push((name.to_string(), strategy));
        Ok(())
    }

    async fn shape_offered(&self, _shape: &str, _subnet: &str) -> Result<bool, FleetError> {
        Ok(true)
    }
}

#[derive(Default)]
struct ScriptedScheduler {
    queued: Vec<QueuedJob>,
    detail: HashMap<String, String>,
    pushes: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SchedulerClient for ScriptedScheduler {
    async fn expand_hostlist(&self, list: &str) -> Result<Vec<String>, BinderError> {
        Ok(list.split(',').map(str::to_string).collect())
    }

    async fn update_node_address(&self, node: &str, address: &str) -> Result<(), BinderError> {
        self.pushes
            .lock()
            .unwrap()
            .push((node.to_string(), address.to_string()));
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
        Ok(self.queued.clone())
    }

    async fn job_detail(&self, _job_id: &str) -> Result<HashMap<String, String>, BinderError> {
        Ok(self.detail.clone())
    }
}

fn provisioner() -> FleetProvisioner<MockCloud> {
    FleetProvisioner::new(MockCloud::default()).with_timeouts(
        Duration::from_millis(50),
        Duration::from_millis(100),
        Duration::from_millis(5),
    )
}

fn node_list(group: &str, count: usize) -> String {
    (1..=count)
        .map(|i| format!("hpc-{group}-{i:03}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::test]
async fn test_independent_preemptible_resume() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let provisioner = provisioner();
    let scheduler = ScriptedScheduler {
        queued: vec![QueuedJob {
            id: "7".to_string(),
            name: "array".to_string(),
            partition: "hpc".to_string(),
            node_count: 8,
            cpu_count: 32,
            memory: "8000M".to_string(),
            state: "PD".to_string(),
            start_time: "N/A".to_string(),
            time_left: "04:00:00".to_string(),
        }],
        detail: HashMap::from([("Command".to_string(), "./run.sh".to_string())]),
        pushes: Mutex::new(Vec::new()),
    };

    let request = ResumeRequest {
        node_list: node_list("spot", 8),
        execution_plan: None,
        dry_run: false,
    };
    let summary = resume::run(&config, &provisioner, &scheduler, &request).await.unwrap();

    assert_eq!(summary.bindings, 8);
    // Independent job: no placement group, preemptible-heavy split.
    assert!(provisioner.provider().placement_groups.lock().unwrap().is_empty());
    let spec = provisioner.provider().last_spec.lock().unwrap().clone().unwrap();
    assert_eq!(spec.total_capacity, 8);
    assert_eq!(spec.spot_capacity, 7);
    assert!(spec.prefer_preemptible);
    // Every node's address was pushed back to the scheduler.
    assert_eq!(scheduler.pushes.lock().unwrap().len(), 8);
}

#[tokio::test]
async fn test_supplied_plan_forces_gang_path() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let provisioner = provisioner();
    let scheduler = ScriptedScheduler::default();

    let plan = serde_json::json!({
        "should_provision": true,
        "instance_shapes": ["hpc6a.48xlarge"],
        "pricing": { "mode": "on-demand" },
        "subnets": ["subnet-aaa"],
        "launch_template": { "name": "burst-lt" },
        "parallel": {
            "is_tight": true,
            "requires_gang": true,
            "fabric_required": true,
            "process_count": 128
        },
        "network": {
            "placement_strategy": "co-located",
            "enhanced_networking": true
        },
        "metadata": { "job_id": "9" }
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&plan).unwrap().as_bytes()).unwrap();

    let request = ResumeRequest {
        node_list: node_list("od", 2),
        execution_plan: Some(file.path().to_path_buf()),
        dry_run: false,
    };
    let summary = resume::run(&config, &provisioner, &scheduler, &request).await.unwrap();

    assert_eq!(summary.bindings, 2);
    // The plan wins over the (empty) job: gang path ensured the group and
    // launched the single planned shape.
    let groups = provisioner.provider().placement_groups.lock().unwrap().clone();
    assert_eq!(groups, vec![("hpc-od-pg".to_string(), PlacementStrategy::CoLocated)]);
    let spec = provisioner.provider().last_spec.lock().unwrap().clone().unwrap();
    let shapes: Vec<&str> = spec.overrides.iter().map(|o| o.shape.as_str()).collect();
    assert_eq!(shapes, vec!["hpc6a.48xlarge"]);
    assert_eq!(spec.placement_group.as_deref(), Some("hpc-od-pg"));
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let provisioner = provisioner();
    let scheduler = ScriptedScheduler::default();

    let request = ResumeRequest {
        node_list: node_list("od", 4),
        execution_plan: None,
        dry_run: true,
    };
    let summary = resume::run(&config, &provisioner, &scheduler, &request).await.unwrap();

    assert_eq!(summary.bindings, 0);
    assert_eq!(provisioner.provider().fleet_calls.load(Ordering::SeqCst), 0);
    assert!(scheduler.pushes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_node_group_fails_cleanly() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let provisioner = provisioner();
    let scheduler = ScriptedScheduler::default();

    let request = ResumeRequest {
        node_list: "hpc-missing-001".to_string(),
        execution_plan: None,
        dry_run: false,
    };
    let err = resume::run(&config, &provisioner, &scheduler, &request).await.unwrap_err();
    assert!(err.to_string().contains("node group"));
    assert_eq!(provisioner.provider().fleet_calls.load(Ordering::SeqCst), 0);
}

//! Sweep and push behavior against a scripted scheduler.

use async_trait::async_trait;
use burst_binder::{
    push_bindings, BinderError, NodeStateView, QueuedJob, SchedulerClient, StateReconciler,
};
use burst_fleet::InstanceBinding;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted scheduler double: canned node states, recorded updates,
/// optionally failing specific nodes.
#[derive(Default)]
struct ScriptedScheduler {
    states: Mutex<Vec<NodeStateView>>,
    updates: Mutex<Vec<(String, String, Option<String>)>>,
    address_pushes: Mutex<Vec<(String, String)>>,
    fail_nodes: Vec<String>,
}

impl ScriptedScheduler {
    fn with_states(states: Vec<NodeStateView>) -> Self {
        Self { states: Mutex::new(states), ..Self::default() }
    }
}

#[async_trait]
impl SchedulerClient for ScriptedScheduler {
    async fn expand_hostlist(&self, list: &str) -> Result<Vec<String>, BinderError> {
        Ok(list.split(',').map(str::to_string).collect())
    }

    async fn update_node_address(&self, node: &str, address: &str) -> Result<(), BinderError> {
        if self.fail_nodes.iter().any(|n| n == node) {
            return Err(BinderError::SchedulerUpdate {
                node: node.to_string(),
                message: "refused".to_string(),
            });
        }
        self.address_pushes
            .lock()
            .unwrap()
            .push((node.to_string(), address.to_string()));
        Ok(())
    }

    async fn node_states(&self, _names: &[String]) -> Result<Vec<NodeStateView>, BinderError> {
        Ok(self.states.lock().unwrap().clone())
    }

    async fn update_node_state(
        &self,
        node: &str,
        state: &str,
        reason: Option<&str>,
    ) -> Result<(), BinderError> {
        if self.fail_nodes.iter().any(|n| n == node) {
            return Err(BinderError::SchedulerUpdate {
                node: node.to_string(),
                message: "refused".to_string(),
            });
        }
        self.updates.lock().unwrap().push((
            node.to_string(),
            state.to_string(),
            reason.map(str::to_string),
        ));
        // Reflect the transition in the snapshot the next sweep sees.
        let mut states = self.states.lock().unwrap();
        if let Some(view) = states.iter_mut().find(|v| v.name == node) {
            *view = NodeStateView::new(node, state, reason.map(str::to_string));
        }
        Ok(())
    }

    async fn jobs_on_nodes(&self, _node_list: &str) -> Result<Vec<QueuedJob>, BinderError> {
        Ok(Vec::new())
    }

    async fn job_detail(&self, _job_id: &str) -> Result<HashMap<String, String>, BinderError> {
        Ok(HashMap::new())
    }
}

fn managed() -> Vec<(String, String)> {
    vec![("p".to_string(), "g".to_string())]
}

#[tokio::test]
async fn test_sweep_recovers_powered_down_node() {
    let scheduler = ScriptedScheduler::with_states(vec![
        NodeStateView::new("p-g-007", "DOWN+POWER", None),
        NodeStateView::new("p-g-008", "IDLE", None),
    ]);
    let reconciler = StateReconciler::new(&scheduler);

    let stats = reconciler.sweep(&managed()).await.unwrap();
    assert_eq!(stats.examined, 2);
    assert_eq!(stats.transitioned, 1);
    assert_eq!(stats.failed, 0);

    let updates = scheduler.updates.lock().unwrap().clone();
    assert_eq!(updates, vec![("p-g-007".to_string(), "IDLE".to_string(), None)]);

    // Second sweep over the updated snapshot: nothing left to do.
    let stats = reconciler.sweep(&managed()).await.unwrap();
    assert_eq!(stats.transitioned, 0);
    assert_eq!(scheduler.updates.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sweep_ignores_unmanaged_and_unparseable_nodes() {
    let scheduler = ScriptedScheduler::with_states(vec![
        NodeStateView::new("other-part-001", "DOWN", None),
        NodeStateView::new("login01", "DOWN", None),
        NodeStateView::new("p-g-001", "DOWN", None),
    ]);
    let reconciler = StateReconciler::new(&scheduler);

    let stats = reconciler.sweep(&managed()).await.unwrap();
    assert_eq!(stats.examined, 1);
    assert_eq!(stats.transitioned, 1);

    let updates = scheduler.updates.lock().unwrap().clone();
    assert_eq!(updates[0].0, "p-g-001");
    assert_eq!(updates[0].1, "POWER_DOWN");
    assert_eq!(updates[0].2.as_deref(), Some("node_stuck"));
}

#[tokio::test]
async fn test_sweep_continues_past_failing_node() {
    let mut scheduler = ScriptedScheduler::with_states(vec![
        NodeStateView::new("p-g-001", "DOWN", None),
        NodeStateView::new("p-g-002", "DOWN+POWER", None),
    ]);
    scheduler.fail_nodes = vec!["p-g-001".to_string()];
    let reconciler = StateReconciler::new(&scheduler);

    let stats = reconciler.sweep(&managed()).await.unwrap();
    assert_eq!(stats.examined, 2);
    assert_eq!(stats.transitioned, 1);
    assert_eq!(stats.failed, 1);
}

fn binding(node: &str, address: &str) -> InstanceBinding {
    InstanceBinding {
        node_name: node.to_string(),
        instance_id: format!("i-{node}"),
        private_address: address.to_string(),
        public_address: None,
        state: "running".to_string(),
        launched_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_push_updates_every_node() {
    let scheduler = ScriptedScheduler::default();
    let bindings = vec![binding("p-g-001", "10.0.0.1"), binding("p-g-002", "10.0.0.2")];

    let report = push_bindings(&scheduler, &bindings).await;
    assert!(report.all_pushed());
    assert_eq!(report.pushed, 2);

    let pushes = scheduler.address_pushes.lock().unwrap().clone();
    assert_eq!(pushes[0], ("p-g-001".to_string(), "10.0.0.1".to_string()));
    assert_eq!(pushes[1], ("p-g-002".to_string(), "10.0.0.2".to_string()));
}

#[tokio::test]
async fn test_push_never_aborts_mid_batch() {
    let mut scheduler = ScriptedScheduler::default();
    scheduler.fail_nodes = vec!["p-g-002".to_string()];
    let bindings = vec![
        binding("p-g-001", "10.0.0.1"),
        binding("p-g-002", "10.0.0.2"),
        binding("p-g-003", "10.0.0.3"),
    ];

    let report = push_bindings(&scheduler, &bindings).await;
    assert_eq!(report.pushed, 2);
    assert_eq!(report.failures.len(), 1);

    // The node after the failing one was still pushed.
    let pushes = scheduler.address_pushes.lock().unwrap().clone();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1].0, "p-g-003");
}

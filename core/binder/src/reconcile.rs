//! State reconciliation.
//!
//! Reads the scheduler's compound node states and applies a fixed
//! transition table to repair stuck nodes. Every transition is best-effort;
//! one failing node never blocks the rest of the sweep.

use crate::names::NodeName;
use crate::slurm::SchedulerClient;
use tracing::{info, warn};

/// Read-only snapshot of one node's compound state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStateView {
    pub name: String,
    /// State tokens, split on `+`, without the trailing asterisk.
    pub tokens: Vec<String>,
    /// Trailing asterisk on the state string: the node is not responding.
    pub not_responding: bool,
    pub reason: Option<String>,
}

impl NodeStateView {
    /// Build from a raw compound state string like `DOWN+POWER` or `IDLE*`.
    pub fn new(name: &str, state: &str, reason: Option<String>) -> Self {
        let not_responding = state.ends_with('*');
        let trimmed = state.trim_end_matches('*');
        Self {
            name: name.to_string(),
            tokens: trimmed.split('+').map(str::to_string).collect(),
            not_responding,
            reason,
        }
    }

    fn has(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Any POWER-family token (`POWER`, `POWERED_DOWN`, `POWERING_UP`, ...).
    fn has_power(&self) -> bool {
        self.tokens.iter().any(|t| t.starts_with("POWER"))
    }
}

/// What the reconciler decided to do with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    PowerDown { reason: &'static str },
    MarkDown { reason: &'static str },
    MarkIdle,
    Undrain,
}

impl ReconcileAction {
    pub fn state(&self) -> &'static str {
        match self {
            ReconcileAction::PowerDown { .. } => "POWER_DOWN",
            ReconcileAction::MarkDown { .. } => "DOWN",
            ReconcileAction::MarkIdle => "IDLE",
            ReconcileAction::Undrain => "UNDRAIN",
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            ReconcileAction::PowerDown { reason } | ReconcileAction::MarkDown { reason } => {
                Some(reason)
            }
            ReconcileAction::MarkIdle | ReconcileAction::Undrain => None,
        }
    }
}

/// The fixed transition table. Pure; sweeping applies it per node.
pub fn decide(view: &NodeStateView) -> Option<ReconcileAction> {
    if view.not_responding && (view.has("DOWN") || view.has("IDLE")) {
        return Some(ReconcileAction::PowerDown { reason: "node_not_responding" });
    }
    if view.has("COMPLETING") && view.has("DRAIN") {
        return Some(ReconcileAction::MarkDown { reason: "node_stuck" });
    }
    if view.has("DOWN") {
        return if view.has_power() {
            Some(ReconcileAction::MarkIdle)
        } else {
            Some(ReconcileAction::PowerDown { reason: "node_stuck" })
        };
    }
    if view.has("DRAIN") && view.has_power() {
        return Some(ReconcileAction::Undrain);
    }
    None
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub examined: usize,
    pub transitioned: usize,
    pub failed: usize,
}

/// Whether a node name parses and belongs to one of the managed
/// (partition, node-group) pairs. The scheduler may host nodes this engine
/// does not manage; those never enter a sweep.
pub fn is_managed_node(name: &str, managed: &[(String, String)]) -> bool {
    NodeName::parse(name)
        .map(|parsed| {
            managed
                .iter()
                .any(|(p, g)| *p == parsed.partition && *g == parsed.node_group)
        })
        .unwrap_or(false)
}

/// Periodic sweep over the scheduler's view of the managed node groups.
pub struct StateReconciler<'a, C: SchedulerClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: SchedulerClient + ?Sized> StateReconciler<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// One pass: read every node the scheduler knows, keep those belonging
    /// to a managed (partition, node-group), and apply the table.
    pub async fn sweep(
        &self,
        managed: &[(String, String)],
    ) -> Result<ReconcileStats, crate::BinderError> {
        let views = self.client.node_states(&[]).await?;
        let mut stats = ReconcileStats::default();

        for view in views {
            if !is_managed_node(&view.name, managed) {
                continue;
            }
            stats.examined += 1;

            let Some(action) = decide(&view) else {
                continue;
            };
            info!(
                node = %view.name,
                state = view.tokens.join("+"),
                target = action.state(),
                "reconciling stuck node"
            );
            match self
                .client
                .update_node_state(&view.name, action.state(), action.reason())
                .await
            {
                Ok(()) => stats.transitioned += 1,
                Err(e) => {
                    warn!(node = %view.name, "state transition failed: {e}");
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(state: &str) -> NodeStateView {
        NodeStateView::new("p-g-007", state, None)
    }

    #[test]
    fn test_not_responding_powers_down() {
        for state in ["DOWN*", "IDLE*", "DOWN+DRAIN*"] {
            let action = decide(&view(state)).unwrap();
            assert_eq!(action.state(), "POWER_DOWN");
            assert_eq!(action.reason(), Some("node_not_responding"));
        }
    }

    #[test]
    fn test_completing_drain_is_stuck() {
        let action = decide(&view("COMPLETING+DRAIN")).unwrap();
        assert_eq!(action.state(), "DOWN");
        assert_eq!(action.reason(), Some("node_stuck"));
    }

    #[test]
    fn test_down_with_power_recovers_to_idle() {
        let action = decide(&view("DOWN+POWER")).unwrap();
        assert_eq!(action, ReconcileAction::MarkIdle);
        assert_eq!(action.reason(), None);

        // POWER-family spellings count too.
        assert_eq!(decide(&view("DOWN+POWERED_DOWN")), Some(ReconcileAction::MarkIdle));
    }

    #[test]
    fn test_down_without_power_powers_down() {
        let action = decide(&view("DOWN")).unwrap();
        assert_eq!(action.state(), "POWER_DOWN");
        assert_eq!(action.reason(), Some("node_stuck"));
    }

    #[test]
    fn test_drain_with_power_undrains() {
        assert_eq!(decide(&view("DRAIN+POWER")), Some(ReconcileAction::Undrain));
        assert_eq!(decide(&view("IDLE+DRAIN+POWERED_DOWN")), Some(ReconcileAction::Undrain));
    }

    #[test]
    fn test_healthy_states_are_untouched() {
        for state in ["IDLE", "ALLOCATED", "MIXED", "COMPLETING", "IDLE+POWER"] {
            assert_eq!(decide(&view(state)), None, "{state}");
        }
    }

    #[test]
    fn test_recovery_is_idempotent_on_the_updated_snapshot() {
        // DOWN+POWER -> IDLE; the updated node no longer matches any rule.
        assert_eq!(decide(&view("DOWN+POWER")), Some(ReconcileAction::MarkIdle));
        assert_eq!(decide(&view("IDLE")), None);
        assert_eq!(decide(&view("IDLE+POWER")), None);
    }

    #[test]
    fn test_is_managed_node() {
        let managed = vec![("p".to_string(), "g".to_string())];
        assert!(is_managed_node("p-g-007", &managed));
        assert!(!is_managed_node("p-other-001", &managed));
        assert!(!is_managed_node("login01", &managed));
        assert!(!is_managed_node("p_g-001", &managed));
    }

    #[test]
    fn test_decide_is_pure() {
        // Applying the table twice to the same snapshot decides the same.
        let snapshot = view("DOWN+DRAIN");
        assert_eq!(decide(&snapshot), decide(&snapshot));
    }
}

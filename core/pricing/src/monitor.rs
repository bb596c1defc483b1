//! Interruption monitoring.
//!
//! A single background worker polls the states of tracked instances on a
//! fixed interval and emits a [`PreemptionEvent`] for every transition into
//! `shutting-down`. Observational only: reacting to the events is the
//! caller's concern. Shutting the monitor down closes the event channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Something that can report current instance states.
#[async_trait]
pub trait InstanceStateSource: Send + Sync + 'static {
    /// (instance id, state string) for every id that still exists.
    async fn instance_states(&self, ids: &[String]) -> Vec<(String, String)>;
}

/// One observed interruption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreemptionEvent {
    pub instance_id: String,
    pub node_name: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub action: String,
}

/// Handle to the background worker.
pub struct InterruptionMonitor {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl InterruptionMonitor {
    /// Spawn the worker. `tracked` pairs instance ids with the logical node
    /// names they are bound to.
    pub fn spawn(
        source: Arc<dyn InstanceStateSource>,
        tracked: Vec<(String, String)>,
        poll_interval: Duration,
    ) -> (Self, mpsc::Receiver<PreemptionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(1);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let ids: Vec<String> = tracked.iter().map(|(id, _)| id.clone()).collect();
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut seen_interrupted: HashSet<String> = HashSet::new();

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }

                for (id, state) in source.instance_states(&ids).await {
                    if state != "shutting-down" || seen_interrupted.contains(&id) {
                        continue;
                    }
                    seen_interrupted.insert(id.clone());
                    let node_name = tracked
                        .iter()
                        .find(|(tracked_id, _)| *tracked_id == id)
                        .map(|(_, name)| name.clone())
                        .unwrap_or_default();
                    info!(instance = %id, node = %node_name, "preemption observed");
                    let event = PreemptionEvent {
                        instance_id: id,
                        node_name,
                        timestamp: Utc::now(),
                        reason: "capacity reclaimed by provider".to_string(),
                        action: "observed".to_string(),
                    };
                    if events_tx.send(event).await.is_err() {
                        // Receiver gone; nothing left to report to.
                        return;
                    }
                }
            }
            // Dropping events_tx here closes the channel for the receiver.
        });

        (Self { shutdown: shutdown_tx, task }, events_rx)
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("interruption monitor did not shut down cleanly: {e}");
        }
    }
}

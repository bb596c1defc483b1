//! Pushing bindings back to the scheduler.

use crate::slurm::SchedulerClient;
use crate::BinderError;
use burst_fleet::InstanceBinding;
use tracing::{info, warn};

/// Outcome of a push batch. Failures are collected, never fatal: a node the
/// scheduler refuses to update must not take the rest of the batch down.
#[derive(Debug, Default)]
pub struct PushReport {
    pub pushed: usize,
    pub failures: Vec<BinderError>,
}

impl PushReport {
    pub fn all_pushed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Point each logical node at its instance's private address.
pub async fn push_bindings<C: SchedulerClient + ?Sized>(
    client: &C,
    bindings: &[InstanceBinding],
) -> PushReport {
    let mut report = PushReport::default();
    for binding in bindings {
        match client
            .update_node_address(&binding.node_name, &binding.private_address)
            .await
        {
            Ok(()) => {
                info!(
                    node = %binding.node_name,
                    instance = %binding.instance_id,
                    address = %binding.private_address,
                    "bound node to instance"
                );
                report.pushed += 1;
            }
            Err(e) => {
                warn!(node = %binding.node_name, "address push failed: {e}");
                report.failures.push(e);
            }
        }
    }
    report
}

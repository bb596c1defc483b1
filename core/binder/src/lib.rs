//! Node binding and state reconciliation
//!
//! Maps launched instances back onto the scheduler's logical node names,
//! pushes address information through the scheduler's own CLI, and
//! periodically repairs nodes stuck in bad compound states. The scheduler's
//! node table is authoritative; this crate only talks to it through its CLI.

pub mod bind;
pub mod names;
pub mod reconcile;
pub mod slurm;

pub use bind::{push_bindings, PushReport};
pub use names::{group_by_node_group, NodeName};
pub use reconcile::{
    decide, is_managed_node, NodeStateView, ReconcileAction, ReconcileStats, StateReconciler,
};
pub use slurm::{parse_memory_mib, QueuedJob, SchedulerClient, SlurmCli};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BinderError {
    #[error("hostlist expansion failed: {0}")]
    HostlistParse(String),
    #[error("scheduler update failed for node {node}: {message}")]
    SchedulerUpdate { node: String, message: String },
    #[error("scheduler command failed: {0}")]
    Command(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Scheduler CLI contract.
//!
//! The engine consumes exactly the documented `scontrol`/`squeue` surfaces:
//! `scontrol show hostnames`, `scontrol update nodename=...`,
//! `scontrol show node <names> -o`, `squeue -w <nodes> -o <fmt> --noheader`,
//! and `scontrol show job <id>`.

use crate::reconcile::NodeStateView;
use crate::BinderError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::process::Command;
use tracing::debug;

/// One `squeue` line for a job occupying requested nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: String,
    pub name: String,
    pub partition: String,
    pub node_count: u32,
    pub cpu_count: u32,
    pub memory: String,
    pub state: String,
    pub start_time: String,
    pub time_left: String,
}

/// The scheduler operations the engine performs, behind a trait so tests
/// can script them.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// `scontrol show hostnames <list>`: expand compact hostlist syntax.
    async fn expand_hostlist(&self, list: &str) -> Result<Vec<String>, BinderError>;

    /// `scontrol update nodename=<n> NodeAddr=<a> NodeHostname=<a>`.
    async fn update_node_address(&self, node: &str, address: &str) -> Result<(), BinderError>;

    /// `scontrol show node <names> -o`: compound state per node. An empty
    /// name list means every node the scheduler knows.
    async fn node_states(&self, names: &[String]) -> Result<Vec<NodeStateView>, BinderError>;

    /// `scontrol update nodename=<n> state=<s> [reason=<r>]`.
    async fn update_node_state(
        &self,
        node: &str,
        state: &str,
        reason: Option<&str>,
    ) -> Result<(), BinderError>;

    /// `squeue -w <nodes> -o "%i,%j,%P,%D,%C,%m,%t,%S,%L" --noheader`.
    async fn jobs_on_nodes(&self, node_list: &str) -> Result<Vec<QueuedJob>, BinderError>;

    /// `scontrol show job <id>`: key=value detail map.
    async fn job_detail(&self, job_id: &str) -> Result<HashMap<String, String>, BinderError>;
}

/// Production implementation shelling out to the scheduler binaries.
pub struct SlurmCli {
    bin_dir: String,
}

impl SlurmCli {
    /// `bin_dir` must carry a trailing slash (config normalises it).
    pub fn new(bin_dir: &str) -> Self {
        Self { bin_dir: bin_dir.to_string() }
    }

    async fn run(&self, binary: &str, args: &[&str]) -> Result<String, BinderError> {
        let path = format!("{}{}", self.bin_dir, binary);
        debug!(command = %path, ?args, "invoking scheduler CLI");
        let output = Command::new(&path).args(args).output().await?;
        if !output.status.success() {
            return Err(BinderError::Command(format!(
                "{path} {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SchedulerClient for SlurmCli {
    async fn expand_hostlist(&self, list: &str) -> Result<Vec<String>, BinderError> {
        let stdout = self
            .run("scontrol", &["show", "hostnames", list])
            .await
            .map_err(|e| BinderError::HostlistParse(e.to_string()))?;
        let names: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(BinderError::HostlistParse(format!("empty expansion for {list:?}")));
        }
        Ok(names)
    }

    async fn update_node_address(&self, node: &str, address: &str) -> Result<(), BinderError> {
        self.run(
            "scontrol",
            &[
                "update",
                &format!("nodename={node}"),
                &format!("NodeAddr={address}"),
                &format!("NodeHostname={address}"),
            ],
        )
        .await
        .map_err(|e| BinderError::SchedulerUpdate { node: node.to_string(), message: e.to_string() })?;
        Ok(())
    }

    async fn node_states(&self, names: &[String]) -> Result<Vec<NodeStateView>, BinderError> {
        let mut args = vec!["show", "node"];
        let joined;
        if !names.is_empty() {
            joined = names.join(",");
            args.push(&joined);
        }
        args.push("-o");
        let stdout = self.run("scontrol", &args).await?;
        Ok(stdout.lines().filter_map(parse_node_line).collect())
    }

    async fn update_node_state(
        &self,
        node: &str,
        state: &str,
        reason: Option<&str>,
    ) -> Result<(), BinderError> {
        let nodename = format!("nodename={node}");
        let state_arg = format!("state={state}");
        let mut args = vec!["update", nodename.as_str(), state_arg.as_str()];
        let reason_arg;
        if let Some(reason) = reason {
            reason_arg = format!("reason={reason}");
            args.push(&reason_arg);
        }
        self.run("scontrol", &args)
            .await
            .map_err(|e| BinderError::SchedulerUpdate { node: node.to_string(), message: e.to_string() })?;
        Ok(())
    }

    async fn jobs_on_nodes(&self, node_list: &str) -> Result<Vec<QueuedJob>, BinderError> {
        let stdout = self
            .run(
                "squeue",
                &[
                    "-w",
                    node_list,
                    "-o",
                    "%i,%j,%P,%D,%C,%m,%t,%S,%L",
                    "--noheader",
                ],
            )
            .await?;
        Ok(stdout.lines().filter_map(parse_squeue_line).collect())
    }

    async fn job_detail(&self, job_id: &str) -> Result<HashMap<String, String>, BinderError> {
        let stdout = self.run("scontrol", &["show", "job", job_id]).await?;
        let mut detail = HashMap::new();
        for token in stdout.split_whitespace() {
            if let Some((key, value)) = token.split_once('=') {
                detail.insert(key.to_string(), value.to_string());
            }
        }
        Ok(detail)
    }
}

/// Parse one `scontrol show node -o` line.
fn parse_node_line(line: &str) -> Option<NodeStateView> {
    let mut name = None;
    let mut state = None;
    for token in line.split_whitespace() {
        if let Some(value) = token.strip_prefix("NodeName=") {
            name = Some(value.to_string());
        } else if let Some(value) = token.strip_prefix("State=") {
            state = Some(value.to_string());
        }
    }
    // Reason may contain spaces; take everything after the key.
    let reason = line
        .split_once("Reason=")
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|r| !r.is_empty());
    Some(NodeStateView::new(&name?, &state?, reason))
}

/// Parse one `squeue` CSV line in the `%i,%j,%P,%D,%C,%m,%t,%S,%L` format.
fn parse_squeue_line(line: &str) -> Option<QueuedJob> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() != 9 {
        return None;
    }
    Some(QueuedJob {
        id: fields[0].to_string(),
        name: fields[1].to_string(),
        partition: fields[2].to_string(),
        node_count: fields[3].parse().ok()?,
        cpu_count: fields[4].parse().ok()?,
        memory: fields[5].to_string(),
        state: fields[6].to_string(),
        start_time: fields[7].to_string(),
        time_left: fields[8].to_string(),
    })
}

/// Scheduler memory spec (`4000M`, `64G`, bare MiB) to MiB.
pub fn parse_memory_mib(memory: &str) -> Option<u64> {
    let memory = memory.trim();
    if memory.is_empty() {
        return None;
    }
    let (digits, unit) = match memory.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((split, _)) => memory.split_at(split),
        None => (memory, ""),
    };
    let value: u64 = digits.parse().ok()?;
    match unit {
        "" | "M" | "Mn" | "Mc" => Some(value),
        "G" | "Gn" | "Gc" => Some(value * 1024),
        "T" | "Tn" | "Tc" => Some(value * 1024 * 1024),
        _ => None,
    }
}

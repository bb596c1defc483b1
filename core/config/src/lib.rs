//! Declarative engine configuration
//!
//! YAML-shaped file with five top-level blocks: cloud, scheduler, advisor,
//! pricing, logging. Partition and node-group names are restricted to
//! alphanumeric characters because they become components of logical node
//! names and placement-group names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("no node group matches partition {partition:?} group {group:?}")]
    UnknownNodeGroup { partition: String, group: String },
}

/// Pricing mode a node group is provisioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingMode {
    Preemptible,
    OnDemand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroupConfig {
    pub name: String,
    pub max_nodes: u32,
    pub pricing_mode: PricingMode,
    pub launch_template: String,
    /// Optional explicit shape override list; empty means "let the
    /// analyzer choose".
    #[serde(default)]
    pub instance_shapes: Vec<String>,
    pub subnets: Vec<String>,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub instance_role: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub name: String,
    pub node_groups: Vec<NodeGroupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Directory holding the scheduler binaries; normalised to a trailing
    /// slash on load.
    pub bin_dir: String,
    pub partitions: Vec<PartitionConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub plan_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub prefer_preemptible: bool,
    #[serde(default)]
    pub default_price_ceiling: Option<f64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cloud: CloudConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load, normalise, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.normalise();
        config.validate()?;
        Ok(config)
    }

    /// Path-shaped fields get a trailing slash so callers can append binary
    /// names directly.
    fn normalise(&mut self) {
        if !self.scheduler.bin_dir.is_empty() && !self.scheduler.bin_dir.ends_with('/') {
            self.scheduler.bin_dir.push('/');
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cloud.region.is_empty() {
            return Err(ConfigError::Invalid("cloud.region is empty".to_string()));
        }
        if self.scheduler.partitions.is_empty() {
            return Err(ConfigError::Invalid("scheduler.partitions is empty".to_string()));
        }
        for partition in &self.scheduler.partitions {
            if !is_alphanumeric(&partition.name) {
                return Err(ConfigError::Invalid(format!(
                    "partition name {:?} must be alphanumeric",
                    partition.name
                )));
            }
            if partition.node_groups.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "partition {:?} has no node groups",
                    partition.name
                )));
            }
            for group in &partition.node_groups {
                if !is_alphanumeric(&group.name) {
                    return Err(ConfigError::Invalid(format!(
                        "node group name {:?} must be alphanumeric",
                        group.name
                    )));
                }
                if group.max_nodes == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "node group {:?} max_nodes must be at least 1",
                        group.name
                    )));
                }
                if group.launch_template.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "node group {:?} has no launch template",
                        group.name
                    )));
                }
                if group.subnets.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "node group {:?} has no subnets",
                        group.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Find a node group by (partition, group) name.
    pub fn node_group(&self, partition: &str, group: &str) -> Result<&NodeGroupConfig, ConfigError> {
        self.scheduler
            .partitions
            .iter()
            .find(|p| p.name == partition)
            .and_then(|p| p.node_groups.iter().find(|g| g.name == group))
            .ok_or_else(|| ConfigError::UnknownNodeGroup {
                partition: partition.to_string(),
                group: group.to_string(),
            })
    }

    /// All (partition, node-group) pairs, for sweep-style operations.
    pub fn all_node_groups(&self) -> Vec<(&PartitionConfig, &NodeGroupConfig)> {
        self.scheduler
            .partitions
            .iter()
            .flat_map(|p| p.node_groups.iter().map(move |g| (p, g)))
            .collect()
    }
}

fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

//! Plan loading and validation.

use crate::model::ExecutionPlan;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot read plan file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse plan: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

/// What the validator looked at and what it found.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Rules that were checked and held.
    pub passed: Vec<&'static str>,
    /// Non-fatal observations, e.g. missing cost constraints.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn pass(&mut self, rule: &'static str) {
        self.passed.push(rule);
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Parse and validate an execution plan from raw JSON bytes.
pub fn load(bytes: &[u8]) -> Result<(ExecutionPlan, ValidationReport), PlanError> {
    let plan: ExecutionPlan = serde_json::from_slice(bytes)?;
    let report = validate(&plan)?;
    info!(
        shapes = plan.instance_shapes.len(),
        subnets = plan.subnets.len(),
        warnings = report.warnings.len(),
        "loaded execution plan"
    );
    Ok((plan, report))
}

/// Convenience wrapper over [`load`] for a plan file on disk.
pub fn load_file(path: &Path) -> Result<(ExecutionPlan, ValidationReport), PlanError> {
    let bytes = std::fs::read(path)?;
    load(&bytes)
}

/// All rules must hold; each failure carries the reason it names.
pub fn validate(plan: &ExecutionPlan) -> Result<ValidationReport, PlanError> {
    let mut report = ValidationReport::default();

    if !plan.should_provision {
        return Err(PlanError::InvalidPlan("should_provision is false".to_string()));
    }
    report.pass("should_provision");

    if plan.instance_shapes.is_empty() {
        return Err(PlanError::InvalidPlan("instance shape list is empty".to_string()));
    }
    report.pass("instance_shapes");

    if plan.subnets.is_empty() {
        return Err(PlanError::InvalidPlan("subnet list is empty".to_string()));
    }
    report.pass("subnets");

    // The pricing mode itself is enforced by the type; a bad string fails at
    // parse time.
    report.pass("pricing_mode");

    if plan.parallel.is_tight && plan.network.placement_strategy.is_none() {
        return Err(PlanError::InvalidPlan(
            "tight workload without a placement strategy".to_string(),
        ));
    }
    if plan.parallel.requires_gang && plan.network.placement_strategy.is_none() {
        return Err(PlanError::InvalidPlan(
            "gang scheduling without a placement strategy".to_string(),
        ));
    }
    report.pass("placement_strategy");

    if plan.parallel.fabric_required && !plan.network.enhanced_networking {
        return Err(PlanError::InvalidPlan(
            "fabric required but enhanced networking is disabled".to_string(),
        ));
    }
    report.pass("enhanced_networking");

    if let (Some(hourly), Some(total), Some(duration)) = (
        plan.cost.max_hourly,
        plan.cost.max_total,
        plan.cost.max_duration_hours,
    ) {
        if hourly * duration > total {
            return Err(PlanError::InvalidPlan("cost constraints inconsistent".to_string()));
        }
    }
    report.pass("cost_constraints");

    if plan.launch_template.is_empty() {
        report.warn("plan carries no launch template handle".to_string());
    }
    if plan.cost.max_total.is_none() && plan.cost.max_hourly.is_none() {
        report.warn("plan carries no cost ceiling".to_string());
    }
    if plan.metadata.job_id.is_none() {
        report.warn("plan names no job id".to_string());
    }

    Ok(report)
}

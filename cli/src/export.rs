//! Performance export: what a job's burst actually looked like.
//!
//! The engine keeps no state of its own, so the record is reconstructed
//! from the scheduler's job table and the instances tagged with the job id.

use crate::jobquery::parse_time_limit_minutes;
use anyhow::{Context, Result};
use burst_binder::SchedulerClient;
use burst_fleet::CloudProvider;
use burst_pricing::{MockPriceTable, ShapePriceSource};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Full record for the external advisor's feedback loop.
    StructuredFeedback,
    /// Single-line JSON for log shipping.
    StructuredCompact,
    /// Cost-reconciliation subset.
    Reconciliation,
    /// Raw record.
    Json,
}

impl ExportFormat {
    fn file_suffix(self) -> &'static str {
        match self {
            ExportFormat::StructuredFeedback => "feedback",
            ExportFormat::StructuredCompact => "compact",
            ExportFormat::Reconciliation => "reconciliation",
            ExportFormat::Json => "raw",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub job_id: String,
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    pub anonymize: bool,
    /// Hourly price ceiling from the config; the cost estimate falls back
    /// to the current shape price when unset.
    pub price_ceiling: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceRecord {
    pub job_id: String,
    pub job_name: Option<String>,
    pub partition: Option<String>,
    pub node_count: u32,
    pub instance_ids: Vec<String>,
    pub instance_shapes: Vec<String>,
    pub duration_hours: f64,
    pub estimated_cost: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ReconciliationRecord<'a> {
    job_id: &'a str,
    node_count: u32,
    duration_hours: f64,
    estimated_cost: f64,
}

pub async fn run<P, C>(provider: &P, scheduler: &C, request: &ExportRequest) -> Result<PathBuf>
where
    P: CloudProvider,
    C: SchedulerClient + ?Sized,
{
    let record = collect(provider, scheduler, request).await?;
    let path = write_record(&record, request)?;
    info!(job = %request.job_id, path = %path.display(), "performance record exported");
    Ok(path)
}

async fn collect<P, C>(
    provider: &P,
    scheduler: &C,
    request: &ExportRequest,
) -> Result<PerformanceRecord>
where
    P: CloudProvider,
    C: SchedulerClient + ?Sized,
{
    let detail = scheduler
        .job_detail(&request.job_id)
        .await
        .context("querying job detail")?;

    let ids = provider
        .instances_by_tag(
            "burst:job-id",
            &[request.job_id.clone()],
            &["pending", "running", "shutting-down", "stopping", "stopped", "terminated"],
        )
        .await
        .context("finding instances by job tag")?;
    let statuses = if ids.is_empty() {
        Vec::new()
    } else {
        provider.describe_instances(&ids).await.context("describing instances")?
    };
    let shapes: Vec<String> = statuses.iter().filter_map(|s| s.shape.clone()).collect();

    let duration_hours = detail
        .get("RunTime")
        .and_then(|t| parse_time_limit_minutes(t))
        .map(|m| m as f64 / 60.0)
        .unwrap_or(0.0);
    let node_count = detail
        .get("NumNodes")
        .and_then(|n| n.parse().ok())
        .unwrap_or(ids.len() as u32);

    // Estimated cost is hourly-ceiling x nodes x duration, with the shape
    // price standing in when no ceiling is configured.
    let hourly = request
        .price_ceiling
        .or_else(|| shapes.first().and_then(|shape| MockPriceTable.price(shape)))
        .unwrap_or(0.0);
    let estimated_cost = hourly * f64::from(node_count) * duration_hours;

    Ok(PerformanceRecord {
        job_id: request.job_id.clone(),
        job_name: if request.anonymize {
            None
        } else {
            detail.get("JobName").cloned()
        },
        partition: detail.get("Partition").cloned(),
        node_count,
        instance_ids: ids,
        instance_shapes: shapes,
        duration_hours,
        estimated_cost,
        generated_at: Utc::now(),
    })
}

fn write_record(record: &PerformanceRecord, request: &ExportRequest) -> Result<PathBuf> {
    let body = render(record, request.format)?;
    let path = request
        .output_dir
        .join(format!("{}-{}.json", request.job_id, request.format.file_suffix()));
    write_file(&path, &body)?;
    Ok(path)
}

fn render(record: &PerformanceRecord, format: ExportFormat) -> Result<String> {
    let body = match format {
        ExportFormat::StructuredFeedback | ExportFormat::Json => {
            serde_json::to_string_pretty(record)?
        }
        ExportFormat::StructuredCompact => serde_json::to_string(record)?,
        ExportFormat::Reconciliation => serde_json::to_string_pretty(&ReconciliationRecord {
            job_id: &record.job_id,
            node_count: record.node_count,
            duration_hours: record.duration_hours,
            estimated_cost: record.estimated_cost,
        })?,
    };
    Ok(body)
}

fn write_file(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output dir {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

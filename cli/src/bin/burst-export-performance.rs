//! Export entry point: write a job's provisioning performance record.

use anyhow::Result;
use burst_binder::SlurmCli;
use burst_cli::export::{self, ExportFormat, ExportRequest};
use burst_config::Config;
use burst_fleet::ec2::Ec2Cloud;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burst-export-performance", about = "Export a job's burst performance record")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    job_id: String,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ExportFormat::StructuredFeedback)]
    format: ExportFormat,

    /// Blank identifying fields in the record
    #[arg(long)]
    anonymize: bool,

    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    burst_cli::init_logging(&config.logging.level);

    let provider =
        Ec2Cloud::new(Some(config.cloud.region.clone()), config.cloud.profile.clone()).await;
    let scheduler = SlurmCli::new(&config.scheduler.bin_dir);

    let request = ExportRequest {
        job_id: args.job_id,
        output_dir: args.output_dir,
        format: args.format,
        anonymize: args.anonymize,
        price_ceiling: config.pricing.default_price_ceiling,
    };
    if args.dry_run {
        println!(
            "dry run: would export job {} as {:?} into {}",
            request.job_id,
            request.format,
            request.output_dir.display()
        );
        return Ok(());
    }
    let path = export::run(&provider, &scheduler, &request).await?;
    println!("{}", path.display());
    Ok(())
}

//! Validate entry point: config file, execution plan, or live integration.

use anyhow::Result;
use burst_binder::SlurmCli;
use burst_cli::validate;
use burst_config::Config;
use burst_fleet::ec2::Ec2Cloud;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burst-validate", about = "Validate engine inputs")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    target: Target,
}

#[derive(Subcommand)]
enum Target {
    /// Validate a config file
    Config { path: PathBuf },
    /// Validate an execution plan file
    ExecutionPlan { path: PathBuf },
    /// Check the scheduler CLI and cloud credentials
    Integration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.target {
        Target::Config { path } => validate::validate_config(&path),
        Target::ExecutionPlan { path } => validate::validate_plan(&path),
        Target::Integration => {
            let config = Config::load(&args.config)?;
            burst_cli::init_logging(&config.logging.level);
            let provider =
                Ec2Cloud::new(Some(config.cloud.region.clone()), config.cloud.profile.clone())
                    .await;
            let scheduler = SlurmCli::new(&config.scheduler.bin_dir);
            validate::validate_integration(&provider, &scheduler).await
        }
    }
}

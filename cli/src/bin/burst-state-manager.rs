//! State-manager entry point: one sweep over the managed node groups.

use anyhow::Result;
use burst_binder::SlurmCli;
use burst_cli::state_manager;
use burst_config::Config;
use burst_fleet::ec2::Ec2Cloud;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "burst-state-manager", about = "Repair stuck scheduler node states")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    /// Print the transitions a sweep would apply
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    burst_cli::init_logging(&config.logging.level);

    let provider = Arc::new(
        Ec2Cloud::new(Some(config.cloud.region.clone()), config.cloud.profile.clone()).await,
    );
    let scheduler = SlurmCli::new(&config.scheduler.bin_dir);

    state_manager::run(&config, provider, &scheduler, args.dry_run).await?;
    Ok(())
}

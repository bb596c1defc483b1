//! Suspend entry point: tear down the instances behind a node list.

use anyhow::Result;
use burst_binder::SlurmCli;
use burst_cli::suspend::{self, SuspendRequest};
use burst_config::Config;
use burst_fleet::ec2::Ec2Cloud;
use burst_fleet::FleetProvisioner;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burst-suspend", about = "Terminate cloud instances for scheduler nodes")]
struct Args {
    /// Nodes to suspend, in compact hostlist syntax
    node_list: String,

    #[arg(long)]
    config: PathBuf,

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
    let provisioner = FleetProvisioner::new(provider);
    let scheduler = SlurmCli::new(&config.scheduler.bin_dir);

    let request = SuspendRequest { node_list: args.node_list, dry_run: args.dry_run };
    let nodes = suspend::run(&provisioner, &scheduler, &request).await?;
    tracing::info!(nodes, "suspend complete");
    Ok(())
}

//! Resume entry point: bring cloud instances up for a node list.

use anyhow::Result;
use burst_binder::SlurmCli;
use burst_cli::resume::{self, ResumeRequest};
use burst_config::Config;
use burst_fleet::ec2::Ec2Cloud;
use burst_fleet::FleetProvisioner;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "burst-resume", about = "Provision cloud instances for scheduler nodes")]
struct Args {
    /// Nodes to resume, in compact hostlist syntax
    node_list: String,

    #[arg(long)]
    config: PathBuf,

    /// Externally-produced execution plan; authoritative when present
    #[arg(long)]
    execution_plan: Option<PathBuf>,

    /// Print what would be launched without touching the cloud
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

    let request = ResumeRequest {
        node_list: args.node_list,
        execution_plan: args.execution_plan,
        dry_run: args.dry_run,
    };
    let summary = resume::run(&config, &provisioner, &scheduler, &request).await?;
    tracing::info!(
        groups = summary.groups,
        nodes = summary.nodes,
        bindings = summary.bindings,
        "resume complete"
    );
    Ok(())
}

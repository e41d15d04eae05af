//! Cluster Operator - drives kops-managed Kubernetes clusters from KopsCluster resources

mod controller_runner;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::{Client, CustomResourceExt};

use clusterop_cluster::controller::Context;
use clusterop_common::config::OperatorConfig;
use clusterop_common::crd::KopsCluster;
use clusterop_common::telemetry::{init_telemetry, TelemetryConfig};
use clusterop_kops::KopsProvisioner;

/// Cluster Operator - reconciles KopsCluster resources through kops
#[derive(Parser, Debug)]
#[command(name = "cluster-operator", version, about, long_about = None)]
struct Cli {
    /// Print the KopsCluster CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: OperatorConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(TelemetryConfig::default())?;

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&KopsCluster::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.config).await,
    }
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::debug!(?config, "loaded operator configuration");
    let settings = config.into_settings()?;
    if settings.tool.development {
        tracing::warn!("development mode: infrastructure-changing kops calls are skipped");
    }
    tracing::info!(
        state_store = %settings.defaults.state_store,
        dns_zone = %settings.defaults.dns_zone,
        reap = settings.reap,
        "starting cluster operator"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    controller_runner::ensure_crd_installed(&client).await?;

    let provisioner = Arc::new(KopsProvisioner::with_process_runner(settings.tool));
    let ctx = Arc::new(
        Context::builder(client.clone(), provisioner, settings.defaults)
            .reap(settings.reap)
            .build(),
    );

    controller_runner::run_cluster_controller(client, ctx).await;

    tracing::info!("cluster operator stopped");
    Ok(())
}

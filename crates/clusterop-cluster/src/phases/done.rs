//! Done phase handler.
//!
//! Done is monitored rather than terminal. Each drift check re-applies an
//! edited spec in place and re-validates the cluster.

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use tracing::info;

use clusterop_common::crd::KopsCluster;
use clusterop_common::events::{actions, reasons};
use clusterop_common::Error;
use clusterop_kops::ResolvedConfig;

use crate::controller::Context;
use crate::phases::{current_status, persist_status, validate_cluster};

/// Handle a cluster in the Done phase.
pub async fn handle_done(
    cluster: &KopsCluster,
    ctx: &Context,
    config: &ResolvedConfig,
) -> Result<Action, Error> {
    let mut status = current_status(cluster);

    if cluster.spec_changed() {
        info!(
            generation = ?cluster.metadata.generation,
            observed = ?status.observed_generation,
            "spec changed, re-applying"
        );
        ctx.provisioner.create_or_replace(config).await?;
        ctx.provisioner.converge(config).await?;
        ctx.provisioner.rolling_update(config).await?;
        status.kube_config = Some(ctx.provisioner.export_credentials(config).await?);
        status.observed_generation = cluster.metadata.generation;
        persist_status(cluster, ctx, &status).await?;
        ctx.publish(
            cluster,
            EventType::Normal,
            reasons::CLUSTER_CONVERGED,
            actions::PROVISION,
            format!("Applied updated spec to {}", config.name),
        )
        .await;
    }

    validate_cluster(cluster, ctx, config, status).await
}

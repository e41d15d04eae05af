//! Updating phase handler.

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use tracing::{debug, info};

use clusterop_common::crd::{ClusterPhase, KopsCluster};
use clusterop_common::events::{actions, reasons};
use clusterop_common::Error;
use clusterop_kops::ResolvedConfig;

use crate::controller::Context;
use crate::phases::{current_status, persist_status, REQUEUE_IMMEDIATE};

/// Handle a cluster in the Updating phase.
///
/// Applies the stored spec to the infrastructure and records fresh
/// credentials. Clusters that never validated skip the rolling update so a
/// cluster still coming up is not disturbed.
pub async fn handle_updating(
    cluster: &KopsCluster,
    ctx: &Context,
    config: &ResolvedConfig,
) -> Result<Action, Error> {
    let mut status = current_status(cluster);

    ctx.provisioner.converge(config).await?;
    ctx.publish(
        cluster,
        EventType::Normal,
        reasons::CLUSTER_CONVERGED,
        actions::PROVISION,
        format!("Applied pending changes to {}", config.name),
    )
    .await;

    let kube_config = ctx.provisioner.export_credentials(config).await?;
    status.kube_config = Some(kube_config);
    persist_status(cluster, ctx, &status).await?;

    if cluster.is_validated() {
        info!("cluster validated before, issuing rolling update");
        ctx.provisioner.rolling_update(config).await?;
        ctx.publish(
            cluster,
            EventType::Normal,
            reasons::ROLLING_UPDATE,
            actions::PROVISION,
            format!("Rolled nodes of {}", config.name),
        )
        .await;
    } else {
        debug!("cluster never validated, skipping rolling update");
    }

    status.set_phase(ClusterPhase::Setup);
    persist_status(cluster, ctx, &status).await?;

    Ok(Action::requeue(REQUEUE_IMMEDIATE))
}

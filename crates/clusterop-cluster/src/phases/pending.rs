//! Pending phase handler.
//!
//! First contact with a cluster: sweep orphans once, guarantee cleanup with
//! the finalizer, then push the declarative spec to the state store.

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, info};

use clusterop_common::crd::{ClusterPhase, KopsCluster};
use clusterop_common::events::{actions, reasons};
use clusterop_common::{Error, CLUSTER_FINALIZER};
use clusterop_kops::ResolvedConfig;

use crate::controller::{has_finalizer, Context};
use crate::phases::{current_status, persist_status, REQUEUE_IMMEDIATE};
use crate::reaper::tracked_names;

/// Handle a cluster in the Pending phase.
pub async fn handle_pending(
    cluster: &KopsCluster,
    ctx: &Context,
    config: &ResolvedConfig,
) -> Result<Action, Error> {
    let name = cluster.name_any();
    let mut status = current_status(cluster);

    if !status.initialized {
        if ctx.reap_enabled {
            reap_orphans(cluster, ctx, config).await?;
        }
        status.initialized = true;
        persist_status(cluster, ctx, &status).await?;
    }

    if !has_finalizer(cluster) {
        info!("adding cleanup finalizer");
        ctx.kube
            .add_cluster_finalizer(&name, CLUSTER_FINALIZER)
            .await?;
    }

    ctx.provisioner.create_or_replace(config).await?;
    ctx.publish(
        cluster,
        EventType::Normal,
        reasons::CLUSTER_REPLACED,
        actions::PROVISION,
        format!("Wrote {} to {}", config.name, config.state_store),
    )
    .await;

    status.set_phase(ClusterPhase::Updating);
    status.observed_generation = cluster.metadata.generation;
    persist_status(cluster, ctx, &status).await?;

    Ok(Action::requeue(REQUEUE_IMMEDIATE))
}

/// Delete clusters in this cluster's state store that no KopsCluster tracks
async fn reap_orphans(
    cluster: &KopsCluster,
    ctx: &Context,
    config: &ResolvedConfig,
) -> Result<(), Error> {
    let clusters = ctx.kube.list_clusters().await?;
    let mut tracked = tracked_names(&clusters, &ctx.defaults, &config.state_store);
    if !tracked.contains(&config.name) {
        tracked.push(config.name.clone());
    }
    debug!(tracked = tracked.len(), state_store = %config.state_store, "sweeping for orphans");

    let deleted = ctx
        .reaper
        .reap(ctx.provisioner.as_ref(), &tracked, &config.state_store)
        .await?;
    for orphan in &deleted {
        ctx.publish(
            cluster,
            EventType::Normal,
            reasons::ORPHAN_DELETED,
            actions::DELETE,
            format!("Deleted untracked cluster {}", orphan),
        )
        .await;
    }
    Ok(())
}

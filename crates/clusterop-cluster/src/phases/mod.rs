//! Phase handlers for the KopsCluster controller.
//!
//! Each phase of the cluster lifecycle is handled by a dedicated module. A
//! handler performs one step, persists the resulting status and tells the
//! controller when to come back.

mod done;
mod pending;
mod setup;
mod updating;

pub use done::handle_done;
pub use pending::handle_pending;
pub use setup::handle_setup;
pub use updating::handle_updating;

use std::time::Duration;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use clusterop_common::crd::{
    ClusterPhase, Condition, ConditionStatus, KopsCluster, KopsClusterStatus,
};
use clusterop_common::events::{actions, reasons};
use clusterop_common::Error;
use clusterop_kops::ResolvedConfig;

use crate::controller::Context;

/// Requeue used to run the next step right away
pub const REQUEUE_IMMEDIATE: Duration = Duration::ZERO;

/// Requeue after a failed or inconclusive validation
pub const VALIDATION_RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Requeue of a healthy cluster to detect drift
pub const DRIFT_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

const SPEC_VALID: &str = "SpecValid";
const VALIDATED: &str = "Validated";

/// Status the handlers start from
///
/// The reconciler only dispatches to a phase once the spec validated, so a
/// previously recorded spec error is cleared here.
pub(crate) fn current_status(cluster: &KopsCluster) -> KopsClusterStatus {
    let mut status = cluster.status.clone().unwrap_or_default();
    let spec_was_invalid = status
        .conditions
        .iter()
        .any(|c| c.type_ == SPEC_VALID && c.status == ConditionStatus::False);
    if spec_was_invalid {
        status.message = None;
        status.set_condition(Condition::new(
            SPEC_VALID,
            ConditionStatus::True,
            "Valid",
            "Spec passed validation",
        ));
    }
    status
}

/// Write `status` to the API server
///
/// Rejects backward phase moves. Skips the write when nothing changed
/// compared to the status the reconcile started from.
pub async fn persist_status(
    cluster: &KopsCluster,
    ctx: &Context,
    status: &KopsClusterStatus,
) -> Result<(), Error> {
    let name = cluster.name_any();
    let from = cluster.phase();

    if !from.can_transition_to(status.phase) {
        return Err(Error::internal_with_context(
            "reconciler",
            format!("illegal phase transition {} -> {} for {}", from, status.phase, name),
        ));
    }

    if cluster.status.as_ref() == Some(status) {
        debug!("status unchanged, skipping update");
        return Ok(());
    }

    ctx.kube.patch_status(&name, status).await?;
    if from != status.phase {
        info!(from = %from, to = %status.phase, "phase transition");
    }
    Ok(())
}

/// Validate the cluster and record the outcome
///
/// Shared by Setup and Done. A healthy non-empty report moves the cluster to
/// Done. A tool or parse failure marks it unvalidated. An empty report is
/// logged and retried without touching status.
pub(crate) async fn validate_cluster(
    cluster: &KopsCluster,
    ctx: &Context,
    config: &ResolvedConfig,
    mut status: KopsClusterStatus,
) -> Result<Action, Error> {
    let report = match ctx.provisioner.validate(config).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "cluster failed validation");
            status.validated = Some(false);
            status.nodes.clear();
            status.set_condition(Condition::new(
                VALIDATED,
                ConditionStatus::False,
                "ValidationFailed",
                e.to_string(),
            ));
            persist_status(cluster, ctx, &status).await?;
            ctx.publish(
                cluster,
                EventType::Warning,
                reasons::VALIDATION_PENDING,
                actions::VALIDATE,
                e.to_string(),
            )
            .await;
            return Ok(Action::requeue(VALIDATION_RETRY_INTERVAL));
        }
    };

    if report.is_empty() {
        warn!(kops_cluster = %config.name, "validation succeeded but reported no nodes");
        ctx.publish(
            cluster,
            EventType::Warning,
            reasons::VALIDATION_ANOMALY,
            actions::VALIDATE,
            "Validation reported no nodes",
        )
        .await;
        return Ok(Action::requeue(VALIDATION_RETRY_INTERVAL));
    }

    if !report.failures.is_empty() {
        debug!(failures = report.failures.len(), "validation reported failures");
    }

    let first_success = status.validated != Some(true) || status.phase != ClusterPhase::Done;
    let node_count = report.nodes.len();
    let ready = report.ready_count();

    status.set_phase(ClusterPhase::Done);
    status.nodes = report.nodes;
    status.validated = Some(true);
    status.set_condition(Condition::new(
        VALIDATED,
        ConditionStatus::True,
        "ValidationSucceeded",
        format!("{} of {} nodes ready", ready, node_count),
    ));
    persist_status(cluster, ctx, &status).await?;

    if first_success {
        info!(nodes = node_count, ready, "cluster validated");
        ctx.publish(
            cluster,
            EventType::Normal,
            reasons::CLUSTER_VALIDATED,
            actions::VALIDATE,
            format!("{} of {} nodes ready", ready, node_count),
        )
        .await;
    }

    Ok(Action::requeue(DRIFT_CHECK_INTERVAL))
}

//! Setup phase handler.

use kube::runtime::controller::Action;

use clusterop_common::crd::KopsCluster;
use clusterop_common::Error;
use clusterop_kops::ResolvedConfig;

use crate::controller::Context;
use crate::phases::{current_status, validate_cluster};

/// Handle a cluster in the Setup phase.
///
/// Waits for the cluster to pass validation; only a healthy non-empty node
/// report moves it to Done.
pub async fn handle_setup(
    cluster: &KopsCluster,
    ctx: &Context,
    config: &ResolvedConfig,
) -> Result<Action, Error> {
    validate_cluster(cluster, ctx, config, current_status(cluster)).await
}

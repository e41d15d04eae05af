//! Controller runner - installs the CRD and drives the KopsCluster controller

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use clusterop_cluster::controller::{error_policy, reconcile, Context};
use clusterop_common::crd::KopsCluster;
use clusterop_common::retry::{retry_with_backoff, RetryConfig};
use clusterop_common::FIELD_MANAGER;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

const CRD_INSTALL_ATTEMPTS: u32 = 10;

/// Install or update the KopsCluster CRD with server-side apply
///
/// The API server may still be coming up when the operator starts, so the
/// apply is retried with backoff.
pub async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = KopsCluster::crd();
    let name = crd
        .metadata
        .name
        .clone()
        .ok_or_else(|| anyhow::anyhow!("KopsCluster CRD has no name"))?;

    tracing::info!(crd = %name, "Installing KopsCluster CRD...");
    let (crds, params, crd, name) = (&crds, &params, &crd, name.as_str());
    retry_with_backoff(
        &RetryConfig::with_max_attempts(CRD_INSTALL_ATTEMPTS),
        "install_crd",
        || async move { crds.patch(name, params, &Patch::Apply(crd)).await },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install KopsCluster CRD: {}", e))?;

    tracing::info!("KopsCluster CRD installed/updated");
    Ok(())
}

/// Run the KopsCluster controller until a shutdown signal arrives
pub async fn run_cluster_controller(client: Client, ctx: Arc<Context>) {
    let clusters: Api<KopsCluster> = Api::all(client);

    tracing::info!("- KopsCluster controller");

    Controller::new(clusters, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("Cluster"))
        .await;
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

//! KopsCluster controller implementation
//!
//! Each reconcile moves one KopsCluster exactly one step through
//! Pending -> Updating -> Setup -> Done, persisting status after every step.
//! Deletion is handled before phase dispatch and is gated by a finalizer.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use clusterop_common::config::ClusterDefaults;
use clusterop_common::crd::{
    ClusterPhase, Condition, ConditionStatus, KopsCluster, KopsClusterStatus,
};
use clusterop_common::events::{actions, reasons, EventPublisher, KubeEventPublisher};
use clusterop_common::retry::RetryConfig;
use clusterop_common::{Error, CLUSTER_FINALIZER, CONTROLLER_NAME, FIELD_MANAGER};
use clusterop_kops::{resolve, Provisioner};

use crate::phases::{handle_done, handle_pending, handle_setup, handle_updating, persist_status};
use crate::reaper::Reaper;

/// Trait abstracting the Kubernetes operations the controller needs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch a KopsCluster by name; `None` when it no longer exists
    async fn get_cluster(&self, name: &str) -> Result<Option<KopsCluster>, Error>;

    /// List every KopsCluster
    async fn list_clusters(&self) -> Result<Vec<KopsCluster>, Error>;

    /// Write the full status of a KopsCluster through the status subresource
    async fn patch_status(&self, name: &str, status: &KopsClusterStatus) -> Result<(), Error>;

    /// Add a finalizer to a KopsCluster
    async fn add_cluster_finalizer(&self, name: &str, finalizer: &str) -> Result<(), Error>;

    /// Remove a finalizer from a KopsCluster
    async fn remove_cluster_finalizer(&self, name: &str, finalizer: &str) -> Result<(), Error>;
}

/// Status fields that must be sent as null when unset so a merge patch clears them
const CLEARABLE_STATUS_FIELDS: &[&str] = &[
    "initialized",
    "validated",
    "nodes",
    "kubeConfig",
    "observedGeneration",
    "message",
    "conditions",
];

/// Build the merge patch body for a full status write
pub fn status_patch(name: &str, status: &KopsClusterStatus) -> Result<Value, Error> {
    let mut value = serde_json::to_value(status)
        .map_err(|e| Error::persistence(name, format!("failed to serialize status: {}", e)))?;
    if let Some(fields) = value.as_object_mut() {
        for key in CLEARABLE_STATUS_FIELDS {
            fields.entry(key.to_string()).or_insert(Value::Null);
        }
    }
    Ok(serde_json::json!({ "status": value }))
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self) -> Api<KopsCluster> {
        Api::all(self.client.clone())
    }

    async fn patch_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<(), Error> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.api()
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_cluster(&self, name: &str) -> Result<Option<KopsCluster>, Error> {
        match self.api().get(name).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_clusters(&self) -> Result<Vec<KopsCluster>, Error> {
        let list = self.api().list(&Default::default()).await?;
        Ok(list.items)
    }

    async fn patch_status(&self, name: &str, status: &KopsClusterStatus) -> Result<(), Error> {
        let patch = status_patch(name, status)?;
        self.api()
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::persistence(name, e.to_string()))?;
        Ok(())
    }

    async fn add_cluster_finalizer(&self, name: &str, finalizer: &str) -> Result<(), Error> {
        let cluster = self.api().get(name).await?;
        let mut finalizers = cluster.metadata.finalizers.unwrap_or_default();
        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(name, finalizers).await
    }

    async fn remove_cluster_finalizer(&self, name: &str, finalizer: &str) -> Result<(), Error> {
        let cluster = self.api().get(name).await?;
        let finalizers: Vec<String> = cluster
            .metadata
            .finalizers
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f != finalizer)
            .collect();
        self.patch_finalizers(name, finalizers).await
    }
}

/// Shared context for the KopsCluster controller
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```text
/// let ctx = Context::builder(client, provisioner, defaults)
///     .reap(true)
///     .build();
/// ```
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// kops adapter
    pub provisioner: Arc<dyn Provisioner>,
    /// Event publisher for Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// DNS zone and state store applied to every cluster
    pub defaults: ClusterDefaults,
    /// Whether first-pass orphan sweeps are enabled
    pub reap_enabled: bool,
    /// Orphan reaper with per-store locks
    pub reaper: Reaper,
    /// Requeue backoff for failed reconciles
    pub backoff: RetryConfig,
    failures: DashMap<String, u32>,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(
        client: Client,
        provisioner: Arc<dyn Provisioner>,
        defaults: ClusterDefaults,
    ) -> ContextBuilder {
        ContextBuilder::new(client, provisioner, defaults)
    }

    /// Create a context for testing with custom mock clients
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn KubeClient>,
        provisioner: Arc<dyn Provisioner>,
        defaults: ClusterDefaults,
    ) -> Self {
        Self {
            kube,
            provisioner,
            events: Arc::new(clusterop_common::events::NoopEventPublisher),
            defaults,
            reap_enabled: false,
            reaper: Reaper::new(),
            backoff: RetryConfig::reconcile_backoff(),
            failures: DashMap::new(),
        }
    }

    /// Record a failed reconcile and return the consecutive failure count
    pub fn record_failure(&self, name: &str) -> u32 {
        let mut count = self.failures.entry(name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget the failure history of a cluster after a successful pass
    pub fn reset_failures(&self, name: &str) {
        self.failures.remove(name);
    }

    /// Consecutive failed reconciles for a cluster
    pub fn failure_count(&self, name: &str) -> u32 {
        self.failures.get(name).map(|c| *c).unwrap_or(0)
    }

    /// Publish an event about `cluster`
    pub async fn publish(
        &self,
        cluster: &KopsCluster,
        type_: EventType,
        reason: &str,
        action: &str,
        note: impl Into<String>,
    ) {
        self.events
            .publish(&cluster.object_ref(&()), type_, reason, action, Some(note.into()))
            .await;
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    provisioner: Arc<dyn Provisioner>,
    defaults: ClusterDefaults,
    kube: Option<Arc<dyn KubeClient>>,
    events: Option<Arc<dyn EventPublisher>>,
    reap_enabled: bool,
    backoff: RetryConfig,
}

impl ContextBuilder {
    fn new(client: Client, provisioner: Arc<dyn Provisioner>, defaults: ClusterDefaults) -> Self {
        Self {
            client,
            provisioner,
            defaults,
            kube: None,
            events: None,
            reap_enabled: false,
            backoff: RetryConfig::reconcile_backoff(),
        }
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the event publisher
    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Enable or disable first-pass orphan sweeps
    pub fn reap(mut self, enabled: bool) -> Self {
        self.reap_enabled = enabled;
        self
    }

    /// Override the requeue backoff for failed reconciles
    pub fn backoff(mut self, backoff: RetryConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone()))),
            events: self.events.unwrap_or_else(|| {
                Arc::new(KubeEventPublisher::new(self.client.clone(), CONTROLLER_NAME))
            }),
            provisioner: self.provisioner,
            defaults: self.defaults,
            reap_enabled: self.reap_enabled,
            reaper: Reaper::new(),
            backoff: self.backoff,
            failures: DashMap::new(),
        }
    }
}

/// Reconcile a KopsCluster resource
///
/// Re-reads the resource, handles deletion if requested, validates the spec
/// and then advances the cluster by exactly one phase step.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<KopsCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cluster.name_any();

    let Some(cluster) = ctx.kube.get_cluster(&name).await? else {
        debug!("cluster no longer exists, nothing to do");
        ctx.reset_failures(&name);
        return Ok(Action::await_change());
    };

    let action = reconcile_cluster(&cluster, &ctx).await?;
    ctx.reset_failures(&name);
    Ok(action)
}

async fn reconcile_cluster(cluster: &KopsCluster, ctx: &Context) -> Result<Action, Error> {
    let name = cluster.name_any();

    if cluster.metadata.deletion_timestamp.is_some() {
        return handle_deletion(cluster, ctx).await;
    }

    if let Err(e) = cluster.spec.validate(&name) {
        warn!(error = %e, "cluster spec is invalid");
        let mut status = cluster.status.clone().unwrap_or_default();
        status.message = Some(e.to_string());
        status.set_condition(Condition::new(
            "SpecValid",
            ConditionStatus::False,
            "InvalidSpec",
            e.to_string(),
        ));
        persist_status(cluster, ctx, &status).await?;
        ctx.publish(cluster, EventType::Warning, reasons::SPEC_INVALID, actions::RECONCILE, e.to_string())
            .await;
        // Spec errors need a human; wait for the next edit
        return Ok(Action::await_change());
    }

    let config = resolve(&name, &cluster.spec, &ctx.defaults);
    let phase = cluster.phase();
    info!(phase = %phase, kops_cluster = %config.name, "reconciling cluster");

    match phase {
        ClusterPhase::Pending => handle_pending(cluster, ctx, &config).await,
        ClusterPhase::Updating => handle_updating(cluster, ctx, &config).await,
        ClusterPhase::Setup => handle_setup(cluster, ctx, &config).await,
        ClusterPhase::Done => handle_done(cluster, ctx, &config).await,
    }
}

/// Requeue policy for failed reconciles
///
/// Retryable errors back off exponentially per cluster; errors that need a
/// spec or configuration change wait for the next edit.
pub fn error_policy(cluster: Arc<KopsCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    let kops_cluster = error.cluster().unwrap_or(name.as_str());

    if !error.is_retryable() {
        error!(
            ?error,
            cluster = %name,
            kops_cluster,
            "reconciliation failed, waiting for a change"
        );
        return Action::await_change();
    }

    let attempt = ctx.record_failure(&name);
    let delay = ctx.backoff.jittered_delay(attempt);
    error!(
        ?error,
        cluster = %name,
        kops_cluster,
        attempt,
        delay_secs = delay.as_secs(),
        "reconciliation failed, retrying"
    );
    Action::requeue(delay)
}

/// Whether the cleanup finalizer is present
pub fn has_finalizer(cluster: &KopsCluster) -> bool {
    cluster
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|s| s == CLUSTER_FINALIZER))
}

/// Tear down the kops cluster, then release the resource
///
/// The finalizer is only removed once kops confirms the cluster is absent or
/// the delete succeeded. Any failure leaves it in place for the next attempt.
async fn handle_deletion(cluster: &KopsCluster, ctx: &Context) -> Result<Action, Error> {
    let name = cluster.name_any();

    if !has_finalizer(cluster) {
        debug!("deletion requested and already finalized");
        return Ok(Action::await_change());
    }

    let config = resolve(&name, &cluster.spec, &ctx.defaults);
    info!(kops_cluster = %config.name, "deleting cluster");

    if ctx.provisioner.exists(&config).await? {
        ctx.publish(
            cluster,
            EventType::Normal,
            reasons::DELETION_STARTED,
            actions::DELETE,
            format!("Deleting {} from {}", config.name, config.state_store),
        )
        .await;
        ctx.provisioner.delete(&config).await?;
    } else {
        info!(kops_cluster = %config.name, "cluster not in state store, skipping delete");
    }

    ctx.kube
        .remove_cluster_finalizer(&name, CLUSTER_FINALIZER)
        .await?;
    ctx.publish(
        cluster,
        EventType::Normal,
        reasons::DELETION_COMPLETE,
        actions::DELETE,
        "Cluster infrastructure removed",
    )
    .await;
    info!("finalizer removed");

    Ok(Action::await_change())
}

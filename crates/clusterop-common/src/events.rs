//! Kubernetes Event recording for the KopsCluster controller.
//!
//! Events are fire-and-forget: a failed publish is logged as a warning and
//! never fails a reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "ClusterReplaced")
    /// * `action` - What action was taken (e.g. "Provision")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "failed to publish Kubernetes event");
        }
    }
}

/// No-op implementation for tests and one-shot tooling.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// Declarative spec pushed to the state store
    pub const CLUSTER_REPLACED: &str = "ClusterReplaced";
    /// Pending changes applied to the infrastructure
    pub const CLUSTER_CONVERGED: &str = "ClusterConverged";
    /// Nodes replaced by a rolling update
    pub const ROLLING_UPDATE: &str = "RollingUpdate";
    /// Cluster passed validation
    pub const CLUSTER_VALIDATED: &str = "ClusterValidated";
    /// Cluster failed validation
    pub const VALIDATION_PENDING: &str = "ValidationPending";
    /// Validation returned no nodes
    pub const VALIDATION_ANOMALY: &str = "ValidationAnomaly";
    /// Spec rejected before provisioning
    pub const SPEC_INVALID: &str = "SpecInvalid";
    /// Orphaned cluster removed from the state store
    pub const ORPHAN_DELETED: &str = "OrphanDeleted";
    /// Cluster deletion initiated
    pub const DELETION_STARTED: &str = "DeletionStarted";
    /// Infrastructure gone, finalizer removed
    pub const DELETION_COMPLETE: &str = "DeletionComplete";
}

/// Well-known event action strings.
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Creating or updating infrastructure
    pub const PROVISION: &str = "Provision";
    /// Validating infrastructure
    pub const VALIDATE: &str = "Validate";
    /// Deleting infrastructure
    pub const DELETE: &str = "Delete";
}

//! KopsCluster Custom Resource Definition
//!
//! A KopsCluster declares a Kubernetes cluster whose infrastructure is owned
//! by kops. The operator pushes the declared spec into the kops state store,
//! applies it, and validates the result.

use std::collections::HashSet;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterNode, ClusterPhase, Condition, KubeConfig};

/// Specification for a KopsCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "clusteroperator.dev",
    version = "v1alpha1",
    kind = "KopsCluster",
    plural = "kopsclusters",
    shortname = "kc",
    status = "KopsClusterStatus",
    namespaced = false,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Validated","type":"boolean","jsonPath":".status.validated"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KopsClusterSpec {
    /// Full kops manifest (Cluster and InstanceGroup documents)
    ///
    /// When unset, a manifest is rendered from `kopsConfig`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Topology overlay applied on top of the operator defaults
    #[serde(default)]
    pub kops_config: KopsConfigSpec,
}

/// Topology fields a KopsCluster may override
///
/// Zero counts and empty strings mean "let kops pick its default".
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KopsConfigSpec {
    /// Number of control plane nodes
    #[serde(default, skip_serializing_if = "is_zero")]
    pub master_count: u32,

    /// Instance type for control plane nodes
    #[serde(default, alias = "masterEc2", skip_serializing_if = "String::is_empty")]
    pub master_instance_type: String,

    /// Number of worker nodes
    #[serde(default, skip_serializing_if = "is_zero")]
    pub worker_count: u32,

    /// Instance type for worker nodes
    #[serde(default, alias = "workerEc2", skip_serializing_if = "String::is_empty")]
    pub worker_instance_type: String,

    /// Existing network (VPC) to place the cluster in
    #[serde(default, alias = "vpc", skip_serializing_if = "String::is_empty")]
    pub network_id: String,

    /// Availability zones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl KopsClusterSpec {
    /// Validate the cluster specification
    pub fn validate(&self, cluster: &str) -> Result<(), crate::Error> {
        if let Some(config) = &self.config {
            if config.trim().is_empty() {
                return Err(crate::Error::validation_for_field(
                    cluster,
                    "spec.config",
                    "config must not be blank when set",
                ));
            }
        }

        let mut seen = HashSet::new();
        for zone in &self.kops_config.zones {
            if zone.trim().is_empty() {
                return Err(crate::Error::validation_for_field(
                    cluster,
                    "spec.kopsConfig.zones",
                    "zone names must not be blank",
                ));
            }
            let zone = zone.trim();
            if !seen.insert(zone) {
                return Err(crate::Error::validation_for_field(
                    cluster,
                    "spec.kopsConfig.zones",
                    format!("zone '{}' is listed more than once", zone),
                ));
            }
        }

        if self.config.is_none() && self.kops_config.zones.is_empty() {
            return Err(crate::Error::validation_for_field(
                cluster,
                "spec.kopsConfig.zones",
                "at least one zone is required when no config is given",
            ));
        }

        Ok(())
    }
}

/// Status for a KopsCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KopsClusterStatus {
    /// Current phase of the cluster lifecycle
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Set once the first pass has recorded the resource
    ///
    /// The orphan sweep only runs while this is false.
    #[serde(default, skip_serializing_if = "is_false")]
    pub initialized: bool,

    /// Result of the most recent validation; unset until the first one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<bool>,

    /// Nodes reported by the last successful validation
    ///
    /// Only meaningful while `phase` is Done.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ClusterNode>,

    /// Exported kube-access credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<KubeConfig>,

    /// The generation of the spec last applied to the infrastructure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Human-readable message about current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Conditions representing the cluster state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl KopsClusterStatus {
    /// Create a new status with the given phase
    pub fn with_phase(phase: ClusterPhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }

    /// Move to `phase`, dropping node records that are not trusted outside Done
    pub fn set_phase(&mut self, phase: ClusterPhase) {
        self.phase = phase;
        if phase != ClusterPhase::Done {
            self.nodes.clear();
        }
    }

    /// Replace the condition of the same type, or add it
    ///
    /// The transition time is kept when the condition status did not change.
    pub fn set_condition(&mut self, mut condition: Condition) {
        if let Some(existing) = self.conditions.iter().find(|c| c.type_ == condition.type_) {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
        }
        self.conditions.retain(|c| c.type_ != condition.type_);
        self.conditions.push(condition);
    }

}

impl KopsCluster {
    /// Current phase, defaulting to Pending when no status was recorded
    pub fn phase(&self) -> ClusterPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Whether the last validation succeeded
    pub fn is_validated(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.validated)
            .unwrap_or(false)
    }

    /// Whether the spec changed since it was last applied
    pub fn spec_changed(&self) -> bool {
        let observed = self.status.as_ref().and_then(|s| s.observed_generation);
        match (self.metadata.generation, observed) {
            (Some(current), Some(observed)) => current != observed,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

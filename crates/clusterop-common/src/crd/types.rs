//! Shared types used by the KopsCluster CRD

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster lifecycle phase
///
/// Phases only ever move forward: Pending -> Updating -> Setup -> Done.
/// Staying in the same phase is always allowed (retries).
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Declarative spec not yet pushed to the state store
    #[default]
    Pending,
    /// Spec pushed, pending changes being applied to the infrastructure
    Updating,
    /// Infrastructure applied, waiting for the cluster to validate
    Setup,
    /// Cluster validated; periodically re-checked for drift
    Done,
}

impl ClusterPhase {
    /// The phase that follows this one, if any
    pub fn next(self) -> Option<ClusterPhase> {
        match self {
            Self::Pending => Some(Self::Updating),
            Self::Updating => Some(Self::Setup),
            Self::Setup => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition
    pub fn can_transition_to(self, to: ClusterPhase) -> bool {
        self == to || self.next() == Some(to)
    }
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Updating => write!(f, "Updating"),
            Self::Setup => write!(f, "Setup"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, Validated)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// A node as reported by `kops validate cluster -o json`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterNode {
    /// Node name
    pub name: String,
    /// Availability zone
    pub zone: String,
    /// Role (Master, Node, ...)
    pub role: String,
    /// Hostname
    pub hostname: String,
    /// Ready status ("True" when the node is ready)
    pub status: String,
}

impl ClusterNode {
    /// Whether the node reports Ready
    pub fn is_ready(&self) -> bool {
        self.status.eq_ignore_ascii_case("true")
    }
}

/// Exported kube-access credentials (the kubeconfig written by `kops export kubecfg`)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KubeConfig {
    /// API version of the kubeconfig document
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind of the kubeconfig document ("Config")
    pub kind: String,

    /// Context selected by default
    #[serde(rename = "current-context", default)]
    pub current_context: String,

    /// API server endpoints
    #[serde(default)]
    pub clusters: Vec<NamedKubeCluster>,

    /// Cluster/user pairings
    #[serde(default)]
    pub contexts: Vec<NamedContext>,

    /// User credentials
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

/// Named API server entry in a kubeconfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamedKubeCluster {
    /// Entry name
    pub name: String,
    /// Endpoint details
    pub cluster: KubeClusterEndpoint,
}

/// API server endpoint details
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KubeClusterEndpoint {
    /// API server URL
    pub server: String,
    /// Base64 CA bundle
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
}

/// Named context entry in a kubeconfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamedContext {
    /// Entry name
    pub name: String,
    /// Context details
    pub context: ContextRef,
}

/// Pairing of a cluster entry and a user entry
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ContextRef {
    /// Name of the cluster entry
    pub cluster: String,
    /// Name of the user entry
    pub user: String,
}

/// Named user entry in a kubeconfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NamedUser {
    /// Entry name
    pub name: String,
    /// Credential material
    #[serde(default)]
    pub user: UserCredentials,
}

/// Credential material for a kubeconfig user
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct UserCredentials {
    /// Base64 client certificate
    #[serde(
        rename = "client-certificate-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_certificate_data: Option<String>,
    /// Base64 client key
    #[serde(
        rename = "client-key-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_key_data: Option<String>,
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Basic auth username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

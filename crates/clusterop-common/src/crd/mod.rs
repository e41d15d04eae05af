//! Custom Resource Definitions for the cluster operator

mod cluster;
mod types;

pub use cluster::{KopsCluster, KopsClusterSpec, KopsClusterStatus, KopsConfigSpec};
pub use types::{
    ClusterNode, ClusterPhase, Condition, ConditionStatus, ContextRef, KubeClusterEndpoint,
    KubeConfig, NamedContext, NamedKubeCluster, NamedUser, UserCredentials,
};

//! Common types for the cluster operator: CRDs, errors, configuration and utilities

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod error;
pub mod events;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Finalizer guarding deletion of the kops-managed infrastructure
pub const CLUSTER_FINALIZER: &str = "clusteroperator.dev/kops-cleanup";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "cluster-operator";

/// Controller name reported on Kubernetes Events
pub const CONTROLLER_NAME: &str = "kopscluster-controller";

//! Error types for the cluster operator
//!
//! Errors carry the cluster name and the failed operation where one is known,
//! so a single log line is enough to tell which kops invocation broke.

use thiserror::Error;

/// Main error type for cluster operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Missing or invalid operator configuration (fatal at startup)
    #[error("configuration error: {message}")]
    Config {
        /// Description of what is missing or invalid
        message: String,
        /// Environment variables that were expected but not found
        missing: Vec<String>,
    },

    /// Validation error for a KopsCluster spec
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.kopsConfig.zones")
        field: Option<String>,
    },

    /// The provisioning tool reported a failure
    #[error("kops {operation} failed for {cluster}: {message}")]
    Provision {
        /// Fully resolved cluster name
        cluster: String,
        /// Adapter operation that failed (replace, update, validate, ...)
        operation: String,
        /// stderr or a description of the execution failure
        message: String,
        /// Exit code of the tool, if it ran to completion
        exit_code: Option<i32>,
    },

    /// Tool output did not match the expected schema
    #[error("failed to parse {document}: {message}")]
    Parse {
        /// Which document failed to parse (validation report, kubeconfig, ...)
        document: String,
        /// Parser error message
        message: String,
    },

    /// Failure saving tracked-resource state
    #[error("failed to persist state for {cluster}: {message}")]
    Persistence {
        /// Name of the KopsCluster being saved
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "reaper")
        context: String,
    },
}

impl Error {
    /// Create a configuration error naming the missing variables
    pub fn config_missing(missing: Vec<String>) -> Self {
        Self::Config {
            message: format!("missing environment variables: {}", missing.join(", ")),
            missing,
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            missing: Vec::new(),
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field path
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a provisioning error for a tool invocation that did not run to completion
    pub fn provision(
        cluster: impl Into<String>,
        operation: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provision {
            cluster: cluster.into(),
            operation: operation.into(),
            message: msg.into(),
            exit_code: None,
        }
    }

    /// Create a provisioning error for a tool invocation that exited non-zero
    pub fn provision_exit(
        cluster: impl Into<String>,
        operation: impl Into<String>,
        exit_code: Option<i32>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provision {
            cluster: cluster.into(),
            operation: operation.into(),
            message: msg.into(),
            exit_code,
        }
    }

    /// Create a parse error for the named document
    pub fn parse(document: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse {
            document: document.into(),
            message: msg.into(),
        }
    }

    /// Create a persistence error for the named cluster
    pub fn persistence(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Persistence {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration and validation errors need a human to change something.
    /// Everything the tool reports is retried because every kops operation the
    /// adapter issues is idempotent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409
            ),
            Error::Config { .. } => false,
            Error::Validation { .. } => false,
            Error::Provision { .. } => true,
            Error::Parse { .. } => true,
            Error::Persistence { .. } => true,
            Error::Internal { .. } => true,
        }
    }

    /// Get the cluster name if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::Validation { cluster, .. }
            | Error::Provision { cluster, .. }
            | Error::Persistence { cluster, .. } => Some(cluster),
            Error::Kube { .. } | Error::Config { .. } | Error::Parse { .. } | Error::Internal { .. } => {
                None
            }
        }
    }
}

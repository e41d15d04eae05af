//! Operator configuration
//!
//! Everything is read from the environment (or matching flags) once at
//! startup, checked by [`OperatorConfig::into_settings`], and then handed to
//! the resolver and the kops adapter as plain immutable values.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::FalseyValueParser;
use clap::Args;

use crate::{Error, Result};

/// Default credential-key filename passed to kops as `SSH_KEY`
pub const DEFAULT_SSH_KEY: &str = "kops.pub";

/// Default kops binary, looked up on `PATH`
pub const DEFAULT_KOPS_PATH: &str = "kops";

/// Default per-command timeout for kops invocations
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 1800;

/// Work directory name under the system temp dir when none is configured
pub const DEFAULT_WORK_DIR_NAME: &str = "cluster-operator";

/// Raw operator configuration as parsed by clap
#[derive(Args, Clone, Default)]
pub struct OperatorConfig {
    /// kops state store (e.g. s3://my-kops-state)
    #[arg(long, env = "KOPS_STATE_STORE")]
    pub state_store: Option<String>,

    /// DNS zone appended to every cluster name
    #[arg(long, env = "KOPS_CLUSTER_DNS_ZONE")]
    pub dns_zone: Option<String>,

    /// Cloud access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub aws_access_key_id: Option<String>,

    /// Cloud secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    /// Dry-run mode: infrastructure-changing kops calls become no-ops
    #[arg(long, env = "CLUSTER_OPERATOR_DEVELOPMENT", value_parser = FalseyValueParser::new())]
    pub development: bool,

    /// Credential-key filename passed to kops
    #[arg(long, env = "SSH_KEY", default_value = DEFAULT_SSH_KEY)]
    pub ssh_key: String,

    /// Path to the kops binary
    #[arg(long, env = "KOPS_PATH", default_value = DEFAULT_KOPS_PATH)]
    pub kops_path: PathBuf,

    /// Delete state-store clusters that no KopsCluster tracks
    #[arg(long, env = "CLUSTER_OPERATOR_REAP", value_parser = FalseyValueParser::new())]
    pub reap: bool,

    /// Directory for rendered manifests and exported kubeconfigs
    #[arg(long, env = "CLUSTER_OPERATOR_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Timeout for a single kops invocation, in seconds
    #[arg(long, env = "KOPS_COMMAND_TIMEOUT_SECS", default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS)]
    pub command_timeout_secs: u64,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("state_store", &self.state_store)
            .field("dns_zone", &self.dns_zone)
            .field("aws_access_key_id", &self.aws_access_key_id.as_ref().map(|_| "<redacted>"))
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("development", &self.development)
            .field("ssh_key", &self.ssh_key)
            .field("kops_path", &self.kops_path)
            .field("reap", &self.reap)
            .field("work_dir", &self.work_dir)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .finish()
    }
}

/// Process-wide defaults merged into every cluster spec
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDefaults {
    /// DNS zone appended to the resource name
    pub dns_zone: String,
    /// kops state store
    pub state_store: String,
}

/// Cloud credential pair handed to the kops subprocess
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Settings for invoking the kops binary
#[derive(Clone, Debug)]
pub struct ToolSettings {
    /// kops binary
    pub kops_path: PathBuf,
    /// Credential pair; absent only in development mode
    pub credentials: Option<CloudCredentials>,
    /// Credential-key filename
    pub ssh_key: String,
    /// Directory for temp files
    pub work_dir: PathBuf,
    /// Per-command timeout
    pub command_timeout: Duration,
    /// Dry-run mode
    pub development: bool,
}

/// Validated operator settings
#[derive(Clone, Debug)]
pub struct OperatorSettings {
    /// Defaults for the resolver
    pub defaults: ClusterDefaults,
    /// Settings for the kops adapter
    pub tool: ToolSettings,
    /// Whether the orphan sweep is enabled
    pub reap: bool,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl OperatorConfig {
    /// Check required values and build the immutable settings
    ///
    /// Every missing variable is reported in a single error.
    pub fn into_settings(self) -> Result<OperatorSettings> {
        let state_store = present(&self.state_store);
        let dns_zone = present(&self.dns_zone);
        let access_key = present(&self.aws_access_key_id);
        let secret_key = present(&self.aws_secret_access_key);

        let mut missing = Vec::new();
        if state_store.is_none() {
            missing.push("KOPS_STATE_STORE".to_string());
        }
        if dns_zone.is_none() {
            missing.push("KOPS_CLUSTER_DNS_ZONE".to_string());
        }
        if !self.development {
            if access_key.is_none() {
                missing.push("AWS_ACCESS_KEY_ID".to_string());
            }
            if secret_key.is_none() {
                missing.push("AWS_SECRET_ACCESS_KEY".to_string());
            }
        }

        let (Some(state_store), Some(dns_zone)) = (state_store, dns_zone) else {
            return Err(Error::config_missing(missing));
        };
        if !missing.is_empty() {
            return Err(Error::config_missing(missing));
        }

        if self.command_timeout_secs == 0 {
            return Err(Error::config("KOPS_COMMAND_TIMEOUT_SECS must be greater than zero"));
        }

        let credentials = match (access_key, secret_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(CloudCredentials {
                access_key_id,
                secret_access_key,
            }),
            _ => None,
        };

        let work_dir = self
            .work_dir
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_WORK_DIR_NAME));

        Ok(OperatorSettings {
            defaults: ClusterDefaults {
                dns_zone: dns_zone.trim_start_matches('.').to_string(),
                state_store: state_store.trim_end_matches('/').to_string(),
            },
            tool: ToolSettings {
                kops_path: self.kops_path,
                credentials,
                ssh_key: self.ssh_key,
                work_dir,
                command_timeout: Duration::from_secs(self.command_timeout_secs),
                development: self.development,
            },
            reap: self.reap,
        })
    }
}

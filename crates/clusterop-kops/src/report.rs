//! Typed views of kops output
//!
//! Anything that does not match the expected shape is a `Parse` error; no
//! field silently falls back to a default except where kops itself omits it.

use clusterop_common::crd::{ClusterNode, KubeConfig};
use clusterop_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Output of `kops validate cluster -o json`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ValidationReport {
    /// Nodes kops could see
    pub nodes: Vec<ClusterNode>,
    /// Problems kops found; absent when the cluster is healthy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ValidationFailure>,
}

/// One validation failure reported by kops
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Kind of object that failed (Node, Pod, InstanceGroup, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Object name
    #[serde(default)]
    pub name: String,
    /// What is wrong
    #[serde(default)]
    pub message: String,
}

impl ValidationReport {
    /// Whether kops reported no nodes at all
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes reporting Ready
    pub fn ready_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_ready()).count()
    }
}

/// Parse the JSON written by `kops validate cluster -o json`
pub fn parse_validation_report(output: &str) -> Result<ValidationReport> {
    serde_json::from_str(output.trim())
        .map_err(|e| Error::parse("validation report", e.to_string()))
}

#[derive(Deserialize)]
struct ListedCluster {
    metadata: ListedMetadata,
}

#[derive(Deserialize)]
struct ListedMetadata {
    name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClusterListing {
    Many(Vec<ListedCluster>),
    One(ListedCluster),
}

/// Parse the cluster names out of `kops get cluster -o json`
///
/// kops prints an array, or a bare object when the store holds one cluster.
/// Empty output means an empty store.
pub fn parse_cluster_list(output: &str) -> Result<Vec<String>> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(Vec::new());
    }

    let listing: ClusterListing = serde_json::from_str(output)
        .map_err(|e| Error::parse("cluster list", e.to_string()))?;

    let names = match listing {
        ClusterListing::Many(clusters) => clusters.into_iter().map(|c| c.metadata.name).collect(),
        ClusterListing::One(cluster) => vec![cluster.metadata.name],
    };

    Ok(names.into_iter().filter(|n: &String| !n.is_empty()).collect())
}

const KUBECONFIG_KIND: &str = "Config";

/// Parse a kubeconfig written by `kops export kubecfg`
///
/// The document must declare `kind: Config` and name at least one API server.
pub fn parse_kubeconfig(contents: &str) -> Result<KubeConfig> {
    if contents.trim().is_empty() {
        return Err(Error::parse("kubeconfig", "file is empty"));
    }
    let config: KubeConfig =
        serde_yaml::from_str(contents).map_err(|e| Error::parse("kubeconfig", e.to_string()))?;

    if config.api_version.trim().is_empty() {
        return Err(Error::parse("kubeconfig", "apiVersion is empty"));
    }
    if config.kind != KUBECONFIG_KIND {
        return Err(Error::parse(
            "kubeconfig",
            format!("expected kind {}, got '{}'", KUBECONFIG_KIND, config.kind),
        ));
    }
    if config.clusters.is_empty() {
        return Err(Error::parse("kubeconfig", "no clusters listed"));
    }
    Ok(config)
}

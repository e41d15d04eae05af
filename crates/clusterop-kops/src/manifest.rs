//! Rendering a kops manifest from resolved topology
//!
//! Used when a KopsCluster carries no `spec.config`. The output is one
//! `Cluster` document followed by a `master` and a `nodes` InstanceGroup.
//! Fields left at zero/empty are omitted so kops fills in its own defaults.

use std::collections::BTreeMap;

use clusterop_common::{Error, Result};
use serde::Serialize;

use crate::resolve::ResolvedConfig;

/// API version of the kops documents we render
pub const KOPS_API_VERSION: &str = "kops.k8s.io/v1alpha2";

/// Label tying an InstanceGroup to its cluster
pub const CLUSTER_LABEL: &str = "kops.k8s.io/cluster";

const MASTER_GROUP: &str = "master";
const NODES_GROUP: &str = "nodes";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document<S> {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    spec: S,
}

#[derive(Serialize)]
struct Metadata {
    name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterSpec {
    cloud_provider: &'static str,
    config_base: String,
    #[serde(rename = "networkID", skip_serializing_if = "String::is_empty")]
    network_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subnets: Vec<Subnet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    etcd_clusters: Vec<EtcdCluster>,
}

#[derive(Serialize)]
struct Subnet {
    name: String,
    zone: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EtcdCluster {
    name: &'static str,
    etcd_members: Vec<EtcdMember>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EtcdMember {
    name: String,
    instance_group: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceGroupSpec {
    role: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    machine_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subnets: Vec<String>,
}

fn non_zero(n: u32) -> Option<u32> {
    (n > 0).then_some(n)
}

fn etcd_clusters(config: &ResolvedConfig) -> Vec<EtcdCluster> {
    let Some(first_zone) = config.zones.first() else {
        return Vec::new();
    };
    // One member per control-plane zone; a single zone gets one member.
    let zones: Vec<&String> = if config.master_count > 1 {
        config.zones.iter().collect()
    } else {
        vec![first_zone]
    };
    ["main", "events"]
        .into_iter()
        .map(|name| EtcdCluster {
            name,
            etcd_members: zones
                .iter()
                .map(|zone| EtcdMember {
                    name: zone.to_string(),
                    instance_group: MASTER_GROUP,
                })
                .collect(),
        })
        .collect()
}

fn instance_group(
    config: &ResolvedConfig,
    group: &str,
    role: &'static str,
    count: u32,
    machine_type: &str,
) -> Document<InstanceGroupSpec> {
    let mut labels = BTreeMap::new();
    labels.insert(CLUSTER_LABEL.to_string(), config.name.clone());
    Document {
        api_version: KOPS_API_VERSION,
        kind: "InstanceGroup",
        metadata: Metadata {
            name: group.to_string(),
            labels,
        },
        spec: InstanceGroupSpec {
            role,
            machine_type: machine_type.to_string(),
            min_size: non_zero(count),
            max_size: non_zero(count),
            subnets: config.zones.clone(),
        },
    }
}

fn to_yaml<T: Serialize>(doc: &T, cluster: &str) -> Result<String> {
    serde_yaml::to_string(doc).map_err(|e| {
        Error::internal_with_context("manifest", format!("failed to render {}: {}", cluster, e))
    })
}

/// Render the kops manifest for `config`
pub fn render(config: &ResolvedConfig) -> Result<String> {
    let cluster = Document {
        api_version: KOPS_API_VERSION,
        kind: "Cluster",
        metadata: Metadata {
            name: config.name.clone(),
            labels: BTreeMap::new(),
        },
        spec: ClusterSpec {
            cloud_provider: "aws",
            config_base: config.config_base(),
            network_id: config.network_id.clone(),
            subnets: config
                .zones
                .iter()
                .map(|zone| Subnet {
                    name: zone.clone(),
                    zone: zone.clone(),
                    kind: "Public",
                })
                .collect(),
            etcd_clusters: etcd_clusters(config),
        },
    };

    let master = instance_group(
        config,
        MASTER_GROUP,
        "Master",
        config.master_count,
        &config.master_instance_type,
    );
    let nodes = instance_group(
        config,
        NODES_GROUP,
        "Node",
        config.worker_count,
        &config.worker_instance_type,
    );

    let docs = [
        to_yaml(&cluster, &config.name)?,
        to_yaml(&master, &config.name)?,
        to_yaml(&nodes, &config.name)?,
    ];
    Ok(docs.join("---\n"))
}

/// The manifest `CreateOrReplace` writes: the user's own, or a rendered one
pub fn manifest_for(config: &ResolvedConfig) -> Result<String> {
    match &config.manifest {
        Some(manifest) => Ok(manifest.clone()),
        None => render(config),
    }
}

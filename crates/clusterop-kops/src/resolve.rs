//! Desired-state resolution
//!
//! Merges a KopsCluster spec with the process-wide defaults. Pure: the same
//! inputs always give the same `ResolvedConfig`.

use clusterop_common::config::ClusterDefaults;
use clusterop_common::crd::KopsClusterSpec;

/// A cluster spec merged with operator defaults
///
/// Zero counts and empty strings mean "use the kops default", never "none".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Fully qualified cluster name, `<resource>.<dns zone>`
    pub name: String,
    /// State store holding the cluster record
    pub state_store: String,
    /// Control plane node count
    pub master_count: u32,
    /// Control plane instance type
    pub master_instance_type: String,
    /// Worker node count
    pub worker_count: u32,
    /// Worker instance type
    pub worker_instance_type: String,
    /// Existing network to place the cluster in
    pub network_id: String,
    /// Availability zones
    pub zones: Vec<String>,
    /// User-supplied manifest, written as-is when present
    pub manifest: Option<String>,
}

impl ResolvedConfig {
    /// kops `configBase`: where the cluster record lives inside the store
    pub fn config_base(&self) -> String {
        format!("{}/{}", self.state_store, self.name)
    }
}

/// Resolve `spec` for the resource called `resource_name`
pub fn resolve(
    resource_name: &str,
    spec: &KopsClusterSpec,
    defaults: &ClusterDefaults,
) -> ResolvedConfig {
    let topology = &spec.kops_config;
    ResolvedConfig {
        name: cluster_name(resource_name, &defaults.dns_zone),
        state_store: defaults.state_store.clone(),
        master_count: topology.master_count,
        master_instance_type: topology.master_instance_type.trim().to_string(),
        worker_count: topology.worker_count,
        worker_instance_type: topology.worker_instance_type.trim().to_string(),
        network_id: topology.network_id.trim().to_string(),
        zones: topology.zones.iter().map(|z| z.trim().to_string()).collect(),
        manifest: spec.config.clone(),
    }
}

/// `<resource>.<dns zone>`
pub fn cluster_name(resource_name: &str, dns_zone: &str) -> String {
    format!("{}.{}", resource_name, dns_zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterop_common::crd::KopsConfigSpec;

    fn defaults() -> ClusterDefaults {
        ClusterDefaults {
            dns_zone: "example.com".to_string(),
            state_store: "s3://kops-state".to_string(),
        }
    }

    #[test]
    fn name_and_store_come_from_defaults() {
        let resolved = resolve("demo", &KopsClusterSpec::default(), &defaults());
        assert_eq!(resolved.name, "demo.example.com");
        assert_eq!(resolved.state_store, "s3://kops-state");
        assert_eq!(resolved.config_base(), "s3://kops-state/demo.example.com");
    }

    #[test]
    fn unset_topology_stays_zero_and_empty() {
        let resolved = resolve("demo", &KopsClusterSpec::default(), &defaults());
        assert_eq!(resolved.master_count, 0);
        assert_eq!(resolved.worker_count, 0);
        assert!(resolved.master_instance_type.is_empty());
        assert!(resolved.network_id.is_empty());
        assert!(resolved.zones.is_empty());
        assert!(resolved.manifest.is_none());
    }

    #[test]
    fn explicit_topology_is_overlaid() {
        let spec = KopsClusterSpec {
            config: Some("kind: Cluster".to_string()),
            kops_config: KopsConfigSpec {
                master_count: 3,
                master_instance_type: "t3.medium".to_string(),
                worker_count: 5,
                worker_instance_type: " t3.large ".to_string(),
                network_id: "vpc-123".to_string(),
                zones: vec!["us-east-2a".to_string(), "us-east-2b".to_string()],
            },
        };
        let resolved = resolve("demo", &spec, &defaults());
        assert_eq!(resolved.master_count, 3);
        assert_eq!(resolved.worker_count, 5);
        assert_eq!(resolved.worker_instance_type, "t3.large");
        assert_eq!(resolved.zones, vec!["us-east-2a", "us-east-2b"]);
        assert_eq!(resolved.manifest.as_deref(), Some("kind: Cluster"));
    }

    #[test]
    fn resolution_is_repeatable() {
        let spec = KopsClusterSpec::default();
        assert_eq!(
            resolve("demo", &spec, &defaults()),
            resolve("demo", &spec, &defaults())
        );
    }
}

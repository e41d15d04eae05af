//! Orphan reaper
//!
//! Deletes clusters that exist in a kops state store but have no KopsCluster
//! tracking them. Sweeps of the same store are serialized in-process.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use clusterop_common::config::ClusterDefaults;
use clusterop_common::crd::KopsCluster;
use clusterop_common::{Error, Result};
use clusterop_kops::{resolve, Provisioner, ResolvedConfig};
use kube::ResourceExt;

/// Serializes orphan sweeps per state store
#[derive(Default)]
pub struct Reaper {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Reaper {
    /// Create a reaper with no sweeps in flight
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, state_store: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(state_store.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Delete every cluster in `state_store` whose name is not in `tracked`
    ///
    /// A failed delete does not stop the sweep. Returns the deleted names, or
    /// an error listing every failure.
    pub async fn reap(
        &self,
        provisioner: &dyn Provisioner,
        tracked: &[String],
        state_store: &str,
    ) -> Result<Vec<String>> {
        let lock = self.lock_for(state_store);
        let _guard = lock.lock().await;

        let external = provisioner.list(state_store).await?;
        let tracked: HashSet<&str> = tracked.iter().map(String::as_str).collect();

        let orphans: Vec<String> = external
            .into_iter()
            .filter(|name| !name.is_empty() && !tracked.contains(name.as_str()))
            .collect();

        if orphans.is_empty() {
            return Ok(Vec::new());
        }
        info!(state_store, count = orphans.len(), "deleting orphaned clusters");

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for orphan in orphans {
            let target = ResolvedConfig {
                name: orphan.clone(),
                state_store: state_store.to_string(),
                ..Default::default()
            };
            match provisioner.delete(&target).await {
                Ok(()) => {
                    info!(cluster = %orphan, "deleted orphaned cluster");
                    deleted.push(orphan);
                }
                Err(e) => {
                    warn!(cluster = %orphan, error = %e, "failed to delete orphaned cluster");
                    failures.push(format!("{}: {}", orphan, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(deleted)
        } else {
            Err(Error::provision(
                state_store,
                "reap",
                format!(
                    "failed to delete {} orphan(s): {}",
                    failures.len(),
                    failures.join("; ")
                ),
            ))
        }
    }
}

/// Resolved names of every KopsCluster whose state store is `state_store`
pub fn tracked_names(
    clusters: &[KopsCluster],
    defaults: &ClusterDefaults,
    state_store: &str,
) -> Vec<String> {
    clusters
        .iter()
        .map(|c| resolve(&c.name_any(), &c.spec, defaults))
        .filter(|resolved| resolved.state_store == state_store)
        .map(|resolved| resolved.name)
        .collect()
}

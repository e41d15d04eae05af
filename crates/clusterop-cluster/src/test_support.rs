//! Shared test doubles for the controller, phase and reaper tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clusterop_common::crd::{KopsCluster, KopsClusterStatus, KubeConfig};
use clusterop_common::{Error, Result};
use clusterop_kops::{
    CommandOutput, CommandRunner, KopsCommand, Operation, Provisioner, ResolvedConfig, RunError,
    ValidationReport,
};
use mockall::mock;

use crate::controller::KubeClient;

// The automock in clusterop-kops only exists under that crate's cfg(test)
mock! {
    pub Provisioner {}

    #[async_trait]
    impl Provisioner for Provisioner {
        async fn create_or_replace(&self, config: &ResolvedConfig) -> Result<()>;
        async fn converge(&self, config: &ResolvedConfig) -> Result<()>;
        async fn rolling_update(&self, config: &ResolvedConfig) -> Result<()>;
        async fn exists(&self, config: &ResolvedConfig) -> Result<bool>;
        async fn delete(&self, config: &ResolvedConfig) -> Result<()>;
        async fn validate(&self, config: &ResolvedConfig) -> Result<ValidationReport>;
        async fn export_credentials(&self, config: &ResolvedConfig) -> Result<KubeConfig>;
        async fn list(&self, state_store: &str) -> Result<Vec<String>>;
    }
}

/// In-memory stand-in for the API server holding KopsClusters
///
/// Status patches replace the stored status, mirroring how the real client
/// sends the full status with cleared fields nulled out.
#[derive(Clone, Default)]
pub struct FakeKube {
    clusters: Arc<Mutex<Vec<KopsCluster>>>,
    status_updates: Arc<Mutex<Vec<KopsClusterStatus>>>,
}

impl FakeKube {
    pub fn with(clusters: Vec<KopsCluster>) -> Self {
        Self {
            clusters: Arc::new(Mutex::new(clusters)),
            status_updates: Arc::default(),
        }
    }

    pub fn cluster(&self, name: &str) -> Option<KopsCluster> {
        self.clusters
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some(name))
            .cloned()
    }

    pub fn status(&self, name: &str) -> KopsClusterStatus {
        self.cluster(name)
            .and_then(|c| c.status)
            .unwrap_or_default()
    }

    pub fn status_updates(&self) -> Vec<KopsClusterStatus> {
        self.status_updates.lock().unwrap().clone()
    }

    fn modify<F: FnOnce(&mut KopsCluster)>(&self, name: &str, f: F) -> Result<()> {
        let mut clusters = self.clusters.lock().unwrap();
        match clusters
            .iter_mut()
            .find(|c| c.metadata.name.as_deref() == Some(name))
        {
            Some(cluster) => {
                f(cluster);
                Ok(())
            }
            None => Err(Error::persistence(name, "not found")),
        }
    }
}

#[async_trait]
impl KubeClient for FakeKube {
    async fn get_cluster(&self, name: &str) -> Result<Option<KopsCluster>> {
        Ok(self.cluster(name))
    }

    async fn list_clusters(&self) -> Result<Vec<KopsCluster>> {
        Ok(self.clusters.lock().unwrap().clone())
    }

    async fn patch_status(&self, name: &str, status: &KopsClusterStatus) -> Result<()> {
        self.status_updates.lock().unwrap().push(status.clone());
        self.modify(name, |c| c.status = Some(status.clone()))
    }

    async fn add_cluster_finalizer(&self, name: &str, finalizer: &str) -> Result<()> {
        self.modify(name, |c| {
            let finalizers = c.metadata.finalizers.get_or_insert_with(Vec::new);
            if !finalizers.iter().any(|f| f == finalizer) {
                finalizers.push(finalizer.to_string());
            }
        })
    }

    async fn remove_cluster_finalizer(&self, name: &str, finalizer: &str) -> Result<()> {
        self.modify(name, |c| {
            if let Some(finalizers) = c.metadata.finalizers.as_mut() {
                finalizers.retain(|f| f != finalizer);
            }
        })
    }
}

/// Command runner that records what it was asked to run and always succeeds
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<KopsCommand>>,
}

impl RecordingRunner {
    pub fn operations(&self) -> Vec<Operation> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.operation())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &KopsCommand) -> std::result::Result<CommandOutput, RunError> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(CommandOutput::success(""))
    }
}

//! The provisioner adapter: kops behind a typed interface
//!
//! Every operation builds a [`KopsCommand`], runs it through the injected
//! [`CommandRunner`] and maps the exit status and output onto a typed result.
//! In development mode the infrastructure-changing operations return
//! synthetic success without running anything; replace, get and list still
//! talk to the state store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clusterop_common::config::ToolSettings;
use clusterop_common::crd::{ClusterNode, KubeConfig};
use clusterop_common::{Error, Result};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::command::{KopsCommand, Operation};
use crate::manifest;
use crate::report::{self, ValidationReport};
use crate::resolve::ResolvedConfig;
use crate::runner::{CommandOutput, CommandRunner, ProcessRunner};

/// Exit code kops uses for "cluster not found" on `get cluster`
pub const NOT_FOUND_EXIT_CODE: i32 = 1;

/// Node reported by validation in development mode
pub const DEV_NODE_NAME: &str = "ip-172-17-17-143.compute.internal";

/// Zone of the synthetic development node
pub const DEV_NODE_ZONE: &str = "us-east-2a";

/// Operations the reconciler needs from the provisioning tool
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Push the declarative spec into the state store (`replace --force`)
    async fn create_or_replace(&self, config: &ResolvedConfig) -> Result<()>;

    /// Apply pending changes to the infrastructure
    async fn converge(&self, config: &ResolvedConfig) -> Result<()>;

    /// Replace nodes that no longer match the spec
    async fn rolling_update(&self, config: &ResolvedConfig) -> Result<()>;

    /// Whether the state store has a record of the cluster
    ///
    /// `Ok(false)` only when kops reports its not-found status. Any other
    /// failure is an error, and callers must then assume the cluster exists.
    async fn exists(&self, config: &ResolvedConfig) -> Result<bool>;

    /// Tear down the cluster and its state-store record
    async fn delete(&self, config: &ResolvedConfig) -> Result<()>;

    /// Ask kops whether the cluster is healthy
    async fn validate(&self, config: &ResolvedConfig) -> Result<ValidationReport>;

    /// Export kube-access credentials for the cluster
    async fn export_credentials(&self, config: &ResolvedConfig) -> Result<KubeConfig>;

    /// Names of every cluster in `state_store`
    async fn list(&self, state_store: &str) -> Result<Vec<String>>;
}

/// Provisioner that shells out to the kops binary
pub struct KopsProvisioner {
    runner: Arc<dyn CommandRunner>,
    settings: ToolSettings,
}

impl KopsProvisioner {
    /// Create a provisioner using `runner` to execute commands
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ToolSettings) -> Self {
        Self { runner, settings }
    }

    /// Create a provisioner that spawns real processes
    pub fn with_process_runner(settings: ToolSettings) -> Self {
        let runner = Arc::new(ProcessRunner::new(settings.command_timeout));
        Self::new(runner, settings)
    }

    /// Whether infrastructure-changing calls are skipped
    pub fn is_development(&self) -> bool {
        self.settings.development
    }

    /// Path of the manifest written for `cluster`
    pub fn manifest_path(&self, cluster: &str) -> PathBuf {
        self.settings.work_dir.join(format!("{}.yaml", cluster))
    }

    /// Path of the kubeconfig exported for `cluster`
    pub fn kubeconfig_path(&self, cluster: &str) -> PathBuf {
        self.settings.work_dir.join(format!("config-{}", cluster))
    }

    fn with_env(&self, command: KopsCommand, state_store: &str) -> KopsCommand {
        let mut command = command
            .env("KOPS_STATE_STORE", state_store)
            .env("SSH_KEY", self.settings.ssh_key.as_str());
        if let Some(creds) = &self.settings.credentials {
            command = command
                .env("AWS_ACCESS_KEY_ID", creds.access_key_id.as_str())
                .env("AWS_SECRET_ACCESS_KEY", creds.secret_access_key.as_str());
        }
        command
    }

    /// Run a command, mapping only execution failures to errors
    async fn execute(&self, cluster: &str, command: KopsCommand) -> Result<CommandOutput> {
        let operation = command.operation();
        info!(cluster, operation = %operation, command = %command, "executing kops");
        self.runner
            .run(&command)
            .await
            .map_err(|e| Error::provision(cluster, operation.as_str(), e.to_string()))
    }

    /// Run a command and require a zero exit status
    async fn execute_checked(&self, cluster: &str, command: KopsCommand) -> Result<CommandOutput> {
        let operation = command.operation();
        let output = self.execute(cluster, command).await?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(Error::provision_exit(
                cluster,
                operation.as_str(),
                output.exit_code,
                output.failure_detail(),
            ))
        }
    }

    async fn ensure_work_dir(&self, cluster: &str, operation: Operation) -> Result<()> {
        tokio::fs::create_dir_all(&self.settings.work_dir)
            .await
            .map_err(|e| {
                Error::provision(
                    cluster,
                    operation.as_str(),
                    format!(
                        "failed to create work dir {}: {}",
                        self.settings.work_dir.display(),
                        e
                    ),
                )
            })
    }

    /// Export credentials to the per-cluster kubeconfig path and parse them
    async fn export_to_file(&self, config: &ResolvedConfig) -> Result<(PathBuf, KubeConfig)> {
        let path = self.kubeconfig_path(&config.name);
        self.ensure_work_dir(&config.name, Operation::ExportKubecfg)
            .await?;

        let command = self.with_env(
            KopsCommand::export_kubecfg(
                &self.settings.kops_path,
                &config.name,
                &config.state_store,
                &path,
            ),
            &config.state_store,
        );
        self.execute_checked(&config.name, command).await?;

        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::provision(
                &config.name,
                Operation::ExportKubecfg.as_str(),
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        let kubeconfig = report::parse_kubeconfig(&contents)?;
        Ok((path, kubeconfig))
    }

    fn development_report() -> ValidationReport {
        ValidationReport {
            nodes: vec![ClusterNode {
                name: DEV_NODE_NAME.to_string(),
                zone: DEV_NODE_ZONE.to_string(),
                role: "Master".to_string(),
                hostname: DEV_NODE_NAME.to_string(),
                status: "True".to_string(),
            }],
            failures: Vec::new(),
        }
    }
}

#[async_trait]
impl Provisioner for KopsProvisioner {
    async fn create_or_replace(&self, config: &ResolvedConfig) -> Result<()> {
        let manifest = manifest::manifest_for(config)?;
        let path = self.manifest_path(&config.name);

        self.ensure_work_dir(&config.name, Operation::Replace).await?;
        tokio::fs::write(&path, manifest.as_bytes())
            .await
            .map_err(|e| {
                Error::provision(
                    &config.name,
                    Operation::Replace.as_str(),
                    format!("failed to write manifest {}: {}", path.display(), e),
                )
            })?;
        debug!(cluster = %config.name, path = %path.display(), "wrote manifest");

        let command = self.with_env(
            KopsCommand::replace(&self.settings.kops_path, &path, &config.state_store),
            &config.state_store,
        );
        self.execute_checked(&config.name, command).await?;
        Ok(())
    }

    async fn converge(&self, config: &ResolvedConfig) -> Result<()> {
        if self.is_development() {
            debug!(cluster = %config.name, "development mode, skipping update");
            return Ok(());
        }
        let command = self.with_env(
            KopsCommand::update(&self.settings.kops_path, &config.name, &config.state_store),
            &config.state_store,
        );
        self.execute_checked(&config.name, command).await?;
        Ok(())
    }

    async fn rolling_update(&self, config: &ResolvedConfig) -> Result<()> {
        if self.is_development() {
            debug!(cluster = %config.name, "development mode, skipping rolling update");
            return Ok(());
        }
        // rolling-update talks to the cluster API, so refresh the kubeconfig first
        let (kubeconfig_path, _) = self.export_to_file(config).await?;
        let command = self
            .with_env(
                KopsCommand::rolling_update(
                    &self.settings.kops_path,
                    &config.name,
                    &config.state_store,
                ),
                &config.state_store,
            )
            .env("KUBECONFIG", kubeconfig_path.display().to_string());
        self.execute_checked(&config.name, command).await?;
        Ok(())
    }

    async fn exists(&self, config: &ResolvedConfig) -> Result<bool> {
        let command = self.with_env(
            KopsCommand::get(&self.settings.kops_path, &config.name, &config.state_store),
            &config.state_store,
        );
        let output = self.execute(&config.name, command).await?;
        match output.exit_code {
            Some(0) => Ok(true),
            Some(NOT_FOUND_EXIT_CODE) => {
                debug!(cluster = %config.name, "cluster not found in state store");
                Ok(false)
            }
            code => Err(Error::provision_exit(
                &config.name,
                Operation::Get.as_str(),
                code,
                output.failure_detail(),
            )),
        }
    }

    async fn delete(&self, config: &ResolvedConfig) -> Result<()> {
        if self.is_development() {
            debug!(cluster = %config.name, "development mode, skipping delete");
            return Ok(());
        }
        let command = self.with_env(
            KopsCommand::delete(&self.settings.kops_path, &config.name, &config.state_store),
            &config.state_store,
        );
        self.execute_checked(&config.name, command).await?;
        Ok(())
    }

    async fn validate(&self, config: &ResolvedConfig) -> Result<ValidationReport> {
        if self.is_development() {
            return Ok(Self::development_report());
        }
        let (kubeconfig_path, _) = self.export_to_file(config).await?;
        let command = self
            .with_env(
                KopsCommand::validate(&self.settings.kops_path, &config.name, &config.state_store),
                &config.state_store,
            )
            .env("KUBECONFIG", kubeconfig_path.display().to_string());
        let output = self.execute_checked(&config.name, command).await?;
        let report = report::parse_validation_report(&output.stdout)?;

        if !report.failures.is_empty() {
            warn!(
                cluster = %config.name,
                failures = report.failures.len(),
                "kops reported validation failures"
            );
        }
        Ok(report)
    }

    async fn export_credentials(&self, config: &ResolvedConfig) -> Result<KubeConfig> {
        if self.is_development() {
            return Ok(KubeConfig::default());
        }
        let (_, kubeconfig) = self.export_to_file(config).await?;
        Ok(kubeconfig)
    }

    async fn list(&self, state_store: &str) -> Result<Vec<String>> {
        let command = self.with_env(
            KopsCommand::list(&self.settings.kops_path, state_store),
            state_store,
        );
        let output = self.execute_checked(state_store, command).await?;
        report::parse_cluster_list(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{MockCommandRunner, RunError};
    use clusterop_common::config::CloudCredentials;
    use std::sync::Mutex;
    use std::time::Duration;

    const STORE: &str = "s3://kops-state";
    const NAME: &str = "demo.example.com";

    fn settings(work_dir: &std::path::Path, development: bool) -> ToolSettings {
        ToolSettings {
            kops_path: PathBuf::from("kops"),
            credentials: (!development).then(|| CloudCredentials {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
            }),
            ssh_key: "kops.pub".to_string(),
            work_dir: work_dir.to_path_buf(),
            command_timeout: Duration::from_secs(60),
            development,
        }
    }

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            name: NAME.to_string(),
            state_store: STORE.to_string(),
            ..Default::default()
        }
    }

    /// Runner that records every command and answers from a closure
    struct RecordingRunner<F> {
        commands: Mutex<Vec<KopsCommand>>,
        respond: F,
    }

    impl<F> RecordingRunner<F>
    where
        F: Fn(&KopsCommand) -> std::result::Result<CommandOutput, RunError> + Send + Sync,
    {
        fn new(respond: F) -> Arc<Self> {
            Arc::new(Self {
                commands: Mutex::new(Vec::new()),
                respond,
            })
        }

        fn operations(&self) -> Vec<Operation> {
            self.commands
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.operation())
                .collect()
        }

        fn command(&self, operation: Operation) -> KopsCommand {
            self.commands
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.operation() == operation)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait]
    impl<F> CommandRunner for RecordingRunner<F>
    where
        F: Fn(&KopsCommand) -> std::result::Result<CommandOutput, RunError> + Send + Sync,
    {
        async fn run(&self, command: &KopsCommand) -> std::result::Result<CommandOutput, RunError> {
            self.commands.lock().unwrap().push(command.clone());
            (self.respond)(command)
        }
    }

    fn write_kubeconfig(command: &KopsCommand) {
        let path = command
            .arguments()
            .iter()
            .find_map(|a| a.strip_prefix("--kubeconfig="))
            .unwrap();
        std::fs::write(
            path,
            "apiVersion: v1\nkind: Config\ncurrent-context: demo.example.com\n\
             clusters:\n- name: demo.example.com\n  cluster:\n    server: https://api.demo.example.com\n",
        )
        .unwrap();
    }

    // ==========================================================================
    // Get
    // ==========================================================================

    #[tokio::test]
    async fn get_maps_exit_one_to_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|c| c.operation() == Operation::Get)
            .returning(|_| Ok(CommandOutput::failure(1, "cluster not found")));
        let kops = KopsProvisioner::new(Arc::new(runner), settings(dir.path(), false));

        assert!(!kops.exists(&resolved()).await.unwrap());
    }

    #[tokio::test]
    async fn get_success_means_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(CommandOutput::success("NAME CLOUD ZONES")));
        let kops = KopsProvisioner::new(Arc::new(runner), settings(dir.path(), false));

        assert!(kops.exists(&resolved()).await.unwrap());
    }

    #[tokio::test]
    async fn get_other_failures_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(CommandOutput::failure(2, "access denied")));
        let kops = KopsProvisioner::new(Arc::new(runner), settings(dir.path(), false));

        match kops.exists(&resolved()).await {
            Err(Error::Provision {
                operation,
                exit_code,
                message,
                ..
            }) => {
                assert_eq!(operation, "get");
                assert_eq!(exit_code, Some(2));
                assert_eq!(message, "access denied");
            }
            other => panic!("expected provision error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_killed_by_signal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| {
            Ok(CommandOutput {
                exit_code: None,
                ..Default::default()
            })
        });
        let kops = KopsProvisioner::new(Arc::new(runner), settings(dir.path(), false));

        assert!(kops.exists(&resolved()).await.is_err());
    }

    // ==========================================================================
    // CreateOrReplace
    // ==========================================================================

    #[tokio::test]
    async fn replace_writes_manifest_and_passes_environment() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::success("")));
        let kops = KopsProvisioner::new(runner.clone(), settings(dir.path(), false));

        kops.create_or_replace(&resolved()).await.unwrap();

        let manifest_path = dir.path().join("demo.example.com.yaml");
        let written = std::fs::read_to_string(&manifest_path).unwrap();
        assert!(written.contains("kind: Cluster"));

        let cmd = runner.command(Operation::Replace);
        assert_eq!(cmd.arguments()[3], manifest_path.display().to_string());
        assert_eq!(cmd.env_value("KOPS_STATE_STORE"), Some(STORE));
        assert_eq!(cmd.env_value("SSH_KEY"), Some("kops.pub"));
        assert_eq!(cmd.env_value("AWS_ACCESS_KEY_ID"), Some("AKIA"));
        assert_eq!(cmd.env_value("AWS_SECRET_ACCESS_KEY"), Some("secret"));
    }

    #[tokio::test]
    async fn replace_twice_writes_identical_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::success("")));
        let kops = KopsProvisioner::new(runner.clone(), settings(dir.path(), false));
        let path = dir.path().join("demo.example.com.yaml");

        kops.create_or_replace(&resolved()).await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        kops.create_or_replace(&resolved()).await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(runner.operations(), vec![Operation::Replace, Operation::Replace]);
    }

    #[tokio::test]
    async fn replace_uses_user_manifest_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::success("")));
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));
        let config = ResolvedConfig {
            manifest: Some("kind: Cluster\nmetadata:\n  name: custom\n".to_string()),
            ..resolved()
        };

        kops.create_or_replace(&config).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("demo.example.com.yaml")).unwrap();
        assert_eq!(written, "kind: Cluster\nmetadata:\n  name: custom\n");
    }

    #[tokio::test]
    async fn replace_failure_carries_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::failure(1, "invalid spec")));
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        let err = kops.create_or_replace(&resolved()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("invalid spec"));
    }

    #[tokio::test]
    async fn replace_runs_in_development_mode() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::success("")));
        let kops = KopsProvisioner::new(runner.clone(), settings(dir.path(), true));

        kops.create_or_replace(&resolved()).await.unwrap();

        let cmd = runner.command(Operation::Replace);
        assert_eq!(cmd.env_value("AWS_ACCESS_KEY_ID"), None);
        assert_eq!(cmd.env_value("KOPS_STATE_STORE"), Some(STORE));
    }

    // ==========================================================================
    // Development mode
    // ==========================================================================

    #[tokio::test]
    async fn development_mode_skips_infrastructure_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let kops = KopsProvisioner::new(Arc::new(runner), settings(dir.path(), true));
        let config = resolved();

        kops.converge(&config).await.unwrap();
        kops.rolling_update(&config).await.unwrap();
        kops.delete(&config).await.unwrap();
        assert_eq!(
            kops.export_credentials(&config).await.unwrap(),
            KubeConfig::default()
        );

        let report = kops.validate(&config).await.unwrap();
        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.nodes[0].name, DEV_NODE_NAME);
        assert_eq!(report.nodes[0].zone, DEV_NODE_ZONE);
        assert_eq!(report.nodes[0].role, "Master");
        assert!(report.nodes[0].is_ready());
    }

    // ==========================================================================
    // Converge, delete, rolling update
    // ==========================================================================

    #[tokio::test]
    async fn converge_and_delete_issue_their_commands() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::success("")));
        let kops = KopsProvisioner::new(runner.clone(), settings(dir.path(), false));

        kops.converge(&resolved()).await.unwrap();
        kops.delete(&resolved()).await.unwrap();

        assert_eq!(runner.operations(), vec![Operation::Update, Operation::Delete]);
        assert!(runner
            .command(Operation::Delete)
            .arguments()
            .contains(&"--yes".to_string()));
    }

    #[tokio::test]
    async fn rolling_update_exports_kubeconfig_first() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|c| {
            if c.operation() == Operation::ExportKubecfg {
                write_kubeconfig(c);
            }
            Ok(CommandOutput::success(""))
        });
        let kops = KopsProvisioner::new(runner.clone(), settings(dir.path(), false));

        kops.rolling_update(&resolved()).await.unwrap();

        assert_eq!(
            runner.operations(),
            vec![Operation::ExportKubecfg, Operation::RollingUpdate]
        );
        let expected = dir.path().join("config-demo.example.com");
        assert_eq!(
            runner.command(Operation::RollingUpdate).env_value("KUBECONFIG"),
            Some(expected.display().to_string().as_str())
        );
    }

    // ==========================================================================
    // Validate and export
    // ==========================================================================

    #[tokio::test]
    async fn validate_parses_report() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|c| match c.operation() {
            Operation::ExportKubecfg => {
                write_kubeconfig(c);
                Ok(CommandOutput::success(""))
            }
            _ => Ok(CommandOutput::success(
                r#"{"nodes":[{"name":"n1","zone":"us-east-2a","role":"Master","hostname":"n1","status":"True"}]}"#,
            )),
        });
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        let report = kops.validate(&resolved()).await.unwrap();
        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.ready_count(), 1);
    }

    #[tokio::test]
    async fn validate_malformed_output_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|c| match c.operation() {
            Operation::ExportKubecfg => {
                write_kubeconfig(c);
                Ok(CommandOutput::success(""))
            }
            _ => Ok(CommandOutput::success("Validation failed: not json")),
        });
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        let err = kops.validate(&resolved()).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn validate_non_zero_exit_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|c| match c.operation() {
            Operation::ExportKubecfg => {
                write_kubeconfig(c);
                Ok(CommandOutput::success(""))
            }
            _ => Ok(CommandOutput::failure(2, "cluster not ready")),
        });
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        let err = kops.validate(&resolved()).await.unwrap_err();
        assert!(matches!(err, Error::Provision { .. }));
    }

    #[tokio::test]
    async fn export_reads_the_written_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|c| {
            write_kubeconfig(c);
            Ok(CommandOutput::success(""))
        });
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        let config = kops.export_credentials(&resolved()).await.unwrap();
        assert_eq!(config.current_context, "demo.example.com");
    }

    #[tokio::test]
    async fn export_without_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::success("")));
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        assert!(kops.export_credentials(&resolved()).await.is_err());
    }

    #[tokio::test]
    async fn timeouts_surface_as_provision_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| {
            Err(RunError::TimedOut {
                timeout: Duration::from_secs(1),
            })
        });
        let kops = KopsProvisioner::new(runner, settings(dir.path(), false));

        let err = kops.converge(&resolved()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(err.is_retryable());
    }

    // ==========================================================================
    // List
    // ==========================================================================

    #[tokio::test]
    async fn list_runs_in_development_mode() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new(|_| {
            Ok(CommandOutput::success(
                r#"[{"metadata":{"name":"a.example.com"}},{"metadata":{"name":"b.example.com"}}]"#,
            ))
        });
        let kops = KopsProvisioner::new(runner.clone(), settings(dir.path(), true));

        let names = kops.list("s3://other-store").await.unwrap();
        assert_eq!(names, vec!["a.example.com", "b.example.com"]);
        assert_eq!(
            runner.command(Operation::List).env_value("KOPS_STATE_STORE"),
            Some("s3://other-store")
        );
    }
}

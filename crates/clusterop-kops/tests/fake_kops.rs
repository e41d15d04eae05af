//! Drives the real process runner against a scripted stand-in for kops.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clusterop_common::config::{CloudCredentials, ToolSettings};
use clusterop_common::Error;
use clusterop_kops::{KopsProvisioner, ProcessRunner, Provisioner, ResolvedConfig};
use tempfile::TempDir;

const STORE: &str = "s3://kops-state";

const SCRIPT: &str = r##"#!/bin/sh
LOG="__LOG__"
echo "$*" >> "$LOG"
echo "env $KOPS_STATE_STORE $SSH_KEY $AWS_ACCESS_KEY_ID" >> "$LOG"

name=""
kubeconfig=""
output=""
for arg in "$@"; do
  case "$arg" in
    --name=*) name="${arg#--name=}" ;;
    --kubeconfig=*) kubeconfig="${arg#--kubeconfig=}" ;;
    json) output="json" ;;
  esac
done

case "$1" in
  replace)
    [ -f "$4" ] || { echo "manifest $4 missing" >&2; exit 9; }
    grep -q "kind: Cluster" "$4" || { echo "not a cluster manifest" >&2; exit 9; }
    exit 0
    ;;
  update)
    [ "$name" = "slow.example.com" ] && sleep 10
    exit 0
    ;;
  get)
    if [ "$output" = "json" ]; then
      echo '[{"metadata":{"name":"one.example.com"}},{"metadata":{"name":"two.example.com"}}]'
      exit 0
    fi
    case "$name" in
      missing.example.com) echo "cluster not found" >&2; exit 1 ;;
      broken.example.com) echo "access denied" >&2; exit 3 ;;
      *) echo "NAME CLOUD ZONES"; exit 0 ;;
    esac
    ;;
  export)
    cat > "$kubeconfig" <<EOF
apiVersion: v1
kind: Config
current-context: $name
clusters:
- name: $name
  cluster:
    server: https://api.$name
contexts: []
users: []
EOF
    exit 0
    ;;
  validate)
    [ -f "$KUBECONFIG" ] || { echo "no kubeconfig" >&2; exit 4; }
    echo '{"nodes":[{"name":"n1","zone":"us-east-2a","role":"Master","hostname":"n1","status":"True"}]}'
    exit 0
    ;;
  delete)
    exit 0
    ;;
esac
echo "unexpected command: $*" >&2
exit 64
"##;

struct Fixture {
    dir: TempDir,
    provisioner: KopsProvisioner,
}

impl Fixture {
    fn new(timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let script = dir.path().join("kops");
        std::fs::write(&script, SCRIPT.replace("__LOG__", &log.display().to_string())).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let settings = ToolSettings {
            kops_path: script,
            credentials: Some(CloudCredentials {
                access_key_id: "AKIATEST".to_string(),
                secret_access_key: "secret".to_string(),
            }),
            ssh_key: "operator.pub".to_string(),
            work_dir: dir.path().join("work"),
            command_timeout: timeout,
            development: false,
        };
        let runner = Arc::new(ProcessRunner::new(timeout));
        Self {
            provisioner: KopsProvisioner::new(runner, settings),
            dir,
        }
    }

    fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    fn log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("calls.log")).unwrap_or_default()
    }
}

fn config(name: &str) -> ResolvedConfig {
    ResolvedConfig {
        name: name.to_string(),
        state_store: STORE.to_string(),
        ..Default::default()
    }
}

fn exists_in(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}

#[tokio::test]
async fn replace_writes_manifest_and_passes_environment() {
    let fixture = Fixture::new(Duration::from_secs(30));

    fixture
        .provisioner
        .create_or_replace(&config("demo.example.com"))
        .await
        .unwrap();

    assert!(exists_in(&fixture.work_dir().join("demo.example.com.yaml")));
    let log = fixture.log();
    assert!(log.contains("replace cluster -f"));
    assert!(log.contains("--state=s3://kops-state --force"));
    assert!(log.contains("env s3://kops-state operator.pub AKIATEST"));
}

#[tokio::test]
async fn get_distinguishes_not_found_from_failure() {
    let fixture = Fixture::new(Duration::from_secs(30));

    assert!(fixture
        .provisioner
        .exists(&config("present.example.com"))
        .await
        .unwrap());
    assert!(!fixture
        .provisioner
        .exists(&config("missing.example.com"))
        .await
        .unwrap());

    match fixture.provisioner.exists(&config("broken.example.com")).await {
        Err(Error::Provision {
            exit_code, message, ..
        }) => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(message, "access denied");
        }
        other => panic!("expected provision error, got {other:?}"),
    }
}

#[tokio::test]
async fn validate_exports_credentials_then_parses_report() {
    let fixture = Fixture::new(Duration::from_secs(30));
    let cluster = config("demo.example.com");

    let report = fixture.provisioner.validate(&cluster).await.unwrap();
    assert_eq!(report.nodes.len(), 1);
    assert!(report.nodes[0].is_ready());
    assert!(exists_in(&fixture.work_dir().join("config-demo.example.com")));

    let kubeconfig = fixture.provisioner.export_credentials(&cluster).await.unwrap();
    assert_eq!(kubeconfig.current_context, "demo.example.com");
    assert_eq!(
        kubeconfig.clusters[0].cluster.server,
        "https://api.demo.example.com"
    );
}

#[tokio::test]
async fn list_returns_store_cluster_names() {
    let fixture = Fixture::new(Duration::from_secs(30));

    let names = fixture.provisioner.list(STORE).await.unwrap();
    assert_eq!(names, vec!["one.example.com", "two.example.com"]);
    assert!(fixture.log().contains("get cluster --state=s3://kops-state -o json"));
}

#[tokio::test]
async fn slow_commands_are_killed_at_the_timeout() {
    let fixture = Fixture::new(Duration::from_millis(500));

    let err = fixture
        .provisioner
        .converge(&config("slow.example.com"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
    assert!(err.is_retryable());
}

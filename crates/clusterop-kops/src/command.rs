//! Structured kops invocations
//!
//! Arguments are kept as an argv vector and handed to the process runner
//! unchanged; nothing here goes through a shell. `Display` renders a quoted
//! form for logs with environment values left out.

use std::fmt;
use std::path::{Path, PathBuf};

/// The kops operations the adapter issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `replace cluster -f <file> --force`
    Replace,
    /// `update cluster --yes`
    Update,
    /// `get cluster --name=<name>`
    Get,
    /// `rolling-update cluster --yes`
    RollingUpdate,
    /// `delete cluster --yes`
    Delete,
    /// `validate cluster -o json`
    Validate,
    /// `export kubecfg`
    ExportKubecfg,
    /// `get cluster -o json` for a whole state store
    List,
}

impl Operation {
    /// Short name used in errors and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Update => "update",
            Self::Get => "get",
            Self::RollingUpdate => "rolling-update",
            Self::Delete => "delete",
            Self::Validate => "validate",
            Self::ExportKubecfg => "export-kubecfg",
            Self::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single kops invocation: program, argv and extra environment
#[derive(Clone, PartialEq, Eq)]
pub struct KopsCommand {
    operation: Operation,
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl KopsCommand {
    /// Start a command for `operation` running `program`
    pub fn new(program: impl Into<PathBuf>, operation: Operation) -> Self {
        Self {
            operation,
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child, replacing an earlier value
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    /// Which operation this command performs
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Program to execute
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments, excluding the program
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Extra environment for the child
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// Value of an environment variable set on this command
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `replace cluster -f <file> --state=<store> --force`
    pub fn replace(program: impl Into<PathBuf>, manifest: &Path, state_store: &str) -> Self {
        Self::new(program, Operation::Replace).args([
            "replace".to_string(),
            "cluster".to_string(),
            "-f".to_string(),
            manifest.display().to_string(),
            format!("--state={}", state_store),
            "--force".to_string(),
        ])
    }

    /// `update cluster --state=<store> --name=<name> --yes`
    pub fn update(program: impl Into<PathBuf>, name: &str, state_store: &str) -> Self {
        Self::new(program, Operation::Update).args([
            "update".to_string(),
            "cluster".to_string(),
            format!("--state={}", state_store),
            format!("--name={}", name),
            "--yes".to_string(),
        ])
    }

    /// `get cluster --state=<store> --name=<name>`
    pub fn get(program: impl Into<PathBuf>, name: &str, state_store: &str) -> Self {
        Self::new(program, Operation::Get).args([
            "get".to_string(),
            "cluster".to_string(),
            format!("--state={}", state_store),
            format!("--name={}", name),
        ])
    }

    /// `rolling-update cluster --state=<store> --name=<name> --fail-on-validate-error=false --yes`
    pub fn rolling_update(program: impl Into<PathBuf>, name: &str, state_store: &str) -> Self {
        Self::new(program, Operation::RollingUpdate).args([
            "rolling-update".to_string(),
            "cluster".to_string(),
            format!("--state={}", state_store),
            format!("--name={}", name),
            "--fail-on-validate-error=false".to_string(),
            "--yes".to_string(),
        ])
    }

    /// `delete cluster --name=<name> --state=<store> --yes`
    pub fn delete(program: impl Into<PathBuf>, name: &str, state_store: &str) -> Self {
        Self::new(program, Operation::Delete).args([
            "delete".to_string(),
            "cluster".to_string(),
            format!("--name={}", name),
            format!("--state={}", state_store),
            "--yes".to_string(),
        ])
    }

    /// `validate cluster --state=<store> --name=<name> -o json`
    pub fn validate(program: impl Into<PathBuf>, name: &str, state_store: &str) -> Self {
        Self::new(program, Operation::Validate).args([
            "validate".to_string(),
            "cluster".to_string(),
            format!("--state={}", state_store),
            format!("--name={}", name),
            "-o".to_string(),
            "json".to_string(),
        ])
    }

    /// `export kubecfg --name=<name> --state=<store> --kubeconfig=<path>`
    pub fn export_kubecfg(
        program: impl Into<PathBuf>,
        name: &str,
        state_store: &str,
        kubeconfig: &Path,
    ) -> Self {
        Self::new(program, Operation::ExportKubecfg).args([
            "export".to_string(),
            "kubecfg".to_string(),
            format!("--name={}", name),
            format!("--state={}", state_store),
            format!("--kubeconfig={}", kubeconfig.display()),
        ])
    }

    /// `get cluster --state=<store> -o json`
    pub fn list(program: impl Into<PathBuf>, state_store: &str) -> Self {
        Self::new(program, Operation::List).args([
            "get".to_string(),
            "cluster".to_string(),
            format!("--state={}", state_store),
            "-o".to_string(),
            "json".to_string(),
        ])
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

impl fmt::Display for KopsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, _) in &self.env {
            write!(f, "{}=*** ", key)?;
        }
        write!(f, "{}", shell_quote(&self.program.display().to_string()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

impl fmt::Debug for KopsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KopsCommand")
            .field("operation", &self.operation)
            .field("command", &self.to_string())
            .finish()
    }
}

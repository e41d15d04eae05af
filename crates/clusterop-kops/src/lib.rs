//! kops provisioning adapter for the cluster operator
//!
//! Resolves KopsCluster specs against operator defaults, renders manifests,
//! and drives the kops binary through a mockable command runner.

#![deny(missing_docs)]

pub mod command;
pub mod manifest;
pub mod provisioner;
pub mod report;
pub mod resolve;
pub mod runner;

pub use command::{KopsCommand, Operation};
pub use provisioner::{KopsProvisioner, Provisioner};
pub use report::{ValidationFailure, ValidationReport};
pub use resolve::{resolve, ResolvedConfig};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RunError};

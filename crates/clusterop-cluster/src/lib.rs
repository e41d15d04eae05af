//! KopsCluster reconciliation engine
//!
//! Drives each KopsCluster through Pending, Updating, Setup and Done by
//! calling the kops provisioner, and sweeps state stores for orphaned clusters.

#![deny(missing_docs)]

pub mod controller;
pub mod phases;
pub mod reaper;

#[cfg(test)]
mod test_support;

pub use controller::{error_policy, reconcile, Context, ContextBuilder, KubeClient, KubeClientImpl};
pub use reaper::Reaper;

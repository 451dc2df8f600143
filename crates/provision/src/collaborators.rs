//! Interfaces the orchestrator consumes.
//!
//! Default implementations live in [`crate::state`], [`crate::readiness`],
//! [`crate::remote`] and the `provision` binary.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::providers::{Region, ServerSize};
use crate::state::{PendingCreation, ServerRecord};

/// Supplies request inputs that were not given up front, and replacements
/// when the vendor rejects one.
#[async_trait]
pub trait InputSelector: Send + Sync {
    /// Pick a server name. `rejected` is the name the vendor refused, if any.
    async fn choose_name(&self, rejected: Option<&str>, reason: Option<&str>) -> Result<String>;

    /// Pick a region out of `regions` (already filtered).
    async fn choose_region(&self, regions: &[Region]) -> Result<String>;

    /// Pick a size for `region` out of `sizes` (already filtered).
    async fn choose_size(&self, region: &str, sizes: &[ServerSize]) -> Result<String>;
}

/// Server record persistence.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Append a record.
    async fn save(&self, record: &ServerRecord) -> Result<()>;

    /// All records.
    async fn list(&self) -> Result<Vec<ServerRecord>>;
}

/// Pending-creation journal, written around each vendor creation call.
#[async_trait]
pub trait CreationJournal: Send + Sync {
    /// Record an in-flight creation.
    async fn begin(&self, entry: &PendingCreation) -> Result<()>;

    /// Clear the entry for `run_id`.
    async fn complete(&self, run_id: &str) -> Result<()>;

    /// Entries never completed.
    async fn pending(&self) -> Result<Vec<PendingCreation>>;
}

/// Application-level readiness check.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Wait for `address` to answer. Never errors.
    ///
    /// `min_wait` is a floor: no verdict is reached before it has elapsed.
    /// How long to keep trying after that is up to the implementation.
    async fn wait_for_ready(&self, address: &str, min_wait: Duration) -> bool;
}

/// Post-provisioning host hardening.
#[async_trait]
pub trait Hardening: Send + Sync {
    /// Configure the host firewall.
    async fn setup_firewall(
        &self,
        address: &str,
        name: &str,
        dry_run: bool,
        bare: bool,
    ) -> Result<()>;

    /// Harden sshd and system settings.
    async fn setup_security(
        &self,
        address: &str,
        name: &str,
        port: Option<u16>,
        dry_run: bool,
        force: bool,
    ) -> Result<()>;
}

/// Output of a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code (-1 if killed by signal).
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ExecOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands on a provisioned host.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run `command` on `address`.
    async fn exec(&self, address: &str, command: &str) -> Result<ExecOutput>;
}

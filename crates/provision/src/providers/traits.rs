//! Provider capability contract and the shared data model.
//!
//! Every vendor adapter translates its own wire format into the types defined
//! here. Nothing outside `providers/<vendor>/` should ever see a vendor's raw
//! JSON or status vocabulary.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::factory::Vendor;
use crate::config::DeployMode;

/// Sentinel address reported until the vendor has allocated a public IP.
pub const PENDING_IP: &str = "pending";

/// Errors that can occur during provider operations.
///
/// Messages carried by these variants have already been scrubbed of the
/// bearer credential and never contain request bodies.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure (DNS, connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vendor name did not match any known adapter.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Operation requires a credential but the adapter was built without one.
    #[error("No API token configured for {0}")]
    MissingCredential(String),

    /// Vendor does not offer this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether the vendor rejected the request because the resource already
    /// exists (duplicate SSH key, duplicate name, ...).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Api { status, message } => {
                *status == 409
                    || (*status == 422 || *status == 400)
                        && message.to_lowercase().contains("already")
            }
            _ => false,
        }
    }
}

/// Normalized server status shared by all vendors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Server is being created or is booting.
    Initializing,
    /// Server is on and running.
    Running,
    /// Server is powered off.
    Off,
    /// Status could not be determined.
    Unknown,
    /// Known vendor transitional state without a shared equivalent
    /// (e.g. "deleting", "rebuilding").
    Other(String),
}

impl ServerStatus {
    /// Build a passthrough status, lower-cased so callers never see two
    /// spellings of the same vendor state.
    #[must_use]
    pub fn other(raw: &str) -> Self {
        Self::Other(raw.to_lowercase())
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Off => write!(f, "off"),
            Self::Unknown => write!(f, "unknown"),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// Request to create a new server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Server name; must be unique per vendor account.
    pub name: String,
    /// Vendor region id (e.g., "fsn1", "nyc3", "ewr", "us-east").
    pub region: String,
    /// Vendor size id (e.g., "cx22", "s-2vcpu-4gb", "vc2-2c-4gb", "g6-standard-2").
    pub size: String,
    /// Cloud-init payload. Adapters choose raw or base64 transport.
    pub boot_script: String,
    /// Pre-registered SSH key ids.
    pub ssh_key_ids: Vec<String>,
    /// Image override; adapters fall back to their default Ubuntu LTS image.
    pub image: Option<String>,
}

/// Result of a creation call or a details lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResult {
    /// Vendor-assigned server id.
    pub id: String,
    /// Public IPv4 address, or [`PENDING_IP`] until allocated.
    pub ip: String,
    /// Normalized status.
    pub status: ServerStatus,
}

impl ProvisionResult {
    /// Whether the vendor has reported a usable public address.
    #[must_use]
    pub fn has_address(&self) -> bool {
        is_valid_ip(&self.ip)
    }
}

/// Region catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region id used in requests.
    pub id: String,
    /// Human readable name.
    pub name: String,
}

impl Region {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Size (plan) catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSize {
    /// Size id used in requests.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// vCPU count.
    pub vcpus: u32,
    /// Memory in MB.
    pub memory_mb: u64,
    /// Disk in GB.
    pub disk_gb: u64,
    /// Monthly price, already formatted with currency.
    pub price_monthly: String,
}

impl std::fmt::Display for ServerSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_precision_loss)]
        let memory_gb = self.memory_mb as f64 / 1024.0;
        write!(
            f,
            "{} - {} vCPU, {memory_gb:.1} GB RAM, {} GB disk, {}/mo",
            self.id, self.vcpus, self.disk_gb, self.price_monthly
        )
    }
}

/// Snapshot (image/backup) of a server disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot id.
    pub id: String,
    /// Server the snapshot was taken from, when the vendor reports it.
    pub server_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Vendor status (e.g. "available", "pending").
    pub status: String,
    /// Size in GB.
    pub size_gb: f64,
    /// Creation timestamp as reported by the vendor.
    pub created_at: String,
    /// Estimated monthly storage cost.
    pub monthly_cost: String,
}

/// Check that a vendor-reported address is a real, routable-looking IP.
///
/// `"pending"`, empty strings and the unspecified addresses (`0.0.0.0`, `::`)
/// are rejected.
#[must_use]
pub fn is_valid_ip(candidate: &str) -> bool {
    candidate
        .trim()
        .parse::<IpAddr>()
        .is_ok_and(|ip| !ip.is_unspecified())
}

/// Format a per-GB price estimate for `size_gb` of storage.
#[must_use]
pub fn estimate_monthly_cost(size_gb: f64, price_per_gb: f64, currency: &str) -> String {
    format!("~{currency}{:.2}/month", size_gb * price_per_gb)
}

/// Capability contract implemented by every vendor adapter.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Vendor this adapter talks to.
    fn vendor(&self) -> Vendor;

    /// Check a credential with a cheap authenticated read.
    ///
    /// Returns `false` on any failure, including network errors.
    async fn validate_token(&self, token: &str) -> bool;

    /// Register a public key, returning the existing key's id when the vendor
    /// already has an identical key.
    async fn upload_ssh_key(&self, name: &str, public_key: &str) -> Result<String, ProviderError>;

    /// Create a server.
    async fn create_server(&self, req: &ProvisionRequest) -> Result<ProvisionResult, ProviderError>;

    /// Get the normalized status of a server.
    async fn get_server_status(&self, id: &str) -> Result<ServerStatus, ProviderError> {
        Ok(self.get_server_details(id).await?.status)
    }

    /// Get server status and address.
    async fn get_server_details(&self, id: &str) -> Result<ProvisionResult, ProviderError>;

    /// Delete a server.
    async fn destroy_server(&self, id: &str) -> Result<(), ProviderError>;

    /// Reboot a server.
    async fn reboot_server(&self, id: &str) -> Result<(), ProviderError>;

    /// Static region catalog.
    fn get_regions(&self) -> Vec<Region>;

    /// Static size catalog.
    fn get_server_sizes(&self) -> Vec<ServerSize>;

    /// Live region catalog, falling back to [`CloudProvider::get_regions`].
    async fn get_available_locations(&self) -> Vec<Region>;

    /// Live size catalog for a region, filtered for the deploy mode, falling
    /// back to [`CloudProvider::get_server_sizes`].
    async fn get_available_server_types(&self, region: &str, mode: DeployMode) -> Vec<ServerSize>;

    /// Snapshot a server's disk.
    async fn create_snapshot(
        &self,
        server_id: &str,
        name: &str,
    ) -> Result<SnapshotInfo, ProviderError>;

    /// List snapshots, optionally only those of one server.
    async fn list_snapshots(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<SnapshotInfo>, ProviderError>;

    /// Delete a snapshot.
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError>;

    /// Approximate monthly cost of snapshotting a server.
    async fn get_snapshot_cost_estimate(&self, server_id: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_validation_rejects_placeholders() {
        assert!(!is_valid_ip(PENDING_IP));
        assert!(!is_valid_ip(""));
        assert!(!is_valid_ip("0.0.0.0"));
        assert!(!is_valid_ip("::"));
        assert!(!is_valid_ip("1.2.3"));
        assert!(!is_valid_ip("256.1.1.1"));
    }

    #[test]
    fn test_ip_validation_accepts_addresses() {
        assert!(is_valid_ip("1.2.3.4"));
        assert!(is_valid_ip(" 203.0.113.7 "));
        assert!(is_valid_ip("2001:db8::1"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ServerStatus::Running.to_string(), "running");
        assert_eq!(ServerStatus::other("Rebuilding").to_string(), "rebuilding");
    }

    #[test]
    fn test_conflict_detection() {
        let dup = ProviderError::Api {
            status: 422,
            message: "SSH Key is already in use on your account".to_string(),
        };
        assert!(dup.is_conflict());

        let uniq = ProviderError::Api {
            status: 409,
            message: "SSH key with the same fingerprint already exists".to_string(),
        };
        assert!(uniq.is_conflict());

        let other = ProviderError::Api {
            status: 422,
            message: "invalid size".to_string(),
        };
        assert!(!other.is_conflict());
    }

    #[test]
    fn test_cost_format() {
        assert_eq!(estimate_monthly_cost(40.0, 0.06, "$"), "~$2.40/month");
    }
}

//! Vultr API request and response models.

use serde::{Deserialize, Serialize};

// ============================================================================
// Instance types
// ============================================================================

/// Cloud compute instance from API.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    /// Instance ID.
    pub id: String,
    /// Instance label.
    #[serde(default)]
    pub label: String,
    /// Main IP address ("0.0.0.0" until assigned).
    #[serde(default)]
    pub main_ip: String,
    /// Disk size in GB.
    #[serde(default)]
    pub disk: u64,
    /// Status: "active", "pending", "suspended", "resizing".
    pub status: String,
    /// Power status: "running", "stopped".
    #[serde(default)]
    pub power_status: String,
    /// Server state: "none", "locked", "installingbooting", "ok".
    #[serde(default)]
    pub server_state: String,
}

/// Single instance response.
#[derive(Debug, Deserialize)]
pub struct InstanceResponse {
    /// Instance details.
    pub instance: Instance,
}

/// Request body for creating an instance.
#[derive(Debug, Serialize)]
pub struct CreateInstanceRequest {
    /// Region ID.
    pub region: String,
    /// Plan ID.
    pub plan: String,
    /// OS ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_id: Option<u32>,
    /// Image ID (for custom images).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Instance label.
    pub label: String,
    /// Hostname.
    pub hostname: String,
    /// SSH key IDs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sshkey_id: Vec<String>,
    /// Base64 encoded cloud-init user data.
    pub user_data: String,
    /// Automatic backups ("enabled" / "disabled").
    pub backups: String,
}

/// Empty request body for power actions.
#[derive(Debug, Serialize)]
pub struct RebootRequest {}

// ============================================================================
// SSH key types
// ============================================================================

/// SSH key.
#[derive(Debug, Clone, Deserialize)]
pub struct SshKey {
    /// Key ID.
    pub id: String,
    /// Key name.
    pub name: String,
    /// Public key.
    pub ssh_key: String,
}

/// Create SSH key request.
#[derive(Debug, Serialize)]
pub struct CreateSshKeyRequest {
    /// Key name.
    pub name: String,
    /// Public key.
    pub ssh_key: String,
}

/// Single SSH key wrapper.
#[derive(Debug, Deserialize)]
pub struct SshKeyResponse {
    /// Key.
    pub ssh_key: SshKey,
}

/// SSH key list.
#[derive(Debug, Deserialize)]
pub struct SshKeyListResponse {
    /// Keys.
    #[serde(default)]
    pub ssh_keys: Vec<SshKey>,
}

// ============================================================================
// Region and plan types
// ============================================================================

/// Region information.
#[derive(Debug, Clone, Deserialize)]
pub struct VultrRegion {
    /// Region ID.
    pub id: String,
    /// Region city.
    pub city: String,
    /// Region country.
    pub country: String,
}

/// Region list.
#[derive(Debug, Deserialize)]
pub struct RegionListResponse {
    /// Regions.
    #[serde(default)]
    pub regions: Vec<VultrRegion>,
}

/// Cloud compute plan.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    /// Plan ID.
    pub id: String,
    /// vCPU count.
    pub vcpu_count: u32,
    /// RAM in MB.
    pub ram: u64,
    /// Disk in GB.
    pub disk: u64,
    /// Monthly cost in USD.
    pub monthly_cost: f64,
    /// Plan type (e.g. "vc2").
    #[serde(rename = "type", default)]
    pub plan_type: String,
    /// Region IDs offering this plan.
    #[serde(default)]
    pub locations: Vec<String>,
}

/// Plan list.
#[derive(Debug, Deserialize)]
pub struct PlanListResponse {
    /// Plans.
    #[serde(default)]
    pub plans: Vec<Plan>,
}

// ============================================================================
// Snapshot types
// ============================================================================

/// Create snapshot request.
#[derive(Debug, Serialize)]
pub struct CreateSnapshotRequest {
    /// Source instance ID.
    pub instance_id: String,
    /// Description.
    pub description: String,
}

/// Snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    /// Snapshot ID.
    pub id: String,
    /// Creation date.
    pub date_created: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Status: "pending", "complete".
    pub status: String,
}

/// Single snapshot wrapper.
#[derive(Debug, Deserialize)]
pub struct SnapshotResponse {
    /// Snapshot.
    pub snapshot: Snapshot,
}

/// Snapshot list.
#[derive(Debug, Deserialize)]
pub struct SnapshotListResponse {
    /// Snapshots.
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

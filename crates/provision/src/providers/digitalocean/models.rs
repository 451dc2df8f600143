//! `DigitalOcean` API request and response models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Droplet types
// ============================================================================

/// Droplet (instance) from API.
#[derive(Debug, Clone, Deserialize)]
pub struct Droplet {
    /// Droplet ID.
    pub id: i64,
    /// Droplet name.
    pub name: String,
    /// Disk size in GB.
    #[serde(default)]
    pub disk: u64,
    /// Status: "new", "active", "off", "archive".
    pub status: String,
    /// Networks.
    #[serde(default)]
    pub networks: Networks,
}

/// Single droplet response.
#[derive(Debug, Deserialize)]
pub struct DropletResponse {
    /// Droplet details.
    pub droplet: Droplet,
}

/// Network configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Networks {
    /// IPv4 addresses.
    #[serde(default)]
    pub v4: Vec<NetworkAddress>,
}

/// Network address.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkAddress {
    /// IP address.
    pub ip_address: String,
    /// Type: "public" or "private".
    #[serde(rename = "type")]
    pub address_type: String,
}

/// Create droplet request.
#[derive(Debug, Serialize)]
pub struct CreateDropletRequest {
    /// Droplet name.
    pub name: String,
    /// Region slug.
    pub region: String,
    /// Size slug.
    pub size: String,
    /// Image slug.
    pub image: String,
    /// SSH key IDs (numeric) or fingerprints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<Value>,
    /// Cloud-init user data (raw).
    pub user_data: String,
    /// Enable monitoring agent.
    pub monitoring: bool,
}

// ============================================================================
// Action types
// ============================================================================

/// Droplet action request.
#[derive(Debug, Serialize)]
pub struct DropletActionRequest {
    /// Action type ("reboot", "snapshot", ...).
    #[serde(rename = "type")]
    pub action_type: String,
    /// Snapshot name (snapshot action only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Action.
#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    /// Action ID.
    pub id: i64,
    /// Status: "in-progress", "completed", "errored".
    pub status: String,
    /// Start timestamp.
    #[serde(default)]
    pub started_at: Option<String>,
    /// Target resource ID.
    #[serde(default)]
    pub resource_id: Option<i64>,
}

/// Single action wrapper.
#[derive(Debug, Deserialize)]
pub struct ActionResponse {
    /// Action.
    pub action: Action,
}

// ============================================================================
// SSH key types
// ============================================================================

/// Account SSH key.
#[derive(Debug, Clone, Deserialize)]
pub struct SshKey {
    /// Key ID.
    pub id: i64,
    /// Key name.
    pub name: String,
    /// Public key.
    pub public_key: String,
}

/// Create SSH key request.
#[derive(Debug, Serialize)]
pub struct CreateSshKeyRequest {
    /// Key name.
    pub name: String,
    /// Public key.
    pub public_key: String,
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
// Catalog types
// ============================================================================

/// Region information.
#[derive(Debug, Clone, Deserialize)]
pub struct DoRegion {
    /// Region slug.
    pub slug: String,
    /// Region name.
    pub name: String,
    /// Accepting new droplets.
    pub available: bool,
}

/// Region list.
#[derive(Debug, Deserialize)]
pub struct RegionListResponse {
    /// Regions.
    #[serde(default)]
    pub regions: Vec<DoRegion>,
}

/// Size (plan).
#[derive(Debug, Clone, Deserialize)]
pub struct Size {
    /// Size slug.
    pub slug: String,
    /// Memory in MB.
    pub memory: u64,
    /// vCPU count.
    pub vcpus: u32,
    /// Disk in GB.
    pub disk: u64,
    /// Monthly price in USD.
    pub price_monthly: f64,
    /// Region slugs offering this size.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Orderable.
    pub available: bool,
    /// Description (e.g. "Basic").
    #[serde(default)]
    pub description: String,
}

/// Size list.
#[derive(Debug, Deserialize)]
pub struct SizeListResponse {
    /// Sizes.
    #[serde(default)]
    pub sizes: Vec<Size>,
}

// ============================================================================
// Snapshot types
// ============================================================================

/// Snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    /// Snapshot ID.
    pub id: String,
    /// Name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Source resource ID.
    pub resource_id: String,
    /// Size in GB.
    #[serde(default)]
    pub size_gigabytes: f64,
}

/// Snapshot list.
#[derive(Debug, Deserialize)]
pub struct SnapshotListResponse {
    /// Snapshots.
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

//! Linode API v4 request and response models.

use serde::{Deserialize, Serialize};

// ============================================================================
// Instance types
// ============================================================================

/// Linode instance.
#[derive(Debug, Clone, Deserialize)]
pub struct LinodeInstance {
    /// Linode ID.
    pub id: i64,
    /// Label.
    #[serde(default)]
    pub label: String,
    /// Status: "running", "offline", "booting", "rebooting", "shutting_down",
    /// "provisioning", "deleting", "migrating", "rebuilding", "cloning",
    /// "restoring", "stopped", "resizing".
    pub status: String,
    /// IPv4 addresses (public and private).
    #[serde(default)]
    pub ipv4: Vec<String>,
    /// Hardware specs.
    #[serde(default)]
    pub specs: Specs,
}

/// Instance hardware specs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Specs {
    /// Disk in MB.
    #[serde(default)]
    pub disk: u64,
    /// Memory in MB.
    #[serde(default)]
    pub memory: u64,
    /// vCPU count.
    #[serde(default)]
    pub vcpus: u32,
}

/// Paged list wrapper used by every Linode collection endpoint.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Items.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Create instance request.
#[derive(Debug, Serialize)]
pub struct CreateInstanceRequest {
    /// Label.
    pub label: String,
    /// Region ID.
    pub region: String,
    /// Type ID.
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Image ID.
    pub image: String,
    /// Root password (required when an image is given).
    pub root_pass: String,
    /// Usernames whose profile SSH keys are installed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authorized_users: Vec<String>,
    /// Metadata service payload.
    pub metadata: Metadata,
    /// Boot after creation.
    pub booted: bool,
}

/// Metadata service payload.
#[derive(Debug, Serialize)]
pub struct Metadata {
    /// Base64 encoded cloud-init user data.
    pub user_data: String,
}

/// Empty request body.
#[derive(Debug, Serialize)]
pub struct EmptyBody {}

// ============================================================================
// Profile types
// ============================================================================

/// Authenticated user profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Username.
    pub username: String,
}

/// Profile SSH key.
#[derive(Debug, Clone, Deserialize)]
pub struct SshKey {
    /// Key ID.
    pub id: i64,
    /// Label.
    pub label: String,
    /// Public key.
    pub ssh_key: String,
}

/// Create SSH key request.
#[derive(Debug, Serialize)]
pub struct CreateSshKeyRequest {
    /// Label.
    pub label: String,
    /// Public key.
    pub ssh_key: String,
}

// ============================================================================
// Catalog types
// ============================================================================

/// Region.
#[derive(Debug, Clone, Deserialize)]
pub struct LinodeRegion {
    /// Region ID (e.g. "us-east").
    pub id: String,
    /// Label (e.g. "Newark, NJ").
    #[serde(default)]
    pub label: String,
    /// Status: "ok" or "outage".
    #[serde(default)]
    pub status: String,
}

/// Instance type.
#[derive(Debug, Clone, Deserialize)]
pub struct LinodeType {
    /// Type ID (e.g. "g6-standard-2").
    pub id: String,
    /// Label.
    #[serde(default)]
    pub label: String,
    /// vCPU count.
    pub vcpus: u32,
    /// Memory in MB.
    pub memory: u64,
    /// Disk in MB.
    pub disk: u64,
    /// Pricing.
    pub price: TypePrice,
    /// Replacement type when this one is deprecated.
    #[serde(default)]
    pub successor: Option<String>,
}

/// Type pricing.
#[derive(Debug, Clone, Deserialize)]
pub struct TypePrice {
    /// Monthly price in USD.
    pub monthly: f64,
}

/// Per-region plan availability entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionAvailability {
    /// Plan (type) ID.
    pub plan: String,
    /// Orderable in the region.
    pub available: bool,
}

// ============================================================================
// Backup types
// ============================================================================

/// Create manual backup request.
#[derive(Debug, Serialize)]
pub struct CreateBackupRequest {
    /// Label.
    pub label: String,
}

/// Backup.
#[derive(Debug, Clone, Deserialize)]
pub struct Backup {
    /// Backup ID.
    pub id: i64,
    /// Label (null for automatic backups).
    #[serde(default)]
    pub label: Option<String>,
    /// Status: "pending", "running", "successful", ...
    pub status: String,
    /// Creation timestamp.
    pub created: String,
    /// Backed up disks.
    #[serde(default)]
    pub disks: Vec<BackupDisk>,
}

/// Backed up disk.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupDisk {
    /// Size in MB.
    pub size: u64,
}

/// Backups of one instance.
#[derive(Debug, Deserialize)]
pub struct BackupsResponse {
    /// Automatic backups.
    #[serde(default)]
    pub automatic: Vec<Backup>,
    /// Manual snapshot slots.
    #[serde(default)]
    pub snapshot: SnapshotSlots,
}

/// Manual snapshot slots.
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotSlots {
    /// Latest completed snapshot.
    pub current: Option<Backup>,
    /// Snapshot being taken.
    pub in_progress: Option<Backup>,
}

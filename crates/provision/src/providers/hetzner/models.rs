//! Hetzner Cloud API request and response models.
//!
//! Based on <https://docs.hetzner.cloud/>.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Pagination
// ============================================================================

/// List metadata. Absent on unpaginated endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    /// Page cursor.
    #[serde(default)]
    pub pagination: Pagination,
}

/// Page cursor of a list response.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    /// Next page number, null on the last page.
    pub next_page: Option<u32>,
}

/// A list response that may continue on further pages.
pub trait Paged: DeserializeOwned {
    /// Listed item.
    type Item;

    /// Split into this page's items and the next page number.
    fn into_page(self) -> (Vec<Self::Item>, Option<u32>);
}

macro_rules! paged {
    ($response:ty, $field:ident, $item:ty) => {
        impl Paged for $response {
            type Item = $item;

            fn into_page(self) -> (Vec<$item>, Option<u32>) {
                (self.$field, self.meta.pagination.next_page)
            }
        }
    };
}

paged!(SshKeyListResponse, ssh_keys, SshKey);
paged!(ServerTypeListResponse, server_types, ServerType);
paged!(ImageListResponse, images, Image);

// ============================================================================
// Server types
// ============================================================================

/// Server from the Cloud API.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudServer {
    /// Server ID.
    pub id: i64,
    /// Server name.
    pub name: String,
    /// Status: "initializing", "starting", "running", "stopping", "off",
    /// "deleting", "migrating", "rebuilding", "unknown".
    pub status: String,
    /// Public networking.
    #[serde(default)]
    pub public_net: PublicNet,
    /// Primary disk size in GB.
    #[serde(default)]
    pub primary_disk_size: Option<f64>,
}

/// Public network block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicNet {
    /// Primary IPv4, absent while allocating.
    pub ipv4: Option<Ipv4Block>,
}

/// IPv4 assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct Ipv4Block {
    /// Address.
    pub ip: String,
}

/// Single server wrapper.
#[derive(Debug, Deserialize)]
pub struct ServerResponse {
    /// Server.
    pub server: CloudServer,
}

/// Create server request for POST /servers.
#[derive(Debug, Serialize)]
pub struct CreateServerRequest {
    /// Server name.
    pub name: String,
    /// Server type name (e.g. "cx22").
    pub server_type: String,
    /// Location name (e.g. "fsn1").
    pub location: String,
    /// Image name or ID.
    pub image: String,
    /// Cloud-init user data (raw).
    pub user_data: String,
    /// SSH key IDs (numeric) or names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<Value>,
    /// Power on after creation.
    pub start_after_create: bool,
}

/// Empty action request body.
#[derive(Debug, Serialize)]
pub struct EmptyBody {}

// ============================================================================
// SSH key types
// ============================================================================

/// SSH key.
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
    /// Pagination.
    #[serde(default)]
    pub meta: Meta,
}

// ============================================================================
// Catalog types
// ============================================================================

/// Location.
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    /// Location name (e.g. "fsn1").
    pub name: String,
    /// Description (e.g. "Falkenstein DC Park 1").
    #[serde(default)]
    pub description: String,
    /// City.
    #[serde(default)]
    pub city: String,
}

/// Location list.
#[derive(Debug, Deserialize)]
pub struct LocationListResponse {
    /// Locations.
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Server type.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerType {
    /// Server type ID.
    pub id: i64,
    /// Name (e.g. "cx22").
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// vCPU count.
    pub cores: u32,
    /// Memory in GB.
    pub memory: f64,
    /// Disk in GB.
    pub disk: u64,
    /// Deprecation flag. Older API versions send a bool, newer ones an
    /// object or null.
    #[serde(default)]
    pub deprecated: Option<Value>,
    /// Prices per location.
    #[serde(default)]
    pub prices: Vec<LocationPrice>,
}

impl ServerType {
    /// Whether the type is marked deprecated in either API format.
    pub fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => true,
        }
    }
}

/// Price entry for one location.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationPrice {
    /// Location name.
    pub location: String,
    /// Monthly price.
    pub price_monthly: Price,
}

/// Net/gross price pair, as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Net price.
    pub net: String,
    /// Gross price.
    pub gross: String,
}

/// Server type list.
#[derive(Debug, Deserialize)]
pub struct ServerTypeListResponse {
    /// Server types.
    #[serde(default)]
    pub server_types: Vec<ServerType>,
    /// Pagination.
    #[serde(default)]
    pub meta: Meta,
}

/// Datacenter.
#[derive(Debug, Clone, Deserialize)]
pub struct Datacenter {
    /// Datacenter name (e.g. "fsn1-dc14").
    pub name: String,
    /// Location the datacenter belongs to.
    pub location: Location,
    /// Server type availability.
    pub server_types: DatacenterServerTypes,
}

/// Server type IDs offered by a datacenter.
#[derive(Debug, Clone, Deserialize)]
pub struct DatacenterServerTypes {
    /// Currently orderable.
    #[serde(default)]
    pub available: Vec<i64>,
}

/// Datacenter list.
#[derive(Debug, Deserialize)]
pub struct DatacenterListResponse {
    /// Datacenters.
    #[serde(default)]
    pub datacenters: Vec<Datacenter>,
}

// ============================================================================
// Image (snapshot) types
// ============================================================================

/// Create image request for POST /servers/{id}/actions/create_image.
#[derive(Debug, Serialize)]
pub struct CreateImageRequest {
    /// Image description.
    pub description: String,
    /// Always "snapshot".
    #[serde(rename = "type")]
    pub image_type: String,
}

/// Image.
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    /// Image ID.
    pub id: i64,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Status: "available", "creating", "unavailable".
    pub status: String,
    /// Size in GB (null while creating).
    pub image_size: Option<f64>,
    /// Disk size in GB.
    #[serde(default)]
    pub disk_size: f64,
    /// Creation timestamp.
    pub created: String,
    /// Source server.
    pub created_from: Option<CreatedFrom>,
}

/// Source server reference.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedFrom {
    /// Server ID.
    pub id: i64,
    /// Server name.
    pub name: String,
}

/// Single image wrapper.
#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    /// Image.
    pub image: Image,
}

/// Image list.
#[derive(Debug, Deserialize)]
pub struct ImageListResponse {
    /// Images.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Pagination.
    #[serde(default)]
    pub meta: Meta,
}

//! Hetzner Cloud API client implementation.
//!
//! API Documentation: <https://docs.hetzner.cloud/>

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::catalog;
use super::models::{
    CloudServer, CreateImageRequest, CreateServerRequest, CreateSshKeyRequest,
    DatacenterListResponse, EmptyBody, Image, ImageListResponse, ImageResponse,
    LocationListResponse, Paged, ServerResponse, ServerTypeListResponse, SshKeyListResponse,
    SshKeyResponse,
};
use crate::config::DeployMode;
use crate::providers::catalog::{fallback_sizes, format_price, meets_floor};
use crate::providers::factory::Vendor;
use crate::providers::http::{ApiClient, ErrorShape};
use crate::providers::traits::{
    estimate_monthly_cost, CloudProvider, ProviderError, ProvisionRequest, ProvisionResult,
    Region, ServerSize, ServerStatus, SnapshotInfo, PENDING_IP,
};

/// Base URL for Hetzner Cloud API.
const API_BASE_URL: &str = "https://api.hetzner.cloud/v1";

/// Default image.
const DEFAULT_IMAGE: &str = "ubuntu-24.04";

/// Snapshot storage price, EUR per GB per month.
const SNAPSHOT_PRICE_PER_GB: f64 = 0.0119;

/// Items per page on list endpoints (API maximum).
const PAGE_SIZE: u32 = 50;

/// Hetzner Cloud provider.
#[derive(Clone)]
pub struct Hetzner {
    api: ApiClient,
}

impl Hetzner {
    /// Create a new Hetzner Cloud provider.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(api_token: Option<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(API_BASE_URL, api_token)
    }

    /// Create a provider against a custom endpoint.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_token: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            api: ApiClient::new("hetzner", base_url, api_token, ErrorShape::ErrorObject)?,
        })
    }

    /// Map Hetzner server status onto the shared vocabulary.
    pub(crate) fn map_status(raw: &str) -> ServerStatus {
        match raw {
            "initializing" | "starting" => ServerStatus::Initializing,
            "running" => ServerStatus::Running,
            "off" | "stopping" => ServerStatus::Off,
            "deleting" | "migrating" | "rebuilding" => ServerStatus::other(raw),
            _ => ServerStatus::Unknown,
        }
    }

    /// Convert a Hetzner server to a provisioning result.
    pub(crate) fn to_result(server: &CloudServer) -> ProvisionResult {
        let ip = server
            .public_net
            .ipv4
            .as_ref()
            .map(|v4| v4.ip.clone())
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| PENDING_IP.to_string());

        ProvisionResult {
            id: server.id.to_string(),
            ip,
            status: Self::map_status(&server.status),
        }
    }

    fn to_snapshot(image: &Image) -> SnapshotInfo {
        let size_gb = image.image_size.unwrap_or(image.disk_size);
        SnapshotInfo {
            id: image.id.to_string(),
            server_id: image.created_from.as_ref().map(|s| s.id.to_string()),
            name: image.description.clone(),
            status: image.status.clone(),
            size_gb,
            created_at: image.created.clone(),
            monthly_cost: estimate_monthly_cost(size_gb, SNAPSHOT_PRICE_PER_GB, "€"),
        }
    }

    /// GET a list endpoint, following `meta.pagination.next_page`.
    async fn get_all<R>(&self, path: &str) -> Result<Vec<R::Item>, ProviderError>
    where
        R: Paged + Send,
        R::Item: Send,
    {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let resp: R = self
                .api
                .get(&format!("{path}{separator}per_page={PAGE_SIZE}&page={page}"))
                .await?;
            let (batch, next_page) = resp.into_page();
            items.extend(batch);
            match next_page {
                Some(next) if next > page => page = next,
                _ => return Ok(items),
            }
        }
    }

    async fn live_locations(&self) -> Result<Vec<Region>, ProviderError> {
        let resp: LocationListResponse = self.api.get("/locations").await?;
        Ok(resp
            .locations
            .into_iter()
            .map(|l| {
                let name = if l.city.is_empty() { l.description } else { l.city };
                Region::new(l.name, name)
            })
            .collect())
    }

    async fn live_server_types(
        &self,
        region: &str,
        mode: DeployMode,
    ) -> Result<Vec<ServerSize>, ProviderError> {
        let types = self.get_all::<ServerTypeListResponse>("/server_types").await?;
        let datacenters: DatacenterListResponse = self.api.get("/datacenters").await?;

        let available: Vec<i64> = datacenters
            .datacenters
            .iter()
            .filter(|dc| dc.location.name == region)
            .flat_map(|dc| dc.server_types.available.iter().copied())
            .collect();

        Ok(types
            .iter()
            .filter(|t| !t.is_deprecated() && available.contains(&t.id))
            .map(|t| {
                let price = t
                    .prices
                    .iter()
                    .find(|p| p.location == region)
                    .map_or_else(
                        || "n/a".to_string(),
                        |p| format_price("€", &p.price_monthly.gross),
                    );
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let memory_mb = (t.memory * 1024.0).round() as u64;
                ServerSize {
                    id: t.name.clone(),
                    name: if t.description.is_empty() {
                        t.name.clone()
                    } else {
                        t.description.clone()
                    },
                    vcpus: t.cores,
                    memory_mb,
                    disk_gb: t.disk,
                    price_monthly: price,
                }
            })
            .filter(|s| meets_floor(s, mode))
            .collect())
    }
}

#[async_trait]
impl CloudProvider for Hetzner {
    fn vendor(&self) -> Vendor {
        Vendor::Hetzner
    }

    async fn validate_token(&self, token: &str) -> bool {
        self.api.check_token("/locations", token).await
    }

    async fn upload_ssh_key(&self, name: &str, public_key: &str) -> Result<String, ProviderError> {
        let body = CreateSshKeyRequest {
            name: name.to_string(),
            public_key: public_key.trim().to_string(),
        };

        match self.api.post::<SshKeyResponse, _>("/ssh_keys", &body).await {
            Ok(resp) => {
                info!(key_id = resp.ssh_key.id, name = %name, "Uploaded SSH key");
                Ok(resp.ssh_key.id.to_string())
            }
            Err(e) if e.is_conflict() => {
                debug!(name = %name, "SSH key conflict, searching existing keys");
                let existing = self.get_all::<SshKeyListResponse>("/ssh_keys").await?;
                existing
                    .iter()
                    .find(|k| k.public_key.trim() == public_key.trim())
                    .map(|k| k.id.to_string())
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_server(
        &self,
        req: &ProvisionRequest,
    ) -> Result<ProvisionResult, ProviderError> {
        info!(
            name = %req.name,
            server_type = %req.size,
            location = %req.region,
            "Creating Hetzner Cloud server"
        );

        let body = CreateServerRequest {
            name: req.name.clone(),
            server_type: req.size.clone(),
            location: req.region.clone(),
            image: req.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            user_data: req.boot_script.clone(),
            ssh_keys: req
                .ssh_key_ids
                .iter()
                .map(|k| k.parse::<i64>().map_or_else(|_| Value::from(k.as_str()), Value::from))
                .collect(),
            start_after_create: true,
        };

        let resp: ServerResponse = self.api.post("/servers", &body).await?;
        let result = Self::to_result(&resp.server);
        info!(server_id = %result.id, status = %result.status, "Server created");
        Ok(result)
    }

    async fn get_server_details(&self, id: &str) -> Result<ProvisionResult, ProviderError> {
        let resp: ServerResponse = self.api.get(&format!("/servers/{id}")).await?;
        Ok(Self::to_result(&resp.server))
    }

    async fn destroy_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Deleting server");
        self.api.delete(&format!("/servers/{id}")).await
    }

    async fn reboot_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Rebooting server");
        self.api
            .post_empty(&format!("/servers/{id}/actions/reboot"), &EmptyBody {})
            .await
    }

    fn get_regions(&self) -> Vec<Region> {
        catalog::regions()
    }

    fn get_server_sizes(&self) -> Vec<ServerSize> {
        catalog::sizes()
    }

    async fn get_available_locations(&self) -> Vec<Region> {
        match self.live_locations().await {
            Ok(regions) if !regions.is_empty() => regions,
            Ok(_) => self.get_regions(),
            Err(e) => {
                warn!(error = %e, "Live location lookup failed, using static catalog");
                self.get_regions()
            }
        }
    }

    async fn get_available_server_types(&self, region: &str, mode: DeployMode) -> Vec<ServerSize> {
        match self.live_server_types(region, mode).await {
            Ok(sizes) if !sizes.is_empty() => sizes,
            Ok(_) => fallback_sizes(self.get_server_sizes(), mode),
            Err(e) => {
                warn!(
                    error = %e,
                    region = %region,
                    "Live server type lookup failed, using static catalog"
                );
                fallback_sizes(self.get_server_sizes(), mode)
            }
        }
    }

    async fn create_snapshot(
        &self,
        server_id: &str,
        name: &str,
    ) -> Result<SnapshotInfo, ProviderError> {
        info!(server_id = %server_id, name = %name, "Creating snapshot");
        let body = CreateImageRequest {
            description: name.to_string(),
            image_type: "snapshot".to_string(),
        };
        let resp: ImageResponse = self
            .api
            .post(&format!("/servers/{server_id}/actions/create_image"), &body)
            .await?;
        Ok(Self::to_snapshot(&resp.image))
    }

    async fn list_snapshots(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<SnapshotInfo>, ProviderError> {
        let images = self.get_all::<ImageListResponse>("/images?type=snapshot").await?;
        Ok(images
            .iter()
            .map(Self::to_snapshot)
            .filter(|s| server_id.is_none_or(|id| s.server_id.as_deref() == Some(id)))
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        info!(snapshot_id = %snapshot_id, "Deleting snapshot");
        self.api.delete(&format!("/images/{snapshot_id}")).await
    }

    async fn get_snapshot_cost_estimate(&self, server_id: &str) -> Result<String, ProviderError> {
        let resp: ServerResponse = self.api.get(&format!("/servers/{server_id}")).await?;
        let disk = resp.server.primary_disk_size.unwrap_or_default();
        Ok(estimate_monthly_cost(disk, SNAPSHOT_PRICE_PER_GB, "€"))
    }
}

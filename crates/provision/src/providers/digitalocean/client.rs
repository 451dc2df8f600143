//! `DigitalOcean` API client implementation.
//!
//! API Documentation: <https://docs.digitalocean.com/reference/api/>

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::catalog;
use super::models::{
    Action, ActionResponse, CreateDropletRequest, CreateSshKeyRequest, Droplet,
    DropletActionRequest, DropletResponse, RegionListResponse, SizeListResponse, Snapshot,
    SnapshotListResponse, SshKeyListResponse, SshKeyResponse,
};
use crate::config::DeployMode;
use crate::providers::catalog::{fallback_sizes, meets_floor};
use crate::providers::factory::Vendor;
use crate::providers::http::{ApiClient, ErrorShape};
use crate::providers::traits::{
    estimate_monthly_cost, CloudProvider, ProviderError, ProvisionRequest, ProvisionResult,
    Region, ServerSize, ServerStatus, SnapshotInfo, PENDING_IP,
};

/// Base URL for `DigitalOcean` API.
const API_BASE_URL: &str = "https://api.digitalocean.com/v2";

/// Default image slug.
const DEFAULT_IMAGE: &str = "ubuntu-24-04-x64";

/// Snapshot storage price, USD per GB per month.
const SNAPSHOT_PRICE_PER_GB: f64 = 0.06;

/// `DigitalOcean` provider.
#[derive(Clone)]
pub struct DigitalOcean {
    api: ApiClient,
}

impl DigitalOcean {
    /// Create a new `DigitalOcean` provider.
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
            api: ApiClient::new("digitalocean", base_url, api_token, ErrorShape::MessageField)?,
        })
    }

    pub(crate) fn map_status(raw: &str) -> ServerStatus {
        match raw {
            "new" => ServerStatus::Initializing,
            "active" => ServerStatus::Running,
            "off" => ServerStatus::Off,
            "archive" => ServerStatus::other(raw),
            _ => ServerStatus::Unknown,
        }
    }

    /// Convert a droplet to a provisioning result.
    pub(crate) fn to_result(droplet: &Droplet) -> ProvisionResult {
        let ip = droplet
            .networks
            .v4
            .iter()
            .find(|ip| ip.address_type == "public")
            .map_or_else(|| PENDING_IP.to_string(), |ip| ip.ip_address.clone());

        ProvisionResult {
            id: droplet.id.to_string(),
            ip,
            status: Self::map_status(&droplet.status),
        }
    }

    fn snapshot_from_list(snapshot: &Snapshot) -> SnapshotInfo {
        SnapshotInfo {
            id: snapshot.id.clone(),
            server_id: Some(snapshot.resource_id.clone()),
            name: snapshot.name.clone(),
            status: "available".to_string(),
            size_gb: snapshot.size_gigabytes,
            created_at: snapshot.created_at.clone(),
            monthly_cost: estimate_monthly_cost(
                snapshot.size_gigabytes,
                SNAPSHOT_PRICE_PER_GB,
                "$",
            ),
        }
    }

    fn snapshot_from_action(action: &Action, server_id: &str, name: &str) -> SnapshotInfo {
        SnapshotInfo {
            id: action.id.to_string(),
            server_id: Some(
                action
                    .resource_id
                    .map_or_else(|| server_id.to_string(), |id| id.to_string()),
            ),
            name: name.to_string(),
            status: action.status.clone(),
            size_gb: 0.0,
            created_at: action.started_at.clone().unwrap_or_default(),
            monthly_cost: "pending".to_string(),
        }
    }

    async fn droplet_action(
        &self,
        id: &str,
        body: &DropletActionRequest,
    ) -> Result<Action, ProviderError> {
        let resp: ActionResponse = self.api.post(&format!("/droplets/{id}/actions"), body).await?;
        debug!(
            action_id = resp.action.id,
            status = %resp.action.status,
            "Droplet action submitted"
        );
        Ok(resp.action)
    }

    async fn live_regions(&self) -> Result<Vec<Region>, ProviderError> {
        let resp: RegionListResponse = self.api.get("/regions?per_page=200").await?;
        Ok(resp
            .regions
            .into_iter()
            .filter(|r| r.available)
            .map(|r| Region::new(r.slug, r.name))
            .collect())
    }

    async fn live_sizes(
        &self,
        region: &str,
        mode: DeployMode,
    ) -> Result<Vec<ServerSize>, ProviderError> {
        let resp: SizeListResponse = self.api.get("/sizes?per_page=200").await?;
        Ok(resp
            .sizes
            .into_iter()
            .filter(|s| s.available && s.regions.iter().any(|r| r == region))
            .map(|s| ServerSize {
                name: if s.description.is_empty() {
                    s.slug.clone()
                } else {
                    format!("{} {}", s.description, s.slug)
                },
                id: s.slug,
                vcpus: s.vcpus,
                memory_mb: s.memory,
                disk_gb: s.disk,
                price_monthly: format!("${:.2}", s.price_monthly),
            })
            .filter(|s| meets_floor(s, mode))
            .collect())
    }
}

#[async_trait]
impl CloudProvider for DigitalOcean {
    fn vendor(&self) -> Vendor {
        Vendor::DigitalOcean
    }

    async fn validate_token(&self, token: &str) -> bool {
        self.api.check_token("/account", token).await
    }

    async fn upload_ssh_key(&self, name: &str, public_key: &str) -> Result<String, ProviderError> {
        let body = CreateSshKeyRequest {
            name: name.to_string(),
            public_key: public_key.trim().to_string(),
        };

        match self.api.post::<SshKeyResponse, _>("/account/keys", &body).await {
            Ok(resp) => {
                info!(key_id = resp.ssh_key.id, name = %name, "Uploaded SSH key");
                Ok(resp.ssh_key.id.to_string())
            }
            Err(e) if e.is_conflict() => {
                debug!(name = %name, "SSH key already registered, searching account keys");
                let existing: SshKeyListResponse =
                    self.api.get("/account/keys?per_page=200").await?;
                existing
                    .ssh_keys
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
            size = %req.size,
            region = %req.region,
            "Creating droplet"
        );

        let body = CreateDropletRequest {
            name: req.name.clone(),
            region: req.region.clone(),
            size: req.size.clone(),
            image: req.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            ssh_keys: req
                .ssh_key_ids
                .iter()
                .map(|k| k.parse::<i64>().map_or_else(|_| Value::from(k.as_str()), Value::from))
                .collect(),
            user_data: req.boot_script.clone(),
            monitoring: true,
        };

        let resp: DropletResponse = self.api.post("/droplets", &body).await?;
        let result = Self::to_result(&resp.droplet);
        info!(server_id = %result.id, status = %result.status, "Droplet created");
        Ok(result)
    }

    async fn get_server_details(&self, id: &str) -> Result<ProvisionResult, ProviderError> {
        let resp: DropletResponse = self.api.get(&format!("/droplets/{id}")).await?;
        Ok(Self::to_result(&resp.droplet))
    }

    async fn destroy_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Deleting droplet");
        self.api.delete(&format!("/droplets/{id}")).await
    }

    async fn reboot_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Rebooting droplet");
        let body = DropletActionRequest {
            action_type: "reboot".to_string(),
            name: None,
        };
        self.droplet_action(id, &body).await.map(|_| ())
    }

    fn get_regions(&self) -> Vec<Region> {
        catalog::regions()
    }

    fn get_server_sizes(&self) -> Vec<ServerSize> {
        catalog::sizes()
    }

    async fn get_available_locations(&self) -> Vec<Region> {
        match self.live_regions().await {
            Ok(regions) if !regions.is_empty() => regions,
            Ok(_) => self.get_regions(),
            Err(e) => {
                warn!(error = %e, "Live region lookup failed, using static catalog");
                self.get_regions()
            }
        }
    }

    async fn get_available_server_types(&self, region: &str, mode: DeployMode) -> Vec<ServerSize> {
        match self.live_sizes(region, mode).await {
            Ok(sizes) if !sizes.is_empty() => sizes,
            Ok(_) => fallback_sizes(self.get_server_sizes(), mode),
            Err(e) => {
                warn!(
                    error = %e,
                    region = %region,
                    "Live size lookup failed, using static catalog"
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
        let body = DropletActionRequest {
            action_type: "snapshot".to_string(),
            name: Some(name.to_string()),
        };
        let action = self.droplet_action(server_id, &body).await?;
        Ok(Self::snapshot_from_action(&action, server_id, name))
    }

    async fn list_snapshots(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<SnapshotInfo>, ProviderError> {
        let resp: SnapshotListResponse = self
            .api
            .get("/snapshots?resource_type=droplet&per_page=200")
            .await?;
        Ok(resp
            .snapshots
            .iter()
            .filter(|s| server_id.is_none_or(|id| s.resource_id == id))
            .map(Self::snapshot_from_list)
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        info!(snapshot_id = %snapshot_id, "Deleting snapshot");
        self.api.delete(&format!("/snapshots/{snapshot_id}")).await
    }

    async fn get_snapshot_cost_estimate(&self, server_id: &str) -> Result<String, ProviderError> {
        let resp: DropletResponse = self.api.get(&format!("/droplets/{server_id}")).await?;
        #[allow(clippy::cast_precision_loss)]
        let disk = resp.droplet.disk as f64;
        Ok(estimate_monthly_cost(disk, SNAPSHOT_PRICE_PER_GB, "$"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::digitalocean::models::{NetworkAddress, Networks};

    #[test]
    fn test_status_mapping() {
        assert_eq!(DigitalOcean::map_status("new"), ServerStatus::Initializing);
        assert_eq!(DigitalOcean::map_status("active"), ServerStatus::Running);
        assert_eq!(DigitalOcean::map_status("off"), ServerStatus::Off);
        assert_eq!(DigitalOcean::map_status("archive"), ServerStatus::Other("archive".into()));
        assert_eq!(DigitalOcean::map_status("ACTIVE"), ServerStatus::Unknown);
    }

    #[test]
    fn test_public_ip_selected() {
        let droplet = Droplet {
            id: 7,
            name: "web".to_string(),
            disk: 50,
            status: "active".to_string(),
            networks: Networks {
                v4: vec![
                    NetworkAddress {
                        ip_address: "10.0.0.5".to_string(),
                        address_type: "private".to_string(),
                    },
                    NetworkAddress {
                        ip_address: "203.0.113.9".to_string(),
                        address_type: "public".to_string(),
                    },
                ],
            },
        };
        let result = DigitalOcean::to_result(&droplet);
        assert_eq!(result.ip, "203.0.113.9");
        assert_eq!(result.status, ServerStatus::Running);
    }

    #[test]
    fn test_new_droplet_has_pending_ip() {
        let droplet = Droplet {
            id: 8,
            name: "web".to_string(),
            disk: 25,
            status: "new".to_string(),
            networks: Networks::default(),
        };
        assert_eq!(DigitalOcean::to_result(&droplet).ip, PENDING_IP);
    }
}

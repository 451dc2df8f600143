//! Vultr API client implementation.
//!
//! API Documentation: <https://www.vultr.com/api/>

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};

use super::catalog;
use super::models::{
    CreateInstanceRequest, CreateSnapshotRequest, CreateSshKeyRequest, Instance,
    InstanceResponse, PlanListResponse, RebootRequest, RegionListResponse, Snapshot,
    SnapshotListResponse, SnapshotResponse, SshKeyListResponse, SshKeyResponse,
};
use crate::config::DeployMode;
use crate::providers::catalog::{fallback_sizes, meets_floor};
use crate::providers::factory::Vendor;
use crate::providers::http::{ApiClient, ErrorShape};
use crate::providers::traits::{
    estimate_monthly_cost, CloudProvider, ProviderError, ProvisionRequest, ProvisionResult,
    Region, ServerSize, ServerStatus, SnapshotInfo, PENDING_IP,
};

/// Base URL for Vultr API.
const API_BASE_URL: &str = "https://api.vultr.com/v2";

/// Ubuntu 24.04 LTS x64.
const DEFAULT_OS_ID: u32 = 2284;

/// Snapshot storage price, USD per GB per month.
const SNAPSHOT_PRICE_PER_GB: f64 = 0.05;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Vultr provider.
#[derive(Clone)]
pub struct Vultr {
    api: ApiClient,
}

impl Vultr {
    /// Create a new Vultr provider.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(api_key: Option<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(API_BASE_URL, api_key)
    }

    /// Create a provider against a custom endpoint.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            api: ApiClient::new("vultr", base_url, api_key, ErrorShape::ErrorString)?,
        })
    }

    /// Map Vultr's three status fields onto the shared vocabulary.
    pub(crate) fn map_status(status: &str, power_status: &str, server_state: &str) -> ServerStatus {
        match (status, power_status) {
            ("pending", _) => ServerStatus::Initializing,
            ("active", "running") if server_state == "ok" => ServerStatus::Running,
            ("active", "running") => ServerStatus::Initializing,
            ("active", "stopped") => ServerStatus::Off,
            ("suspended" | "resizing", _) => ServerStatus::other(status),
            _ => ServerStatus::Unknown,
        }
    }

    /// Convert a Vultr instance to a provisioning result.
    pub(crate) fn to_result(instance: &Instance) -> ProvisionResult {
        let ip = if instance.main_ip.is_empty() || instance.main_ip == "0.0.0.0" {
            PENDING_IP.to_string()
        } else {
            instance.main_ip.clone()
        };

        ProvisionResult {
            id: instance.id.clone(),
            ip,
            status: Self::map_status(
                &instance.status,
                &instance.power_status,
                &instance.server_state,
            ),
        }
    }

    fn to_snapshot(snapshot: &Snapshot) -> SnapshotInfo {
        #[allow(clippy::cast_precision_loss)]
        let size_gb = snapshot.size as f64 / BYTES_PER_GB;
        SnapshotInfo {
            id: snapshot.id.clone(),
            server_id: None,
            name: snapshot.description.clone(),
            status: snapshot.status.clone(),
            size_gb,
            created_at: snapshot.date_created.clone(),
            monthly_cost: estimate_monthly_cost(size_gb, SNAPSHOT_PRICE_PER_GB, "$"),
        }
    }

    async fn live_regions(&self) -> Result<Vec<Region>, ProviderError> {
        let resp: RegionListResponse = self.api.get("/regions?per_page=500").await?;
        Ok(resp
            .regions
            .into_iter()
            .map(|r| Region::new(r.id, format!("{}, {}", r.city, r.country)))
            .collect())
    }

    async fn live_plans(
        &self,
        region: &str,
        mode: DeployMode,
    ) -> Result<Vec<ServerSize>, ProviderError> {
        let resp: PlanListResponse = self.api.get("/plans?type=vc2&per_page=500").await?;
        Ok(resp
            .plans
            .into_iter()
            .filter(|p| p.locations.iter().any(|l| l == region))
            .map(|p| ServerSize {
                name: p.id.clone(),
                id: p.id,
                vcpus: p.vcpu_count,
                memory_mb: p.ram,
                disk_gb: p.disk,
                price_monthly: format!("${:.2}", p.monthly_cost),
            })
            .filter(|s| meets_floor(s, mode))
            .collect())
    }
}

#[async_trait]
impl CloudProvider for Vultr {
    fn vendor(&self) -> Vendor {
        Vendor::Vultr
    }

    async fn validate_token(&self, token: &str) -> bool {
        self.api.check_token("/account", token).await
    }

    async fn upload_ssh_key(&self, name: &str, public_key: &str) -> Result<String, ProviderError> {
        let body = CreateSshKeyRequest {
            name: name.to_string(),
            ssh_key: public_key.trim().to_string(),
        };

        match self.api.post::<SshKeyResponse, _>("/ssh-keys", &body).await {
            Ok(resp) => {
                info!(key_id = %resp.ssh_key.id, name = %name, "Uploaded SSH key");
                Ok(resp.ssh_key.id)
            }
            Err(e) if e.is_conflict() => {
                debug!(name = %name, "SSH key already registered, searching account keys");
                let existing: SshKeyListResponse = self.api.get("/ssh-keys?per_page=500").await?;
                existing
                    .ssh_keys
                    .into_iter()
                    .find(|k| k.ssh_key.trim() == public_key.trim())
                    .map(|k| k.id)
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
            label = %req.name,
            plan = %req.size,
            region = %req.region,
            "Creating Vultr instance"
        );

        let (os_id, image_id) = match &req.image {
            Some(image) => (None, Some(image.clone())),
            None => (Some(DEFAULT_OS_ID), None),
        };

        let body = CreateInstanceRequest {
            region: req.region.clone(),
            plan: req.size.clone(),
            os_id,
            image_id,
            label: req.name.clone(),
            hostname: req.name.clone(),
            sshkey_id: req.ssh_key_ids.clone(),
            user_data: STANDARD.encode(&req.boot_script),
            backups: "disabled".to_string(),
        };

        let resp: InstanceResponse = self.api.post("/instances", &body).await?;
        let result = Self::to_result(&resp.instance);
        info!(server_id = %result.id, status = %result.status, "Instance created");
        Ok(result)
    }

    async fn get_server_details(&self, id: &str) -> Result<ProvisionResult, ProviderError> {
        let resp: InstanceResponse = self.api.get(&format!("/instances/{id}")).await?;
        Ok(Self::to_result(&resp.instance))
    }

    async fn destroy_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Deleting instance");
        self.api.delete(&format!("/instances/{id}")).await
    }

    async fn reboot_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Rebooting instance");
        self.api
            .post_empty(&format!("/instances/{id}/reboot"), &RebootRequest {})
            .await
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
        match self.live_plans(region, mode).await {
            Ok(sizes) if !sizes.is_empty() => sizes,
            Ok(_) => fallback_sizes(self.get_server_sizes(), mode),
            Err(e) => {
                warn!(
                    error = %e,
                    region = %region,
                    "Live plan lookup failed, using static catalog"
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
        let body = CreateSnapshotRequest {
            instance_id: server_id.to_string(),
            description: name.to_string(),
        };
        let resp: SnapshotResponse = self.api.post("/snapshots", &body).await?;
        let mut info = Self::to_snapshot(&resp.snapshot);
        info.server_id = Some(server_id.to_string());
        Ok(info)
    }

    async fn list_snapshots(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<SnapshotInfo>, ProviderError> {
        if server_id.is_some() {
            debug!("Vultr snapshots do not record their source instance, listing all");
        }
        let resp: SnapshotListResponse = self.api.get("/snapshots?per_page=500").await?;
        Ok(resp.snapshots.iter().map(Self::to_snapshot).collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        info!(snapshot_id = %snapshot_id, "Deleting snapshot");
        self.api.delete(&format!("/snapshots/{snapshot_id}")).await
    }

    async fn get_snapshot_cost_estimate(&self, server_id: &str) -> Result<String, ProviderError> {
        let resp: InstanceResponse = self.api.get(&format!("/instances/{server_id}")).await?;
        #[allow(clippy::cast_precision_loss)]
        let disk = resp.instance.disk as f64;
        Ok(estimate_monthly_cost(disk, SNAPSHOT_PRICE_PER_GB, "$"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(status: &str, power: &str, state: &str, ip: &str) -> Instance {
        Instance {
            id: "abc-123".to_string(),
            label: "node".to_string(),
            main_ip: ip.to_string(),
            disk: 80,
            status: status.to_string(),
            power_status: power.to_string(),
            server_state: state.to_string(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Vultr::map_status("pending", "stopped", "none"), ServerStatus::Initializing);
        assert_eq!(Vultr::map_status("active", "running", "ok"), ServerStatus::Running);
        assert_eq!(
            Vultr::map_status("active", "running", "installingbooting"),
            ServerStatus::Initializing
        );
        assert_eq!(Vultr::map_status("active", "stopped", "ok"), ServerStatus::Off);
        assert_eq!(
            Vultr::map_status("suspended", "stopped", "ok"),
            ServerStatus::Other("suspended".into())
        );
        assert_eq!(Vultr::map_status("closed", "", ""), ServerStatus::Unknown);
    }

    #[test]
    fn test_zero_address_is_pending() {
        let result = Vultr::to_result(&instance("pending", "stopped", "none", "0.0.0.0"));
        assert_eq!(result.ip, PENDING_IP);

        let result = Vultr::to_result(&instance("active", "running", "ok", "45.76.1.2"));
        assert_eq!(result.ip, "45.76.1.2");
        assert_eq!(result.status, ServerStatus::Running);
    }

    #[test]
    fn test_snapshot_size_in_gb() {
        let snap = Snapshot {
            id: "s1".to_string(),
            date_created: "2024-01-01T00:00:00+00:00".to_string(),
            description: "nightly".to_string(),
            size: 10 * 1024 * 1024 * 1024,
            status: "complete".to_string(),
        };
        let info = Vultr::to_snapshot(&snap);
        assert!((info.size_gb - 10.0).abs() < f64::EPSILON);
        assert_eq!(info.monthly_cost, "~$0.50/month");
    }
}

//! Linode API v4 client implementation.
//!
//! API Documentation: <https://techdocs.akamai.com/linode-api/reference/api>

use std::net::Ipv4Addr;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog;
use super::models::{
    Backup, BackupsResponse, CreateBackupRequest, CreateInstanceRequest, CreateSshKeyRequest,
    EmptyBody, LinodeInstance, LinodeRegion, LinodeType, Metadata, Page, Profile,
    RegionAvailability, SshKey,
};
use crate::config::DeployMode;
use crate::providers::catalog::{fallback_sizes, meets_floor};
use crate::providers::factory::Vendor;
use crate::providers::http::{ApiClient, ErrorShape};
use crate::providers::traits::{
    estimate_monthly_cost, CloudProvider, ProviderError, ProvisionRequest, ProvisionResult,
    Region, ServerSize, ServerStatus, SnapshotInfo, PENDING_IP,
};

/// Base URL for Linode API.
const API_BASE_URL: &str = "https://api.linode.com/v4";

/// Default image.
const DEFAULT_IMAGE: &str = "linode/ubuntu24.04";

/// Backup service heuristic, USD per GB per month.
const BACKUP_PRICE_PER_GB: f64 = 0.10;

/// Linode provider.
#[derive(Clone)]
pub struct Linode {
    api: ApiClient,
}

impl Linode {
    /// Create a new Linode provider.
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
            api: ApiClient::new("linode", base_url, api_token, ErrorShape::ReasonArray)?,
        })
    }

    pub(crate) fn map_status(raw: &str) -> ServerStatus {
        match raw {
            "provisioning" | "booting" => ServerStatus::Initializing,
            "running" => ServerStatus::Running,
            "offline" | "shutting_down" | "stopped" => ServerStatus::Off,
            "rebooting" | "deleting" | "migrating" | "rebuilding" | "cloning" | "restoring"
            | "resizing" => ServerStatus::other(raw),
            _ => ServerStatus::Unknown,
        }
    }

    /// First public IPv4, skipping private ranges.
    fn public_ipv4(addresses: &[String]) -> Option<String> {
        addresses
            .iter()
            .find(|a| a.parse::<Ipv4Addr>().is_ok_and(|ip| !ip.is_private()))
            .cloned()
    }

    pub(crate) fn to_result(instance: &LinodeInstance) -> ProvisionResult {
        ProvisionResult {
            id: instance.id.to_string(),
            ip: Self::public_ipv4(&instance.ipv4).unwrap_or_else(|| PENDING_IP.to_string()),
            status: Self::map_status(&instance.status),
        }
    }

    fn to_snapshot(backup: &Backup, server_id: &str) -> SnapshotInfo {
        #[allow(clippy::cast_precision_loss)]
        let size_gb = backup.disks.iter().map(|d| d.size).sum::<u64>() as f64 / 1024.0;
        SnapshotInfo {
            id: backup.id.to_string(),
            server_id: Some(server_id.to_string()),
            name: backup.label.clone().unwrap_or_else(|| "automatic".to_string()),
            status: backup.status.clone(),
            size_gb,
            created_at: backup.created.clone(),
            monthly_cost: estimate_monthly_cost(size_gb, BACKUP_PRICE_PER_GB, "$"),
        }
    }

    fn root_password() -> String {
        format!("{}A!{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    async fn profile(&self) -> Result<Profile, ProviderError> {
        self.api.get("/profile").await
    }

    async fn backups_of(&self, server_id: &str) -> Result<Vec<SnapshotInfo>, ProviderError> {
        let resp: BackupsResponse = self
            .api
            .get(&format!("/linode/instances/{server_id}/backups"))
            .await?;
        Ok(resp
            .automatic
            .iter()
            .chain(resp.snapshot.current.iter())
            .chain(resp.snapshot.in_progress.iter())
            .map(|b| Self::to_snapshot(b, server_id))
            .collect())
    }

    async fn live_regions(&self) -> Result<Vec<Region>, ProviderError> {
        let resp: Page<LinodeRegion> = self.api.get("/regions").await?;
        Ok(resp
            .data
            .into_iter()
            .filter(|r| r.status.is_empty() || r.status == "ok")
            .map(|r| Region::new(r.id, r.label))
            .collect())
    }

    async fn live_types(
        &self,
        region: &str,
        mode: DeployMode,
    ) -> Result<Vec<ServerSize>, ProviderError> {
        let resp: Page<LinodeType> = self.api.get("/linode/types").await?;

        // Only capacity-limited plans show up here.
        let unavailable: Vec<String> = match self
            .api
            .get::<Vec<RegionAvailability>>(&format!("/regions/{region}/availability"))
            .await
        {
            Ok(entries) => entries.into_iter().filter(|e| !e.available).map(|e| e.plan).collect(),
            Err(e) => {
                debug!(error = %e, region = %region, "Region availability lookup failed");
                Vec::new()
            }
        };

        Ok(resp
            .data
            .into_iter()
            .filter(|t| t.successor.is_none() && !unavailable.contains(&t.id))
            .map(|t| ServerSize {
                name: if t.label.is_empty() { t.id.clone() } else { t.label },
                id: t.id,
                vcpus: t.vcpus,
                memory_mb: t.memory,
                disk_gb: t.disk / 1024,
                price_monthly: format!("${:.2}", t.price.monthly),
            })
            .filter(|s| meets_floor(s, mode))
            .collect())
    }
}

#[async_trait]
impl CloudProvider for Linode {
    fn vendor(&self) -> Vendor {
        Vendor::Linode
    }

    async fn validate_token(&self, token: &str) -> bool {
        self.api.check_token("/profile", token).await
    }

    async fn upload_ssh_key(&self, name: &str, public_key: &str) -> Result<String, ProviderError> {
        let body = CreateSshKeyRequest {
            label: name.to_string(),
            ssh_key: public_key.trim().to_string(),
        };

        match self.api.post::<SshKey, _>("/profile/sshkeys", &body).await {
            Ok(key) => {
                info!(key_id = key.id, name = %name, "Uploaded SSH key");
                Ok(key.id.to_string())
            }
            Err(e) if e.is_conflict() => {
                debug!(name = %name, "SSH key already registered, searching profile keys");
                let existing: Page<SshKey> = self.api.get("/profile/sshkeys").await?;
                existing
                    .data
                    .iter()
                    .find(|k| k.ssh_key.trim() == public_key.trim())
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
            label = %req.name,
            instance_type = %req.size,
            region = %req.region,
            "Creating Linode"
        );

        // Linode installs every key on the user's profile rather than by id.
        let authorized_users = if req.ssh_key_ids.is_empty() {
            Vec::new()
        } else {
            vec![self.profile().await?.username]
        };

        let body = CreateInstanceRequest {
            label: req.name.clone(),
            region: req.region.clone(),
            instance_type: req.size.clone(),
            image: req.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            root_pass: Self::root_password(),
            authorized_users,
            metadata: Metadata {
                user_data: STANDARD.encode(&req.boot_script),
            },
            booted: true,
        };

        let instance: LinodeInstance = self.api.post("/linode/instances", &body).await?;
        let result = Self::to_result(&instance);
        info!(server_id = %result.id, status = %result.status, "Linode created");
        Ok(result)
    }

    async fn get_server_details(&self, id: &str) -> Result<ProvisionResult, ProviderError> {
        let instance: LinodeInstance = self.api.get(&format!("/linode/instances/{id}")).await?;
        Ok(Self::to_result(&instance))
    }

    async fn destroy_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Deleting Linode");
        self.api.delete(&format!("/linode/instances/{id}")).await
    }

    async fn reboot_server(&self, id: &str) -> Result<(), ProviderError> {
        info!(server_id = %id, "Rebooting Linode");
        self.api
            .post_empty(&format!("/linode/instances/{id}/reboot"), &EmptyBody {})
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
        match self.live_types(region, mode).await {
            Ok(sizes) if !sizes.is_empty() => sizes,
            Ok(_) => fallback_sizes(self.get_server_sizes(), mode),
            Err(e) => {
                warn!(
                    error = %e,
                    region = %region,
                    "Live type lookup failed, using static catalog"
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
        info!(server_id = %server_id, name = %name, "Creating manual backup");
        let body = CreateBackupRequest {
            label: name.to_string(),
        };
        let backup: Backup = self
            .api
            .post(&format!("/linode/instances/{server_id}/backups"), &body)
            .await?;
        Ok(Self::to_snapshot(&backup, server_id))
    }

    async fn list_snapshots(
        &self,
        server_id: Option<&str>,
    ) -> Result<Vec<SnapshotInfo>, ProviderError> {
        if let Some(id) = server_id {
            return self.backups_of(id).await;
        }

        let instances: Page<LinodeInstance> = self.api.get("/linode/instances").await?;
        let mut all = Vec::new();
        for instance in instances.data {
            let id = instance.id.to_string();
            match self.backups_of(&id).await {
                Ok(mut backups) => all.append(&mut backups),
                Err(e) => debug!(server_id = %id, error = %e, "Skipping instance without backups"),
            }
        }
        Ok(all)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "Linode backups cannot be deleted individually (backup {snapshot_id}); \
             they rotate automatically"
        )))
    }

    async fn get_snapshot_cost_estimate(&self, server_id: &str) -> Result<String, ProviderError> {
        let instance: LinodeInstance = self
            .api
            .get(&format!("/linode/instances/{server_id}"))
            .await?;
        #[allow(clippy::cast_precision_loss)]
        let disk_gb = instance.specs.disk as f64 / 1024.0;
        Ok(estimate_monthly_cost(disk_gb, BACKUP_PRICE_PER_GB, "$"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::linode::models::Specs;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Linode::map_status("provisioning"), ServerStatus::Initializing);
        assert_eq!(Linode::map_status("booting"), ServerStatus::Initializing);
        assert_eq!(Linode::map_status("running"), ServerStatus::Running);
        assert_eq!(Linode::map_status("offline"), ServerStatus::Off);
        assert_eq!(Linode::map_status("shutting_down"), ServerStatus::Off);
        assert_eq!(Linode::map_status("cloning"), ServerStatus::Other("cloning".into()));
        assert_eq!(Linode::map_status("billing_failure"), ServerStatus::Unknown);
    }

    #[test]
    fn test_private_addresses_skipped() {
        let instance = LinodeInstance {
            id: 99,
            label: "node".to_string(),
            status: "running".to_string(),
            ipv4: vec!["192.168.130.4".to_string(), "172.105.9.9".to_string()],
            specs: Specs::default(),
        };
        assert_eq!(Linode::to_result(&instance).ip, "172.105.9.9");

        let instance = LinodeInstance {
            ipv4: vec!["192.168.130.4".to_string()],
            ..instance
        };
        assert_eq!(Linode::to_result(&instance).ip, PENDING_IP);
    }

    #[test]
    fn test_root_password_has_mixed_classes() {
        let pass = Linode::root_password();
        assert!(pass.len() >= 64);
        assert!(pass.chars().any(|c| c.is_ascii_uppercase()));
        assert!(pass.contains('!'));
        assert_ne!(pass, Linode::root_password());
    }
}

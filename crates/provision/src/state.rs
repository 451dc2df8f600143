//! Server records and the pending-creation journal, persisted as JSON.
//!
//! Both stores assume a single writer; concurrent runs against the same file
//! can lose updates.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::collaborators::{CreationJournal, ServerStore};
use crate::config::DeployMode;
use crate::providers::{ProvisionRequest, Vendor};

/// A provisioned server, written once per successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Vendor server ID.
    pub id: String,
    /// Server name.
    pub name: String,
    /// Vendor.
    pub vendor: Vendor,
    /// Public IP, or `"pending"` if it was never resolved.
    pub ip: String,
    /// Region id.
    pub region: String,
    /// Size id.
    pub size: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Deploy mode.
    pub mode: DeployMode,
}

/// A vendor creation call that has been issued but not yet recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCreation {
    /// Run ID.
    pub run_id: String,
    /// Vendor.
    pub vendor: Vendor,
    /// Server name.
    pub name: String,
    /// Region id.
    pub region: String,
    /// Size id.
    pub size: String,
    /// When the creation call started.
    pub started_at: DateTime<Utc>,
}

impl PendingCreation {
    /// New entry for `request`, with a fresh run ID.
    #[must_use]
    pub fn for_request(vendor: Vendor, request: &ProvisionRequest) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            vendor,
            name: request.name.clone(),
            region: request.region.clone(),
            size: request.size.clone(),
            started_at: Utc::now(),
        }
    }
}

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(T::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .context("Failed to create state directory")?;
    }
    let content = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// [`ServerStore`] backed by a JSON array file.
#[derive(Debug, Clone)]
pub struct JsonServerStore {
    path: PathBuf,
}

impl JsonServerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ServerStore for JsonServerStore {
    async fn save(&self, record: &ServerRecord) -> Result<()> {
        let mut records: Vec<ServerRecord> = read_json(&self.path).await?;
        records.push(record.clone());
        write_json(&self.path, &records).await?;
        info!(server_id = %record.id, path = %self.path.display(), "Saved server record");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ServerRecord>> {
        read_json(&self.path).await
    }
}

/// [`CreationJournal`] backed by a JSON array file.
#[derive(Debug, Clone)]
pub struct JsonCreationJournal {
    path: PathBuf,
}

impl JsonCreationJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CreationJournal for JsonCreationJournal {
    async fn begin(&self, entry: &PendingCreation) -> Result<()> {
        let mut entries: Vec<PendingCreation> = read_json(&self.path).await?;
        entries.push(entry.clone());
        write_json(&self.path, &entries).await?;
        debug!(run_id = %entry.run_id, name = %entry.name, "Journaled pending creation");
        Ok(())
    }

    async fn complete(&self, run_id: &str) -> Result<()> {
        let mut entries: Vec<PendingCreation> = read_json(&self.path).await?;
        let before = entries.len();
        entries.retain(|e| e.run_id != run_id);
        if entries.len() != before {
            write_json(&self.path, &entries).await?;
            debug!(run_id = %run_id, "Cleared pending creation");
        }
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<PendingCreation>> {
        read_json(&self.path).await
    }
}

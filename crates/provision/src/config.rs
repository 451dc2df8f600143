//! Provisioning configuration types.
//!
//! [`ProvisionOptions`] is the validated request handed to the orchestrator.
//! [`Settings`] is the optional YAML file with tokens, paths and polling
//! overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;
use crate::poll::PollConfig;
use crate::providers::{ProvisionRequest, Vendor};

/// Directory name under the user config dir.
const APP_DIR: &str = "cto-provision";

static SERVER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,62}$").unwrap());

/// What gets installed on the new server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Plain OS with unattended upgrades, nothing listening.
    Bare,
    /// OS plus the platform container on port 80.
    #[default]
    Platform,
}

impl DeployMode {
    /// Smallest memory size (MB) worth offering for this mode.
    #[must_use]
    pub fn memory_floor_mb(self) -> u64 {
        match self {
            Self::Bare => 512,
            Self::Platform => 2048,
        }
    }

    /// Whether an application layer is installed and can be probed.
    #[must_use]
    pub fn installs_platform(self) -> bool {
        matches!(self, Self::Platform)
    }
}

impl std::fmt::Display for DeployMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare => write!(f, "bare"),
            Self::Platform => write!(f, "platform"),
        }
    }
}

impl std::str::FromStr for DeployMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bare" => Ok(Self::Bare),
            "platform" => Ok(Self::Platform),
            _ => Err(anyhow::anyhow!("Unknown mode: {s}. Supported: bare, platform")),
        }
    }
}

/// Polling budgets for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Status poll until `running`.
    pub boot: PollConfig,
    /// IP poll override; the vendor profile is used when `None`.
    pub ip: Option<PollConfig>,
    /// Reachability wait override; the vendor profile is used when `None`.
    pub readiness_min_wait: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            boot: PollConfig::new(30, Duration::from_secs(1)),
            ip: None,
            readiness_min_wait: None,
        }
    }
}

impl PollSettings {
    /// IP poll budget for `vendor`.
    #[must_use]
    pub fn ip_for(&self, vendor: Vendor) -> PollConfig {
        self.ip.unwrap_or_else(|| vendor.ip_poll())
    }

    /// Minimum reachability wait for `vendor`.
    #[must_use]
    pub fn readiness_for(&self, vendor: Vendor) -> Duration {
        self.readiness_min_wait
            .unwrap_or_else(|| vendor.readiness_min_wait())
    }
}

/// Hardening requested after provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardeningOptions {
    /// Print commands instead of running them.
    pub dry_run: bool,
    /// Move sshd to this port.
    pub ssh_port: Option<u16>,
    /// Apply even if the host looks already hardened.
    pub force: bool,
}

/// Fully enumerated provisioning request.
///
/// Missing `name`, `region` or `size` are chosen through the
/// [`InputSelector`](crate::collaborators::InputSelector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Target vendor.
    pub vendor: Vendor,
    /// Server name.
    pub name: Option<String>,
    /// Region id.
    pub region: Option<String>,
    /// Size id.
    pub size: Option<String>,
    /// Deploy mode.
    pub mode: DeployMode,
    /// Boot script override; the mode's default is rendered otherwise.
    pub boot_script: Option<String>,
    /// Image override.
    pub image: Option<String>,
    /// Already-registered SSH key ids.
    pub ssh_key_ids: Vec<String>,
    /// Public key to register (idempotently) before creation.
    pub ssh_public_key: Option<String>,
    /// Post-provisioning hardening; `None` skips it.
    pub hardening: Option<HardeningOptions>,
    /// Poll budgets.
    pub poll: PollSettings,
}

impl ProvisionOptions {
    /// Options with every optional field unset.
    #[must_use]
    pub fn new(vendor: Vendor, mode: DeployMode) -> Self {
        Self {
            vendor,
            name: None,
            region: None,
            size: None,
            mode,
            boot_script: None,
            image: None,
            ssh_key_ids: Vec::new(),
            ssh_public_key: None,
            hardening: None,
            poll: PollSettings::default(),
        }
    }

    /// Check every supplied field once, before any vendor call.
    ///
    /// # Errors
    /// Returns [`ProvisionError::InvalidRequest`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        let fields = [
            ("region", &self.region),
            ("size", &self.size),
            ("image", &self.image),
        ];
        for (field, value) in fields {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ProvisionError::InvalidRequest(format!("{field} must not be empty")));
            }
        }
        if self.ssh_key_ids.iter().any(|k| k.trim().is_empty()) {
            return Err(ProvisionError::InvalidRequest("ssh key ids must not be empty".into()));
        }
        if let Some(key) = &self.ssh_public_key {
            if !key.trim_start().starts_with("ssh-") && !key.trim_start().starts_with("ecdsa-") {
                return Err(ProvisionError::InvalidRequest(
                    "ssh public key must be in OpenSSH format".into(),
                ));
            }
        }
        if self.poll.boot.max_attempts == 0 {
            return Err(ProvisionError::InvalidRequest(
                "boot poll attempts must be at least 1".into(),
            ));
        }
        if let Some(hardening) = &self.hardening {
            if hardening.ssh_port == Some(0) {
                return Err(ProvisionError::InvalidRequest("ssh port must be non-zero".into()));
            }
        }
        Ok(())
    }

    /// Build the vendor request once name, region and size are settled.
    #[must_use]
    pub fn to_request(
        &self,
        name: &str,
        region: &str,
        size: &str,
        ssh_key_ids: Vec<String>,
    ) -> ProvisionRequest {
        ProvisionRequest {
            name: name.to_string(),
            region: region.to_string(),
            size: size.to_string(),
            boot_script: self
                .boot_script
                .clone()
                .unwrap_or_else(|| crate::cloud_init::render(self.mode)),
            ssh_key_ids,
            image: self.image.clone(),
        }
    }
}

/// Check a server name against the common subset all four vendors accept.
///
/// # Errors
/// Returns [`ProvisionError::InvalidRequest`] when the name is unusable.
pub fn validate_name(name: &str) -> Result<(), ProvisionError> {
    if SERVER_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ProvisionError::InvalidRequest(format!(
            "invalid server name '{name}': use 1-63 letters, digits, '.', '_' or '-'"
        )))
    }
}

// ============================================================================
// Settings file
// ============================================================================

/// Optional YAML settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tokens keyed by vendor name.
    pub tokens: HashMap<Vendor, String>,
    /// Server records file.
    pub records_path: Option<PathBuf>,
    /// Pending-creation journal file.
    pub journal_path: Option<PathBuf>,
    /// Polling overrides.
    pub polling: PollingOverrides,
    /// Reachability probe target.
    pub readiness: ReadinessSettings,
    /// SSH access for hardening.
    pub ssh: SshSettings,
}

/// Polling overrides from the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingOverrides {
    /// Boot status poll attempts.
    pub boot_attempts: Option<u32>,
    /// Seconds between boot status polls.
    pub boot_interval_secs: Option<u64>,
    /// IP poll attempts.
    pub ip_attempts: Option<u32>,
    /// Seconds between IP polls.
    pub ip_interval_secs: Option<u64>,
    /// Minimum seconds to wait for the platform to answer.
    pub readiness_min_wait_secs: Option<u64>,
}

/// Reachability probe target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    /// HTTP port.
    pub port: u16,
    /// Request path.
    pub path: String,
    /// Seconds between probes.
    pub interval_secs: u64,
    /// Checks made after the vendor's minimum wait has elapsed.
    pub max_attempts: u32,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            port: 80,
            path: "/".to_string(),
            interval_secs: 5,
            max_attempts: 60,
        }
    }
}

/// SSH access for hardening.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Login user.
    pub user: String,
    /// Private key file.
    pub identity_file: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            identity_file: None,
        }
    }
}

impl Settings {
    /// Default settings file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.yaml"))
    }

    /// Load settings from `path`, or the default location.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Configured token for `vendor`, ignoring blanks.
    #[must_use]
    pub fn token_for(&self, vendor: Vendor) -> Option<&str> {
        self.tokens
            .get(&vendor)
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// Server records file.
    #[must_use]
    pub fn records_path(&self) -> PathBuf {
        self.records_path
            .clone()
            .unwrap_or_else(|| data_dir().join("servers.json"))
    }

    /// Pending-creation journal file.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.journal_path
            .clone()
            .unwrap_or_else(|| data_dir().join("pending.json"))
    }

    /// Poll budgets with overrides applied.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        let mut poll = PollSettings::default();
        let o = &self.polling;
        if let Some(attempts) = o.boot_attempts {
            poll.boot.max_attempts = attempts;
        }
        if let Some(secs) = o.boot_interval_secs {
            poll.boot.interval = Duration::from_secs(secs);
        }
        if o.ip_attempts.is_some() || o.ip_interval_secs.is_some() {
            poll.ip = Some(PollConfig::new(
                o.ip_attempts.unwrap_or(20),
                Duration::from_secs(o.ip_interval_secs.unwrap_or(3)),
            ));
        }
        poll.readiness_min_wait = o.readiness_min_wait_secs.map(Duration::from_secs);
        poll
    }
}

fn data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

//! Vendor name → adapter construction.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::digitalocean::DigitalOcean;
use super::hetzner::Hetzner;
use super::linode::Linode;
use super::traits::{CloudProvider, ProviderError};
use super::vultr::Vultr;
use crate::poll::PollConfig;

/// Supported cloud vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Hetzner Cloud.
    Hetzner,
    /// `DigitalOcean`.
    DigitalOcean,
    /// Vultr.
    Vultr,
    /// Linode (Akamai).
    Linode,
}

impl Vendor {
    /// All vendors, in display order.
    pub const ALL: [Self; 4] = [Self::Hetzner, Self::DigitalOcean, Self::Vultr, Self::Linode];

    /// Canonical lower-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hetzner => "hetzner",
            Self::DigitalOcean => "digitalocean",
            Self::Vultr => "vultr",
            Self::Linode => "linode",
        }
    }

    /// Environment variables consulted for this vendor's credential, in
    /// priority order.
    #[must_use]
    pub fn token_env_vars(self) -> &'static [&'static str] {
        match self {
            Self::Hetzner => &["HCLOUD_TOKEN", "HETZNER_API_TOKEN"],
            Self::DigitalOcean => &["DIGITALOCEAN_TOKEN", "DO_API_TOKEN"],
            Self::Vultr => &["VULTR_API_KEY"],
            Self::Linode => &["LINODE_TOKEN", "LINODE_API_TOKEN"],
        }
    }

    /// How long and how often to poll for a public IP after creation.
    #[must_use]
    pub fn ip_poll(self) -> PollConfig {
        match self {
            Self::Hetzner | Self::Linode => PollConfig::new(20, Duration::from_secs(3)),
            Self::DigitalOcean => PollConfig::new(30, Duration::from_secs(2)),
            Self::Vultr => PollConfig::new(60, Duration::from_secs(5)),
        }
    }

    /// Minimum time to wait for the platform to answer after boot.
    #[must_use]
    pub fn readiness_min_wait(self) -> Duration {
        match self {
            Self::Hetzner => Duration::from_secs(60),
            Self::DigitalOcean | Self::Linode => Duration::from_secs(90),
            Self::Vultr => Duration::from_secs(120),
        }
    }
}

impl FromStr for Vendor {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hetzner" | "hcloud" => Ok(Self::Hetzner),
            "digitalocean" | "do" => Ok(Self::DigitalOcean),
            "vultr" => Ok(Self::Vultr),
            "linode" => Ok(Self::Linode),
            _ => Err(ProviderError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build an adapter without a credential, for catalog-only use.
///
/// # Errors
/// Returns [`ProviderError::UnknownProvider`] for unrecognized names.
pub fn create_provider(name: &str) -> Result<Arc<dyn CloudProvider>, ProviderError> {
    build(name.parse()?, None)
}

/// Build an adapter bound to `token`.
///
/// # Errors
/// Returns [`ProviderError::UnknownProvider`] for unrecognized names.
pub fn create_provider_with_token(
    name: &str,
    token: &str,
) -> Result<Arc<dyn CloudProvider>, ProviderError> {
    build(name.parse()?, Some(token.to_string()))
}

/// Build an adapter for a parsed vendor.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build(
    vendor: Vendor,
    token: Option<String>,
) -> Result<Arc<dyn CloudProvider>, ProviderError> {
    Ok(match vendor {
        Vendor::Hetzner => Arc::new(Hetzner::new(token)?),
        Vendor::DigitalOcean => Arc::new(DigitalOcean::new(token)?),
        Vendor::Vultr => Arc::new(Vultr::new(token)?),
        Vendor::Linode => Arc::new(Linode::new(token)?),
    })
}

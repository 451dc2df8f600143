//! Multi-vendor VM provisioning for CTO Platform.
//!
//! This crate creates virtual machines on Hetzner Cloud, `DigitalOcean`,
//! Vultr or Linode behind one [`CloudProvider`](providers::CloudProvider)
//! contract, and drives a new server from creation to a persisted, reachable
//! record.
//!
//! # Example
//!
//! ```rust,ignore
//! use cto_provision::config::{DeployMode, ProvisionOptions};
//! use cto_provision::orchestrator::{provision, Collaborators};
//! use cto_provision::providers::Vendor;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut options = ProvisionOptions::new(Vendor::Hetzner, DeployMode::Platform);
//!     options.name = Some("web-1".into());
//!     options.region = Some("fsn1".into());
//!     options.size = Some("cx22".into());
//!
//!     let outcome = provision(&options, &token, collaborators).await?;
//!     println!("{} ready={}", outcome.record.ip, outcome.ready);
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cloud_init;
pub mod collaborators;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod providers;
pub mod readiness;
pub mod remote;
pub mod state;
pub mod ui;

pub use error::ProvisionError;
pub use orchestrator::{provision, Collaborators, ProvisionOutcome, Provisioner};

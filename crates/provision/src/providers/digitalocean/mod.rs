//! `DigitalOcean` Droplet provider.
//!
//! Implements the [`CloudProvider`](crate::providers::CloudProvider) trait for
//! `DigitalOcean` Droplets. Boot scripts are sent as raw `user_data`.

mod catalog;
mod client;
mod models;

pub use client::DigitalOcean;
pub use models::*;

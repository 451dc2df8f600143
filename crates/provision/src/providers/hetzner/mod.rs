//! Hetzner Cloud provider.
//!
//! Implements the [`CloudProvider`](crate::providers::CloudProvider) trait for
//! the Hetzner Cloud API (not the Robot bare metal API).
//!
//! Locations: Germany (Falkenstein, Nuremberg), Finland (Helsinki), US
//! (Ashburn, Hillsboro), Singapore.

mod catalog;
mod client;
mod models;

pub use client::Hetzner;
pub use models::*;

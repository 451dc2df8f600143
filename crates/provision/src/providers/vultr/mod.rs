//! Vultr cloud compute provider.
//!
//! Implements the [`CloudProvider`](crate::providers::CloudProvider) trait for
//! Vultr Cloud Compute instances. User data must be base64 encoded.

mod catalog;
mod client;
mod models;

pub use client::Vultr;
pub use models::*;

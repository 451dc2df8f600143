//! Linode (Akamai) provider.
//!
//! Implements the [`CloudProvider`](crate::providers::CloudProvider) trait for
//! Linode API v4. SSH keys are attached through the account username
//! (`authorized_users`) instead of by id, and "snapshots" are backups.

mod catalog;
mod client;
mod models;

pub use client::Linode;
pub use models::*;

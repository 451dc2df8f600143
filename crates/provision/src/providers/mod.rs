//! Cloud vendor adapters behind one capability contract.

pub mod catalog;
pub mod digitalocean;
pub mod factory;
pub mod hetzner;
pub mod http;
pub mod linode;
mod traits;
pub mod vultr;

pub use factory::{create_provider, create_provider_with_token, Vendor};
pub use traits::{
    estimate_monthly_cost, is_valid_ip, CloudProvider, ProviderError, ProvisionRequest,
    ProvisionResult, Region, ServerSize, ServerStatus, SnapshotInfo, PENDING_IP,
};

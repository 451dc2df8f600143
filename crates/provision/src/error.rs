//! Orchestrator errors.

use thiserror::Error;

use crate::providers::ProviderError;

/// Fatal outcomes of a provisioning run.
///
/// Timeouts while resolving the IP or waiting for reachability and failed
/// hardening steps are not errors; they surface as warnings on
/// [`ProvisionOutcome`](crate::orchestrator::ProvisionOutcome).
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The vendor rejected the credential.
    #[error("Invalid API token for {vendor}")]
    CredentialInvalid { vendor: String },

    /// Request failed validation before any vendor call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Creation was rejected and could not be retried.
    #[error("Server creation failed after {retries} retries: {message}")]
    CreationFailed { retries: u32, message: String },

    /// The server never reported `running`.
    #[error("Server {server_id} did not reach running state after {attempts} status checks")]
    BootTimeout { server_id: String, attempts: u32 },

    /// Provider call failed outside the creation loop.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The input selector could not supply a value.
    #[error("Selection failed: {0}")]
    Selection(String),

    /// The server record could not be saved.
    #[error("Failed to persist server record: {0}")]
    Persistence(String),
}

//! End-to-end provisioning run.
//!
//! Credential validation → creation with classified retries → boot polling →
//! IP polling → reachability polling → persistence → best-effort hardening.

mod creation;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

pub use creation::{
    classify_failure, CreationState, FailureKind, Transition, MAX_CREATE_RETRIES,
};

use crate::collaborators::{
    CreationJournal, Hardening, InputSelector, ReadinessProbe, ServerStore,
};
use crate::config::{validate_name, ProvisionOptions};
use crate::error::ProvisionError;
use crate::poll::{poll_until, PollOutcome};
use crate::providers::factory;
use crate::providers::{
    is_valid_ip, CloudProvider, ProviderError, ProvisionRequest, ProvisionResult, ServerSize,
    ServerStatus, PENDING_IP,
};
use crate::state::{PendingCreation, ServerRecord};

/// Stages of one run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    SelectingInputs,
    Creating,
    AwaitingBoot,
    ResolvingIp,
    AwaitingReachability,
    Persisting,
    RunningFollowups,
    Done,
}

impl ProvisionStage {
    /// Stage after this one on the success path.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::SelectingInputs => Self::Creating,
            Self::Creating => Self::AwaitingBoot,
            Self::AwaitingBoot => Self::ResolvingIp,
            Self::ResolvingIp => Self::AwaitingReachability,
            Self::AwaitingReachability => Self::Persisting,
            Self::Persisting => Self::RunningFollowups,
            Self::RunningFollowups | Self::Done => Self::Done,
        }
    }
}

/// External services a run depends on.
#[derive(Clone)]
pub struct Collaborators {
    /// Supplies missing and replacement inputs.
    pub selector: Arc<dyn InputSelector>,
    /// Receives the final record.
    pub store: Arc<dyn ServerStore>,
    /// Records in-flight creations; skipped when `None`.
    pub journal: Option<Arc<dyn CreationJournal>>,
    /// Application probe; reachability is skipped when `None`.
    pub readiness: Option<Arc<dyn ReadinessProbe>>,
    /// Hardening steps; skipped when `None`.
    pub hardening: Option<Arc<dyn Hardening>>,
}

/// Successful run.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    /// Persisted record.
    pub record: ServerRecord,
    /// Whether the server is usable (probe result, or IP known when unprobed).
    pub ready: bool,
    /// Non-fatal problems, one per failed step.
    pub warnings: Vec<String>,
    /// Creation retries consumed.
    pub retries: u32,
}

/// A server the vendor accepted, plus the request that produced it.
struct Created {
    result: ProvisionResult,
    request: ProvisionRequest,
    retries: u32,
    run_id: String,
}

/// Vendor message of a creation failure, already scrubbed by the adapter.
fn creation_message(err: &ProviderError) -> String {
    match err {
        ProviderError::Api { message, .. } | ProviderError::NotFound(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Drives one provisioning run against one adapter.
pub struct Provisioner {
    provider: Arc<dyn CloudProvider>,
    token: String,
    collaborators: Collaborators,
}

impl Provisioner {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        token: impl Into<String>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            provider,
            token: token.into(),
            collaborators,
        }
    }

    /// Run every stage.
    ///
    /// # Errors
    /// Returns error on invalid input or credential, unrecoverable creation
    /// failure, boot timeout, or failed persistence.
    pub async fn run(
        &self,
        options: &ProvisionOptions,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let vendor = self.provider.vendor();
        let mut stage = ProvisionStage::SelectingInputs;
        let mut warnings = Vec::new();

        // SelectingInputs
        options.validate()?;
        if !self.provider.validate_token(&self.token).await {
            return Err(ProvisionError::CredentialInvalid {
                vendor: vendor.to_string(),
            });
        }
        let request = self.initial_request(options).await?;
        stage = self.advance(stage);

        // Creating
        let Created {
            result: created,
            request,
            retries,
            run_id,
        } = self.create_with_retries(options, request).await?;
        stage = self.advance(stage);

        // AwaitingBoot
        self.await_boot(options, &created.id).await?;
        stage = self.advance(stage);

        // ResolvingIp
        let ip = if created.has_address() {
            created.ip.clone()
        } else if let Some(ip) = self.resolve_ip(options, &created.id).await {
            ip
        } else {
            let msg = format!(
                "Public IP for server {} was not assigned in time; \
                 look it up in the {vendor} console",
                created.id
            );
            warn!(server_id = %created.id, "IP resolution timed out");
            warnings.push(msg);
            PENDING_IP.to_string()
        };
        stage = self.advance(stage);

        // AwaitingReachability
        let has_ip = is_valid_ip(&ip);
        let ready = match &self.collaborators.readiness {
            Some(probe) if has_ip && options.mode.installs_platform() => {
                let min_wait = options.poll.readiness_for(vendor);
                info!(
                    ip = %ip,
                    min_wait_secs = min_wait.as_secs(),
                    "Waiting for platform to respond"
                );
                let ok = probe.wait_for_ready(&ip, min_wait).await;
                if !ok {
                    warn!(ip = %ip, "Platform did not respond in time");
                    warnings.push(format!(
                        "Platform on {ip} did not respond yet; it may still be starting"
                    ));
                }
                ok
            }
            _ => has_ip,
        };
        stage = self.advance(stage);

        // Persisting
        let record = ServerRecord {
            id: created.id.clone(),
            name: request.name.clone(),
            vendor,
            ip: ip.clone(),
            region: request.region.clone(),
            size: request.size.clone(),
            created_at: Utc::now(),
            mode: options.mode,
        };
        self.collaborators
            .store
            .save(&record)
            .await
            .map_err(|e| ProvisionError::Persistence(format!("{e:#}")))?;
        self.journal_complete(&run_id).await;
        stage = self.advance(stage);

        // RunningFollowups
        if let Some(hardening) = &options.hardening {
            self.run_followups(&record, hardening, &mut warnings).await;
        }
        stage = self.advance(stage);
        debug_assert_eq!(stage, ProvisionStage::Done);

        info!(
            server_id = %record.id,
            ip = %record.ip,
            ready,
            retries,
            warnings = warnings.len(),
            "Provisioning complete"
        );

        Ok(ProvisionOutcome {
            record,
            ready,
            warnings,
            retries,
        })
    }

    fn advance(&self, stage: ProvisionStage) -> ProvisionStage {
        let next = stage.next();
        debug!(vendor = %self.provider.vendor(), from = ?stage, to = ?next, "Stage transition");
        next
    }

    async fn initial_request(
        &self,
        options: &ProvisionOptions,
    ) -> Result<ProvisionRequest, ProvisionError> {
        let selector = &self.collaborators.selector;

        let name = match &options.name {
            Some(name) => name.clone(),
            None => {
                let name = selector
                    .choose_name(None, None)
                    .await
                    .map_err(|e| ProvisionError::Selection(format!("{e:#}")))?;
                validate_name(&name)?;
                name
            }
        };

        let region = match &options.region {
            Some(region) => region.clone(),
            None => {
                let regions = self.provider.get_available_locations().await;
                selector
                    .choose_region(&regions)
                    .await
                    .map_err(|e| ProvisionError::Selection(format!("{e:#}")))?
            }
        };

        let size = match &options.size {
            Some(size) => size.clone(),
            None => {
                let sizes = self.provider.get_available_server_types(&region, options.mode).await;
                selector
                    .choose_size(&region, &sizes)
                    .await
                    .map_err(|e| ProvisionError::Selection(format!("{e:#}")))?
            }
        };

        let mut key_ids = options.ssh_key_ids.clone();
        if let Some(public_key) = &options.ssh_public_key {
            let key_name = format!("cto-{name}");
            let id = self.provider.upload_ssh_key(&key_name, public_key).await?;
            if !key_ids.contains(&id) {
                key_ids.push(id);
            }
        }

        Ok(options.to_request(&name, &region, &size, key_ids))
    }

    async fn create_with_retries(
        &self,
        options: &ProvisionOptions,
        request: ProvisionRequest,
    ) -> Result<Created, ProvisionError> {
        let vendor = self.provider.vendor();
        let mut state = CreationState::new(request);

        loop {
            let entry = PendingCreation::for_request(vendor, &state.request);
            self.journal_begin(&entry).await;

            let err = match self.provider.create_server(&state.request).await {
                Ok(result) => {
                    info!(
                        server_id = %result.id,
                        name = %state.request.name,
                        region = %state.request.region,
                        size = %state.request.size,
                        retries = state.attempt,
                        "Server created"
                    );
                    return Ok(Created {
                        result,
                        request: state.request,
                        retries: state.attempt,
                        run_id: entry.run_id,
                    });
                }
                Err(e) => e,
            };
            self.journal_complete(&entry.run_id).await;

            let message = creation_message(&err);
            let kind = classify_failure(&message);
            let transition = state.transition(kind);
            warn!(
                kind = %kind,
                attempt = state.attempt,
                error = %message,
                "Server creation rejected"
            );

            match transition {
                Transition::Fatal => {
                    error!(retries = state.attempt, "Giving up on server creation");
                    return Err(ProvisionError::CreationFailed {
                        retries: state.attempt,
                        message,
                    });
                }
                Transition::RenameAndRetry => {
                    let name = self
                        .collaborators
                        .selector
                        .choose_name(Some(&state.request.name), Some(&message))
                        .await
                        .map_err(|e| ProvisionError::Selection(format!("{e:#}")))?;
                    validate_name(&name)?;
                    state.request.name = name;
                }
                Transition::RelocateAndRetry => {
                    let regions: Vec<_> = self
                        .provider
                        .get_available_locations()
                        .await
                        .into_iter()
                        .filter(|r| !state.region_excluded(&r.id))
                        .collect();
                    if regions.is_empty() {
                        return Err(ProvisionError::CreationFailed {
                            retries: state.attempt,
                            message: format!("{message} (no other regions available)"),
                        });
                    }
                    let region = self
                        .collaborators
                        .selector
                        .choose_region(&regions)
                        .await
                        .map_err(|e| ProvisionError::Selection(format!("{e:#}")))?;
                    let size = self
                        .choose_replacement_size(options, &state, &region, &message)
                        .await?;
                    state.request.region = region;
                    state.request.size = size;
                }
                Transition::ResizeAndRetry => {
                    let region = state.request.region.clone();
                    state.request.size = self
                        .choose_replacement_size(options, &state, &region, &message)
                        .await?;
                }
            }
        }
    }

    async fn choose_replacement_size(
        &self,
        options: &ProvisionOptions,
        state: &CreationState,
        region: &str,
        message: &str,
    ) -> Result<String, ProvisionError> {
        let sizes: Vec<ServerSize> = self
            .provider
            .get_available_server_types(region, options.mode)
            .await
            .into_iter()
            .filter(|s| !state.size_excluded(&s.id))
            .collect();
        if sizes.is_empty() {
            return Err(ProvisionError::CreationFailed {
                retries: state.attempt,
                message: format!("{message} (no other sizes available in {region})"),
            });
        }
        self.collaborators
            .selector
            .choose_size(region, &sizes)
            .await
            .map_err(|e| ProvisionError::Selection(format!("{e:#}")))
    }

    async fn await_boot(
        &self,
        options: &ProvisionOptions,
        server_id: &str,
    ) -> Result<(), ProvisionError> {
        info!(server_id = %server_id, "Waiting for server to boot");
        let provider = &self.provider;
        let outcome = poll_until(options.poll.boot, |attempt| async move {
            match provider.get_server_status(server_id).await {
                Ok(ServerStatus::Running) => Some(()),
                Ok(status) => {
                    debug!(
                        server_id = %server_id,
                        attempt,
                        status = %status,
                        "Server not running yet"
                    );
                    None
                }
                Err(e) => {
                    debug!(server_id = %server_id, attempt, error = %e, "Status check failed");
                    None
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Ready { attempts, .. } => {
                info!(server_id = %server_id, attempts, "Server is running");
                Ok(())
            }
            PollOutcome::TimedOut { attempts } => Err(ProvisionError::BootTimeout {
                server_id: server_id.to_string(),
                attempts,
            }),
        }
    }

    async fn resolve_ip(&self, options: &ProvisionOptions, server_id: &str) -> Option<String> {
        let config = options.poll.ip_for(self.provider.vendor());
        info!(
            server_id = %server_id,
            max_attempts = config.max_attempts,
            "Waiting for public IP"
        );
        let provider = &self.provider;
        poll_until(config, |attempt| async move {
            match provider.get_server_details(server_id).await {
                Ok(details) if is_valid_ip(&details.ip) => Some(details.ip.trim().to_string()),
                Ok(details) => {
                    debug!(server_id = %server_id, attempt, ip = %details.ip, "No valid IP yet");
                    None
                }
                Err(e) => {
                    debug!(server_id = %server_id, attempt, error = %e, "Details lookup failed");
                    None
                }
            }
        })
        .await
        .into_value()
    }

    async fn run_followups(
        &self,
        record: &ServerRecord,
        opts: &crate::config::HardeningOptions,
        warnings: &mut Vec<String>,
    ) {
        if !is_valid_ip(&record.ip) {
            warnings.push("Hardening skipped: server has no public IP yet".to_string());
            return;
        }
        let Some(hardening) = &self.collaborators.hardening else {
            warnings.push("Hardening requested but not available".to_string());
            return;
        };
        let bare = !record.mode.installs_platform();

        if let Err(e) = hardening
            .setup_firewall(&record.ip, &record.name, opts.dry_run, bare)
            .await
        {
            warn!(server_id = %record.id, error = %format!("{e:#}"), "Firewall setup failed");
            warnings.push(format!("Firewall setup failed: {e:#}"));
        }

        if let Err(e) = hardening
            .setup_security(&record.ip, &record.name, opts.ssh_port, opts.dry_run, opts.force)
            .await
        {
            warn!(
                server_id = %record.id,
                error = %format!("{e:#}"),
                "Security hardening failed"
            );
            warnings.push(format!("Security hardening failed: {e:#}"));
        }
    }

    async fn journal_begin(&self, entry: &PendingCreation) {
        if let Some(journal) = &self.collaborators.journal {
            if let Err(e) = journal.begin(entry).await {
                warn!(
                    run_id = %entry.run_id,
                    error = %format!("{e:#}"),
                    "Failed to journal pending creation"
                );
            }
        }
    }

    async fn journal_complete(&self, run_id: &str) {
        if let Some(journal) = &self.collaborators.journal {
            if let Err(e) = journal.complete(run_id).await {
                warn!(
                    run_id = %run_id,
                    error = %format!("{e:#}"),
                    "Failed to clear pending creation"
                );
            }
        }
    }
}

/// Build the adapter for `options.vendor` and run once.
///
/// # Errors
/// See [`Provisioner::run`]; also fails if the adapter cannot be built.
pub async fn provision(
    options: &ProvisionOptions,
    credential: &str,
    collaborators: Collaborators,
) -> Result<ProvisionOutcome, ProvisionError> {
    let provider = factory::build(options.vendor, Some(credential.to_string()))?;
    Provisioner::new(provider, credential, collaborators)
        .run(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = ProvisionStage::SelectingInputs;
        let mut seen = vec![stage];
        while stage != ProvisionStage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(seen[3], ProvisionStage::ResolvingIp);
        assert_eq!(ProvisionStage::Done.next(), ProvisionStage::Done);
    }

    #[test]
    fn test_creation_message_prefers_vendor_text() {
        let api = ProviderError::Api {
            status: 422,
            message: "name already used".into(),
        };
        assert_eq!(creation_message(&api), "name already used");
        let http = ProviderError::Http("connection reset".into());
        assert_eq!(creation_message(&http), "HTTP error: connection reset");
    }
}

//! Provisioning runs against scripted vendors and in-memory collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use cto_provision::collaborators::{
    CreationJournal, Hardening, InputSelector, ReadinessProbe, ServerStore,
};
use cto_provision::config::{DeployMode, HardeningOptions, PollSettings, ProvisionOptions};
use cto_provision::poll::PollConfig;
use cto_provision::providers::{
    CloudProvider, ProviderError, ProvisionRequest, ProvisionResult, Region, ServerSize,
    ServerStatus, SnapshotInfo, Vendor, PENDING_IP,
};
use cto_provision::state::{PendingCreation, ServerRecord};
use cto_provision::{Collaborators, ProvisionError, ProvisionOutcome, Provisioner};

const TOKEN: &str = "test-token";

// =============================================================================
// Scripted vendor
// =============================================================================

struct FakeProvider {
    token_ok: bool,
    create_results: Mutex<VecDeque<Result<ProvisionResult, ProviderError>>>,
    statuses: Mutex<VecDeque<ServerStatus>>,
    idle_status: ServerStatus,
    ips: Mutex<VecDeque<String>>,
    regions: Vec<Region>,
    sizes: Vec<ServerSize>,
    create_calls: Mutex<Vec<ProvisionRequest>>,
    status_calls: AtomicU32,
    details_calls: AtomicU32,
}

impl FakeProvider {
    fn new() -> Self {
        Self {
            token_ok: true,
            create_results: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            idle_status: ServerStatus::Running,
            ips: Mutex::new(VecDeque::new()),
            regions: vec![
                Region::new("fsn1", "Falkenstein"),
                Region::new("nbg1", "Nuremberg"),
                Region::new("hel1", "Helsinki"),
            ],
            sizes: vec![size("cx22", 4096), size("cx32", 8192), size("cx42", 16384)],
            create_calls: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
            details_calls: AtomicU32::new(0),
        }
    }

    fn creates(self, results: Vec<Result<ProvisionResult, ProviderError>>) -> Self {
        *self.create_results.lock().unwrap() = results.into();
        self
    }

    fn statuses(mut self, statuses: Vec<ServerStatus>, idle: ServerStatus) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self.idle_status = idle;
        self
    }

    fn ips(self, ips: &[&str]) -> Self {
        *self.ips.lock().unwrap() = ips.iter().map(ToString::to_string).collect();
        self
    }

    fn created(&self) -> Vec<ProvisionRequest> {
        self.create_calls.lock().unwrap().clone()
    }
}

fn size(id: &str, memory_mb: u64) -> ServerSize {
    ServerSize {
        id: id.to_string(),
        name: id.to_string(),
        vcpus: 2,
        memory_mb,
        disk_gb: 40,
        price_monthly: "€4.51".to_string(),
    }
}

fn accepted(id: &str, ip: &str) -> Result<ProvisionResult, ProviderError> {
    Ok(ProvisionResult {
        id: id.to_string(),
        ip: ip.to_string(),
        status: ServerStatus::Initializing,
    })
}

fn rejected(status: u16, message: &str) -> Result<ProvisionResult, ProviderError> {
    Err(ProviderError::Api {
        status,
        message: message.to_string(),
    })
}

#[async_trait]
impl CloudProvider for FakeProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Hetzner
    }

    async fn validate_token(&self, _token: &str) -> bool {
        self.token_ok
    }

    async fn upload_ssh_key(
        &self,
        _name: &str,
        _public_key: &str,
    ) -> Result<String, ProviderError> {
        Ok("key-1".to_string())
    }

    async fn create_server(
        &self,
        req: &ProvisionRequest,
    ) -> Result<ProvisionResult, ProviderError> {
        self.create_calls.lock().unwrap().push(req.clone());
        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| rejected(500, "no scripted result"))
    }

    async fn get_server_status(&self, _id: &str) -> Result<ServerStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.idle_status.clone()))
    }

    async fn get_server_details(&self, id: &str) -> Result<ProvisionResult, ProviderError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        let ip = self
            .ips
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| PENDING_IP.to_string());
        Ok(ProvisionResult {
            id: id.to_string(),
            ip,
            status: ServerStatus::Running,
        })
    }

    async fn destroy_server(&self, _id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn reboot_server(&self, _id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    fn get_regions(&self) -> Vec<Region> {
        self.regions.clone()
    }

    fn get_server_sizes(&self) -> Vec<ServerSize> {
        self.sizes.clone()
    }

    async fn get_available_locations(&self) -> Vec<Region> {
        self.regions.clone()
    }

    async fn get_available_server_types(
        &self,
        _region: &str,
        _mode: DeployMode,
    ) -> Vec<ServerSize> {
        self.sizes.clone()
    }

    async fn create_snapshot(
        &self,
        _server_id: &str,
        _name: &str,
    ) -> Result<SnapshotInfo, ProviderError> {
        Err(ProviderError::Unsupported("snapshots".into()))
    }

    async fn list_snapshots(
        &self,
        _server_id: Option<&str>,
    ) -> Result<Vec<SnapshotInfo>, ProviderError> {
        Ok(Vec::new())
    }

    async fn delete_snapshot(&self, _snapshot_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn get_snapshot_cost_estimate(&self, _server_id: &str) -> Result<String, ProviderError> {
        Ok("~€0.00/month".to_string())
    }
}

// =============================================================================
// In-memory collaborators
// =============================================================================

/// Answers names from a script and always picks the first offered option.
#[derive(Default)]
struct ScriptedSelector {
    names: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<String>>,
    offered_regions: Mutex<Vec<Vec<String>>>,
    offered_sizes: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl InputSelector for ScriptedSelector {
    async fn choose_name(&self, rejected: Option<&str>, _reason: Option<&str>) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("name:{}", rejected.unwrap_or("-")));
        match self.names.lock().unwrap().pop_front() {
            Some(name) => Ok(name),
            None => bail!("no scripted name"),
        }
    }

    async fn choose_region(&self, regions: &[Region]) -> Result<String> {
        self.calls.lock().unwrap().push("region".to_string());
        self.offered_regions
            .lock()
            .unwrap()
            .push(regions.iter().map(|r| r.id.clone()).collect());
        match regions.first() {
            Some(region) => Ok(region.id.clone()),
            None => bail!("no regions offered"),
        }
    }

    async fn choose_size(&self, region: &str, sizes: &[ServerSize]) -> Result<String> {
        self.calls.lock().unwrap().push(format!("size:{region}"));
        self.offered_sizes
            .lock()
            .unwrap()
            .push((region.to_string(), sizes.iter().map(|s| s.id.clone()).collect()));
        match sizes.first() {
            Some(size) => Ok(size.id.clone()),
            None => bail!("no sizes offered"),
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<ServerRecord>>,
}

#[async_trait]
impl ServerStore for MemoryStore {
    async fn save(&self, record: &ServerRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ServerRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct MemoryJournal {
    entries: Mutex<Vec<PendingCreation>>,
    begun: AtomicU32,
}

#[async_trait]
impl CreationJournal for MemoryJournal {
    async fn begin(&self, entry: &PendingCreation) -> Result<()> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn complete(&self, run_id: &str) -> Result<()> {
        self.entries.lock().unwrap().retain(|e| e.run_id != run_id);
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<PendingCreation>> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

struct StubProbe {
    answer: bool,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ReadinessProbe for StubProbe {
    async fn wait_for_ready(&self, address: &str, _min_wait: Duration) -> bool {
        self.calls.lock().unwrap().push(address.to_string());
        self.answer
    }
}

#[derive(Default)]
struct RecordingHardening {
    fail_firewall: bool,
    steps: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Hardening for RecordingHardening {
    async fn setup_firewall(
        &self,
        _address: &str,
        _name: &str,
        _dry_run: bool,
        _bare: bool,
    ) -> Result<()> {
        self.steps.lock().unwrap().push("firewall");
        if self.fail_firewall {
            bail!("ufw: command not found");
        }
        Ok(())
    }

    async fn setup_security(
        &self,
        _address: &str,
        _name: &str,
        _port: Option<u16>,
        _dry_run: bool,
        _force: bool,
    ) -> Result<()> {
        self.steps.lock().unwrap().push("security");
        Ok(())
    }
}

struct Harness {
    provider: Arc<FakeProvider>,
    selector: Arc<ScriptedSelector>,
    store: Arc<MemoryStore>,
    journal: Arc<MemoryJournal>,
    probe: Arc<StubProbe>,
    hardening: Arc<RecordingHardening>,
}

impl Harness {
    fn new(provider: FakeProvider) -> Self {
        Self {
            provider: Arc::new(provider),
            selector: Arc::new(ScriptedSelector::default()),
            store: Arc::new(MemoryStore::default()),
            journal: Arc::new(MemoryJournal::default()),
            probe: Arc::new(StubProbe {
                answer: true,
                calls: Mutex::new(Vec::new()),
            }),
            hardening: Arc::new(RecordingHardening::default()),
        }
    }

    fn with_names(self, names: &[&str]) -> Self {
        *self.selector.names.lock().unwrap() = names.iter().map(ToString::to_string).collect();
        self
    }

    fn with_unresponsive_platform(mut self) -> Self {
        self.probe = Arc::new(StubProbe {
            answer: false,
            calls: Mutex::new(Vec::new()),
        });
        self
    }

    fn with_failing_firewall(mut self) -> Self {
        self.hardening = Arc::new(RecordingHardening {
            fail_firewall: true,
            ..RecordingHardening::default()
        });
        self
    }

    async fn run(&self, options: &ProvisionOptions) -> Result<ProvisionOutcome, ProvisionError> {
        let collaborators = Collaborators {
            selector: self.selector.clone(),
            store: self.store.clone(),
            journal: Some(self.journal.clone()),
            readiness: Some(self.probe.clone()),
            hardening: Some(self.hardening.clone()),
        };
        Provisioner::new(self.provider.clone(), TOKEN, collaborators)
            .run(options)
            .await
    }

    fn selector_calls(&self) -> Vec<String> {
        self.selector.calls.lock().unwrap().clone()
    }

    fn offered_regions(&self) -> Vec<Vec<String>> {
        self.selector.offered_regions.lock().unwrap().clone()
    }

    fn offered_sizes(&self) -> Vec<(String, Vec<String>)> {
        self.selector.offered_sizes.lock().unwrap().clone()
    }

    fn saved(&self) -> Vec<ServerRecord> {
        self.store.records.lock().unwrap().clone()
    }

    fn pending(&self) -> Vec<PendingCreation> {
        self.journal.entries.lock().unwrap().clone()
    }
}

fn options(mode: DeployMode) -> ProvisionOptions {
    let mut options = ProvisionOptions::new(Vendor::Hetzner, mode);
    options.name = Some("x".to_string());
    options.region = Some("fsn1".to_string());
    options.size = Some("cx22".to_string());
    options.poll = PollSettings {
        boot: PollConfig::new(5, Duration::ZERO),
        ip: Some(PollConfig::new(3, Duration::ZERO)),
        readiness_min_wait: Some(Duration::ZERO),
    };
    options
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn name_conflict_is_renamed_and_run_completes() {
    let provider = FakeProvider::new()
        .creates(vec![
            rejected(422, "server name is already used"),
            accepted("1", PENDING_IP),
        ])
        .statuses(vec![ServerStatus::Initializing, ServerStatus::Running], ServerStatus::Running)
        .ips(&["203.0.113.10"]);
    let harness = Harness::new(provider).with_names(&["x2"]);

    let outcome = harness.run(&options(DeployMode::Platform)).await.unwrap();

    assert_eq!(outcome.record.id, "1");
    assert_eq!(outcome.record.name, "x2");
    assert_eq!(outcome.record.ip, "203.0.113.10");
    assert_eq!(outcome.record.region, "fsn1");
    assert_eq!(outcome.record.size, "cx22");
    assert!(outcome.ready);
    assert_eq!(outcome.retries, 1);
    assert!(outcome.warnings.is_empty());

    let calls = harness.provider.created();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name, "x");
    assert_eq!(calls[1].name, "x2");
    assert_eq!(calls[1].region, calls[0].region);
    assert_eq!(calls[1].size, calls[0].size);

    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.provider.details_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.selector_calls(), ["name:x"]);
    assert_eq!(*harness.probe.calls.lock().unwrap(), ["203.0.113.10"]);
    assert_eq!(harness.saved(), vec![outcome.record.clone()]);
}

#[tokio::test]
async fn journal_is_cleared_once_the_record_is_saved() {
    let provider = FakeProvider::new().creates(vec![
        rejected(422, "server name is already used"),
        accepted("1", "198.51.100.7"),
    ]);
    let harness = Harness::new(provider).with_names(&["x2"]);

    harness.run(&options(DeployMode::Bare)).await.unwrap();

    assert_eq!(harness.journal.begun.load(Ordering::SeqCst), 2);
    assert!(harness.pending().is_empty());
}

#[tokio::test]
async fn unrecognized_rejection_is_fatal_without_retries() {
    let provider = FakeProvider::new().creates(vec![rejected(402, "insufficient account balance")]);
    let harness = Harness::new(provider);

    let err = harness.run(&options(DeployMode::Platform)).await.unwrap_err();

    match err {
        ProvisionError::CreationFailed { retries, message } => {
            assert_eq!(retries, 0);
            assert_eq!(message, "insufficient account balance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(harness.provider.created().len(), 1);
    assert!(harness.selector_calls().is_empty());
    assert!(harness.saved().is_empty());
    assert!(harness.pending().is_empty());
}

#[tokio::test]
async fn disabled_location_is_excluded_from_relocation() {
    let provider = FakeProvider::new().creates(vec![
        rejected(412, "location fsn1 is disabled"),
        accepted("7", "198.51.100.7"),
    ]);
    let harness = Harness::new(provider);

    let outcome = harness.run(&options(DeployMode::Bare)).await.unwrap();

    assert_eq!(outcome.retries, 1);
    assert_eq!(outcome.record.region, "nbg1");
    assert_eq!(harness.offered_regions(), [["nbg1", "hel1"]]);
    assert_eq!(harness.selector_calls(), ["region", "size:nbg1"]);
    assert_eq!(harness.provider.created()[1].region, "nbg1");
}

#[tokio::test]
async fn relocation_after_resize_keeps_the_rejected_size_excluded() {
    let provider = FakeProvider::new().creates(vec![
        rejected(412, "server type is unavailable in this location"),
        rejected(412, "location fsn1 is disabled"),
        accepted("7", "198.51.100.7"),
    ]);
    let harness = Harness::new(provider);

    let outcome = harness.run(&options(DeployMode::Bare)).await.unwrap();

    assert_eq!(outcome.retries, 2);
    assert_eq!(outcome.record.region, "nbg1");
    assert_eq!(outcome.record.size, "cx32");
    assert_eq!(harness.selector_calls(), ["size:fsn1", "region", "size:nbg1"]);
    assert_eq!(harness.offered_regions(), [["nbg1", "hel1"]]);
    let offered_sizes = harness.offered_sizes();
    assert_eq!(offered_sizes.len(), 2);
    for (region, sizes) in &offered_sizes {
        assert!(!sizes.contains(&"cx22".to_string()), "cx22 offered again in {region}");
    }
    assert_eq!(offered_sizes[1].0, "nbg1");
    assert_eq!(offered_sizes[1].1, ["cx32", "cx42"]);

    let calls: Vec<_> = harness
        .provider
        .created()
        .into_iter()
        .map(|r| (r.region, r.size))
        .collect();
    assert_eq!(
        calls,
        [
            ("fsn1".to_string(), "cx22".to_string()),
            ("fsn1".to_string(), "cx32".to_string()),
            ("nbg1".to_string(), "cx32".to_string()),
        ]
    );
}

#[tokio::test]
async fn second_relocation_excludes_both_disabled_regions() {
    let provider = FakeProvider::new().creates(vec![
        rejected(412, "location fsn1 is disabled"),
        rejected(412, "location nbg1 is disabled"),
        accepted("8", "198.51.100.8"),
    ]);
    let harness = Harness::new(provider);

    let outcome = harness.run(&options(DeployMode::Bare)).await.unwrap();

    assert_eq!(outcome.retries, 2);
    assert_eq!(outcome.record.region, "hel1");
    assert_eq!(harness.offered_regions(), vec![vec!["nbg1", "hel1"], vec!["hel1"]]);
    assert_eq!(harness.saved().len(), 1);
}

#[tokio::test]
async fn unavailable_sizes_are_replaced_until_retries_run_out() {
    let unavailable = "server type is unavailable in this location";
    let provider = FakeProvider::new().creates(vec![
        rejected(412, unavailable),
        rejected(412, unavailable),
        rejected(412, unavailable),
    ]);
    let harness = Harness::new(provider);

    let err = harness.run(&options(DeployMode::Platform)).await.unwrap_err();

    assert!(matches!(err, ProvisionError::CreationFailed { retries: 2, .. }));
    let sizes: Vec<_> = harness
        .provider
        .created()
        .into_iter()
        .map(|r| r.size)
        .collect();
    assert_eq!(sizes, ["cx22", "cx32", "cx42"]);
    assert!(harness.saved().is_empty());
}

#[tokio::test]
async fn boot_timeout_is_fatal_and_leaves_journal_entry() {
    let provider = FakeProvider::new()
        .creates(vec![accepted("9", PENDING_IP)])
        .statuses(vec![], ServerStatus::Initializing);
    let harness = Harness::new(provider);

    let err = harness.run(&options(DeployMode::Platform)).await.unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::BootTimeout { ref server_id, attempts: 5 } if server_id == "9"
    ));
    assert!(harness.saved().is_empty());
    let pending = harness.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "x");
}

#[tokio::test]
async fn ip_timeout_is_recorded_as_pending_with_warning() {
    let provider = FakeProvider::new().creates(vec![accepted("3", PENDING_IP)]);
    let harness = Harness::new(provider);

    let outcome = harness.run(&options(DeployMode::Platform)).await.unwrap();

    assert_eq!(outcome.record.ip, PENDING_IP);
    assert!(!outcome.ready);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(harness.provider.details_calls.load(Ordering::SeqCst), 3);
    assert!(harness.probe.calls.lock().unwrap().is_empty());
    assert_eq!(harness.saved().len(), 1);
}

#[tokio::test]
async fn unresponsive_platform_is_saved_with_one_warning() {
    let provider = FakeProvider::new().creates(vec![accepted("5", "198.51.100.5")]);
    let harness = Harness::new(provider).with_unresponsive_platform();

    let outcome = harness.run(&options(DeployMode::Platform)).await.unwrap();

    assert!(!outcome.ready);
    assert_eq!(outcome.record.ip, "198.51.100.5");
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("Platform on 198.51.100.5"));
    assert_eq!(*harness.probe.calls.lock().unwrap(), ["198.51.100.5"]);
    assert_eq!(harness.saved(), vec![outcome.record.clone()]);
    assert!(harness.pending().is_empty());
}

#[tokio::test]
async fn bare_mode_skips_readiness_probe() {
    let provider = FakeProvider::new().creates(vec![accepted("4", "198.51.100.4")]);
    let harness = Harness::new(provider);

    let outcome = harness.run(&options(DeployMode::Bare)).await.unwrap();

    assert!(outcome.ready);
    assert!(harness.probe.calls.lock().unwrap().is_empty());
    assert_eq!(harness.provider.details_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_credential_stops_before_creation() {
    let mut provider = FakeProvider::new();
    provider.token_ok = false;
    let harness = Harness::new(provider);

    let err = harness.run(&options(DeployMode::Platform)).await.unwrap_err();

    assert!(matches!(err, ProvisionError::CredentialInvalid { .. }));
    assert!(harness.provider.created().is_empty());
}

#[tokio::test]
async fn invalid_name_is_rejected_before_any_vendor_call() {
    let harness = Harness::new(FakeProvider::new());
    let mut opts = options(DeployMode::Platform);
    opts.name = Some("-bad name".to_string());

    let err = harness.run(&opts).await.unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidRequest(_)));
    assert!(harness.provider.created().is_empty());
}

#[tokio::test]
async fn missing_inputs_are_selected_from_catalog() {
    let provider = FakeProvider::new().creates(vec![accepted("5", "198.51.100.5")]);
    let harness = Harness::new(provider).with_names(&["picked"]);
    let mut opts = options(DeployMode::Bare);
    opts.name = None;
    opts.region = None;
    opts.size = None;

    let outcome = harness.run(&opts).await.unwrap();

    assert_eq!(outcome.record.name, "picked");
    assert_eq!(outcome.record.region, "fsn1");
    assert_eq!(outcome.record.size, "cx22");
    assert_eq!(outcome.retries, 0);
    assert_eq!(harness.selector_calls(), ["name:-", "region", "size:fsn1"]);
}

#[tokio::test]
async fn failed_firewall_still_runs_security_hardening() {
    let provider = FakeProvider::new().creates(vec![accepted("6", "198.51.100.6")]);
    let harness = Harness::new(provider).with_failing_firewall();
    let mut opts = options(DeployMode::Platform);
    opts.hardening = Some(HardeningOptions::default());

    let outcome = harness.run(&opts).await.unwrap();

    assert!(outcome.ready);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("ufw: command not found"));
    assert_eq!(*harness.hardening.steps.lock().unwrap(), ["firewall", "security"]);
    assert_eq!(harness.saved().len(), 1);
}

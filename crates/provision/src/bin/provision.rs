//! Provision CLI - multi-vendor VM provisioning for CTO Platform.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cto_provision::collaborators::{CreationJournal, InputSelector, ReadinessProbe, ServerStore};
use cto_provision::config::{DeployMode, HardeningOptions, ProvisionOptions, Settings};
use cto_provision::credentials::{resolve_from_process_env, CredentialSource, ResolvedCredential};
use cto_provision::providers::catalog::meets_floor;
use cto_provision::providers::{factory, CloudProvider, Region, ServerSize, Vendor};
use cto_provision::readiness::HttpReadinessProbe;
use cto_provision::remote::{SshExecutor, SshHardening};
use cto_provision::state::{JsonCreationJournal, JsonServerStore};
use cto_provision::{provision, ui, Collaborators};

/// Provision CLI - create and manage cloud VMs for CTO Platform.
#[derive(Parser)]
#[command(name = "provision")]
#[command(about = "Provision and manage VMs on Hetzner, DigitalOcean, Vultr and Linode")]
struct Cli {
    /// Vendor: hetzner, digitalocean, vultr or linode (or set `PROVISION_PROVIDER`).
    #[arg(short, long, global = true, env = "PROVISION_PROVIDER")]
    provider: Option<String>,

    /// API token; falls back to the vendor's env vars and the settings file.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Settings file (default: <config dir>/cto-provision/config.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never prompt; fail when input is missing.
    #[arg(long, global = true, default_value = "false")]
    non_interactive: bool,

    /// Enable verbose logging.
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a new server.
    Create {
        /// Server name (prompted if omitted).
        #[arg(long)]
        name: Option<String>,

        /// Region id (chosen from the live catalog if omitted).
        #[arg(long)]
        region: Option<String>,

        /// Size id (chosen from the live catalog if omitted).
        #[arg(long)]
        size: Option<String>,

        /// Deploy mode: bare or platform.
        #[arg(long, default_value = "platform")]
        mode: DeployMode,

        /// Boot script file; replaces the mode's default cloud-init.
        #[arg(long)]
        boot_script: Option<PathBuf>,

        /// Image override.
        #[arg(long)]
        image: Option<String>,

        /// Registered SSH key ids (comma-separated).
        #[arg(long, value_delimiter = ',')]
        ssh_key_id: Vec<String>,

        /// Public key file to register before creation.
        #[arg(long)]
        ssh_public_key: Option<PathBuf>,

        /// Configure firewall and SSH hardening once the server is up.
        #[arg(long, default_value = "false")]
        harden: bool,

        /// Print hardening commands instead of running them.
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Move sshd to this port during hardening.
        #[arg(long)]
        ssh_port: Option<u16>,

        /// Re-apply hardening on an already hardened host.
        #[arg(long, default_value = "false")]
        force: bool,

        /// Skip the HTTP readiness wait.
        #[arg(long, default_value = "false")]
        no_probe: bool,
    },

    /// Show normalized server status.
    Status {
        /// Server ID.
        #[arg(long)]
        id: String,
    },

    /// Show server id, address and status.
    Details {
        /// Server ID.
        #[arg(long)]
        id: String,
    },

    /// Reboot a server.
    Reboot {
        /// Server ID.
        #[arg(long)]
        id: String,
    },

    /// Destroy a server.
    Destroy {
        /// Server ID.
        #[arg(long)]
        id: String,

        /// Skip confirmation.
        #[arg(short, long, default_value = "false")]
        yes: bool,
    },

    /// List recorded servers.
    List,

    /// List creations that were started but never recorded.
    Pending,

    /// List regions (live when a token is available).
    Regions,

    /// List server sizes.
    Sizes {
        /// Region for the live, availability-filtered list.
        #[arg(long)]
        region: Option<String>,

        /// Deploy mode whose memory floor applies.
        #[arg(long, default_value = "platform")]
        mode: DeployMode,
    },

    /// Check that the resolved token is accepted.
    ValidateToken,

    /// Manage SSH keys.
    SshKey {
        #[command(subcommand)]
        action: SshKeyAction,
    },

    /// Manage snapshots.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SshKeyAction {
    /// Register a public key; returns the existing id if already registered.
    Upload {
        /// Key name.
        #[arg(long)]
        name: String,

        /// Public key file.
        #[arg(long)]
        public_key: PathBuf,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Snapshot a server.
    Create {
        /// Server ID.
        #[arg(long)]
        server_id: String,

        /// Snapshot name.
        #[arg(long)]
        name: String,
    },

    /// List snapshots.
    List {
        /// Only snapshots of this server.
        #[arg(long)]
        server_id: Option<String>,
    },

    /// Delete a snapshot.
    Delete {
        /// Snapshot ID.
        #[arg(long)]
        id: String,
    },

    /// Estimate the monthly cost of snapshotting a server.
    Cost {
        /// Server ID.
        #[arg(long)]
        server_id: String,
    },
}

/// [`InputSelector`] backed by terminal prompts.
struct PromptSelector {
    interactive: bool,
}

impl PromptSelector {
    fn ensure_interactive(&self, what: &str) -> Result<()> {
        if self.interactive {
            Ok(())
        } else {
            bail!("{what} is required in non-interactive mode")
        }
    }
}

#[async_trait]
impl InputSelector for PromptSelector {
    async fn choose_name(&self, rejected: Option<&str>, reason: Option<&str>) -> Result<String> {
        self.ensure_interactive("--name")?;
        if let (Some(rejected), Some(reason)) = (rejected, reason) {
            ui::print_warning(&format!("Name '{rejected}' was rejected: {reason}"));
        }
        let suggestion = rejected.map(|r| format!("{r}-2"));
        tokio::task::spawn_blocking(move || -> Result<String> {
            let theme = ColorfulTheme::default();
            let mut input = Input::<String>::with_theme(&theme).with_prompt("Server name");
            if let Some(suggestion) = suggestion {
                input = input.default(suggestion);
            }
            Ok(input.interact_text()?.trim().to_string())
        })
        .await?
    }

    async fn choose_region(&self, regions: &[Region]) -> Result<String> {
        self.ensure_interactive("--region")?;
        if regions.is_empty() {
            bail!("No regions available");
        }
        let regions = regions.to_vec();
        tokio::task::spawn_blocking(move || -> Result<String> {
            let items: Vec<String> = regions.iter().map(ToString::to_string).collect();
            let index = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Region")
                .items(&items)
                .default(0)
                .interact()?;
            Ok(regions[index].id.clone())
        })
        .await?
    }

    async fn choose_size(&self, region: &str, sizes: &[ServerSize]) -> Result<String> {
        self.ensure_interactive("--size")?;
        if sizes.is_empty() {
            bail!("No sizes available in {region}");
        }
        let sizes = sizes.to_vec();
        let prompt = format!("Size in {region}");
        tokio::task::spawn_blocking(move || -> Result<String> {
            let items: Vec<String> = sizes.iter().map(ToString::to_string).collect();
            let index = Select::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .items(&items)
                .default(0)
                .interact()?;
            Ok(sizes[index].id.clone())
        })
        .await?
    }
}

/// Shared state for one invocation.
struct App {
    provider: Option<String>,
    token: Option<String>,
    interactive: bool,
    settings: Settings,
}

impl App {
    fn vendor(&self) -> Result<Vendor> {
        let name = self
            .provider
            .as_deref()
            .context("--provider is required for this command")?;
        Ok(name.parse()?)
    }

    /// Resolve the token, prompting as a last resort.
    async fn credential(&self, vendor: Vendor) -> Result<ResolvedCredential> {
        let resolved = resolve_from_process_env(vendor, self.token.as_deref(), &self.settings);
        if let Some(cred) = resolved {
            debug!(vendor = %vendor, source = %cred.source, "Resolved credential");
            return Ok(cred);
        }
        if !self.interactive {
            bail!(
                "No {vendor} token found; pass --token or set {}",
                vendor.token_env_vars().join(" / ")
            );
        }
        let prompt = format!("{vendor} API token");
        let token = tokio::task::spawn_blocking(move || {
            Password::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .interact()
        })
        .await??;
        if token.trim().is_empty() {
            bail!("Empty {vendor} token");
        }
        Ok(ResolvedCredential {
            token: token.trim().to_string(),
            source: CredentialSource::Prompt,
        })
    }

    async fn connect(&self) -> Result<(Arc<dyn CloudProvider>, ResolvedCredential)> {
        let vendor = self.vendor()?;
        let cred = self.credential(vendor).await?;
        let provider = factory::build(vendor, Some(cred.token.clone()))?;
        Ok((provider, cred))
    }

    /// Authenticated adapter when a token resolves without prompting.
    fn connect_quietly(&self) -> Result<(Arc<dyn CloudProvider>, bool)> {
        let vendor = self.vendor()?;
        let cred = resolve_from_process_env(vendor, self.token.as_deref(), &self.settings);
        let live = cred.is_some();
        Ok((factory::build(vendor, cred.map(|c| c.token))?, live))
    }

    fn store(&self) -> JsonServerStore {
        JsonServerStore::new(self.settings.records_path())
    }

    fn journal(&self) -> JsonCreationJournal {
        JsonCreationJournal::new(self.settings.journal_path())
    }
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what}: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::load(cli.config.as_deref())?;
    let app = App {
        provider: cli.provider,
        token: cli.token,
        interactive: !cli.non_interactive,
        settings,
    };

    match cli.command {
        Commands::Create {
            name,
            region,
            size,
            mode,
            boot_script,
            image,
            ssh_key_id,
            ssh_public_key,
            harden,
            dry_run,
            ssh_port,
            force,
            no_probe,
        } => {
            let vendor = app.vendor()?;
            let cred = app.credential(vendor).await?;

            let mut options = ProvisionOptions::new(vendor, mode);
            options.name = name;
            options.region = region;
            options.size = size;
            options.image = image;
            options.ssh_key_ids = ssh_key_id;
            options.boot_script = boot_script
                .map(|p| read_file(&p, "boot script"))
                .transpose()?;
            options.ssh_public_key = ssh_public_key
                .map(|p| read_file(&p, "public key").map(|k| k.trim().to_string()))
                .transpose()?;
            options.poll = app.settings.poll_settings();
            if harden {
                options.hardening = Some(HardeningOptions {
                    dry_run,
                    ssh_port,
                    force,
                });
            }

            let readiness: Option<Arc<dyn ReadinessProbe>> = if no_probe {
                None
            } else {
                Some(Arc::new(HttpReadinessProbe::from_settings(&app.settings.readiness)?))
            };
            let executor = Arc::new(SshExecutor::from_settings(&app.settings.ssh));
            let collaborators = Collaborators {
                selector: Arc::new(PromptSelector {
                    interactive: app.interactive,
                }),
                store: Arc::new(app.store()),
                journal: Some(Arc::new(app.journal())),
                readiness,
                hardening: Some(Arc::new(SshHardening::new(executor))),
            };

            ui::print_section(&format!("Provisioning on {vendor}"));
            info!(vendor = %vendor, mode = %mode, source = %cred.source, "Starting provisioning");
            let outcome = provision(&options, &cred.token, collaborators).await?;

            ui::print_success("Server provisioned");
            ui::print_record(&outcome.record);
            ui::print_field("Ready", &outcome.ready.to_string());
            ui::print_field("Retries", &outcome.retries.to_string());
            for warning in &outcome.warnings {
                ui::print_warning(warning);
            }
        }

        Commands::Status { id } => {
            let (provider, _) = app.connect().await?;
            let status = provider.get_server_status(&id).await?;
            println!("{status}");
        }

        Commands::Details { id } => {
            let (provider, _) = app.connect().await?;
            let details = provider.get_server_details(&id).await?;
            ui::print_field("ID", &details.id);
            ui::print_field("IP", &details.ip);
            ui::print_field("Status", &details.status.to_string());
        }

        Commands::Reboot { id } => {
            let (provider, _) = app.connect().await?;
            provider.reboot_server(&id).await?;
            ui::print_success(&format!("Reboot requested for {id}"));
        }

        Commands::Destroy { id, yes } => {
            let (provider, _) = app.connect().await?;
            if !yes {
                if !app.interactive {
                    bail!("Refusing to destroy {id} without --yes in non-interactive mode");
                }
                let prompt = format!("Destroy server {id}? This cannot be undone");
                let confirmed = tokio::task::spawn_blocking(move || {
                    Confirm::with_theme(&ColorfulTheme::default())
                        .with_prompt(prompt)
                        .default(false)
                        .interact()
                })
                .await??;
                if !confirmed {
                    ui::print_info("Aborted");
                    return Ok(());
                }
            }
            provider.destroy_server(&id).await?;
            ui::print_success(&format!("Destroyed {id}"));
        }

        Commands::List => {
            let vendor = app.provider.as_deref().map(str::parse::<Vendor>).transpose()?;
            let records = app.store().list().await?;
            let records: Vec<_> = records
                .into_iter()
                .filter(|r| vendor.is_none_or(|v| r.vendor == v))
                .collect();
            if records.is_empty() {
                ui::print_info("No servers recorded");
            }
            for record in &records {
                ui::print_record(record);
                println!();
            }
        }

        Commands::Pending => {
            let entries = app.journal().pending().await?;
            ui::print_pending(&entries);
        }

        Commands::Regions => {
            let (provider, live) = app.connect_quietly()?;
            let regions = if live {
                provider.get_available_locations().await
            } else {
                ui::print_info("No token found; showing the built-in catalog");
                provider.get_regions()
            };
            ui::print_regions(&regions);
        }

        Commands::Sizes { region, mode } => {
            let (provider, live) = app.connect_quietly()?;
            let sizes = match region {
                Some(region) if live => provider.get_available_server_types(&region, mode).await,
                _ => {
                    if !live {
                        ui::print_info("No token found; showing the built-in catalog");
                    }
                    provider
                        .get_server_sizes()
                        .into_iter()
                        .filter(|s| meets_floor(s, mode))
                        .collect()
                }
            };
            ui::print_sizes(&sizes);
        }

        Commands::ValidateToken => {
            let vendor = app.vendor()?;
            let cred = app.credential(vendor).await?;
            let provider = factory::build(vendor, Some(cred.token.clone()))?;
            if provider.validate_token(&cred.token).await {
                ui::print_success(&format!("{vendor} token from {} is valid", cred.source));
            } else {
                bail!("{vendor} rejected the token from {}", cred.source);
            }
        }

        Commands::SshKey {
            action: SshKeyAction::Upload { name, public_key },
        } => {
            let (provider, _) = app.connect().await?;
            let key = read_file(&public_key, "public key")?;
            let id = provider.upload_ssh_key(&name, key.trim()).await?;
            ui::print_success(&format!("SSH key '{name}' registered"));
            ui::print_field("ID", &id);
        }

        Commands::Snapshot { action } => {
            let (provider, _) = app.connect().await?;
            match action {
                SnapshotAction::Create { server_id, name } => {
                    let snap = provider.create_snapshot(&server_id, &name).await?;
                    ui::print_success(&format!("Snapshot '{}' requested", snap.name));
                    ui::print_snapshots(std::slice::from_ref(&snap));
                }
                SnapshotAction::List { server_id } => {
                    let snaps = provider.list_snapshots(server_id.as_deref()).await?;
                    ui::print_snapshots(&snaps);
                }
                SnapshotAction::Delete { id } => {
                    provider.delete_snapshot(&id).await?;
                    ui::print_success(&format!("Deleted snapshot {id}"));
                }
                SnapshotAction::Cost { server_id } => {
                    let estimate = provider.get_snapshot_cost_estimate(&server_id).await?;
                    println!("{estimate}");
                }
            }
        }
    }

    Ok(())
}

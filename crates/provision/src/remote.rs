//! SSH transport and host hardening.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::collaborators::{ExecOutput, Hardening, RemoteExec};
use crate::config::SshSettings;

/// Per-command ceiling.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Drop-in written by [`SshHardening::setup_security`]; its presence means the
/// host was already hardened.
const SSHD_DROPIN: &str = "/etc/ssh/sshd_config.d/99-cto-hardening.conf";

/// [`RemoteExec`] over the system `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    user: String,
    identity_file: Option<PathBuf>,
    port: u16,
}

impl SshExecutor {
    pub fn new(user: impl Into<String>, identity_file: Option<PathBuf>) -> Self {
        Self {
            user: user.into(),
            identity_file,
            port: 22,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &SshSettings) -> Self {
        Self::new(settings.user.clone(), settings.identity_file.clone())
    }

    /// Connect on a non-default port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn args(&self, address: &str, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{address}", self.user));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RemoteExec for SshExecutor {
    async fn exec(&self, address: &str, command: &str) -> Result<ExecOutput> {
        debug!(address = %address, command = %command, "ssh exec");
        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            Command::new("ssh").args(self.args(address, command)).output(),
        )
        .await
        .with_context(|| format!("ssh to {address} timed out"))?
        .context("Failed to run ssh")?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Firewall commands. Bare servers only expose SSH.
#[must_use]
pub fn firewall_commands(bare: bool) -> Vec<String> {
    let mut commands = vec![
        "DEBIAN_FRONTEND=noninteractive apt-get install -y ufw".to_string(),
        "ufw default deny incoming".to_string(),
        "ufw default allow outgoing".to_string(),
        "ufw allow OpenSSH".to_string(),
    ];
    if !bare {
        commands.push("ufw allow 80/tcp".to_string());
        commands.push("ufw allow 443/tcp".to_string());
    }
    commands.push("ufw --force enable".to_string());
    commands
}

/// sshd and system hardening commands.
#[must_use]
pub fn security_commands(port: Option<u16>) -> Vec<String> {
    let mut dropin = String::from(concat!(
        "PermitRootLogin prohibit-password\\n",
        "PasswordAuthentication no\\n",
        "KbdInteractiveAuthentication no\\n",
        "MaxAuthTries 3\\n",
    ));
    let mut commands =
        vec!["DEBIAN_FRONTEND=noninteractive apt-get install -y fail2ban".to_string()];
    if let Some(port) = port {
        dropin.push_str(&format!("Port {port}\\n"));
        commands.push(format!("ufw allow {port}/tcp || true"));
    }
    commands.push(format!("printf '{dropin}' > {SSHD_DROPIN}"));
    commands.push("sshd -t".to_string());
    commands.push("systemctl enable --now fail2ban".to_string());
    commands.push("systemctl restart ssh || systemctl restart sshd".to_string());
    commands
}

/// [`Hardening`] that runs shell commands through a [`RemoteExec`].
#[derive(Clone)]
pub struct SshHardening {
    exec: Arc<dyn RemoteExec>,
}

impl SshHardening {
    pub fn new(exec: Arc<dyn RemoteExec>) -> Self {
        Self { exec }
    }

    async fn run_all(
        &self,
        address: &str,
        step: &str,
        commands: &[String],
        dry_run: bool,
    ) -> Result<()> {
        for command in commands {
            if dry_run {
                info!(address = %address, step, command = %command, "dry run");
                println!("  [dry-run] {address}: {command}");
                continue;
            }
            let out = self.exec.exec(address, command).await?;
            if !out.success() {
                bail!(
                    "{step}: '{command}' exited with {}: {}",
                    out.exit_code,
                    out.stderr.trim()
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Hardening for SshHardening {
    async fn setup_firewall(
        &self,
        address: &str,
        name: &str,
        dry_run: bool,
        bare: bool,
    ) -> Result<()> {
        info!(address = %address, name = %name, bare, "Configuring firewall");
        self.run_all(address, "firewall", &firewall_commands(bare), dry_run)
            .await
    }

    async fn setup_security(
        &self,
        address: &str,
        name: &str,
        port: Option<u16>,
        dry_run: bool,
        force: bool,
    ) -> Result<()> {
        if !force && !dry_run {
            let probe = self.exec.exec(address, &format!("test -f {SSHD_DROPIN}")).await?;
            if probe.success() {
                info!(address = %address, name = %name, "Already hardened, skipping");
                return Ok(());
            }
        }
        info!(address = %address, name = %name, port = ?port, "Hardening SSH");
        self.run_all(address, "security", &security_commands(port), dry_run)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        already_hardened: bool,
    }

    #[async_trait]
    impl RemoteExec for Recorder {
        async fn exec(&self, _address: &str, command: &str) -> Result<ExecOutput> {
            self.commands.lock().unwrap().push(command.to_string());
            let failed = self.fail_on.is_some_and(|f| command.contains(f))
                || (command.starts_with("test -f") && !self.already_hardened);
            Ok(ExecOutput {
                exit_code: i32::from(failed),
                stdout: String::new(),
                stderr: if failed { "boom".into() } else { String::new() },
            })
        }
    }

    #[test]
    fn test_bare_firewall_only_opens_ssh() {
        let bare = firewall_commands(true);
        assert!(!bare.iter().any(|c| c.contains("80/tcp")));
        assert!(firewall_commands(false).iter().any(|c| c.contains("443/tcp")));
        assert_eq!(bare.last().unwrap(), "ufw --force enable");
    }

    #[test]
    fn test_security_port_is_opened_and_configured() {
        let cmds = security_commands(Some(2222));
        assert!(cmds.iter().any(|c| c.contains("ufw allow 2222/tcp")));
        assert!(cmds.iter().any(|c| c.contains("Port 2222")));
        assert!(!security_commands(None).iter().any(|c| c.contains("Port ")));
    }

    #[test]
    fn test_ssh_args() {
        let exec = SshExecutor::new("admin", Some(PathBuf::from("/k"))).with_port(2222);
        let args = exec.args("1.2.3.4", "uptime");
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/k"]));
        assert_eq!(args[args.len() - 2], "admin@1.2.3.4");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[tokio::test]
    async fn test_failed_command_stops_step() {
        let rec = Arc::new(Recorder {
            fail_on: Some("ufw default deny"),
            ..Recorder::default()
        });
        let hardening = SshHardening::new(rec.clone());
        let err = hardening.setup_firewall("1.2.3.4", "srv", false, true).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(rec.commands.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hardened_host_is_skipped_unless_forced() {
        let rec = Arc::new(Recorder {
            already_hardened: true,
            ..Recorder::default()
        });
        let hardening = SshHardening::new(rec.clone());
        hardening.setup_security("1.2.3.4", "srv", None, false, false).await.unwrap();
        assert_eq!(rec.commands.lock().unwrap().len(), 1);

        hardening.setup_security("1.2.3.4", "srv", None, false, true).await.unwrap();
        assert!(rec.commands.lock().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let rec = Arc::new(Recorder::default());
        let hardening = SshHardening::new(rec.clone());
        hardening.setup_firewall("1.2.3.4", "srv", true, false).await.unwrap();
        hardening.setup_security("1.2.3.4", "srv", Some(2222), true, false).await.unwrap();
        assert!(rec.commands.lock().unwrap().is_empty());
    }
}

//! Default boot scripts per deploy mode.

use crate::config::DeployMode;

/// Container image started in platform mode.
pub const PLATFORM_IMAGE: &str = "ghcr.io/5dlabs/cto-platform:latest";

const BARE: &str = r"#cloud-config
package_update: true
package_upgrade: true
packages:
  - unattended-upgrades
  - curl
runcmd:
  - systemctl enable --now unattended-upgrades
";

/// Render the boot script for `mode`.
#[must_use]
pub fn render(mode: DeployMode) -> String {
    match mode {
        DeployMode::Bare => BARE.to_string(),
        DeployMode::Platform => format!(
            r"#cloud-config
package_update: true
package_upgrade: true
packages:
  - unattended-upgrades
  - curl
  - ca-certificates
runcmd:
  - systemctl enable --now unattended-upgrades
  - curl -fsSL https://get.docker.com | sh
  - systemctl enable --now docker
  - docker run -d --name cto-platform --restart unless-stopped -p 80:80 {PLATFORM_IMAGE}
"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_has_no_docker() {
        let script = render(DeployMode::Bare);
        assert!(script.starts_with("#cloud-config\n"));
        assert!(!script.contains("docker"));
    }

    #[test]
    fn test_platform_publishes_port_80() {
        let script = render(DeployMode::Platform);
        assert!(script.contains("-p 80:80"));
        assert!(script.contains(PLATFORM_IMAGE));
    }
}

//! Ordered credential resolution: flag, then environment, then settings file.
//!
//! The CLI adds an interactive prompt as a last resort.

use std::fmt;

use crate::config::Settings;
use crate::providers::Vendor;

/// Where a token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// `--token` flag.
    Flag,
    /// Named environment variable.
    Environment(String),
    /// Settings file.
    ConfigFile,
    /// Interactive prompt.
    Prompt,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => write!(f, "--token flag"),
            Self::Environment(var) => write!(f, "${var}"),
            Self::ConfigFile => write!(f, "settings file"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

/// A token plus its provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    /// Bearer token.
    pub token: String,
    /// Source.
    pub source: CredentialSource,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("token", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Resolve the token for `vendor`.
///
/// `env` is consulted for each of [`Vendor::token_env_vars`] in order, which
/// keeps this independent of the process environment in tests.
pub fn resolve_credential<F>(
    vendor: Vendor,
    flag: Option<&str>,
    env: F,
    settings: &Settings,
) -> Option<ResolvedCredential>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = flag.and_then(non_blank) {
        return Some(ResolvedCredential {
            token,
            source: CredentialSource::Flag,
        });
    }

    for var in vendor.token_env_vars() {
        if let Some(token) = env(var).as_deref().and_then(non_blank) {
            return Some(ResolvedCredential {
                token,
                source: CredentialSource::Environment((*var).to_string()),
            });
        }
    }

    settings.token_for(vendor).and_then(non_blank).map(|token| ResolvedCredential {
        token,
        source: CredentialSource::ConfigFile,
    })
}

/// [`resolve_credential`] against the real process environment.
pub fn resolve_from_process_env(
    vendor: Vendor,
    flag: Option<&str>,
    settings: &Settings,
) -> Option<ResolvedCredential> {
    resolve_credential(vendor, flag, |var| std::env::var(var).ok(), settings)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn settings_with(vendor: Vendor, token: &str) -> Settings {
        let mut settings = Settings::default();
        settings.tokens.insert(vendor, token.to_string());
        settings
    }

    #[test]
    fn test_flag_wins() {
        let settings = settings_with(Vendor::Hetzner, "from-file");
        let cred = resolve_credential(
            Vendor::Hetzner,
            Some("from-flag"),
            env_of(&[("HCLOUD_TOKEN", "from-env")]),
            &settings,
        )
        .unwrap();
        assert_eq!(cred.token, "from-flag");
        assert_eq!(cred.source, CredentialSource::Flag);
    }

    #[test]
    fn test_env_order_then_file() {
        let settings = settings_with(Vendor::DigitalOcean, "from-file");

        let cred = resolve_credential(
            Vendor::DigitalOcean,
            Some("   "),
            env_of(&[("DO_API_TOKEN", "second"), ("DIGITALOCEAN_TOKEN", "first")]),
            &settings,
        )
        .unwrap();
        assert_eq!(cred.token, "first");
        assert_eq!(cred.source, CredentialSource::Environment("DIGITALOCEAN_TOKEN".into()));

        let cred = resolve_credential(
            Vendor::DigitalOcean,
            None,
            env_of(&[("DIGITALOCEAN_TOKEN", "")]),
            &settings,
        )
        .unwrap();
        assert_eq!(cred.token, "from-file");
        assert_eq!(cred.source, CredentialSource::ConfigFile);
    }

    #[test]
    fn test_nothing_found() {
        let settings = settings_with(Vendor::Hetzner, "other-vendor");
        assert!(resolve_credential(Vendor::Vultr, None, env_of(&[]), &settings).is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let cred = ResolvedCredential {
            token: "super-secret".into(),
            source: CredentialSource::Prompt,
        };
        let shown = format!("{cred:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("Prompt"));
    }
}

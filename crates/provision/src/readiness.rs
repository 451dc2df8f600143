//! HTTP reachability probe for platform-mode servers.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::collaborators::ReadinessProbe;
use crate::config::ReadinessSettings;
use crate::poll::{poll_until, PollConfig, PollOutcome};

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Default checks after the minimum wait.
const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Polls `http://<address>:<port><path>` until any non-5xx answer.
///
/// Polling starts once the caller's minimum wait has passed and then runs
/// for up to `max_attempts` checks, `interval` apart.
#[derive(Clone)]
pub struct HttpReadinessProbe {
    client: Client,
    port: u16,
    path: String,
    interval: Duration,
    max_attempts: u32,
}

impl HttpReadinessProbe {
    /// Build a probe.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(port: u16, path: impl Into<String>, interval: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let path = path.into();
        Ok(Self {
            client,
            port,
            path: if path.starts_with('/') { path } else { format!("/{path}") },
            interval: if interval.is_zero() { Duration::from_secs(1) } else { interval },
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Override the number of checks made after the minimum wait.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Build a probe from the settings file section.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn from_settings(settings: &ReadinessSettings) -> anyhow::Result<Self> {
        Ok(Self::new(
            settings.port,
            settings.path.clone(),
            Duration::from_secs(settings.interval_secs),
        )?
        .with_max_attempts(settings.max_attempts))
    }

    fn url(&self, address: &str) -> String {
        let host = match address.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]"),
            _ => address.to_string(),
        };
        format!("http://{host}:{}{}", self.port, self.path)
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadinessProbe {
    async fn wait_for_ready(&self, address: &str, min_wait: Duration) -> bool {
        let url = self.url(address);
        if !min_wait.is_zero() {
            debug!(
                url = %url,
                wait_secs = min_wait.as_secs(),
                "Waiting before first readiness check"
            );
            tokio::time::sleep(min_wait).await;
        }

        let config = PollConfig::new(self.max_attempts, self.interval);
        let client = &self.client;
        let url_ref = url.as_str();

        let outcome = poll_until(config, |attempt| async move {
            match client.get(url_ref).send().await {
                Ok(resp) if !resp.status().is_server_error() => Some(resp.status().as_u16()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    debug!(url = %url_ref, attempt, status, "Not ready yet");
                    None
                }
                Err(e) => {
                    debug!(url = %url_ref, attempt, error = %e, "Not reachable yet");
                    None
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                info!(url = %url, status = value, attempts, "Platform is responding");
                true
            }
            PollOutcome::TimedOut { attempts } => {
                debug!(url = %url, attempts, "Readiness wait exhausted");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_formatting() {
        let probe = HttpReadinessProbe::new(8080, "health", Duration::from_secs(5)).unwrap();
        assert_eq!(probe.url("1.2.3.4"), "http://1.2.3.4:8080/health");
        assert_eq!(probe.url("2001:db8::1"), "http://[2001:db8::1]:8080/health");
    }

    #[test]
    fn test_settings_set_attempt_budget() {
        let settings = ReadinessSettings {
            max_attempts: 0,
            ..ReadinessSettings::default()
        };
        let probe = HttpReadinessProbe::from_settings(&settings).unwrap();
        assert_eq!(probe.max_attempts, 1);
        assert_eq!(probe.interval, Duration::from_secs(5));

        let probe = HttpReadinessProbe::new(80, "/", Duration::ZERO).unwrap();
        assert_eq!(probe.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(probe.interval, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_wait_is_a_floor() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HttpReadinessProbe::new(port, "/", Duration::from_secs(1))
            .unwrap()
            .with_max_attempts(4);
        let start = tokio::time::Instant::now();
        let ready = probe.wait_for_ready("127.0.0.1", Duration::from_secs(3)).await;
        let elapsed = start.elapsed();

        assert!(!ready);
        // Three second floor, then three one-second gaps between four checks.
        assert!(elapsed >= Duration::from_secs(6), "gave up after {elapsed:?}");
    }
}

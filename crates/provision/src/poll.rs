//! Bounded, fixed-interval polling.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Attempt budget for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Maximum number of probe invocations.
    pub max_attempts: u32,
    /// Delay between consecutive probes.
    pub interval: Duration,
}

impl PollConfig {
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on total wall-clock time spent sleeping.
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Result of [`poll_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// Probe was satisfied on attempt `attempts` (1-based).
    Ready { value: T, attempts: u32 },
    /// Every attempt ran without the probe being satisfied.
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    /// Satisfied value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Ready { value, .. } => Some(value),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Call `probe` until it yields `Some`, at most `config.max_attempts` times.
///
/// Sleeps `config.interval` between attempts but never after the last one.
pub async fn poll_until<T, F, Fut>(config: PollConfig, mut probe: F) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = probe(attempt).await {
            return PollOutcome::Ready {
                value,
                attempts: attempt,
            };
        }
        debug!(attempt, max_attempts = config.max_attempts, "Poll not satisfied");
        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }
    PollOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_on_third_attempt() {
        let cfg = PollConfig::new(5, Duration::ZERO);
        let outcome = poll_until(cfg, |n| async move { (n == 3).then_some(n * 10) }).await;
        assert_eq!(
            outcome,
            PollOutcome::Ready {
                value: 30,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_times_out_after_budget() {
        let mut calls = 0;
        let cfg = PollConfig::new(4, Duration::ZERO);
        let outcome: PollOutcome<()> = poll_until(cfg, |_| {
            calls += 1;
            async { None }
        })
        .await;
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 4 });
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_never_probes() {
        let cfg = PollConfig::new(0, Duration::from_secs(60));
        let outcome: PollOutcome<u8> = poll_until(cfg, |_| async { Some(1) }).await;
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sleep_after_final_attempt() {
        let cfg = PollConfig::new(3, Duration::from_secs(10));
        let start = tokio::time::Instant::now();
        let _: PollOutcome<()> = poll_until(cfg, |_| async { None }).await;
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(cfg.ceiling(), Duration::from_secs(20));
    }
}

//! Jittered update schedule.
//!
//! Every cycle waits the fixed base interval plus a freshly randomized
//! drift, so the remote service never sees perfectly periodic traffic.
//! Waits are measured against the wall clock rather than a monotonic
//! timer: time spent in system suspend counts toward the wait, keeping
//! the real-world cadence intact across laptop lid-closes.

use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ScheduleConfig;

/// Granularity of the wall-clock polling loop.
const POLL_GRANULARITY: Duration = Duration::from_secs(1);

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full wall-clock duration elapsed.
    Elapsed,
    /// The cancellation token fired mid-wait.
    Cancelled,
}

/// Injectable uniform random source, so tests can pin the jitter.
pub trait DriftSource: Send + Sync {
    /// A uniformly distributed value in `[lo, hi)`.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64;
}

/// Production drift source backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadRngDrift;

impl DriftSource for ThreadRngDrift {
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        rand::Rng::gen_range(&mut rand::thread_rng(), lo..hi)
    }
}

/// Fixed interval plus randomized drift, with a suspend-tolerant wait.
pub struct Schedule {
    base_interval: Duration,
    min_drift: Duration,
    max_drift: Duration,
    drift: Box<dyn DriftSource>,
    poll_granularity: Duration,
}

impl Schedule {
    /// Build a schedule from configuration, using the thread-local RNG.
    pub fn new(config: &ScheduleConfig) -> Self {
        Self::with_drift_source(config, Box::new(ThreadRngDrift))
    }

    /// Build a schedule with an explicit drift source.
    pub fn with_drift_source(config: &ScheduleConfig, drift: Box<dyn DriftSource>) -> Self {
        Self {
            base_interval: Duration::from_secs(config.base_interval_secs),
            min_drift: Duration::from_secs_f64(config.min_drift_secs),
            max_drift: Duration::from_secs_f64(config.max_drift_secs),
            drift,
            poll_granularity: POLL_GRANULARITY,
        }
    }

    /// Override the wall-clock poll granularity (useful for testing).
    #[cfg(test)]
    pub fn with_poll_granularity(mut self, granularity: Duration) -> Self {
        self.poll_granularity = granularity;
        self
    }

    /// Delay until the next attempt: `base + min_drift + uniform(0, max - min)`.
    ///
    /// Randomness is drawn fresh on every call; the result is never cached.
    pub fn next_delay(&mut self) -> Duration {
        let spread = (self.max_drift.as_secs_f64() - self.min_drift.as_secs_f64()).max(0.0);
        let extra = self.drift.uniform(0.0, spread);
        self.base_interval + self.min_drift + Duration::from_secs_f64(extra)
    }

    /// Remaining delay when resuming a schedule after a restart.
    ///
    /// Zero when the computed deadline has already passed (overdue: run now).
    pub fn remaining_delay(&mut self, last_success: f64, now: f64) -> Duration {
        let deadline = last_success + self.next_delay().as_secs_f64();
        let remaining = deadline - now;
        if remaining <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(remaining)
        }
    }

    /// Wait at least `duration` of wall-clock time, polling every
    /// [`POLL_GRANULARITY`] so suspend/hibernate periods count toward the
    /// wait. Returns early with [`WaitOutcome::Cancelled`] when `cancel`
    /// fires.
    pub async fn wall_clock_wait(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let deadline = SystemTime::now() + duration;
        loop {
            let now = SystemTime::now();
            let Ok(remaining) = deadline.duration_since(now) else {
                return WaitOutcome::Elapsed;
            };
            if remaining.is_zero() {
                return WaitOutcome::Elapsed;
            }
            let step = remaining.min(self.poll_granularity);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("wait cancelled");
                    return WaitOutcome::Cancelled;
                }
                _ = tokio::time::sleep(step) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    /// Drift source returning a fixed fraction of the requested range.
    struct FixedDrift(f64);

    impl DriftSource for FixedDrift {
        fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
            lo + (hi - lo) * self.0
        }
    }

    fn test_config() -> ScheduleConfig {
        ScheduleConfig {
            base_interval_secs: 4 * 3600,
            min_drift_secs: 10.0,
            max_drift_secs: 60.0,
        }
    }

    #[test]
    fn next_delay_stays_within_bounds() {
        let mut schedule = Schedule::new(&test_config());
        for _ in 0..200 {
            let delay = schedule.next_delay().as_secs_f64();
            assert!(delay >= 4.0 * 3600.0 + 10.0, "delay {delay} below minimum");
            assert!(delay <= 4.0 * 3600.0 + 60.0, "delay {delay} above maximum");
        }
    }

    #[test]
    fn next_delay_is_jittered() {
        let mut schedule = Schedule::new(&test_config());
        let first = schedule.next_delay();
        let varied = (0..100).any(|_| schedule.next_delay() != first);
        assert!(varied, "100 draws produced a constant delay");
    }

    #[test]
    fn next_delay_boundaries_with_pinned_drift() {
        let mut low = Schedule::with_drift_source(&test_config(), Box::new(FixedDrift(0.0)));
        assert_eq!(low.next_delay(), Duration::from_secs(4 * 3600 + 10));

        let mut high = Schedule::with_drift_source(&test_config(), Box::new(FixedDrift(1.0)));
        assert_eq!(high.next_delay(), Duration::from_secs(4 * 3600 + 60));
    }

    #[test]
    fn remaining_delay_is_zero_when_overdue() {
        let mut schedule = Schedule::new(&test_config());
        let base = 4.0 * 3600.0;
        // Fresh store: last success at epoch, now already two intervals in.
        assert_eq!(schedule.remaining_delay(0.0, base * 2.0), Duration::ZERO);
    }

    #[test]
    fn remaining_delay_bounded_by_interval_plus_max_drift() {
        let mut schedule = Schedule::new(&test_config());
        let now = 1_700_000_000.0;
        for offset in [0.0, 1.0, 3600.0, 4.0 * 3600.0] {
            let remaining = schedule.remaining_delay(now - offset, now).as_secs_f64();
            assert!(remaining >= 0.0);
            assert!(
                remaining <= 4.0 * 3600.0 + 60.0,
                "remaining {remaining} above base + max drift"
            );
        }
    }

    #[test]
    fn remaining_delay_counts_down_from_last_success() {
        let mut schedule = Schedule::with_drift_source(&test_config(), Box::new(FixedDrift(0.0)));
        let last = 1_000.0;
        let now = 1_000.0 + 3600.0;
        let remaining = schedule.remaining_delay(last, now).as_secs_f64();
        // base + min_drift - elapsed hour
        assert!((remaining - (3.0 * 3600.0 + 10.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn wall_clock_wait_elapses() {
        let schedule = Schedule::new(&test_config())
            .with_poll_granularity(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let outcome = schedule
            .wall_clock_wait(Duration::from_millis(30), &cancel)
            .await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
    }

    #[tokio::test]
    async fn wall_clock_wait_returns_early_on_cancel() {
        let schedule = Schedule::new(&test_config())
            .with_poll_granularity(Duration::from_millis(20));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let start = std::time::Instant::now();
        let outcome = schedule
            .wall_clock_wait(Duration::from_secs(3600), &cancel)
            .await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
        // Cancellation should be observed well before the hour is up.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn zero_duration_wait_returns_immediately() {
        let schedule = Schedule::new(&test_config());
        let cancel = CancellationToken::new();
        let outcome = schedule.wall_clock_wait(Duration::ZERO, &cancel).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
    }
}

//! The unattended update loop.
//!
//! Reads the last success time, waits out the remainder of the schedule,
//! attempts an update, records success, and waits again until cancelled. A failed attempt is neither retried immediately nor
//! escalated: the loop just waits the normal full interval and tries at
//! the next slot, which bounds load on the remote service.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::executor::ActionExecutor;
use crate::outcome::{ActionOutcome, OutcomeKind, now_epoch_secs};
use crate::schedule::{Schedule, WaitOutcome};
use crate::tracker::UpdateTracker;

/// Owns the tracker, schedule and executor for the lifetime of the loop.
pub struct UpdateRunner {
    tracker: UpdateTracker,
    schedule: Schedule,
    executor: ActionExecutor,
    attempt_timeout: Duration,
    cancel: CancellationToken,
}

impl UpdateRunner {
    /// Assemble a runner. The tracker must already be open.
    pub fn new(
        tracker: UpdateTracker,
        schedule: Schedule,
        executor: ActionExecutor,
        attempt_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tracker,
            schedule,
            executor,
            attempt_timeout,
            cancel,
        }
    }

    /// Run until cancellation. Consumes the runner; the tracker is closed
    /// on every exit path.
    pub async fn run(mut self) -> Result<()> {
        let last = self.tracker.last_update()?;
        info!(last_update = last, "starting update scheduler");

        // Resume the schedule rather than starting an ad hoc grace period:
        // the startup wait uses the same jittered delay semantics.
        let delay = self.schedule.remaining_delay(last, now_epoch_secs());
        if !delay.is_zero() {
            info!(secs = delay.as_secs_f64(), "waiting for next update");
            if self.wait(delay).await == WaitOutcome::Cancelled {
                return self.shutdown();
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            info!("updating now");
            let outcome = self
                .executor
                .update(self.attempt_timeout, &self.cancel)
                .await;
            self.settle(&outcome);

            let delay = self.schedule.next_delay();
            info!(secs = delay.as_secs_f64(), "waiting for next update");
            if self.wait(delay).await == WaitOutcome::Cancelled {
                break;
            }
        }

        self.shutdown()
    }

    /// Log the attempt and persist the timestamp on success.
    ///
    /// A storage failure here degrades to in-memory scheduling: the loop
    /// keeps its cadence, it just cannot survive a restart faithfully.
    fn settle(&self, outcome: &ActionOutcome) {
        match outcome.kind {
            OutcomeKind::Success => {
                info!(%outcome, "update attempt finished");
                if let Err(e) = self.tracker.record_update(now_epoch_secs()) {
                    error!("cannot persist update time: {e}");
                }
            }
            OutcomeKind::Fatal => error!(%outcome, "update attempt finished"),
            OutcomeKind::Cancelled => info!(%outcome, "update attempt finished"),
            _ => warn!(%outcome, "update attempt finished"),
        }
    }

    async fn wait(&self, delay: Duration) -> WaitOutcome {
        self.schedule.wall_clock_wait(delay, &self.cancel).await
    }

    fn shutdown(self) -> Result<()> {
        self.tracker.close();
        info!("update scheduler stopped");
        Ok(())
    }
}

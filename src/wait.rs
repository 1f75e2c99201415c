//! Bounded condition waits.
//!
//! The browser flows need "wait until the page reaches state X, or give up
//! after the timeout" in several places. This keeps that contract in one
//! polling utility instead of ad hoc sleep loops at every call site.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Result, UpdaterError};

/// Poll `probe` until it reports the condition met or `timeout` expires.
///
/// Returns `Ok(true)` when the condition was observed, `Ok(false)` on
/// timeout. Probe errors propagate immediately and abort the wait, as does
/// cancellation: `cancel` firing mid-wait yields [`UpdaterError::Cancelled`]
/// without waiting for the next poll to resolve.
pub async fn wait_until<F, Fut>(
    mut probe: F,
    timeout: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }
        if probe().await? {
            return Ok(true);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdaterError::Cancelled),
            _ = tokio::time::sleep(remaining.min(poll)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn immediate_condition_returns_true_without_sleeping() {
        let start = Instant::now();
        let met = wait_until(
            || async { Ok(true) },
            Duration::from_secs(10),
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(met);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn condition_met_after_a_few_polls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let met = wait_until(
            move || {
                let counter = Arc::clone(&counter);
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
            },
            Duration::from_secs(5),
            Duration::from_millis(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(met);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn timeout_returns_false() {
        let met = wait_until(
            || async { Ok(false) },
            Duration::from_millis(30),
            Duration::from_millis(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!met);
    }

    #[tokio::test]
    async fn probe_error_aborts_the_wait() {
        let result = wait_until(
            || async { Err(UpdaterError::Browser("gone".to_owned())) },
            Duration::from_secs(5),
            Duration::from_millis(5),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(UpdaterError::Browser(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_long_wait() {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        // Hour-long timeout: only cancellation can end this promptly.
        let result = wait_until(
            || async { Ok(false) },
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(UpdaterError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn already_cancelled_wait_skips_the_probe() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);
        let result = wait_until(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                }
            },
            Duration::from_secs(5),
            Duration::from_millis(5),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(UpdaterError::Cancelled)));
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }
}

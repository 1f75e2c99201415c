//! Result of a single action attempt.
//!
//! One [`ActionOutcome`] is produced per login/update attempt. Outcomes are
//! never persisted; only a success triggers a write to the update tracker.

use std::time::Duration;

/// How an attempt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// All invoked controls were accepted by the remote service in time.
    Success,
    /// A bounded wait expired before the expected page state appeared.
    /// Retryable on the next scheduled cycle.
    TimedOut,
    /// The page changed under us mid-operation (stale element, vanished
    /// node). Retryable on the next scheduled cycle.
    TransientUi,
    /// The listing rendered, but no control passed the actionable filter.
    /// Distinct from a timeout: the page answered, there was nothing to do.
    NoActionableControls,
    /// Anything else (no session, driver gone, protocol error). Logged at
    /// higher severity since it suggests a persistent problem.
    Fatal,
    /// Shutdown was requested mid-attempt; the wait was abandoned.
    Cancelled,
}

impl OutcomeKind {
    /// Short lowercase label for log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TimedOut => "timed out",
            Self::TransientUi => "transient UI error",
            Self::NoActionableControls => "nothing to update",
            Self::Fatal => "fatal error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one action attempt, with enough context to diagnose from a
/// single log line.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// How the attempt resolved.
    pub kind: OutcomeKind,
    /// Wall-clock time the attempt started (UTC epoch seconds).
    pub attempted_at: f64,
    /// How long the attempt took, whatever the result.
    pub elapsed: Duration,
    /// Optional diagnostic detail (never credentials).
    pub message: Option<String>,
}

impl ActionOutcome {
    /// Build an outcome of the given kind with no message.
    pub fn new(kind: OutcomeKind, attempted_at: f64, elapsed: Duration) -> Self {
        Self {
            kind,
            attempted_at,
            elapsed,
            message: None,
        }
    }

    /// Build an outcome carrying a diagnostic message.
    pub fn with_message(
        kind: OutcomeKind,
        attempted_at: f64,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            attempted_at,
            elapsed,
            message: Some(message.into()),
        }
    }

    /// Whether the attempt succeeded (and should be recorded).
    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {:.1}s",
            self.kind.label(),
            self.elapsed.as_secs_f64()
        )?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Current wall-clock time as UTC epoch seconds (fractional).
pub fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

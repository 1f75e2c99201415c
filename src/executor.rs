//! One action attempt, start to finish.
//!
//! Opens a session, runs the requested flow, always releases the session,
//! and normalizes every possible ending into an [`ActionOutcome`]. Nothing
//! escapes as an error: the loop above only ever sees outcome kinds.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::{FlowResult, SessionFactory};
use crate::error::UpdaterError;
use crate::outcome::{ActionOutcome, OutcomeKind, now_epoch_secs};

/// Which flow an attempt drives.
enum Flow {
    Login,
    Update(Duration),
}

/// Runs login/update attempts against sessions from a factory.
pub struct ActionExecutor {
    factory: Box<dyn SessionFactory>,
}

impl ActionExecutor {
    /// Build an executor over the given session factory.
    pub fn new(factory: Box<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Run one interactive login attempt. `cancel` interrupts the login
    /// wait.
    pub async fn login(&self, cancel: &CancellationToken) -> ActionOutcome {
        self.attempt(Flow::Login, cancel).await
    }

    /// Run one update attempt with the given page-state timeout. `cancel`
    /// firing ends any in-attempt wait early; the session is still
    /// released.
    pub async fn update(&self, timeout: Duration, cancel: &CancellationToken) -> ActionOutcome {
        self.attempt(Flow::Update(timeout), cancel).await
    }

    async fn attempt(&self, flow: Flow, cancel: &CancellationToken) -> ActionOutcome {
        let attempted_at = now_epoch_secs();
        let started = Instant::now();

        let mut session = match self.factory.open_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("cannot open browser session: {e}");
                return ActionOutcome::with_message(
                    OutcomeKind::Fatal,
                    attempted_at,
                    started.elapsed(),
                    e.to_string(),
                );
            }
        };

        let result = match flow {
            Flow::Login => session.perform_login_flow(cancel).await,
            Flow::Update(timeout) => session.perform_update_flow(timeout, cancel).await,
        };

        // Release the session whatever the flow did.
        if let Err(e) = session.quit().await {
            warn!("cannot release browser session: {e}");
        }

        let elapsed = started.elapsed();
        match result {
            Ok(FlowResult::Completed) => {
                ActionOutcome::new(OutcomeKind::Success, attempted_at, elapsed)
            }
            Ok(FlowResult::TimedOut) => {
                ActionOutcome::new(OutcomeKind::TimedOut, attempted_at, elapsed)
            }
            Ok(FlowResult::NothingToDo) => ActionOutcome::with_message(
                OutcomeKind::NoActionableControls,
                attempted_at,
                elapsed,
                "no actionable update controls on the listing",
            ),
            Err(UpdaterError::TransientUi(msg)) => {
                ActionOutcome::with_message(OutcomeKind::TransientUi, attempted_at, elapsed, msg)
            }
            Err(UpdaterError::Cancelled) => {
                info!("attempt abandoned: shutdown requested");
                ActionOutcome::new(OutcomeKind::Cancelled, attempted_at, elapsed)
            }
            Err(e) => {
                error!("attempt failed: {e}");
                ActionOutcome::with_message(OutcomeKind::Fatal, attempted_at, elapsed, e.to_string())
            }
        }
    }
}

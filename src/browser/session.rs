//! Collaborator seam for the browser session.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// How a browser flow resolved, before error normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowResult {
    /// The flow observed the expected end state in time.
    Completed,
    /// The bounded wait expired first.
    TimedOut,
    /// The listing rendered but no control passed the actionable filter.
    NothingToDo,
}

/// One authenticated browser session against the résumé listing.
///
/// Sessions are stateful and must be released with [`quit`](Self::quit)
/// regardless of flow outcome.
#[async_trait]
pub trait ResumeSession: Send {
    /// Drive the interactive login flow: open the login page and block
    /// until the listing becomes reachable (the human has logged in) or a
    /// long timeout elapses. `cancel` firing ends any wait early with
    /// [`UpdaterError::Cancelled`](crate::error::UpdaterError::Cancelled).
    async fn perform_login_flow(&mut self, cancel: &CancellationToken) -> Result<FlowResult>;

    /// Drive one update pass: open the listing, wait up to `timeout` for
    /// controls to appear, invoke the actionable ones, and wait up to
    /// `timeout` for the service to accept them all. `cancel` interrupts
    /// both waits and the inter-click pauses.
    async fn perform_update_flow(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<FlowResult>;

    /// Release the session.
    async fn quit(self: Box<Self>) -> Result<()>;
}

/// Opens fresh sessions, one per attempt.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a new browser session.
    async fn open_session(&self) -> Result<Box<dyn ResumeSession>>;
}

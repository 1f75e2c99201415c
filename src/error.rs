//! Error types for the updater.

/// Top-level error type for the CV update agent.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// Persistent last-update store unreadable or uncreatable.
    #[error("storage error: {0}")]
    Storage(String),

    /// Operation attempted on a closed last-update store.
    #[error("update tracker is closed")]
    Closed,

    /// Configuration error (bad file, invalid value).
    #[error("config error: {0}")]
    Config(String),

    /// WebDriver / browser session error.
    #[error("browser error: {0}")]
    Browser(String),

    /// The page state became inconsistent mid-operation (stale or vanished
    /// element). Retryable on the next scheduled cycle.
    #[error("transient UI error: {0}")]
    TransientUi(String),

    /// chromedriver could not be located or started.
    #[error("driver error: {0}")]
    Driver(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown was requested. Not a failure; a clean-exit marker.
    #[error("cancellation requested")]
    Cancelled,
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdaterError>;

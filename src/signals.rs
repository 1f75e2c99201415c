//! Termination signal bridge.
//!
//! SIGINT/SIGTERM are translated into the loop's cancellation token
//! instead of killing the process, so the store and the browser session
//! are always released on the way out.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawn a task that cancels `cancel` on the first termination signal.
pub fn install(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("cannot install SIGTERM handler: {e}");
                    if ctrl_c.await.is_ok() {
                        info!("received Ctrl+C, shutting down...");
                        cancel.cancel();
                    }
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, shutting down..."),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
            }
            cancel.cancel();
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_ok() {
                info!("received Ctrl+C, shutting down...");
                cancel.cancel();
            }
        }
    });
}

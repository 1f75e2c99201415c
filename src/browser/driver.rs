//! chromedriver process management.
//!
//! When no external WebDriver URL is configured, a chromedriver child is
//! spawned for the lifetime of the process and killed when the handle
//! drops, so shutdown never leaves a stray driver behind.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::config::DriverConfig;
use crate::error::{Result, UpdaterError};
use crate::wait::wait_until;

/// How long to wait for a spawned chromedriver to start listening.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for the listening socket.
const STARTUP_POLL: Duration = Duration::from_millis(200);

/// A running WebDriver endpoint: either a spawned chromedriver child or an
/// externally managed server.
pub struct DriverHandle {
    url: Url,
    // Held only to keep kill_on_drop armed for the spawned case.
    _child: Option<Child>,
}

impl DriverHandle {
    /// Connect to the configured endpoint, spawning chromedriver if no
    /// external `webdriver_url` is set. `cancel` aborts the readiness wait.
    pub async fn start(config: &DriverConfig, cancel: &CancellationToken) -> Result<Self> {
        if let Some(external) = &config.webdriver_url {
            let url = Url::parse(external)
                .map_err(|e| UpdaterError::Driver(format!("bad webdriver URL {external}: {e}")))?;
            debug!(%url, "using external webdriver endpoint");
            return Ok(Self { url, _child: None });
        }

        let binary = which::which(&config.binary).map_err(|e| {
            UpdaterError::Driver(format!("cannot locate {}: {e}", config.binary))
        })?;

        let child = Command::new(&binary)
            .arg(format!("--port={}", config.port))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                UpdaterError::Driver(format!("cannot spawn {}: {e}", binary.display()))
            })?;

        let port = config.port;
        let ready = wait_until(
            move || async move { Ok(TcpStream::connect(("127.0.0.1", port)).await.is_ok()) },
            STARTUP_TIMEOUT,
            STARTUP_POLL,
            cancel,
        )
        .await?;
        if !ready {
            return Err(UpdaterError::Driver(format!(
                "{} did not start listening on port {port} within {}s",
                binary.display(),
                STARTUP_TIMEOUT.as_secs()
            )));
        }

        let url = Url::parse(&format!("http://127.0.0.1:{port}"))
            .map_err(|e| UpdaterError::Driver(format!("cannot build driver URL: {e}")))?;
        info!(driver = %binary.display(), %url, "chromedriver started");
        Ok(Self {
            url,
            _child: Some(child),
        })
    }

    /// The WebDriver endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

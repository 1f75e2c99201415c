//! CLI entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cv_updater::browser::{DriverHandle, WebDriverFactory};
use cv_updater::config::BrowserKind;
use cv_updater::schedule::Schedule;
use cv_updater::{ActionExecutor, UpdateRunner, UpdateTracker, UpdaterConfig, signals};

/// Tracker database filename within the data directory.
const DB_FILENAME: &str = "hhautomate.db";

/// Keeps your résumé listing looking recently updated.
#[derive(Parser)]
#[command(name = "cv-updater", version, about)]
struct Cli {
    /// Page-state wait timeout in seconds.
    #[arg(short = 't', long)]
    timeout: Option<f64>,

    /// Browser to drive.
    #[arg(short, long, value_enum)]
    browser: Option<BrowserKind>,

    /// Logging verbosity (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    /// Application data directory.
    #[arg(short = 'd', long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Path to TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Open a browser window and wait for you to log in. Run once.
    Login,

    /// Run the unattended update loop until SIGINT/SIGTERM.
    Update,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("cv_updater={}", cli.verbosity))),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => UpdaterConfig::from_file(path)?,
        None => UpdaterConfig::default(),
    };
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(browser) = cli.browser {
        config.browser = browser;
    }
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }
    config.validate()?;

    let data_dir = config.resolved_data_dir()?;
    create_data_dir(&data_dir)?;

    match cli.command {
        Command::Login => run_login(&config, data_dir).await,
        Command::Update => run_update(&config, data_dir).await,
    }
}

/// Create the data directory, owner-only on unix (it holds browser cookies).
fn create_data_dir(dir: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create data dir {}", dir.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("cannot restrict data dir {}", dir.display()))?;
    }
    Ok(())
}

async fn run_login(config: &UpdaterConfig, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("login mode: enter your credentials in the opened browser window");

    let cancel = CancellationToken::new();
    signals::install(cancel.clone());

    let driver = DriverHandle::start(&config.driver, &cancel).await?;
    let factory = WebDriverFactory::new(
        driver.url().clone(),
        config,
        data_dir.join("profile"),
        false,
    );
    let executor = ActionExecutor::new(Box::new(factory));

    let outcome = executor.login(&cancel).await;
    info!(%outcome, "login attempt finished");
    if !outcome.is_success() {
        anyhow::bail!("login did not complete: {outcome}");
    }
    Ok(())
}

async fn run_update(config: &UpdaterConfig, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("update mode: running headless browser");

    let tracker = UpdateTracker::open(&data_dir.join(DB_FILENAME))?;

    let cancel = CancellationToken::new();
    signals::install(cancel.clone());

    // The driver child outlives the loop and dies with this handle.
    let driver = DriverHandle::start(&config.driver, &cancel).await?;
    let factory = WebDriverFactory::new(
        driver.url().clone(),
        config,
        data_dir.join("profile"),
        true,
    );
    let executor = ActionExecutor::new(Box::new(factory));

    let runner = UpdateRunner::new(
        tracker,
        Schedule::new(&config.schedule),
        executor,
        config.attempt_timeout(),
        cancel,
    );
    runner.run().await?;

    info!("shutting down...");
    Ok(())
}

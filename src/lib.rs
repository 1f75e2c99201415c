//! cv-updater: keeps a résumé listing fresh on a jittered schedule.
//!
//! # Architecture
//!
//! The core is a scheduling-and-state-tracking loop built from small,
//! independently testable pieces:
//! - **Tracker**: one durable SQLite record of the last successful update
//! - **Schedule**: fixed interval + randomized drift, with suspend-tolerant
//!   wall-clock waits
//! - **Executor**: one browser attempt, normalized into a fixed outcome set
//! - **Runner**: the infinite, cancellable loop tying them together
//! - **Signals**: SIGINT/SIGTERM translated into the loop's cancellation
//!
//! Browser mechanics live behind the [`browser::ResumeSession`] seam.

pub mod browser;
pub mod config;
pub mod error;
pub mod executor;
pub mod outcome;
pub mod runner;
pub mod schedule;
pub mod signals;
pub mod tracker;
pub mod wait;

pub use config::UpdaterConfig;
pub use error::{Result, UpdaterError};
pub use executor::ActionExecutor;
pub use outcome::{ActionOutcome, OutcomeKind};
pub use runner::UpdateRunner;
pub use schedule::{Schedule, WaitOutcome};
pub use tracker::UpdateTracker;

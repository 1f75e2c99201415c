//! Configuration for the update agent.
//!
//! Values come from an optional TOML file (`--config`), with CLI flags
//! overriding individual fields. Everything has a sensible default; the
//! zero-config invocation targets hh.ru with a 4-hour jittered cadence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdaterError};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Application data directory (tracker DB + browser profile).
    /// `None` resolves to `~/.config/cv-updater`.
    pub data_dir: Option<PathBuf>,
    /// Per-attempt wait timeout for page state, in seconds. Must be positive.
    pub timeout_secs: f64,
    /// Which browser to drive.
    pub browser: BrowserKind,
    /// Update schedule (base interval and drift bounds).
    pub schedule: ScheduleConfig,
    /// WebDriver endpoint / chromedriver settings.
    pub driver: DriverConfig,
    /// Target pages and control classification.
    pub site: SiteConfig,
}

/// Which browser the driver should launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Google Chrome.
    Chrome,
    /// Chromium.
    #[default]
    Chromium,
}

impl BrowserKind {
    /// Candidate browser binary names for `which` lookup, most specific first.
    pub fn binary_candidates(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &["google-chrome", "google-chrome-stable"],
            Self::Chromium => &["chromium", "chromium-browser"],
        }
    }
}

/// Update cadence: fixed base interval plus randomized drift bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fixed interval between updates, in seconds.
    pub base_interval_secs: u64,
    /// Minimum extra drift, in seconds.
    pub min_drift_secs: f64,
    /// Maximum extra drift, in seconds.
    pub max_drift_secs: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: 4 * 3600,
            min_drift_secs: 10.0,
            max_drift_secs: 60.0,
        }
    }
}

/// WebDriver endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// External WebDriver URL. When set, no chromedriver is spawned.
    pub webdriver_url: Option<String>,
    /// chromedriver binary name (resolved via PATH) or absolute path.
    pub binary: String,
    /// Port for the spawned chromedriver.
    pub port: u16,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            binary: "chromedriver".to_owned(),
            port: 9515,
        }
    }
}

/// Target pages and the control-classification heuristic.
///
/// The class names are a markup heuristic the remote service may change;
/// keeping them configurable avoids a code change when it does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Résumé listing page.
    pub list_url: String,
    /// Login page; the listing path is appended as a `backurl` query param.
    pub login_url: String,
    /// XPath locating every update control on the listing.
    pub button_xpath: String,
    /// Class an element must carry to count as an update link.
    pub require_class: String,
    /// Class on the parent marking a control as "already updated".
    pub disabled_class: String,
    /// Invoke controls even when classified as already updated.
    pub click_disabled: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            list_url: "https://hh.ru/applicant/resumes".to_owned(),
            login_url: "https://hh.ru/account/login".to_owned(),
            button_xpath: "//button[@data-qa='resume-update-button']".to_owned(),
            require_class: "bloko-link".to_owned(),
            disabled_class: "applicant-resumes-update-button_disabled".to_owned(),
            click_disabled: false,
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            UpdaterError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| UpdaterError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs <= 0.0 {
            return Err(UpdaterError::Config(format!(
                "timeout must be positive, got {}",
                self.timeout_secs
            )));
        }
        if self.schedule.min_drift_secs < 0.0 {
            return Err(UpdaterError::Config("min drift must be >= 0".to_owned()));
        }
        if self.schedule.max_drift_secs < self.schedule.min_drift_secs {
            return Err(UpdaterError::Config(format!(
                "max drift ({}) must be >= min drift ({})",
                self.schedule.max_drift_secs, self.schedule.min_drift_secs
            )));
        }
        if self.schedule.base_interval_secs == 0 {
            return Err(UpdaterError::Config(
                "base interval must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// Resolved data directory (`~/.config/cv-updater` by default).
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::config_dir()
            .map(|d| d.join("cv-updater"))
            .ok_or_else(|| UpdaterError::Config("cannot determine config directory".to_owned()))
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            timeout_secs: 10.0,
            browser: BrowserKind::default(),
            schedule: ScheduleConfig::default(),
            driver: DriverConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = UpdaterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeout_secs, 10.0);
        assert_eq!(config.browser, BrowserKind::Chromium);
        assert_eq!(config.schedule.base_interval_secs, 4 * 3600);
        assert!(config.site.list_url.contains("/applicant/resumes"));
    }

    #[test]
    fn zero_or_negative_timeout_is_rejected() {
        for bad in [0.0, -1.0] {
            let config = UpdaterConfig {
                timeout_secs: bad,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(UpdaterError::Config(_))));
        }
    }

    #[test]
    fn inverted_drift_bounds_are_rejected() {
        let config = UpdaterConfig {
            schedule: ScheduleConfig {
                base_interval_secs: 3600,
                min_drift_secs: 60.0,
                max_drift_secs: 10.0,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(UpdaterError::Config(_))));
    }

    #[test]
    fn toml_round_trip() {
        let config = UpdaterConfig {
            timeout_secs: 25.0,
            browser: BrowserKind::Chrome,
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        let restored: UpdaterConfig = toml::from_str(&text).unwrap();
        assert_eq!(restored.timeout_secs, 25.0);
        assert_eq!(restored.browser, BrowserKind::Chrome);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let restored: UpdaterConfig = toml::from_str("timeout_secs = 5.0\n").unwrap();
        assert_eq!(restored.timeout_secs, 5.0);
        assert_eq!(restored.schedule.base_interval_secs, 4 * 3600);
        assert_eq!(restored.driver.port, 9515);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = UpdaterConfig::from_file(Path::new("/no/such/config.toml"));
        assert!(matches!(result, Err(UpdaterError::Config(_))));
    }

    #[test]
    fn from_file_validates_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "timeout_secs = -3.0\n").unwrap();
        assert!(matches!(
            UpdaterConfig::from_file(&path),
            Err(UpdaterError::Config(_))
        ));
    }

    #[test]
    fn resolved_data_dir_defaults_under_config_dir() {
        let config = UpdaterConfig::default();
        let dir = config.resolved_data_dir().unwrap();
        assert!(dir.ends_with("cv-updater"));
    }
}

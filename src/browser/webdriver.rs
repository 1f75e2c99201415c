//! WebDriver-backed résumé session.
//!
//! Thin wrapper over `fantoccini`: page navigation, control lookup and
//! clicking. All waiting goes through [`wait_until`] so every bounded wait
//! has the same timeout and cancellation contract.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::browser::session::{FlowResult, ResumeSession, SessionFactory};
use crate::config::{BrowserKind, SiteConfig, UpdaterConfig};
use crate::error::{Result, UpdaterError};
use crate::schedule::{DriftSource, ThreadRngDrift};
use crate::wait::wait_until;

/// Poll interval for page-state waits.
const PAGE_POLL: Duration = Duration::from_millis(500);

/// Login is interactive: wait up to an hour for the human.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(3600);

/// Bounds of the randomized pause between successive clicks, in seconds.
const CLICK_PAUSE_RANGE: (f64, f64) = (1.0, 3.0);

/// Map a WebDriver command error onto the crate taxonomy.
///
/// Stale/missing element races are transient (the page re-rendered under
/// us); everything else is a plain browser error.
fn classify(e: CmdError) -> UpdaterError {
    classify_text(e.to_string())
}

fn classify_text(text: String) -> UpdaterError {
    let lowered = text.to_lowercase();
    if lowered.contains("stale element") || lowered.contains("no such element") {
        UpdaterError::TransientUi(text)
    } else {
        UpdaterError::Browser(text)
    }
}

/// Whether `class_attr` contains `class` as a whole word.
fn has_class(class_attr: &str, class: &str) -> bool {
    class_attr.split_whitespace().any(|c| c == class)
}

/// The actionable-control predicate: carries the link class, and is not
/// marked already-updated on its parent (unless overridden).
fn control_is_actionable(class_attr: &str, parent_class_attr: &str, site: &SiteConfig) -> bool {
    if !has_class(class_attr, &site.require_class) {
        return false;
    }
    site.click_disabled || !has_class(parent_class_attr, &site.disabled_class)
}

/// One update control on the listing, abstracted over the WebDriver
/// element so the click orchestration is testable without a browser.
#[async_trait]
trait UpdateControl: Send + Sync {
    /// The control's own `class` attribute.
    async fn class(&self) -> Result<String>;

    /// The parent element's `class` attribute.
    async fn parent_class(&self) -> Result<String>;

    /// Click the control.
    async fn invoke(&self) -> Result<()>;
}

#[async_trait]
impl UpdateControl for Element {
    async fn class(&self) -> Result<String> {
        Ok(self
            .attr("class")
            .await
            .map_err(classify)?
            .unwrap_or_default())
    }

    async fn parent_class(&self) -> Result<String> {
        let parent = self.find(Locator::XPath("..")).await.map_err(classify)?;
        Ok(parent
            .attr("class")
            .await
            .map_err(classify)?
            .unwrap_or_default())
    }

    async fn invoke(&self) -> Result<()> {
        self.click().await.map_err(classify)
    }
}

/// Keep only the controls passing the actionable predicate.
async fn classify_actionable<C: UpdateControl>(
    controls: Vec<C>,
    site: &SiteConfig,
) -> Result<Vec<C>> {
    let mut out = Vec::new();
    for control in controls {
        let class = control.class().await?;
        let parent_class = control.parent_class().await?;
        if control_is_actionable(&class, &parent_class, site) {
            out.push(control);
        }
    }
    Ok(out)
}

/// Invoke each control in order, with a randomized pause between clicks.
///
/// An intercepted click means the control flipped to disabled between
/// lookup and click (the update already went through); it is logged and
/// skipped. Other errors abort the pass.
async fn invoke_controls<C: UpdateControl>(
    controls: &[C],
    pause: &mut dyn DriftSource,
    cancel: &CancellationToken,
) -> Result<()> {
    for (i, control) in controls.iter().enumerate() {
        if i > 0 {
            let (lo, hi) = CLICK_PAUSE_RANGE;
            let secs = pause.uniform(lo, hi);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UpdaterError::Cancelled),
                _ = tokio::time::sleep(Duration::from_secs_f64(secs)) => {}
            }
        }
        match control.invoke().await {
            Ok(()) => debug!("clicked update control"),
            Err(err) => {
                if let UpdaterError::Browser(msg) = &err {
                    if msg.to_lowercase().contains("click intercepted") {
                        info!("click intercepted; control already disabled");
                        continue;
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Collect the update controls currently classified as actionable.
async fn actionable_controls(client: &Client, site: &SiteConfig) -> Result<Vec<Element>> {
    let elems = client
        .find_all(Locator::XPath(&site.button_xpath))
        .await
        .map_err(classify)?;
    classify_actionable(elems, site).await
}

/// Login URL with the listing path as the post-login destination.
fn build_login_url(site: &SiteConfig) -> Result<Url> {
    let list = Url::parse(&site.list_url)
        .map_err(|e| UpdaterError::Config(format!("bad list URL {}: {e}", site.list_url)))?;
    let mut login = Url::parse(&site.login_url)
        .map_err(|e| UpdaterError::Config(format!("bad login URL {}: {e}", site.login_url)))?;
    login.query_pairs_mut().append_pair("backurl", list.path());
    Ok(login)
}

/// Wait up to `timeout` for any update control to be present.
async fn wait_for_controls(
    client: Client,
    xpath: String,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<bool> {
    wait_until(
        move || {
            let client = client.clone();
            let xpath = xpath.clone();
            async move {
                match client.find_all(Locator::XPath(&xpath)).await {
                    Ok(elems) => Ok(!elems.is_empty()),
                    Err(e) => match classify(e) {
                        UpdaterError::TransientUi(_) => Ok(false),
                        other => Err(other),
                    },
                }
            }
        },
        timeout,
        PAGE_POLL,
        cancel,
    )
    .await
}

/// One fantoccini-backed browser session.
pub struct WebDriverSession {
    client: Client,
    site: SiteConfig,
    login_url: Url,
    pause: Box<dyn DriftSource>,
}

#[async_trait]
impl ResumeSession for WebDriverSession {
    async fn perform_login_flow(&mut self, cancel: &CancellationToken) -> Result<FlowResult> {
        self.client
            .goto(self.login_url.as_str())
            .await
            .map_err(classify)?;
        info!("login page opened; waiting for the listing to become reachable");
        let reachable = wait_for_controls(
            self.client.clone(),
            self.site.button_xpath.clone(),
            LOGIN_TIMEOUT,
            cancel,
        )
        .await?;
        if reachable {
            info!("logged in");
            Ok(FlowResult::Completed)
        } else {
            Ok(FlowResult::TimedOut)
        }
    }

    async fn perform_update_flow(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<FlowResult> {
        self.client
            .goto(&self.site.list_url)
            .await
            .map_err(classify)?;
        let appeared = wait_for_controls(
            self.client.clone(),
            self.site.button_xpath.clone(),
            timeout,
            cancel,
        )
        .await?;
        if !appeared {
            return Ok(FlowResult::TimedOut);
        }

        let controls = actionable_controls(&self.client, &self.site).await?;
        if controls.is_empty() {
            return Ok(FlowResult::NothingToDo);
        }
        info!(count = controls.len(), "located update controls");
        invoke_controls(&controls, self.pause.as_mut(), cancel).await?;

        // The service disables each control as it accepts the update; the
        // pass is done once the actionable set drains. Stale reads mid-poll
        // are expected while the page re-renders.
        let client = self.client.clone();
        let site = self.site.clone();
        let drained = wait_until(
            move || {
                let client = client.clone();
                let site = site.clone();
                async move {
                    match actionable_controls(&client, &site).await {
                        Ok(controls) => Ok(controls.is_empty()),
                        Err(UpdaterError::TransientUi(_)) => Ok(false),
                        Err(other) => Err(other),
                    }
                }
            },
            timeout,
            PAGE_POLL,
            cancel,
        )
        .await?;

        if drained {
            info!("all update controls accepted");
            Ok(FlowResult::Completed)
        } else {
            Ok(FlowResult::TimedOut)
        }
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        let session = *self;
        session
            .client
            .close()
            .await
            .map_err(|e| UpdaterError::Browser(format!("cannot close session: {e}")))
    }
}

/// Opens WebDriver sessions against a running chromedriver endpoint.
pub struct WebDriverFactory {
    webdriver_url: Url,
    site: SiteConfig,
    browser: BrowserKind,
    profile_dir: PathBuf,
    headless: bool,
}

impl WebDriverFactory {
    /// Build a factory for the given endpoint and configuration.
    ///
    /// `headless` is true for the unattended loop and false for the
    /// interactive login window. The Chrome profile under `profile_dir`
    /// persists the authenticated cookies between the two.
    pub fn new(
        webdriver_url: Url,
        config: &UpdaterConfig,
        profile_dir: PathBuf,
        headless: bool,
    ) -> Self {
        Self {
            webdriver_url,
            site: config.site.clone(),
            browser: config.browser,
            profile_dir,
            headless,
        }
    }

    fn capabilities(&self) -> serde_json::map::Map<String, serde_json::Value> {
        let mut args = vec![
            "--disable-dev-shm-usage".to_owned(),
            "--disable-gpu".to_owned(),
            format!("user-data-dir={}", self.profile_dir.display()),
        ];
        if self.headless {
            args.push("--headless=new".to_owned());
        }

        let mut chrome_options = json!({ "args": args });
        let binary = self
            .browser
            .binary_candidates()
            .iter()
            .find_map(|candidate| which::which(candidate).ok());
        if let Some(path) = binary {
            chrome_options["binary"] = json!(path.to_string_lossy());
        }

        let mut caps = serde_json::map::Map::new();
        caps.insert("goog:chromeOptions".to_owned(), chrome_options);
        caps
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn open_session(&self) -> Result<Box<dyn ResumeSession>> {
        let client = ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(self.webdriver_url.as_str())
            .await
            .map_err(|e| UpdaterError::Browser(format!("cannot open session: {e}")))?;
        Ok(Box::new(WebDriverSession {
            client,
            site: self.site.clone(),
            login_url: build_login_url(&self.site)?,
            pause: Box::new(ThreadRngDrift),
        }))
    }
}

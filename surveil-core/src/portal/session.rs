use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{millis, TimingSection};

use super::error::{MonitorError, MonitorResult, PortalError, PortalResult};
use super::events::Reporter;
use super::page::{wait_for_all, BrowserDriver, BrowserHandle, ElementState, PortalPage};
use super::selectors::PortalSelectors;

/// Picks the first existing executable out of an ordered candidate list.
#[derive(Debug, Clone, Default)]
pub struct ExecutableLocator {
    candidates: Vec<PathBuf>,
}

impl ExecutableLocator {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// `None` means "let the automation library look for one".
    pub fn resolve(&self) -> Option<PathBuf> {
        self.candidates
            .iter()
            .find(|candidate| candidate.exists())
            .cloned()
    }
}

/// Sole owner of the browser and page handles.
pub struct SessionManager {
    driver: Arc<dyn BrowserDriver>,
    locator: ExecutableLocator,
    selectors: Arc<PortalSelectors>,
    timing: Arc<TimingSection>,
    reporter: Reporter,
    browser: Option<Box<dyn BrowserHandle>>,
    page: Option<Box<dyn PortalPage>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("locator", &self.locator)
            .field("browser", &self.browser.is_some())
            .field("page", &self.page.is_some())
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        locator: ExecutableLocator,
        selectors: Arc<PortalSelectors>,
        timing: Arc<TimingSection>,
        reporter: Reporter,
    ) -> Self {
        Self {
            driver,
            locator,
            selectors,
            timing,
            reporter,
            browser: None,
            page: None,
        }
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    pub fn has_page(&self) -> bool {
        self.page.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.browser.is_none() && self.page.is_none()
    }

    pub fn page(&self) -> PortalResult<&dyn PortalPage> {
        self.page.as_deref().ok_or(PortalError::NoPage)
    }

    pub async fn acquire(&mut self) -> MonitorResult<()> {
        self.acquire_browser().await?;
        self.acquire_page().await
    }

    pub async fn acquire_browser(&mut self) -> MonitorResult<()> {
        if self.browser.is_some() {
            return Ok(());
        }
        let executable = self.locator.resolve();
        match &executable {
            Some(path) => self.reporter.info("env", path.display().to_string()),
            None => self
                .reporter
                .info("env", "no bundled browser, using library discovery"),
        }

        let launched = self.driver.launch(executable.as_deref()).await;
        match launched {
            Ok(browser) => {
                self.browser = Some(browser);
                Ok(())
            }
            Err(err @ PortalError::ExecutableNotFound(_)) => {
                self.reporter
                    .fail("init", "browser executable not found, stopping");
                self.reporter.lock_controls();
                self.release().await;
                Err(MonitorError::BrowserUnavailable(err))
            }
            Err(err) => {
                self.reporter.fail("init", "browser launch failed, recovering");
                Err(MonitorError::Transient(err))
            }
        }
    }

    pub async fn acquire_page(&mut self) -> MonitorResult<()> {
        if self.page.is_some() {
            return Ok(());
        }
        let Some(browser) = self.browser.as_ref() else {
            return Err(MonitorError::Transient(PortalError::Launch(
                "no browser to open a page in".to_string(),
            )));
        };
        let opened = browser.new_page().await;
        match opened {
            Ok(page) => {
                self.page = Some(page);
                Ok(())
            }
            Err(err) => {
                // Forces a full relaunch on the next attempt.
                self.browser = None;
                self.reporter.fail("init", "opening a page failed, recovering");
                Err(MonitorError::Transient(err))
            }
        }
    }

    /// Best-effort logout and teardown. Never fails and leaves the session
    /// empty.
    pub async fn release(&mut self) {
        self.reporter.stop("terminate", "terminating");

        if let Some(page) = self.page.as_deref() {
            if let Err(err) = log_out(page, &self.selectors, &self.timing).await {
                debug!(error = %err, "logout sequence skipped");
            }
            sleep(millis(self.timing.logout_settle_ms)).await;
            match wait_for_all(
                page,
                &self.selectors.login_form(),
                ElementState::Attached,
                millis(self.timing.logout_confirm_timeout_ms),
            )
            .await
            {
                Ok(()) => debug!("login form is back, logout confirmed"),
                Err(err) => debug!(error = %err, "logout not confirmed"),
            }
        }

        if let Some(mut page) = self.page.take() {
            match page.close().await {
                Ok(()) => self.reporter.stop("terminate", "page closed"),
                Err(err) => {
                    warn!(error = %err, "page close failed");
                    self.reporter.fail("terminate", "page closed abnormally");
                }
            }
        }

        if let Some(mut browser) = self.browser.take() {
            match browser.close().await {
                Ok(()) => self.reporter.stop("terminate", "browser closed"),
                Err(err) => {
                    warn!(error = %err, "browser close failed");
                    self.reporter.fail("terminate", "browser closed abnormally");
                }
            }
        }

        self.reporter.stop("terminate", "terminated, state reset");
    }
}

async fn log_out(
    page: &dyn PortalPage,
    selectors: &PortalSelectors,
    timing: &TimingSection,
) -> PortalResult<()> {
    page.wait_for(
        &selectors.overlay,
        ElementState::Hidden,
        millis(timing.logout_overlay_timeout_ms),
    )
    .await?;
    page.wait_for(
        &selectors.logout.settings,
        ElementState::Attached,
        millis(timing.logout_settings_timeout_ms),
    )
    .await?;
    page.click(&selectors.logout.settings).await?;
    // The sign-out button is only rendered after settings was opened.
    page.wait_for(
        &selectors.logout.sign_out,
        ElementState::Visible,
        millis(timing.logout_signout_timeout_ms),
    )
    .await?;
    page.click(&selectors.logout.sign_out).await
}

pub fn describe_executable(locator: &ExecutableLocator) -> String {
    match locator.resolve() {
        Some(path) => path.display().to_string(),
        None => "automation library discovery".to_string(),
    }
}

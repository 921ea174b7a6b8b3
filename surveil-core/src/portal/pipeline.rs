use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::config::{millis, MonitorConfig, TimingSection};

use super::error::{MonitorError, MonitorResult};
use super::events::Reporter;
use super::page::BrowserDriver;
use super::selectors::{PortalSelectors, Section};
use super::session::{ExecutableLocator, SessionManager};
use super::signal::StopSignal;
use super::verify::{AcceptAll, AllowList, CredentialVerifier};

const MASK: &str = "******";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    passcode: String,
}

impl Credentials {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        passcode: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            passcode: passcode.into(),
        }
    }

    pub fn passcode(&self) -> &str {
        &self.passcode
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("passcode", &MASK)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Init,
    Authenticated,
    Navigated,
    Extracting,
}

/// One login-navigate-extract cycle against the portal. A run only ends
/// with an error; stopping surfaces as [`MonitorError::Cancelled`].
pub struct Pipeline {
    pub(crate) session: SessionManager,
    pub(crate) signal: StopSignal,
    pub(crate) reporter: Reporter,
    pub(crate) selectors: Arc<PortalSelectors>,
    pub(crate) timing: Arc<TimingSection>,
    pub(crate) verifier: Arc<dyn CredentialVerifier>,
    stage: PipelineStage,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("session", &self.session)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &MonitorConfig, reporter: Reporter) -> Self {
        let selectors = Arc::new(PortalSelectors::default());
        let timing = Arc::new(config.timing.clone());
        let locator = ExecutableLocator::new(config.chromium.executable_candidates.clone());
        let verifier: Arc<dyn CredentialVerifier> = if config.access.allowed_users.is_empty() {
            Arc::new(AcceptAll)
        } else {
            Arc::new(AllowList::new(config.access.allowed_users.iter().cloned()))
        };
        let session = SessionManager::new(
            driver,
            locator,
            Arc::clone(&selectors),
            Arc::clone(&timing),
            reporter.clone(),
        );
        Self {
            session,
            signal: StopSignal::new(),
            reporter,
            selectors,
            timing,
            verifier,
            stage: PipelineStage::Init,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn signal(&self) -> &StopSignal {
        &self.signal
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub async fn release_session(&mut self) {
        self.session.release().await;
    }

    /// Runs until a failure or a stop request.
    pub async fn run(&mut self, credentials: &Credentials) -> MonitorResult<Infallible> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, user = %credentials.username);
        self.run_stages(credentials).instrument(span).await
    }

    async fn run_stages(&mut self, credentials: &Credentials) -> MonitorResult<Infallible> {
        self.stage = PipelineStage::Init;
        self.reporter
            .start("run", format!("portal url: {}", credentials.url));
        self.reporter
            .start("run", format!("username: {}", credentials.username));
        self.reporter.start("run", format!("passcode: {MASK}"));
        self.checkpoint().await?;

        match self.drive(credentials).await {
            Ok(never) => match never {},
            Err(err) => Err(self.recover(err).await),
        }
    }

    /// Every retryable failure leaves a FAIL line, whichever stage raised it.
    async fn drive(&mut self, credentials: &Credentials) -> MonitorResult<Infallible> {
        let outcome = self.stages(credentials).await;
        if let Err(MonitorError::Transient(err)) = &outcome {
            debug!(stage = ?self.stage, error = %err, "transient failure");
            self.reporter.fail("run", "run failed, recovering");
        }
        outcome
    }

    async fn stages(&mut self, credentials: &Credentials) -> MonitorResult<Infallible> {
        self.init().await?;
        self.logon(credentials).await?;
        self.advance(PipelineStage::Authenticated);
        self.redirect().await?;
        self.advance(PipelineStage::Navigated);
        self.advance(PipelineStage::Extracting);
        self.extraction_loop().await
    }

    async fn init(&mut self) -> MonitorResult<()> {
        self.session.acquire_browser().await?;
        self.reporter.info("init", "browser ready");
        self.checkpoint().await?;
        sleep(millis(self.timing.launch_settle_ms)).await;

        self.session.acquire_page().await?;
        self.reporter.info("init", "page opened");
        self.checkpoint().await?;
        sleep(millis(self.timing.page_settle_ms)).await;
        Ok(())
    }

    async fn extraction_loop(&mut self) -> MonitorResult<Infallible> {
        loop {
            for section in Section::ALL {
                self.extract(section).await?;
                sleep(millis(self.timing.section_pacing_ms)).await;
            }
        }
    }

    fn advance(&mut self, stage: PipelineStage) {
        debug!(from = ?self.stage, to = ?stage, "pipeline stage");
        self.stage = stage;
    }

    /// Cancellation point. A pending stop releases the session and ends the
    /// run.
    pub(crate) async fn checkpoint(&mut self) -> MonitorResult<()> {
        if self.signal.take() {
            self.reporter.stop("checkpoint", "stop signal received");
            self.session.release().await;
            return Err(MonitorError::Cancelled);
        }
        Ok(())
    }

    /// A stop that raced with `err` wins over it.
    pub(crate) async fn recover(&mut self, err: MonitorError) -> MonitorError {
        match self.checkpoint().await {
            Err(cancelled) => cancelled,
            Ok(()) => err,
        }
    }
}

//! Capability interface between the monitor and the automation library.
//!
//! The pipeline only ever talks to a [`PortalPage`]; concrete selectors are
//! handed in by the caller, never baked into an implementation.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use super::error::{PortalError, PortalResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    /// Present in the document.
    Attached,
    /// Present and rendered.
    Visible,
    /// Absent or not rendered.
    Hidden,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElementState::Attached => "attached",
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ElementProbe {
    pub exists: bool,
    pub visible: bool,
}

impl ElementProbe {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn satisfies(&self, state: ElementState) -> bool {
        match state {
            ElementState::Attached => self.exists,
            ElementState::Visible => self.exists && self.visible,
            ElementState::Hidden => !self.exists || !self.visible,
        }
    }
}

#[async_trait]
pub trait PortalPage: Send + Sync {
    /// Starts navigation and returns once the document is parsed.
    async fn goto(&self, url: &str) -> PortalResult<()>;

    async fn probe(&self, selector: &str) -> PortalResult<ElementProbe>;

    async fn fill(&self, selector: &str, value: &str) -> PortalResult<()>;

    async fn click(&self, selector: &str) -> PortalResult<()>;

    /// Clicks the closest `<a>` around the matched element.
    async fn click_anchor_of(&self, selector: &str) -> PortalResult<()>;

    /// `innerText` of the first match, or `None` when nothing matches.
    async fn read_text(&self, selector: &str) -> PortalResult<Option<String>>;

    /// Selects the `<option>` whose visible text equals `label`. Returns
    /// whether one was found.
    async fn select_option(&self, option_selector: &str, label: &str) -> PortalResult<bool>;

    async fn close(&mut self) -> PortalResult<()>;

    /// Polls until the element reaches `state` or `timeout` runs out.
    async fn wait_for(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> PortalResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.probe(selector).await?.satisfies(state) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(PortalError::Timeout {
                    selector: selector.to_string(),
                    state,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Waits for several elements concurrently; fails with the first error.
pub async fn wait_for_all(
    page: &dyn PortalPage,
    selectors: &[&str],
    state: ElementState,
    timeout: Duration,
) -> PortalResult<()> {
    let waits = selectors
        .iter()
        .map(|selector| page.wait_for(selector, state, timeout));
    futures::future::try_join_all(waits).await?;
    Ok(())
}

#[async_trait]
pub trait BrowserHandle: Send + Sync {
    async fn new_page(&self) -> PortalResult<Box<dyn PortalPage>>;

    async fn close(&mut self) -> PortalResult<()>;
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// `None` leaves executable discovery to the driver.
    async fn launch(&self, executable: Option<&Path>) -> PortalResult<Box<dyn BrowserHandle>>;
}

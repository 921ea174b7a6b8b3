use std::sync::Arc;

use tokio::time::sleep;

use crate::config::millis;

use super::error::MonitorResult;
use super::page::{wait_for_all, ElementState};
use super::pipeline::Pipeline;

impl Pipeline {
    /// Sleeps through `schedule`, checking for a stop around every sleep and
    /// for the loading overlay to clear after it.
    pub(crate) async fn settle(&mut self, schedule: &[u64]) -> MonitorResult<()> {
        let outcome = self.settle_steps(schedule).await;
        if let Err(err) = &outcome {
            if !err.is_cancelled() {
                self.reporter.fail("settle", "network or system fault");
            }
        }
        outcome
    }

    async fn settle_steps(&mut self, schedule: &[u64]) -> MonitorResult<()> {
        for &duration in schedule {
            self.checkpoint().await?;
            sleep(millis(duration)).await;
            self.checkpoint().await?;
            self.session
                .page()?
                .wait_for(
                    &self.selectors.overlay,
                    ElementState::Hidden,
                    millis(self.timing.overlay_timeout_ms),
                )
                .await?;
        }
        Ok(())
    }

    /// Leaves the landing screen for the reports screen holding the three
    /// section tabs.
    pub(crate) async fn redirect(&mut self) -> MonitorResult<()> {
        let selectors = Arc::clone(&self.selectors);
        let timing = Arc::clone(&self.timing);

        self.reporter.info("redirect", "opening reports screen");
        self.session
            .page()?
            .click_anchor_of(&selectors.home_marker)
            .await?;
        self.settle(&timing.redirect_settle_ms).await?;

        let targets = wait_for_all(
            self.session.page()?,
            &selectors.section_targets(),
            ElementState::Attached,
            millis(timing.reports_timeout_ms),
        )
        .await;
        if let Err(err) = targets {
            self.reporter
                .fail("redirect", "reports screen failed to load, recovering");
            return Err(err.into());
        }
        self.reporter.info("redirect", "reports screen loaded");
        self.checkpoint().await
    }
}

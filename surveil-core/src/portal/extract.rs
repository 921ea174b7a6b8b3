use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::time::sleep;
use tracing::debug;

use crate::config::millis;

use super::error::MonitorResult;
use super::events::ExtractionResult;
use super::page::ElementState;
use super::pipeline::Pipeline;
use super::selectors::{QueryFilter, RowFilter, Section};

fn digit_run() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("valid regex"))
}

/// Row total shown by the list counter. Anything unreadable counts as zero.
pub fn parse_counter(text: &str, no_records_marker: &str) -> u32 {
    if text.contains(no_records_marker) {
        return 0;
    }
    digit_run()
        .find(text)
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(0)
}

/// Exact, case-sensitive matches of `target`.
pub fn count_matching<'a, I>(statuses: I, target: &str) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    statuses
        .into_iter()
        .filter(|status| *status == target)
        .count() as u32
}

impl Pipeline {
    /// Counts one section and publishes the result.
    pub(crate) async fn extract(&mut self, section: Section) -> MonitorResult<ExtractionResult> {
        let result = match self.query_section(section).await {
            Ok(result) => result,
            Err(err) => return Err(self.recover(err).await),
        };
        self.reporter.result(result.clone());
        self.checkpoint().await?;
        Ok(result)
    }

    async fn query_section(&mut self, section: Section) -> MonitorResult<ExtractionResult> {
        let selectors = Arc::clone(&self.selectors);
        let timing = Arc::clone(&self.timing);
        let view = selectors.section(section);

        self.reporter.info(section.component(), "querying");
        let page = self.session.page()?;
        page.wait_for(
            &view.target,
            ElementState::Attached,
            millis(timing.target_timeout_ms),
        )
        .await?;
        page.click(&view.target).await?;

        // The list container gets swapped a few times after a tab switch.
        self.settle(&timing.section_settle_ms).await?;
        self.settle(&timing.section_settle_ms).await?;
        self.session
            .page()?
            .wait_for(
                &view.verify,
                ElementState::Attached,
                millis(timing.verify_timeout_ms),
            )
            .await?;

        if let Some(query) = &view.query {
            self.apply_saved_query(query).await?;
        }

        let total = self.read_row_counter().await?;
        let count = match &view.rows {
            Some(rows) => self.count_rows(rows, total).await?,
            None => total,
        };
        debug!(%section, total, count, "section extracted");

        Ok(ExtractionResult {
            label: view.label.clone(),
            count,
        })
    }

    async fn apply_saved_query(&mut self, query: &QueryFilter) -> MonitorResult<()> {
        let selectors = Arc::clone(&self.selectors);
        let timing = Arc::clone(&self.timing);

        match self
            .session
            .page()?
            .select_option(&selectors.saved_query_options, &query.option_label)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(option = %query.option_label, "saved query option not listed"),
            Err(err) => debug!(error = %err, "saved query selection ignored"),
        }
        self.settle(&timing.filter_settle_ms).await?;
        self.await_loading_done().await
    }

    /// Best effort: gives up silently after the configured number of polls.
    async fn await_loading_done(&mut self) -> MonitorResult<()> {
        let selectors = Arc::clone(&self.selectors);
        let timing = Arc::clone(&self.timing);

        for attempt in 1..=timing.completion_poll_attempts {
            let status = self
                .session
                .page()?
                .read_text(&selectors.loading_status)
                .await?;
            if status.as_deref() == Some(selectors.loading_done_text.as_str()) {
                return Ok(());
            }
            debug!(attempt, status = ?status, "query still loading");
            self.checkpoint().await?;
            sleep(millis(timing.completion_poll_interval_ms)).await;
        }
        debug!("query never reported completion, reading counter anyway");
        Ok(())
    }

    async fn read_row_counter(&self) -> MonitorResult<u32> {
        let text = self
            .session
            .page()?
            .read_text(&self.selectors.row_counter)
            .await?;
        Ok(text
            .map(|text| parse_counter(&text, &self.selectors.no_records_marker))
            .unwrap_or(0))
    }

    /// Reads one status cell per row. Each read is a round trip to the
    /// browser, so a stop is honoured between rows.
    async fn count_rows(&mut self, rows: &RowFilter, total: u32) -> MonitorResult<u32> {
        let mut matched = 0;
        for index in 1..=total {
            self.checkpoint().await?;
            let status = self
                .session
                .page()?
                .read_text(&rows.cell_selector(index))
                .await?;
            matched += count_matching(status.as_deref(), &rows.target_status);
        }
        Ok(matched)
    }
}

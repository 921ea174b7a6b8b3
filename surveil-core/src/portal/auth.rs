use std::sync::Arc;

use tokio::time::sleep;
use tracing::debug;

use crate::config::millis;

use super::error::{MonitorError, MonitorResult, PortalError};
use super::page::{wait_for_all, ElementState};
use super::pipeline::{Credentials, Pipeline};

/// Login error banners mention a wrong user id or password with this text.
pub fn is_invalid_credentials(status_text: &str, marker: &str) -> bool {
    status_text.contains(marker)
}

impl Pipeline {
    pub(crate) async fn logon(&mut self, credentials: &Credentials) -> MonitorResult<()> {
        if let Err(err) = self.verifier.verify(&credentials.username).await {
            self.reporter
                .fail("logon", format!("user verification failed: {}", err.reason));
            self.reporter.lock_controls();
            self.session.release().await;
            return Err(MonitorError::UnknownFatal(err.to_string()));
        }

        let selectors = Arc::clone(&self.selectors);
        let timing = Arc::clone(&self.timing);

        // Error pages still load a document; the login form check below
        // decides whether the portal is up.
        if let Err(err) = self.session.page()?.goto(&credentials.url).await {
            debug!(error = %err, url = %credentials.url, "navigation error ignored");
        }
        self.reporter.info("logon", "entering login page");
        self.checkpoint().await?;
        sleep(millis(timing.login_page_settle_ms)).await;

        let page = self.session.page()?;
        if let Err(err) = wait_for_all(
            page,
            &selectors.login_form(),
            ElementState::Attached,
            millis(timing.login_form_timeout_ms),
        )
        .await
        {
            self.reporter
                .fail("logon", "login page failed to load, recovering");
            return Err(err.into());
        }
        self.reporter.info("logon", "login page loaded");

        page.fill(&selectors.login.username, &credentials.username)
            .await?;
        page.fill(&selectors.login.password, credentials.passcode())
            .await?;
        page.click_anchor_of(&selectors.login.submit).await?;
        self.reporter.info("logon", "signing in");

        let home = page
            .wait_for(
                &selectors.home_marker,
                ElementState::Attached,
                millis(timing.home_timeout_ms),
            )
            .await;
        if let Err(cause) = home {
            return Err(self.diagnose_login_failure(credentials, cause).await);
        }

        self.settle(&timing.login_settle_ms).await?;
        self.reporter.info("logon", "logged in");
        self.checkpoint().await
    }

    /// The home screen never showed up: tell wrong credentials apart from a
    /// slow portal.
    async fn diagnose_login_failure(
        &mut self,
        credentials: &Credentials,
        cause: PortalError,
    ) -> MonitorError {
        let status_text = match self.session.page() {
            Ok(page) => {
                let banner = page
                    .wait_for(
                        &self.selectors.status_bar,
                        ElementState::Attached,
                        millis(self.timing.status_bar_timeout_ms),
                    )
                    .await;
                match banner {
                    Ok(()) => page
                        .read_text(&self.selectors.status_bar)
                        .await
                        .ok()
                        .flatten(),
                    Err(_) => None,
                }
            }
            Err(_) => None,
        };

        let rejected = status_text.as_deref().is_some_and(|text| {
            is_invalid_credentials(text, &self.selectors.invalid_credentials_marker)
        });
        if rejected {
            self.reporter
                .fail("logon", "wrong user id or password, check and retry");
            self.reporter.lock_controls();
            self.session.release().await;
            return MonitorError::InvalidCredentials {
                username: credentials.username.clone(),
            };
        }

        self.reporter
            .fail("logon", "home page failed to load, recovering");
        MonitorError::Transient(cause)
    }
}

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChromiumSection;

use super::error::{PortalError, PortalResult};
use super::page::{BrowserDriver, BrowserHandle, ElementProbe, PortalPage};

/// Launches Chromium through chromiumoxide.
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    config: Arc<ChromiumSection>,
}

impl ChromiumDriver {
    pub fn new(config: ChromiumSection) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    fn build_chromium_config(&self, executable: Option<&Path>) -> PortalResult<ChromiumConfig> {
        let [width, height] = self.config.viewport;
        let mut builder = ChromiumConfig::builder()
            .window_size(width, height)
            .viewport(ChromiumViewport {
                width,
                height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: width >= height,
                has_touch: false,
            });

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }
        builder = builder.args(vec![
            "--no-first-run",
            "--password-store=basic",
            "--disable-background-timer-throttling",
        ]);

        // Without an explicit path the builder runs its own discovery, and
        // its only failure mode is not finding a binary.
        builder.build().map_err(|reason| match executable {
            None => PortalError::ExecutableNotFound(reason),
            Some(_) => PortalError::Configuration(reason),
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self, executable: Option<&Path>) -> PortalResult<Box<dyn BrowserHandle>> {
        let chromium_config = self.build_chromium_config(executable)?;
        info!(
            executable = ?executable,
            headless = self.config.headless,
            width = self.config.viewport[0],
            height = self.config.viewport[1],
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(classify_launch_error)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        Ok(Box::new(ChromiumBrowser {
            browser,
            handler_task: Some(handler_task),
        }))
    }
}

fn classify_launch_error(err: CdpError) -> PortalError {
    match err {
        CdpError::Io(ref source) if source.kind() == io::ErrorKind::NotFound => {
            PortalError::ExecutableNotFound(err.to_string())
        }
        other => PortalError::Launch(other.to_string()),
    }
}

#[derive(Debug)]
pub struct ChromiumBrowser {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserHandle for ChromiumBrowser {
    async fn new_page(&self) -> PortalResult<Box<dyn PortalPage>> {
        let params = CreateTargetParams::new("about:blank");
        let page = self.browser.new_page(params).await?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> PortalResult<()> {
        info!("Shutting down Chromium instance");
        self.browser.close().await?;
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("ChromiumBrowser dropped without explicit close");
                handle.abort();
            }
        }
    }
}

#[derive(Debug)]
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> PortalResult<T> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| PortalError::Script(format!("failed to decode result: {err}")))
    }
}

fn js_string(value: &str) -> PortalResult<String> {
    serde_json::to_string(value).map_err(|err| PortalError::Script(err.to_string()))
}

#[async_trait]
impl PortalPage for ChromiumPage {
    async fn goto(&self, url: &str) -> PortalResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(PortalError::Configuration)?;
        self.page.goto(params).await?;
        Ok(())
    }

    async fn probe(&self, selector: &str) -> PortalResult<ElementProbe> {
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return {{ exists: false, visible: false }};
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none'
        && style.visibility !== 'hidden'
        && (rect.width > 0 || rect.height > 0);
    return {{ exists: true, visible }};
}})()"#,
            selector = js_string(selector)?
        );
        self.eval(script).await
    }

    async fn fill(&self, selector: &str, value: &str) -> PortalResult<()> {
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return false;
    el.focus();
    el.value = {value};
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
            selector = js_string(selector)?,
            value = js_string(value)?
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(PortalError::ElementNotFound(selector.to_string()))
        }
    }

    async fn click(&self, selector: &str) -> PortalResult<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn click_anchor_of(&self, selector: &str) -> PortalResult<()> {
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    const anchor = el && el.closest('a');
    if (!anchor) return false;
    anchor.click();
    return true;
}})()"#,
            selector = js_string(selector)?
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(PortalError::ElementNotFound(format!("anchor of {selector}")))
        }
    }

    async fn read_text(&self, selector: &str) -> PortalResult<Option<String>> {
        let script = format!(
            r#"(() => {{
    const el = document.querySelector({selector});
    return el ? el.innerText : null;
}})()"#,
            selector = js_string(selector)?
        );
        self.eval(script).await
    }

    async fn select_option(&self, option_selector: &str, label: &str) -> PortalResult<bool> {
        let script = format!(
            r#"(() => {{
    for (const option of document.querySelectorAll({selector})) {{
        if (option.innerText === {label}) {{
            option.selected = true;
            const select = option.closest('select');
            if (select) select.dispatchEvent(new Event('change', {{ bubbles: true }}));
            option.click();
            return true;
        }}
    }}
    return false;
}})()"#,
            selector = js_string(option_selector)?,
            label = js_string(label)?
        );
        self.eval(script).await
    }

    async fn close(&mut self) -> PortalResult<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}

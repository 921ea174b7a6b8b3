#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use surveil_core::config::MonitorConfig;
use surveil_core::portal::{
    BrowserDriver, BrowserHandle, Credentials, ElementProbe, EventSink, MemorySink, MonitorEvent,
    Pipeline, PortalError, PortalPage, PortalResult, PortalSelectors, Reporter, Section,
    StopSignal,
};

pub const PORTAL_URL: &str = "https://portal.example/login";
pub const USERNAME: &str = "agent01";
pub const PASSCODE: &str = "s3cret";

pub fn credentials() -> Credentials {
    Credentials::new(PORTAL_URL, USERNAME, PASSCODE)
}

pub fn wrong_credentials() -> Credentials {
    Credentials::new(PORTAL_URL, USERNAME, "guess")
}

#[derive(Debug, Clone)]
struct Element {
    visible: bool,
    text: Option<String>,
}

#[derive(Debug, Default)]
struct PortalState {
    dom: HashMap<String, Element>,
    filled: HashMap<String, String>,
    calls: Vec<String>,
    launches: u32,
    pages_opened: u32,
    pages_closed: u32,
    browsers_closed: u32,
    logouts: u32,
    missing_executable: bool,
    launch_failures: u32,
    redirect_failures: u32,
    stalled_loading: bool,
    failing_fills: bool,
    complaint_counter: Option<String>,
    reads: HashMap<String, u32>,
    stop_on_read: Option<(String, u32, StopSignal)>,
}

/// Scripted stand-in for the portal and the browser driving it.
#[derive(Debug, Clone, Default)]
pub struct MockPortal {
    state: Arc<Mutex<PortalState>>,
    selectors: Arc<PortalSelectors>,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_executable(self) -> Self {
        self.with(|state| state.missing_executable = true);
        self
    }

    pub fn failing_launches(self, count: u32) -> Self {
        self.with(|state| state.launch_failures = count);
        self
    }

    pub fn failing_redirects(self, count: u32) -> Self {
        self.with(|state| state.redirect_failures = count);
        self
    }

    /// Every form fill fails as if the field had vanished.
    pub fn failing_fills(self) -> Self {
        self.with(|state| state.failing_fills = true);
        self
    }

    /// The saved query never reports completion.
    pub fn stalled_loading(self) -> Self {
        self.with(|state| state.stalled_loading = true);
        self
    }

    /// Replaces the complaint list counter; no status cells are rendered.
    pub fn complaint_counter(self, text: &str) -> Self {
        self.with(|state| state.complaint_counter = Some(text.to_string()));
        self
    }

    /// Raises `signal` on the `nth` text read of a selector starting with
    /// `prefix`.
    pub fn stop_on_read(&self, prefix: &str, nth: u32, signal: StopSignal) {
        self.with(|state| state.stop_on_read = Some((prefix.to_string(), nth, signal)));
    }

    /// Text reads of selectors starting with `prefix`.
    pub fn reads(&self, prefix: &str) -> u32 {
        self.with(|state| {
            state
                .reads
                .iter()
                .filter(|(selector, _)| selector.starts_with(prefix))
                .map(|(_, count)| count)
                .sum()
        })
    }

    pub fn driver(&self) -> Arc<dyn BrowserDriver> {
        Arc::new(MockDriver {
            portal: self.clone(),
        })
    }

    pub fn launches(&self) -> u32 {
        self.with(|state| state.launches)
    }

    pub fn pages_opened(&self) -> u32 {
        self.with(|state| state.pages_opened)
    }

    pub fn pages_closed(&self) -> u32 {
        self.with(|state| state.pages_closed)
    }

    pub fn browsers_closed(&self) -> u32 {
        self.with(|state| state.browsers_closed)
    }

    pub fn logouts(&self) -> u32 {
        self.with(|state| state.logouts)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|state| state.calls.clone())
    }

    fn with<T>(&self, f: impl FnOnce(&mut PortalState) -> T) -> T {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    fn record(&self, call: String) {
        self.with(|state| state.calls.push(call));
    }

    fn show(&self, selector: &str, text: Option<&str>) {
        self.with(|state| {
            state.dom.insert(
                selector.to_string(),
                Element {
                    visible: true,
                    text: text.map(str::to_string),
                },
            );
        });
    }

    fn show_login_form(&self) {
        self.with(|state| state.dom.clear());
        for selector in self.selectors.login_form() {
            self.show(selector, None);
        }
    }

    fn submit_login(&self) {
        let accepted = self.with(|state| {
            state.filled.get(&self.selectors.login.username).map(String::as_str) == Some(USERNAME)
                && state.filled.get(&self.selectors.login.password).map(String::as_str)
                    == Some(PASSCODE)
        });
        if accepted {
            self.with(|state| state.dom.clear());
            self.show(&self.selectors.home_marker, None);
            self.show(&self.selectors.logout.settings, None);
        } else {
            self.show(
                &self.selectors.status_bar,
                Some("用户标识或密码有误。(SBL-UIF-00348)"),
            );
        }
    }

    fn open_reports(&self) {
        let blocked = self.with(|state| {
            if state.redirect_failures > 0 {
                state.redirect_failures -= 1;
                true
            } else {
                false
            }
        });
        if blocked {
            return;
        }
        for target in self.selectors.section_targets() {
            self.show(target, None);
        }
    }

    fn open_section(&self, section: Section) {
        let view = self.selectors.section(section).clone();
        self.with(|state| {
            state.dom.retain(|selector, _| {
                !selector.starts_with("td[") && !selector.starts_with("li[aria-label")
            });
        });
        self.show(&view.verify, None);
        let override_counter = self.with(|state| state.complaint_counter.clone());
        let (counter, cells): (&str, Vec<&str>) = match (section, override_counter.as_deref()) {
            (Section::Request, _) => ("共 5 条", vec![]),
            (Section::Complaint, Some(counter)) => (counter, vec![]),
            (Section::Complaint, None) => ("3", vec!["新建", "已处理", "新建"]),
            (Section::Reminder, _) => ("无记录", vec![]),
        };
        self.show(&self.selectors.row_counter, Some(counter));
        if let Some(rows) = &view.rows {
            for (index, status) in cells.into_iter().enumerate() {
                self.show(&rows.cell_selector(index as u32 + 1), Some(status));
            }
        }
    }

    fn section_for_target(&self, selector: &str) -> Option<Section> {
        Section::ALL
            .into_iter()
            .find(|section| self.selectors.section(*section).target == selector)
    }
}

struct MockDriver {
    portal: MockPortal,
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn launch(&self, _executable: Option<&Path>) -> PortalResult<Box<dyn BrowserHandle>> {
        self.portal.record("launch".into());
        let outcome = self.portal.with(|state| {
            state.launches += 1;
            if state.missing_executable {
                Err(PortalError::ExecutableNotFound("chrome".into()))
            } else if state.launch_failures > 0 {
                state.launch_failures -= 1;
                Err(PortalError::Launch("crashed on startup".into()))
            } else {
                Ok(())
            }
        });
        outcome?;
        Ok(Box::new(MockBrowser {
            portal: self.portal.clone(),
        }))
    }
}

struct MockBrowser {
    portal: MockPortal,
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    async fn new_page(&self) -> PortalResult<Box<dyn PortalPage>> {
        self.portal.record("new_page".into());
        self.portal.with(|state| {
            state.pages_opened += 1;
            state.dom.clear();
        });
        Ok(Box::new(MockPage {
            portal: self.portal.clone(),
        }))
    }

    async fn close(&mut self) -> PortalResult<()> {
        self.portal.record("browser.close".into());
        self.portal.with(|state| state.browsers_closed += 1);
        Ok(())
    }
}

struct MockPage {
    portal: MockPortal,
}

#[async_trait]
impl PortalPage for MockPage {
    async fn goto(&self, url: &str) -> PortalResult<()> {
        self.portal.record(format!("goto {url}"));
        if url == PORTAL_URL {
            self.portal.show_login_form();
        }
        Ok(())
    }

    async fn probe(&self, selector: &str) -> PortalResult<ElementProbe> {
        Ok(self.portal.with(|state| match state.dom.get(selector) {
            Some(element) => ElementProbe {
                exists: true,
                visible: element.visible,
            },
            None => ElementProbe::absent(),
        }))
    }

    async fn fill(&self, selector: &str, value: &str) -> PortalResult<()> {
        self.portal.record(format!("fill {selector}"));
        self.portal.with(|state| {
            if state.failing_fills || !state.dom.contains_key(selector) {
                return Err(PortalError::ElementNotFound(selector.to_string()));
            }
            state.filled.insert(selector.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn click(&self, selector: &str) -> PortalResult<()> {
        self.portal.record(format!("click {selector}"));
        let present = self.portal.with(|state| state.dom.contains_key(selector));
        if !present {
            return Err(PortalError::ElementNotFound(selector.to_string()));
        }
        let selectors = Arc::clone(&self.portal.selectors);
        if let Some(section) = self.portal.section_for_target(selector) {
            self.portal.open_section(section);
        } else if selector == selectors.logout.settings {
            self.portal.show(&selectors.logout.sign_out, None);
        } else if selector == selectors.logout.sign_out {
            self.portal.with(|state| state.logouts += 1);
            self.portal.show_login_form();
        }
        Ok(())
    }

    async fn click_anchor_of(&self, selector: &str) -> PortalResult<()> {
        self.portal.record(format!("click_anchor_of {selector}"));
        let selectors = Arc::clone(&self.portal.selectors);
        if selector == selectors.login.submit {
            self.portal.submit_login();
        } else if selector == selectors.home_marker {
            self.portal.open_reports();
        }
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> PortalResult<Option<String>> {
        Ok(self.portal.with(|state| {
            let reads = state.reads.entry(selector.to_string()).or_default();
            *reads += 1;
            let seen: u32 = match &state.stop_on_read {
                Some((prefix, _, _)) => state
                    .reads
                    .iter()
                    .filter(|(read, _)| read.starts_with(prefix.as_str()))
                    .map(|(_, count)| count)
                    .sum(),
                None => 0,
            };
            if let Some((_, nth, signal)) = &state.stop_on_read {
                if seen == *nth {
                    signal.raise();
                }
            }
            state.dom.get(selector).and_then(|element| element.text.clone())
        }))
    }

    async fn select_option(&self, option_selector: &str, label: &str) -> PortalResult<bool> {
        self.portal
            .record(format!("select_option {option_selector} {label}"));
        let selectors = Arc::clone(&self.portal.selectors);
        if self.portal.with(|state| state.stalled_loading) {
            self.portal.show(&selectors.loading_status, Some("加载中"));
        } else {
            self.portal
                .show(&selectors.loading_status, Some(selectors.loading_done_text.as_str()));
        }
        Ok(true)
    }

    async fn close(&mut self) -> PortalResult<()> {
        self.portal.record("page.close".into());
        self.portal.with(|state| {
            state.pages_closed += 1;
            state.dom.clear();
        });
        Ok(())
    }
}

type Trigger = Box<dyn Fn(&MemorySink) -> bool + Send + Sync>;

/// Records events and raises a stop signal the first time `trigger` holds.
pub struct TriggerSink {
    memory: MemorySink,
    signal: Mutex<Option<StopSignal>>,
    trigger: Trigger,
    fired: AtomicBool,
}

impl EventSink for TriggerSink {
    fn emit(&self, event: MonitorEvent) {
        self.memory.emit(event);
        if self.fired.load(Ordering::SeqCst) || !(self.trigger)(&self.memory) {
            return;
        }
        if let Some(signal) = self.signal.lock().unwrap().as_ref() {
            self.fired.store(true, Ordering::SeqCst);
            signal.raise();
        }
    }
}

pub struct Harness {
    pub portal: MockPortal,
    pub events: MemorySink,
    pub pipeline: Pipeline,
}

pub fn test_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.chromium.executable_candidates.clear();
    config
}

pub fn harness(portal: MockPortal) -> Harness {
    harness_with_trigger(portal, |_| false)
}

pub fn harness_with_trigger<F>(portal: MockPortal, trigger: F) -> Harness
where
    F: Fn(&MemorySink) -> bool + Send + Sync + 'static,
{
    let events = MemorySink::new();
    let sink = Arc::new(TriggerSink {
        memory: events.clone(),
        signal: Mutex::new(None),
        trigger: Box::new(trigger),
        fired: AtomicBool::new(false),
    });
    let pipeline = Pipeline::new(
        portal.driver(),
        &test_config(),
        Reporter::new(sink.clone()),
    );
    *sink.signal.lock().unwrap() = Some(pipeline.signal().clone());
    Harness {
        portal,
        events,
        pipeline,
    }
}

pub fn lines(events: &MemorySink) -> Vec<String> {
    events
        .process_lines()
        .iter()
        .map(|line| format!("[{}] {} => {}", line.level, line.component, line.message))
        .collect()
}

pub fn has_line(events: &MemorySink, needle: &str) -> bool {
    lines(events).iter().any(|line| line.contains(needle))
}

/// Polls `condition` on virtual time; panics after ten virtual minutes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..12_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached");
}

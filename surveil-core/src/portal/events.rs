use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Fail,
    Stop,
    Start,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "INFO",
            LogLevel::Fail => "FAIL",
            LogLevel::Stop => "STOP",
            LogLevel::Start => "START",
        };
        f.write_str(label)
    }
}

/// One line for the host's process log.
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {} => {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.component,
            self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub label: String,
    pub count: u32,
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiSignal {
    Lock,
    Unlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum MonitorEvent {
    Process(LogLine),
    Message(ExtractionResult),
    /// Fatal termination: the host disables further attempts.
    Options(UiSignal),
    /// The supervisor loop exited: the host may re-enable its controls.
    Control(UiSignal),
    Status(MonitorStatus),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: MonitorEvent);
}

impl EventSink for UnboundedSender<MonitorEvent> {
    fn emit(&self, event: MonitorEvent) {
        // A closed receiver means the host went away; the run keeps going.
        let _ = self.send(event);
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<MonitorEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn process_lines(&self) -> Vec<LogLine> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MonitorEvent::Process(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<ExtractionResult> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MonitorEvent::Message(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: MonitorEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

/// Formats log lines for the sink and mirrors them to `tracing`.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn info(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, component, message.into());
    }

    pub fn fail(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Fail, component, message.into());
    }

    pub fn stop(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Stop, component, message.into());
    }

    pub fn start(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Start, component, message.into());
    }

    pub fn result(&self, result: ExtractionResult) {
        info!(label = %result.label, count = result.count, "section counted");
        self.sink.emit(MonitorEvent::Message(result));
    }

    pub fn lock_controls(&self) {
        self.sink.emit(MonitorEvent::Options(UiSignal::Lock));
    }

    pub fn unlock_controls(&self) {
        self.sink.emit(MonitorEvent::Control(UiSignal::Unlock));
    }

    pub fn status(&self, status: MonitorStatus) {
        self.sink.emit(MonitorEvent::Status(status));
    }

    fn log(&self, level: LogLevel, component: &str, message: String) {
        match level {
            LogLevel::Fail => warn!(component, "{message}"),
            _ => info!(component, level = %level, "{message}"),
        }
        self.sink.emit(MonitorEvent::Process(LogLine {
            timestamp: Local::now(),
            level,
            component: component.to_string(),
            message,
        }));
    }
}

use serde::Serialize;
use thiserror::Error;

use super::page::ElementState;

pub type PortalResult<T> = Result<T, PortalError>;
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Failures raised by the automation layer, before classification.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("chromium executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("timeout after {timeout_ms}ms waiting for {selector} to be {state}")]
    Timeout {
        selector: String,
        state: ElementState,
        timeout_ms: u64,
    },
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("no open page")]
    NoPage,
}

impl PortalError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PortalError::Timeout { .. })
    }
}

/// Classified failure of a pipeline run. The supervisor decides between
/// retrying and stopping purely on the variant.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("transient failure: {0}")]
    Transient(#[from] PortalError),
    #[error("invalid credentials for user {username}")]
    InvalidCredentials { username: String },
    #[error("browser unavailable: {0}")]
    BrowserUnavailable(#[source] PortalError),
    #[error("unrecoverable failure: {0}")]
    UnknownFatal(String),
    #[error("stop signal received")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    InvalidCredentials,
    BrowserUnavailable,
    UnknownFatal,
    Cancelled,
}

impl MonitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::Transient(_) => ErrorKind::Transient,
            MonitorError::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            MonitorError::BrowserUnavailable(_) => ErrorKind::BrowserUnavailable,
            MonitorError::UnknownFatal(_) => ErrorKind::UnknownFatal,
            MonitorError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MonitorError::Cancelled)
    }

    /// Fatal errors also lock the host's controls.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::InvalidCredentials { .. }
                | MonitorError::BrowserUnavailable(_)
                | MonitorError::UnknownFatal(_)
        )
    }

    /// Whether the supervisor loop must exit instead of restarting the run.
    pub fn ends_supervision(&self) -> bool {
        self.is_cancelled() || self.is_fatal()
    }
}

mod auth;
mod chromium;
mod error;
mod events;
mod extract;
mod navigator;
mod page;
mod pipeline;
mod selectors;
mod session;
mod signal;
mod supervisor;
mod verify;

pub use auth::is_invalid_credentials;
pub use chromium::{ChromiumBrowser, ChromiumDriver, ChromiumPage};
pub use error::{ErrorKind, MonitorError, MonitorResult, PortalError, PortalResult};
pub use events::{
    EventSink, ExtractionResult, LogLevel, LogLine, MemorySink, MonitorEvent, MonitorStatus,
    Reporter, UiSignal,
};
pub use extract::{count_matching, parse_counter};
pub use page::{
    wait_for_all, BrowserDriver, BrowserHandle, ElementProbe, ElementState, PortalPage,
};
pub use pipeline::{Credentials, Pipeline, PipelineStage};
pub use selectors::{
    row_id, LoginSelectors, LogoutSelectors, PortalSelectors, QueryFilter, RowFilter, Section,
    SectionSelectors,
};
pub use session::{describe_executable, ExecutableLocator, SessionManager};
pub use signal::StopSignal;
pub use supervisor::{RunControl, RunControlState, Supervisor};
pub use verify::{AcceptAll, AllowList, CredentialVerifier, VerificationError};

pub mod config;
pub mod error;
pub mod portal;

pub use config::{
    load_monitor_config, parse_portal_url, AccessSection, ChromiumSection, MonitorConfig,
    PortalSection, TimingSection,
};
pub use error::{ConfigError, Result};
pub use portal::{
    ChromiumDriver, Credentials, MonitorError, MonitorEvent, Pipeline, Reporter, Supervisor,
};

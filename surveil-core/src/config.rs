use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    #[serde(default)]
    pub portal: PortalSection,
    #[serde(default)]
    pub chromium: ChromiumSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub access: AccessSection,
}

impl MonitorConfig {
    /// Checks values that parse fine but cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.portal.url {
            parse_portal_url(url)?;
        }
        if self.chromium.viewport[0] == 0 || self.chromium.viewport[1] == 0 {
            return Err(ConfigError::Invalid {
                field: "chromium.viewport",
                reason: "width and height must be positive".to_string(),
            });
        }
        if self.timing.completion_poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "timing.completion_poll_attempts",
                reason: "at least one poll is required".to_string(),
            });
        }
        for (field, schedule) in [
            ("timing.login_settle_ms", &self.timing.login_settle_ms),
            ("timing.redirect_settle_ms", &self.timing.redirect_settle_ms),
            ("timing.section_settle_ms", &self.timing.section_settle_ms),
            ("timing.filter_settle_ms", &self.timing.filter_settle_ms),
        ] {
            if schedule.is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "settle schedule must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalSection {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    /// Probed in order; the first existing file wins.
    pub executable_candidates: Vec<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub viewport: [u32; 2],
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        let suffix = std::env::consts::EXE_SUFFIX;
        Self {
            executable_candidates: vec![
                PathBuf::from(format!("./resources/chromium/chrome-headless-shell{suffix}")),
                PathBuf::from(format!("./resources/chromium/chrome{suffix}")),
                PathBuf::from(format!("./src/chromium/chrome-headless-shell{suffix}")),
                PathBuf::from(format!("./src/chromium/chrome{suffix}")),
            ],
            headless: true,
            sandbox: true,
            viewport: [1280, 720],
            request_timeout_seconds: None,
        }
    }
}

/// Every wait the monitor performs, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub launch_settle_ms: u64,
    pub page_settle_ms: u64,
    pub login_page_settle_ms: u64,
    pub login_form_timeout_ms: u64,
    pub home_timeout_ms: u64,
    pub status_bar_timeout_ms: u64,
    pub overlay_timeout_ms: u64,
    pub target_timeout_ms: u64,
    pub verify_timeout_ms: u64,
    pub reports_timeout_ms: u64,
    pub section_pacing_ms: u64,
    pub completion_poll_attempts: u32,
    pub completion_poll_interval_ms: u64,
    pub login_settle_ms: Vec<u64>,
    pub redirect_settle_ms: Vec<u64>,
    pub section_settle_ms: Vec<u64>,
    pub filter_settle_ms: Vec<u64>,
    pub logout_overlay_timeout_ms: u64,
    pub logout_settings_timeout_ms: u64,
    pub logout_signout_timeout_ms: u64,
    pub logout_settle_ms: u64,
    pub logout_confirm_timeout_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            launch_settle_ms: 2000,
            page_settle_ms: 500,
            login_page_settle_ms: 5000,
            login_form_timeout_ms: 2000,
            home_timeout_ms: 8000,
            status_bar_timeout_ms: 1000,
            overlay_timeout_ms: 2000,
            target_timeout_ms: 1000,
            verify_timeout_ms: 2000,
            reports_timeout_ms: 2000,
            section_pacing_ms: 2500,
            completion_poll_attempts: 10,
            completion_poll_interval_ms: 1500,
            login_settle_ms: vec![1500, 2500],
            redirect_settle_ms: vec![2000, 1000],
            section_settle_ms: vec![1000, 500],
            filter_settle_ms: vec![2000, 500],
            logout_overlay_timeout_ms: 2000,
            logout_settings_timeout_ms: 500,
            logout_signout_timeout_ms: 1000,
            logout_settle_ms: 1000,
            logout_confirm_timeout_ms: 2000,
        }
    }
}

pub(crate) fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessSection {
    /// Usernames allowed to log in. Empty accepts everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

pub fn parse_portal_url(candidate: &str) -> Result<Url> {
    let url = Url::parse(candidate).map_err(|err| ConfigError::Invalid {
        field: "portal.url",
        reason: format!("{candidate}: {err}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            field: "portal.url",
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

pub fn load_monitor_config<P: AsRef<Path>>(path: P) -> Result<MonitorConfig> {
    let config: MonitorConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use surveil_core::portal::{
    describe_executable, ChromiumDriver, Credentials, ExecutableLocator, MonitorError,
    MonitorEvent, Pipeline, Reporter, Supervisor,
};
use surveil_core::{load_monitor_config, parse_portal_url, MonitorConfig};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] surveil_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("monitor stopped: {0}")]
    Monitor(#[from] MonitorError),
    #[error("monitor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("health check failed: {0}")]
    CheckFailed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Portal report monitor", long_about = None)]
pub struct Cli {
    /// Path to monitor.toml
    #[arg(long, default_value = "configs/monitor.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Logs in and reports counts until stopped with Ctrl-C
    Run(RunArgs),
    /// Shows which Chromium executable would be launched
    Locate,
    /// Validates the configuration
    Check,
    /// Prints shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Login page URL; defaults to portal.url from the config
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long, env = "SURVEIL_USERNAME")]
    pub username: String,
    #[arg(long, env = "SURVEIL_PASSCODE", hide_env_values = true)]
    pub passcode: String,
}

pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => {
            let config = load_monitor_config(&cli.config)?;
            run_monitor(config, args, cli.format)
        }
        Commands::Locate => {
            let config = load_monitor_config(&cli.config)?;
            render(&locate(&config), cli.format)
        }
        Commands::Check => {
            let report = health_check(&cli.config);
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::CheckFailed(
                    "one or more checks failed".to_string(),
                ));
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            generate(*shell, &mut command, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn credentials_for(config: &MonitorConfig, args: &RunArgs) -> Result<Credentials> {
    let url = args
        .url
        .clone()
        .or_else(|| config.portal.url.clone())
        .ok_or(AppError::MissingArgument("--url"))?;
    parse_portal_url(&url)?;
    Ok(Credentials::new(
        url,
        args.username.as_str(),
        args.passcode.as_str(),
    ))
}

fn run_monitor(config: MonitorConfig, args: &RunArgs, format: OutputFormat) -> Result<()> {
    let credentials = credentials_for(&config, args)?;
    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(supervise(config, credentials, format))? {
        None | Some(MonitorError::Cancelled) => Ok(()),
        Some(err) => Err(err.into()),
    }
}

async fn supervise(
    config: MonitorConfig,
    credentials: Credentials,
    format: OutputFormat,
) -> Result<Option<MonitorError>> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<MonitorEvent>();
    let driver = Arc::new(ChromiumDriver::new(config.chromium.clone()));
    let pipeline = Pipeline::new(driver, &config, Reporter::new(Arc::new(sender)));
    let supervisor = Arc::new(Supervisor::new(pipeline));

    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            print_event(&event, format);
        }
    });

    let mut handle = Arc::clone(&supervisor).spawn(credentials);
    let outcome = tokio::select! {
        joined = &mut handle => joined?,
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            supervisor.stop();
            handle.await?
        }
    };

    // The sender lives inside the pipeline; dropping it lets the printer drain.
    drop(supervisor);
    printer.await?;
    Ok(outcome)
}

fn print_event(event: &MonitorEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(event) {
            Ok(json) => println!("{json}"),
            Err(err) => warn!(error = %err, "event not serializable"),
        },
        OutputFormat::Text => match event {
            MonitorEvent::Process(line) => println!("{line}"),
            MonitorEvent::Message(result) => println!("{result}"),
            MonitorEvent::Options(_) | MonitorEvent::Control(_) | MonitorEvent::Status(_) => {}
        },
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct LocateReport {
    pub candidates: Vec<CandidateEntry>,
    pub resolved: String,
}

#[derive(Debug, Serialize)]
pub struct CandidateEntry {
    pub path: String,
    pub exists: bool,
}

fn locate(config: &MonitorConfig) -> LocateReport {
    let locator = ExecutableLocator::new(config.chromium.executable_candidates.clone());
    LocateReport {
        candidates: locator
            .candidates()
            .iter()
            .map(|path| CandidateEntry {
                path: path.display().to_string(),
                exists: path.exists(),
            })
            .collect(),
        resolved: describe_executable(&locator),
    }
}

impl DisplayFallback for LocateReport {
    fn display(&self) -> String {
        let mut lines: Vec<String> = self
            .candidates
            .iter()
            .map(|candidate| {
                let mark = if candidate.exists { "found" } else { "missing" };
                format!("{mark:>7}  {}", candidate.path)
            })
            .collect();
        lines.push(format!("env => {}", self.resolved));
        lines.join("\n")
    }
}

fn health_check(path: &Path) -> Vec<HealthEntry> {
    let config = match load_monitor_config(path) {
        Ok(config) => config,
        Err(err) => return vec![HealthEntry::error("config", err.to_string())],
    };
    let mut report = vec![HealthEntry::ok("config", path.display().to_string())];

    report.push(match &config.portal.url {
        Some(url) => HealthEntry::ok("portal.url", url.clone()),
        None => HealthEntry::warn("portal.url", "not set, pass --url to run"),
    });

    let locator = ExecutableLocator::new(config.chromium.executable_candidates.clone());
    report.push(match locator.resolve() {
        Some(path) => HealthEntry::ok("chromium", path.display().to_string()),
        None => HealthEntry::warn("chromium", "no bundled executable, relying on discovery"),
    });

    report.push(if config.access.allowed_users.is_empty() {
        HealthEntry::ok("access", "all users allowed")
    } else {
        HealthEntry::ok(
            "access",
            format!("{} allowed users", config.access.allowed_users.len()),
        )
    });
    report
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(HealthEntry::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for HealthEntry {
    fn display(&self) -> String {
        format!(
            "[{status}] {name}: {detail}",
            status = self.status,
            name = self.name,
            detail = self.detail
        )
    }
}

//! Agent configuration.
//!
//! Settings are layered: `tgo.toml` (optional) → environment → CLI flags.
//!
//! ```toml
//! [agent]
//! name = "tgo"
//! app_root = ".."
//! env_file = "uhura_map.json"
//! log_file = "tgo.log"
//! listen_port = 8101
//!
//! [coordinator]
//! url = "http://coordinator:8100/"
//! retry_attempts = 1
//! retry_delay_secs = 5
//!
//! [timing]
//! init_poll_secs = 15
//! test_poll_secs = 10
//! start_timeout_mins = 30
//! init_timeout_mins = 30
//! ready_timeout_mins = 15
//! command_timeout_mins = 30
//! test_timeout_mins = 30
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tgo_common::Phase;

use crate::status::RetryPolicy;

/// Coordinator used when neither the config nor the snapshot names one.
pub const DEFAULT_COORDINATOR_URL: &str = "http://localhost:8100/";

/// Environment variable overriding the coordinator URL.
pub const COORDINATOR_URL_ENV: &str = "TGO_COORDINATOR_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// App Name identifying this agent inside its instance
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Directory holding one sub-directory per app Name
    #[serde(default = "default_app_root")]
    pub app_root: PathBuf,
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Port used for the command listener when the agent is not in the snapshot
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_agent_name() -> String {
    "tgo".to_string()
}

fn default_app_root() -> PathBuf {
    PathBuf::from("..")
}

fn default_env_file() -> PathBuf {
    PathBuf::from("uhura_map.json")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("tgo.log")
}

fn default_listen_port() -> u16 {
    8101
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            app_root: default_app_root(),
            env_file: default_env_file(),
            log_file: default_log_file(),
            listen_port: default_listen_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSection {
    #[serde(default)]
    pub url: Option<String>,
    /// Total attempts per status push; 1 means a transport failure is fatal
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            url: None,
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSection {
    #[serde(default = "default_init_poll_secs")]
    pub init_poll_secs: u64,
    #[serde(default = "default_test_poll_secs")]
    pub test_poll_secs: u64,
    #[serde(default = "default_long_timeout_mins")]
    pub start_timeout_mins: u64,
    #[serde(default = "default_long_timeout_mins")]
    pub init_timeout_mins: u64,
    #[serde(default = "default_ready_timeout_mins")]
    pub ready_timeout_mins: u64,
    #[serde(default = "default_long_timeout_mins")]
    pub command_timeout_mins: u64,
    #[serde(default = "default_long_timeout_mins")]
    pub test_timeout_mins: u64,
}

fn default_init_poll_secs() -> u64 {
    15
}

fn default_test_poll_secs() -> u64 {
    10
}

fn default_long_timeout_mins() -> u64 {
    30
}

fn default_ready_timeout_mins() -> u64 {
    15
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            init_poll_secs: default_init_poll_secs(),
            test_poll_secs: default_test_poll_secs(),
            start_timeout_mins: default_long_timeout_mins(),
            init_timeout_mins: default_long_timeout_mins(),
            ready_timeout_mins: default_ready_timeout_mins(),
            command_timeout_mins: default_long_timeout_mins(),
            test_timeout_mins: default_long_timeout_mins(),
        }
    }
}

/// Contents of `tgo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TgoToml {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub coordinator: CoordinatorSection,
    #[serde(default)]
    pub timing: TimingSection,
}

impl TgoToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse tgo.toml")
    }

    /// Defaults when the file does not exist; a malformed file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Polling intervals and per-phase deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Delay between sweeps while waiting for Initializing / Ready
    pub init_poll: Duration,
    /// Delay between sweeps while waiting for tests to finish
    pub test_poll: Duration,
    pub start_timeout: Duration,
    pub init_timeout: Duration,
    pub ready_timeout: Duration,
    /// Deadline for the coordinator's TESTNOW once all apps are ready
    pub command_timeout: Duration,
    pub test_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from_section(&TimingSection::default())
    }
}

impl Timing {
    pub fn from_section(section: &TimingSection) -> Self {
        let mins = |m: u64| Duration::from_secs(m * 60);
        Self {
            init_poll: Duration::from_secs(section.init_poll_secs),
            test_poll: Duration::from_secs(section.test_poll_secs),
            start_timeout: mins(section.start_timeout_mins),
            init_timeout: mins(section.init_timeout_mins),
            ready_timeout: mins(section.ready_timeout_mins),
            command_timeout: mins(section.command_timeout_mins),
            test_timeout: mins(section.test_timeout_mins),
        }
    }

    /// How long the orchestrator waits for the unit working `phase`.
    pub fn deadline(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Uninitialized => self.start_timeout,
            Phase::Initializing => self.init_timeout,
            Phase::Ready => self.ready_timeout,
            Phase::Testing | Phase::Done | Phase::Terminate => self.test_timeout,
        }
    }
}

/// Values supplied on the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub coordinator_url: Option<String>,
    pub app_root: Option<PathBuf>,
    pub debug: bool,
    pub log_to_screen: bool,
}

/// Runtime configuration for the agent.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent_name: String,
    pub app_root: PathBuf,
    pub env_file: PathBuf,
    pub log_file: PathBuf,
    pub listen_port: u16,
    /// Explicit coordinator URL; the snapshot's is used when absent
    pub coordinator_url: Option<String>,
    pub retry: RetryPolicy,
    pub timing: Timing,
    pub debug: bool,
    pub log_to_screen: bool,
}

impl Config {
    /// Load `tgo.toml` (or the file named on the command line) and apply the
    /// environment and CLI layers on top.
    pub fn load(cli: CliOverrides) -> Result<Self> {
        let path = cli
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("tgo.toml"));
        let toml = TgoToml::load_or_default(&path)?;
        let env_url = std::env::var(COORDINATOR_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        Ok(Self::from_layers(toml, env_url, cli))
    }

    pub fn from_layers(toml: TgoToml, env_url: Option<String>, cli: CliOverrides) -> Self {
        let coordinator_url = cli
            .coordinator_url
            .or(env_url)
            .or(toml.coordinator.url)
            .filter(|u| !u.trim().is_empty())
            .map(|u| normalize_url(&u));

        Self {
            agent_name: toml.agent.name,
            app_root: cli.app_root.unwrap_or(toml.agent.app_root),
            env_file: cli.env_file.unwrap_or(toml.agent.env_file),
            log_file: toml.agent.log_file,
            listen_port: toml.agent.listen_port,
            coordinator_url,
            retry: RetryPolicy::new(
                toml.coordinator.retry_attempts,
                Duration::from_secs(toml.coordinator.retry_delay_secs),
            ),
            timing: Timing::from_section(&toml.timing),
            debug: cli.debug,
            log_to_screen: cli.log_to_screen,
        }
    }

    /// Coordinator base URL: explicit setting, else the snapshot's, else the
    /// local test-mode default.
    pub fn resolve_coordinator_url(&self, snapshot_url: &str) -> String {
        match &self.coordinator_url {
            Some(url) => url.clone(),
            None if !snapshot_url.trim().is_empty() => normalize_url(snapshot_url),
            None => DEFAULT_COORDINATOR_URL.to_string(),
        }
    }
}

/// Base URLs are joined with relative paths, so they always end in `/`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

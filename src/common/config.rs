//! Configuration file handling
//!
//! The whole run is driven by one immutable [`Config`] built at startup and
//! handed to the orchestrator. Every field has a default, so an absent or
//! partial config file is fine.

use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "FLOW_SMOKE_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Container provisioning settings
    #[serde(default)]
    pub container: ContainerConfig,

    /// Engine endpoint settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Readiness polling settings
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Counter verification settings
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Flow definition used when none is given on the command line
    #[serde(default = "default_flow_file")]
    pub default_flow_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            container: ContainerConfig::default(),
            engine: EngineConfig::default(),
            readiness: ReadinessConfig::default(),
            verify: VerifyConfig::default(),
            default_flow_file: default_flow_file(),
        }
    }
}

fn default_flow_file() -> PathBuf {
    PathBuf::from("NiFi_Flow.json")
}

/// A host port published to a container port
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// Container provisioning settings
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    /// Image reference, including tag
    #[serde(default = "default_image")]
    pub image: String,

    /// Let the runtime delete the container once it stops
    #[serde(default = "default_true")]
    pub auto_remove: bool,

    /// Pull the image when it is not available locally
    #[serde(default = "default_true")]
    pub pull: bool,

    /// Published ports (management API and data ingestion)
    #[serde(default = "default_ports")]
    pub ports: Vec<PortMapping>,

    /// Grace period before the runtime kills the container on stop
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            auto_remove: true,
            pull: true,
            ports: default_ports(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

fn default_image() -> String {
    "apache/nifi:1.12.1".to_string()
}
fn default_true() -> bool {
    true
}
fn default_ports() -> Vec<PortMapping> {
    vec![
        PortMapping {
            host: 8080,
            container: 8080,
        },
        PortMapping {
            host: 8081,
            container: 8081,
        },
    ]
}
fn default_stop_timeout() -> u64 {
    10
}

/// Engine endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the management API
    #[serde(default = "default_management_url")]
    pub management_url: String,

    /// URL of the data-ingestion endpoint
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,

    /// Timeout for management and ingestion requests (readiness probes use their own)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            management_url: default_management_url(),
            ingest_url: default_ingest_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_management_url() -> String {
    "http://localhost:8080/nifi-api".to_string()
}
fn default_ingest_url() -> String {
    "http://localhost:8081/testInput".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

/// What to do when the readiness budget runs out
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnExhausted {
    /// Abort the run
    #[default]
    Fail,
    /// Presume the engine is ready and carry on
    Continue,
}

/// Readiness polling settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sleep between attempts
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Per-attempt timeout
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,

    #[serde(default)]
    pub on_exhausted: OnExhausted,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval(),
            attempt_timeout_secs: default_attempt_timeout(),
            on_exhausted: OnExhausted::default(),
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

fn default_max_attempts() -> u32 {
    12
}
fn default_interval() -> u64 {
    5
}
fn default_attempt_timeout() -> u64 {
    2
}

/// Counter verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_counter_name")]
    pub counter_name: String,

    #[serde(default = "default_counter_context")]
    pub counter_context: String,

    /// Payload posted to the ingestion endpoint
    #[serde(default = "default_stimulus")]
    pub stimulus: serde_json::Value,

    /// Wait after starting the flow
    #[serde(default = "default_settle_ms")]
    pub start_settle_ms: u64,

    /// Wait after posting the stimulus before re-reading the counter
    #[serde(default = "default_settle_ms")]
    pub stimulus_settle_ms: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            counter_name: default_counter_name(),
            counter_context: default_counter_context(),
            stimulus: default_stimulus(),
            start_settle_ms: default_settle_ms(),
            stimulus_settle_ms: default_settle_ms(),
        }
    }
}

impl VerifyConfig {
    pub fn start_settle(&self) -> Duration {
        Duration::from_millis(self.start_settle_ms)
    }

    pub fn stimulus_settle(&self) -> Duration {
        Duration::from_millis(self.stimulus_settle_ms)
    }
}

fn default_counter_name() -> String {
    "testCounterSuccess".to_string()
}
fn default_counter_context() -> String {
    "All UpdateCounter's".to_string()
}
fn default_stimulus() -> serde_json::Value {
    json!({ "foo": "bar" })
}
fn default_settle_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from `$FLOW_SMOKE_CONFIG` or the default config file
    ///
    /// Returns default configuration if no file exists. A path named by the
    /// environment variable must exist.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.readiness.max_attempts == 0 {
            return Err(super::Error::Config(
                "readiness.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.container.image.trim().is_empty() {
            return Err(super::Error::Config("container.image is empty".to_string()));
        }
        for url in [&self.engine.management_url, &self.engine.ingest_url] {
            if reqwest::Url::parse(url).is_err() {
                return Err(super::Error::Config(format!("invalid URL '{}'", url)));
            }
        }
        Ok(())
    }
}

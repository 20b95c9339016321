// Configuration Storage Service
// Optional JSON config file plus environment lookups

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::ProviderKind;

pub const CONFIG_PATH_ENV: &str = "DETECTOR_PIPE_CONFIG";
pub const LOG_DIR_ENV: &str = "DETECTOR_PIPE_LOG_DIR";
pub const DISABLE_FILE_LOG_ENV: &str = "DETECTOR_PIPE_DISABLE_FILE_LOG";
pub const TIMEOUT_ENV: &str = "DETECTOR_PIPE_TIMEOUT_SECS";

/// Variable lookup, so the pipe can run against a fixed map in tests.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    /// Present and non-empty.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.var(key).as_deref(), Some("1") | Some("true") | Some("TRUE"))
    }
}

/// The live process environment, read at every lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipeConfig {
    pub log_dir: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// The proxy URL to use, if enabled. HTTPS wins since every endpoint is HTTPS.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https
            .as_deref()
            .or(self.http.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOverride {
    pub base_url: Option<String>,
}

impl PipeConfig {
    pub fn provider_url(&self, kind: ProviderKind) -> Option<&str> {
        self.providers
            .get(kind.slug())
            .and_then(|p| p.base_url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }

    /// Environment first, then the config file. `None` means no timeout.
    pub fn request_timeout(&self, env: &impl Environment) -> Option<Duration> {
        env.non_empty(TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or(self.request_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn log_dir(&self, env: &impl Environment) -> PathBuf {
        if let Some(p) = env.var(LOG_DIR_ENV).filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(p);
        }
        if let Some(p) = self.log_dir.as_deref().filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(p);
        }
        default_logs_dir()
    }
}

fn default_logs_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("detector-pipe").join("logs");
    }
    PathBuf::from("logs")
}

pub struct ConfigStore {
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_file: PathBuf) -> Self {
        Self { config_file }
    }

    /// `DETECTOR_PIPE_CONFIG` if set, otherwise the per-user config dir.
    pub fn locate(env: &impl Environment) -> Option<Self> {
        if let Some(p) = env.non_empty(CONFIG_PATH_ENV) {
            return Some(Self::new(PathBuf::from(p)));
        }
        Self::default_config_dir().map(|dir| Self::new(dir.join("config.json")))
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("detector-pipe"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.config_file
    }

    /// Load configuration; a missing file yields defaults.
    pub fn load(&self) -> anyhow::Result<PipeConfig> {
        if !self.config_file.exists() {
            return Ok(PipeConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .with_context(|| format!("Failed to read config {}", self.config_file.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", self.config_file.display()))
    }
}

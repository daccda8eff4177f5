use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tableside_core::activity::{
    ActivityTimings, DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_THROTTLE_SECS,
};
use tableside_core::session::DEFAULT_IDLE_TIMEOUT_SECS;

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub tracker: TrackerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    /// How long shutdown waits for the final beacon before exiting.
    #[serde(default = "default_beacon_grace_ms")]
    pub beacon_grace_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            health_check_interval_secs: default_health_check_interval(),
            beacon_grace_ms: default_beacon_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_throttle")]
    pub throttle_secs: u64,
    /// Must match the server's `TABLESIDE_SESSION_TIMEOUT_SECS`.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            throttle_secs: default_throttle(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl TrackerSettings {
    pub fn timings(&self) -> ActivityTimings {
        ActivityTimings::from_secs(
            self.heartbeat_interval_secs,
            self.throttle_secs,
            self.idle_timeout_secs,
        )
    }
}

impl ServerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_health_check_interval() -> u64 {
    300
}

fn default_beacon_grace_ms() -> u64 {
    2_000
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

fn default_throttle() -> u64 {
    DEFAULT_THROTTLE_SECS
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("tableside"))
}

/// Get the daemon config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("daemon.toml"))
}

/// Load daemon config from disk, falling back to defaults when absent.
pub fn load_config() -> Result<DaemonConfig> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<DaemonConfig> {
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read daemon config at {}", path.display()))?;
    let config: DaemonConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse daemon config at {}", path.display()))?;
    config
        .tracker
        .timings()
        .validate()
        .with_context(|| format!("Invalid [tracker] settings in {}", path.display()))?;
    Ok(config)
}

// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "rabbit_session.json";

/// Tuning for a session. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_frame_max")]
    pub frame_max: u32,
    /// Seconds; 0 disables heartbeats.
    #[serde(default)]
    pub heartbeat: u16,
    /// Length of one consume polling slice. Upper bound on cancellation latency.
    #[serde(default = "default_poll_slice_ms")]
    pub poll_slice_ms: u64,
    #[serde(default)]
    pub confirm_publishes: bool,
    #[serde(default = "default_connection_name")]
    pub connection_name: String,
}

// Default values
fn default_frame_max() -> u32 { 131_072 }
fn default_poll_slice_ms() -> u64 { 1000 }
fn default_connection_name() -> String { "rabbit-session".to_string() }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_max: default_frame_max(),
            heartbeat: 0,
            poll_slice_ms: default_poll_slice_ms(),
            confirm_publishes: false,
            connection_name: default_connection_name(),
        }
    }
}

impl SessionConfig {
    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms)
    }

    /// Sub-millisecond remainders round up, so only `Duration::ZERO` maps to 0.
    pub fn with_poll_slice(mut self, slice: Duration) -> Self {
        let millis = slice.as_nanos().div_ceil(1_000_000);
        self.poll_slice_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn with_confirm_publishes(mut self, enabled: bool) -> Self {
        self.confirm_publishes = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_slice_ms == 0 {
            return Err(anyhow!("Configuration error: poll_slice_ms must be positive"));
        }
        // AMQP 0-9-1 minimum frame size
        if self.frame_max < 4096 {
            return Err(anyhow!(
                "Configuration error: frame_max {} is below the protocol minimum of 4096",
                self.frame_max
            ));
        }
        Ok(())
    }
}

pub fn find_config_file() -> Result<PathBuf> {
    let nested = Path::new("config").join(CONFIG_FILE_NAME);
    let locations = [
        ("Current directory", PathBuf::from(CONFIG_FILE_NAME)),
        ("Current directory (alternative)", nested),
    ];

    for (location_name, path) in locations.iter() {
        if path.exists() {
            debug!("Found config file in {}: {}", location_name, path.display());
            return Ok(path.clone());
        }
    }

    if let Some(home_dir) = home::home_dir() {
        let home_config = home_dir.join(format!(".{}", CONFIG_FILE_NAME));
        if home_config.exists() {
            debug!("Found config file in home directory: {}", home_config.display());
            return Ok(home_config);
        }
    }

    Err(anyhow!(
        "Could not find {} in the current directory, config/ or your home directory",
        CONFIG_FILE_NAME
    ))
}

pub fn load_config() -> Result<SessionConfig> {
    let config_path = find_config_file()?;
    load_config_from(&config_path)
}

pub fn load_config_from(config_path: &Path) -> Result<SessionConfig> {
    let config_content = fs::read_to_string(config_path)
        .context(format!("Failed to read config file at {}", config_path.display()))?;

    let config: SessionConfig = serde_json::from_str(&config_content)
        .context("Configuration file contains invalid JSON")?;

    config.validate()?;
    Ok(config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&SessionConfig::default())
        .context("Failed to serialize default configuration")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory at {}", parent.display()))?;
        }
    }

    fs::write(path, json)
        .context(format!("Failed to write configuration to {}", path.display()))?;

    info!("Created default configuration file at: {}", path.display());
    Ok(())
}

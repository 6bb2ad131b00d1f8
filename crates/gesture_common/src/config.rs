//! Configuration for the gesture-switch daemon.
//!
//! Loaded from a TOML file at startup; a missing file falls back to the
//! defaults with a warning so a bare install still comes up against a
//! local broker.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GestureError;

/// Default config file path.
pub const CONFIG_PATH: &str = "/etc/gesture-switch/config.toml";

/// Message-bus connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client id presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "gestured".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Capture and classification pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Path to the frozen classifier artifact. Loading it is a fatal
    /// startup step; there is no default that makes sense.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path the landmark sidecar writes newline-JSON records to. When
    /// unset the capture loop stays idle and only state sync runs.
    #[serde(default)]
    pub landmark_feed: Option<PathBuf>,

    /// Capture/classify tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Quiet window during which an identical command for the same device
    /// is suppressed.
    #[serde(default = "default_debounce_quiet")]
    pub debounce_quiet_ms: u64,

    /// How long a locally issued command waits for a confirming status
    /// report before it is expired.
    #[serde(default = "default_intent_expiry")]
    pub intent_expiry_ms: u64,

    /// How often the controller sweeps for expired pending intents.
    #[serde(default = "default_expiry_sweep")]
    pub expiry_sweep_ms: u64,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("/var/lib/gesture-switch/model.json")
}

fn default_tick_interval() -> u64 {
    30
}

fn default_debounce_quiet() -> u64 {
    1000
}

fn default_intent_expiry() -> u64 {
    5000
}

fn default_expiry_sweep() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            landmark_feed: None,
            tick_interval_ms: default_tick_interval(),
            debounce_quiet_ms: default_debounce_quiet(),
            intent_expiry_ms: default_intent_expiry(),
            expiry_sweep_ms: default_expiry_sweep(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist. A file that exists but fails to parse is an
    /// error; silently masking a typo'd config is worse than not starting.
    pub fn load_or_default(path: &Path) -> Result<Self, GestureError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| GestureError::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

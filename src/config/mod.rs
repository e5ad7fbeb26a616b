// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::DEFAULT_CAPACITY;
use crate::detection::ThresholdConfig;
use crate::streaming::ExportFormat;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Live device transport
    pub transport: TransportConfig,

    /// Simulated fallback producer
    pub simulator: SimulatorConfig,

    /// Retention window
    pub history: HistoryConfig,

    /// Classification thresholds in force at startup
    pub thresholds: ThresholdConfig,

    /// History export
    pub export: ExportConfig,

    /// Read-only live feed for dashboards
    pub feed: FeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "VitalWatch".to_string(),
            log_level: "info".to_string(),
            transport: TransportConfig::default(),
            simulator: SimulatorConfig::default(),
            history: HistoryConfig::default(),
            thresholds: ThresholdConfig::default(),
            export: ExportConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("vitalwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Live transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// WebSocket endpoint of the device, e.g. `ws://host:port`
    pub url: String,

    /// Upper bound for a connect attempt
    pub connect_timeout_ms: u64,

    /// Connect on startup
    pub auto_connect: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://192.168.10.5:8080".to_string(),
            connect_timeout_ms: 5000,
            auto_connect: false,
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,

    /// Fixed seed for a reproducible walk
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            seed: None,
        }
    }
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of samples retained
    pub capacity: usize,

    /// Buffered change events per subscriber before it lags
    pub event_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            event_capacity: 256,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output directory
    pub path: PathBuf,

    pub format: ExportFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data"),
            format: ExportFormat::Csv,
        }
    }
}

/// Live feed server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub max_clients: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "0.0.0.0".to_string(),
            port: 8765,
            max_clients: 10,
        }
    }
}

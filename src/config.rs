use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::{BatchOptions, DEFAULT_DELAY};
use crate::geocode::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};
use crate::regions::{DatasetErrorPolicy, DEFAULT_ROOT_MARKER};

/// Settings for the `enrich` binary. Every field has a default, so an empty
/// file (or no file) is a valid configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub datasets: DatasetsConfig,
    pub geocoder: GeocoderConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatasetsConfig {
    pub root: PathBuf,
    pub root_marker: String,
    pub on_error: DatasetErrorPolicy,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT_MARKER),
            root_marker: DEFAULT_ROOT_MARKER.to_string(),
            on_error: DatasetErrorPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub delay_ms: u64,
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY.as_millis() as u64,
            concurrency: 1,
        }
    }
}

impl BatchConfig {
    pub fn options(&self) -> BatchOptions {
        BatchOptions {
            delay: Duration::from_millis(self.delay_ms),
            concurrency: self.concurrency.max(1),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

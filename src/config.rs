use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Aggregator, InsightsError, Predictor, Result};

const MAX_OFFSET_MINUTES: i32 = 14 * 60;
const DEFAULT_CONFIG_PATH: &str = "config/insights.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: "data/sample_posts.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub utc_offset_minutes: i32,
}

impl AnalyticsConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(InsightsError::Config(format!(
                "utc_offset_minutes out of range (-840..=840): {}",
                self.utc_offset_minutes
            )));
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            InsightsError::Config(format!(
                "invalid utc_offset_minutes: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn aggregator(&self) -> Result<Aggregator> {
        Ok(Aggregator::new(self.offset()?))
    }

    pub fn predictor(&self) -> Result<Predictor> {
        Ok(Predictor::new(self.offset()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub data: DataConfig,
    pub analytics: AnalyticsConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl InsightsConfig {
    /// An explicit path (argument or `INSIGHTS_CONFIG_PATH`) must exist; only
    /// the built-in default location may be missing.
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        let (config_path, explicit) = match path.or_else(env_config_path) {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else if explicit {
            return Err(InsightsError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        } else {
            InsightsConfig::default()
        };

        config.apply_env_overrides();
        config.analytics.offset()?;
        Ok((config, Some(config_path)))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| InsightsError::Config(format!("failed to read config: {}", err)))?;
        toml::from_str(&contents)
            .map_err(|err| InsightsError::Config(format!("failed to parse config: {}", err)))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| InsightsError::Config(format!("failed to serialize config: {}", err)))?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        for name in self.apply_overrides(|name| env::var(name).ok()) {
            warn!(variable = name, "ignoring unparseable environment override");
        }
    }

    /// Applies `INSIGHTS_*` overrides from `lookup` and returns the names of
    /// variables that were set but could not be parsed.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<&'static str> {
        let mut rejected = Vec::new();

        if let Some(path) = lookup("INSIGHTS_DATA_PATH") {
            if !path.trim().is_empty() {
                self.data.path = path;
            }
        }
        if let Some(offset) = lookup("INSIGHTS_UTC_OFFSET_MINUTES") {
            match offset.trim().parse::<i32>() {
                Ok(value) => self.analytics.utc_offset_minutes = value,
                Err(_) => rejected.push("INSIGHTS_UTC_OFFSET_MINUTES"),
            }
        }
        if let Some(enabled) = lookup("INSIGHTS_CACHE_MODELS") {
            match parse_flag(&enabled) {
                Some(value) => self.cache.enabled = value,
                None => rejected.push("INSIGHTS_CACHE_MODELS"),
            }
        }
        if let Some(max_entries) = lookup("INSIGHTS_CACHE_MAX_ENTRIES") {
            match max_entries.trim().parse::<usize>() {
                Ok(value) => self.cache.max_entries = value,
                Err(_) => rejected.push("INSIGHTS_CACHE_MAX_ENTRIES"),
            }
        }
        if let Some(host) = lookup("INSIGHTS_HOST") {
            if !host.trim().is_empty() {
                self.server.host = host;
            }
        }
        if let Some(port) = lookup("INSIGHTS_PORT") {
            match port.trim().parse::<u16>() {
                Ok(value) => self.server.port = value,
                Err(_) => rejected.push("INSIGHTS_PORT"),
            }
        }

        rejected
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_config_path() -> Option<PathBuf> {
    env::var("INSIGHTS_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

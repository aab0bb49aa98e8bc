use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::system::collector::DEFAULT_TOP_N;
use crate::system::metrics::{DEFAULT_PAGE_SIZE, MetricsStrategy};
use crate::system::poll::DEFAULT_PERIOD;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub metrics: MetricsConfig,
    pub actions: ActionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub top_n: usize,
    pub cycle_timeout_ms: u64,
    pub resolve_icons: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: DEFAULT_PERIOD.as_millis() as u64,
            top_n: DEFAULT_TOP_N,
            cycle_timeout_ms: 10_000,
            resolve_icons: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    #[default]
    Auto,
    Page,
    Table,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub strategy: StrategyChoice,
    pub page_size: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            strategy: StrategyChoice::Auto,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MetricsConfig {
    pub fn resolve(&self) -> MetricsStrategy {
        match self.strategy {
            StrategyChoice::Auto => MetricsStrategy::detect(self.page_size),
            StrategyChoice::Page => MetricsStrategy::PageBased {
                page_size: self.page_size,
            },
            StrategyChoice::Table => MetricsStrategy::TableBased,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub escalation: bool,
    pub escalation_program: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        ActionsConfig {
            escalation: true,
            escalation_program: "sudo".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procwatch").join("config.toml"))
}

pub fn load_config() -> (Config, Option<ConfigError>) {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => (Config::default(), None),
    }
}

/// Falls back to defaults when the file is missing or invalid. A file that
/// exists but does not parse is handed back so the caller can report it once
/// logging is up.
pub fn load_config_from_path(path: &Path) -> (Config, Option<ConfigError>) {
    match read_config(path) {
        Ok(config) => (config, None),
        Err(ConfigError::Read { .. }) => (Config::default(), None),
        Err(err) => (Config::default(), Some(err)),
    }
}

pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

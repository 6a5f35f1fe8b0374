use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::metrics::ReservoirKind;

const ENV_PREFIX: &str = "METRICS_SNAPSHOT_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
    #[error("{0}")]
    OutOfRange(&'static str),
}

/// Server and reservoir settings.
///
/// Loaded from an optional JSON file named by `METRICS_SNAPSHOT_CONFIG`, then
/// overridden field by field from `METRICS_SNAPSHOT_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SSE push interval (milliseconds)
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,

    /// Reservoir used when a metric is first recorded without an explicit kind
    #[serde(default = "default_kind")]
    pub default_kind: ReservoirKind,

    #[serde(default)]
    pub reservoir: ReservoirSettings,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReservoirSettings {
    /// Retained values for uniform and sliding-window reservoirs
    #[serde(default = "default_reservoir_size")]
    pub size: usize,

    /// Upper bound on distinct metric names the registry will create
    #[serde(default = "default_max_metrics")]
    pub max_metrics: usize,

    /// HdrHistogram range and precision
    #[serde(default = "default_hdr_lowest")]
    pub hdr_lowest: u64,
    #[serde(default = "default_hdr_highest")]
    pub hdr_highest: u64,
    #[serde(default = "default_hdr_sigfig")]
    pub hdr_sigfig: u8,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}
fn default_stream_interval_ms() -> u64 {
    500
}
fn default_kind() -> ReservoirKind {
    ReservoirKind::Hdr
}
fn default_reservoir_size() -> usize {
    1028
}
fn default_max_metrics() -> usize {
    1024
}
fn default_hdr_lowest() -> u64 {
    1
}
fn default_hdr_highest() -> u64 {
    3_600_000_000
}
fn default_hdr_sigfig() -> u8 {
    3
}

impl Default for ReservoirSettings {
    fn default() -> Self {
        Self {
            size: default_reservoir_size(),
            max_metrics: default_max_metrics(),
            hdr_lowest: default_hdr_lowest(),
            hdr_highest: default_hdr_highest(),
            hdr_sigfig: default_hdr_sigfig(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            stream_interval_ms: default_stream_interval_ms(),
            default_kind: default_kind(),
            reservoir: ReservoirSettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Same as `from_env`, with the environment supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let mut config = match var("CONFIG") {
            Some(path) => {
                let path = PathBuf::from(path);
                let json = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path, source })?;
                serde_json::from_str(&json)?
            }
            None => Self::default(),
        };

        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(v) = var("STREAM_INTERVAL_MS") {
            config.stream_interval_ms = parse("STREAM_INTERVAL_MS", v)?;
        }
        if let Some(v) = var("DEFAULT_KIND") {
            config.default_kind = parse("DEFAULT_KIND", v)?;
        }
        if let Some(v) = var("RESERVOIR_SIZE") {
            config.reservoir.size = parse("RESERVOIR_SIZE", v)?;
        }
        if let Some(v) = var("MAX_METRICS") {
            config.reservoir.max_metrics = parse("MAX_METRICS", v)?;
        }
        if let Some(v) = var("HDR_LOWEST") {
            config.reservoir.hdr_lowest = parse("HDR_LOWEST", v)?;
        }
        if let Some(v) = var("HDR_HIGHEST") {
            config.reservoir.hdr_highest = parse("HDR_HIGHEST", v)?;
        }
        if let Some(v) = var("HDR_SIGFIG") {
            config.reservoir.hdr_sigfig = parse("HDR_SIGFIG", v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_interval_ms == 0 {
            return Err(ConfigError::OutOfRange("stream_interval_ms must be greater than 0"));
        }
        self.reservoir.validate()
    }
}

impl ReservoirSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::OutOfRange("reservoir size must be greater than 0"));
        }
        if self.max_metrics == 0 {
            return Err(ConfigError::OutOfRange("max_metrics must be greater than 0"));
        }
        if self.hdr_lowest == 0 {
            return Err(ConfigError::OutOfRange("hdr_lowest must be at least 1"));
        }
        if self.hdr_highest < self.hdr_lowest.saturating_mul(2) {
            return Err(ConfigError::OutOfRange("hdr_highest must be at least twice hdr_lowest"));
        }
        if self.hdr_sigfig > 5 {
            return Err(ConfigError::OutOfRange("hdr_sigfig must be between 0 and 5"));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{key}"),
        value,
    })
}

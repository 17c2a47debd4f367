// Tue Jan 13 2026 - Alex

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to start discovery for network {network}: {source}")]
    DiscoveryStart {
        network: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed waiting for discovery socket: {0}")]
    DiscoveryWait(#[source] std::io::Error),
    #[error("Failed waiting for scheduler connection: {0}")]
    ConnectionWait(#[source] std::io::Error),
    #[error("Malformed stats message: {0}")]
    MalformedStats(#[from] StatsError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("missing key {0}")]
    MissingKey(&'static str),
    #[error("invalid MaxJobs value {0:?}")]
    InvalidMaxJobs(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

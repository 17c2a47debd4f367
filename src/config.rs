// Tue Jan 13 2026 - Alex

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_NETWORK_NAME: &str = "ICECREAM";
pub const DEFAULT_SCHEDULER_ENV_VAR: &str = "USE_SCHEDULER";
pub const DEFAULT_SCHEDULER_PORT: u16 = 8765;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network name tried first. Empty means the built-in default.
    pub network_name: String,
    pub scheduler_env_var: String,
    pub scheduler_port: u16,
    pub idle_deadline_ms: u64,
    pub probe_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub login_retry_delay_ms: u64,
    pub strict_stats: bool,
    pub ignore_unhandled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_name: String::new(),
            scheduler_env_var: DEFAULT_SCHEDULER_ENV_VAR.to_string(),
            scheduler_port: DEFAULT_SCHEDULER_PORT,
            idle_deadline_ms: 2000,
            probe_wait_ms: 3000,
            poll_interval_ms: 50,
            probe_timeout_ms: 2000,
            login_retry_delay_ms: 1000,
            strict_stats: false,
            ignore_unhandled: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "json" => {
                let contents = fs::read_to_string(path)?;
                let config: Config = serde_json::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    pub fn with_network_name(mut self, name: impl Into<String>) -> Self {
        self.network_name = name.into();
        self
    }

    pub fn with_idle_deadline(mut self, deadline: Duration) -> Self {
        self.idle_deadline_ms = deadline.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_login_retry_delay(mut self, delay: Duration) -> Self {
        self.login_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_strict_stats(mut self, strict: bool) -> Self {
        self.strict_stats = strict;
        self
    }

    pub fn with_ignore_unhandled(mut self, ignore: bool) -> Self {
        self.ignore_unhandled = ignore;
        self
    }

    pub fn idle_deadline(&self) -> Duration {
        Duration::from_millis(self.idle_deadline_ms)
    }

    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn login_retry_delay(&self) -> Duration {
        Duration::from_millis(self.login_retry_delay_ms)
    }

    /// Reads the override network name. Unset and empty values both yield `None`.
    pub fn scheduler_override_from_env(&self) -> Option<String> {
        std::env::var(&self.scheduler_env_var)
            .ok()
            .filter(|value| !value.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_deadline_ms == 0 {
            return Err(ConfigError::Validation("idle_deadline_ms must be greater than 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation("poll_interval_ms must be greater than 0".to_string()));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation("probe_timeout_ms must be greater than 0".to_string()));
        }
        if self.scheduler_port == 0 {
            return Err(ConfigError::Validation("scheduler_port must be set".to_string()));
        }
        Ok(())
    }
}

//! TOML configuration loading and validation.
//!
//! The cyclic data plane is configured statically before the RT threads
//! start; nothing here is touched on the hot path. Defaults mirror the
//! demo cell's network schedule (100 µs stack budgets, 40 µs jitter
//! allowance, 1 ms cycle).
//!
//! # TOML Example
//!
//! ```toml
//! [cycle]
//! base_time_s = 1700000000.0
//! interval_ns = 1000000
//! send_offset_ns = 200000
//! recv_offset_ns = 600000
//! recv_window_ns = 100000
//!
//! [net]
//! publisher_id = 1
//! interface = "eth0"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    DEFAULT_APP_WAKEUP_NS, DEFAULT_INTERVAL_NS, DEFAULT_MAX_JITTER_NS, DEFAULT_RECV_STACK_NS,
    DEFAULT_SEND_STACK_NS,
};
use crate::time::TaiTime;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Network schedule of the cyclic data plane.
///
/// All offsets are relative to the epoch start of a cycle; all durations
/// in nanoseconds. The stack/wakeup/jitter budgets separate the wire
/// deadline from the thread wakeup instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Cycle base time as a Unix timestamp [s]. The epoch grid is
    /// `base + k * interval`.
    #[serde(default)]
    pub base_time_s: f64,

    /// Cycle interval [ns].
    #[serde(default = "default_interval")]
    pub interval_ns: u64,

    /// Offset from epoch start to the sending slot [ns].
    #[serde(default)]
    pub send_offset_ns: u64,

    /// Spacing between consecutive per-axis sending slots [ns].
    #[serde(default)]
    pub send_window_ns: u64,

    /// Offset from epoch start to the end of the receive slot [ns].
    #[serde(default)]
    pub recv_offset_ns: u64,

    /// Duration in which an inbound packet is expected [ns].
    #[serde(default)]
    pub recv_window_ns: u64,

    /// Modeled outbound stack latency [ns].
    #[serde(default = "default_send_stack")]
    pub send_stack_ns: u64,

    /// Modeled inbound stack latency [ns].
    #[serde(default = "default_recv_stack")]
    pub recv_stack_ns: u64,

    /// Application wakeup budget [ns].
    #[serde(default = "default_app_wakeup")]
    pub app_wakeup_ns: u64,

    /// Worst-case scheduling jitter allowance [ns].
    #[serde(default = "default_max_jitter")]
    pub max_jitter_ns: u64,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_NS
}
fn default_send_stack() -> u64 {
    DEFAULT_SEND_STACK_NS
}
fn default_recv_stack() -> u64 {
    DEFAULT_RECV_STACK_NS
}
fn default_app_wakeup() -> u64 {
    DEFAULT_APP_WAKEUP_NS
}
fn default_max_jitter() -> u64 {
    DEFAULT_MAX_JITTER_NS
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            base_time_s: 0.0,
            interval_ns: DEFAULT_INTERVAL_NS,
            send_offset_ns: 0,
            send_window_ns: 0,
            recv_offset_ns: 0,
            recv_window_ns: 0,
            send_stack_ns: DEFAULT_SEND_STACK_NS,
            recv_stack_ns: DEFAULT_RECV_STACK_NS,
            app_wakeup_ns: DEFAULT_APP_WAKEUP_NS,
            max_jitter_ns: DEFAULT_MAX_JITTER_NS,
        }
    }
}

impl CycleConfig {
    /// The base time as an absolute instant.
    pub fn base_time(&self) -> TaiTime {
        TaiTime::from_secs_f64(self.base_time_s)
    }

    /// Validate the schedule.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `interval_ns` is zero
    /// - an offset or window does not fit inside one interval
    /// - `base_time_s` is negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ns == 0 {
            return Err(ConfigError::ValidationError(
                "interval_ns must be > 0".to_string(),
            ));
        }
        if self.base_time_s < 0.0 {
            return Err(ConfigError::ValidationError(
                "base_time_s must not be negative".to_string(),
            ));
        }
        if self.send_offset_ns >= self.interval_ns {
            return Err(ConfigError::ValidationError(format!(
                "send_offset_ns {} must be < interval_ns {}",
                self.send_offset_ns, self.interval_ns
            )));
        }
        if self.recv_offset_ns >= self.interval_ns {
            return Err(ConfigError::ValidationError(format!(
                "recv_offset_ns {} must be < interval_ns {}",
                self.recv_offset_ns, self.interval_ns
            )));
        }
        if self.recv_window_ns > self.interval_ns {
            return Err(ConfigError::ValidationError(format!(
                "recv_window_ns {} must be <= interval_ns {}",
                self.recv_window_ns, self.interval_ns
            )));
        }
        Ok(())
    }
}

/// Network identity and demo-transport endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Publisher id written into every outbound network message.
    #[serde(default = "default_publisher_id")]
    pub publisher_id: u16,

    /// Name of the network interface to bind to.
    #[serde(default)]
    pub interface: String,

    /// Local socket address the demo UDP transport listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Remote socket address the demo UDP transport sends to.
    #[serde(default = "default_dest")]
    pub dest: String,
}

fn default_publisher_id() -> u16 {
    0x0001
}
fn default_listen() -> String {
    "0.0.0.0:14550".to_string()
}
fn default_dest() -> String {
    "127.0.0.1:14551".to_string()
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            publisher_id: default_publisher_id(),
            interface: String::new(),
            listen: default_listen(),
            dest: default_dest(),
        }
    }
}

/// Complete static configuration of one data plane role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPlaneConfig {
    /// Cycle timing schedule.
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Network identity/endpoints.
    #[serde(default)]
    pub net: NetConfig,
}

impl DataPlaneConfig {
    /// Load and validate a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::FileNotFound` if the file does not exist
    /// - `ConfigError::ParseError` on invalid TOML
    /// - `ConfigError::ValidationError` on semantic violations
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.cycle.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

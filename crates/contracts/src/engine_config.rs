//! Engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::Verbosity;

/// Flow engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Ring depth P: frames that may be in flight per channel
    #[validate(range(min = 1, max = 64))]
    pub ring_depth: usize,

    /// Verbosity every node starts with
    pub default_verbosity: Verbosity,

    /// Log per-frame timing regardless of node verbosity
    pub always_enable_timing: bool,

    /// Bounded waits with wait logging, plus processing-order indices
    pub debug_timings: bool,

    /// Wait slice (ms) between "still waiting" logs in debug timing mode
    #[validate(range(min = 1, max = 1000))]
    pub wait_log_interval_ms: u64,

    /// Recent per-frame runtimes kept per node
    #[validate(range(min = 1, max = 4096))]
    pub timing_history: usize,

    /// Logging / metrics output
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ring_depth: 4,
            default_verbosity: Verbosity::Low,
            always_enable_timing: false,
            debug_timings: false,
            wait_log_interval_ms: 2,
            timing_history: 64,
            logging: LoggingConfig::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON format (production)
    #[default]
    Json,
    /// Human-readable pretty format (development)
    Pretty,
    /// Compact format
    Compact,
}

/// Logging and metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log output format
    pub format: LogFormat,

    /// Default log level when `RUST_LOG` is unset
    #[validate(length(min = 1))]
    pub level: String,

    /// Prometheus exporter port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            metrics_port: None,
        }
    }
}

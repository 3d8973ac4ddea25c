//! Driver loop configuration.

use serde::{Deserialize, Serialize};

use crate::core::scheduler::SchedulerTuning;

/// Knobs for the driver loop that are not user-facing session settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Scheduler policy.
    #[serde(default)]
    pub tuning: SchedulerTuning,
    /// Attempts per generation before the session stops.
    #[serde(default = "default_max_encode_retry")]
    pub max_encode_retry: u32,
    /// Sample quality metrics every this many generations (and on the first).
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval: u64,
    /// Floor on the delay between ticks, in milliseconds.
    #[serde(default = "default_min_tick_interval_ms")]
    pub min_tick_interval_ms: f64,
    /// Budget for one offloaded batch, in milliseconds.
    #[serde(default = "default_offload_timeout_ms")]
    pub offload_timeout_ms: u64,
    /// Budget for bringing the offload worker in sync, in milliseconds.
    #[serde(default = "default_offload_init_timeout_ms")]
    pub offload_init_timeout_ms: u64,
    /// Cadence of the observational wall clock, in milliseconds.
    #[serde(default = "default_clock_cadence_ms")]
    pub clock_cadence_ms: u64,
}

const fn default_max_encode_retry() -> u32 {
    3
}

const fn default_metrics_interval() -> u64 {
    5
}

const fn default_min_tick_interval_ms() -> f64 {
    8.0
}

const fn default_offload_timeout_ms() -> u64 {
    10_000
}

const fn default_offload_init_timeout_ms() -> u64 {
    2_000
}

const fn default_clock_cadence_ms() -> u64 {
    1_000
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tuning: SchedulerTuning::default(),
            max_encode_retry: default_max_encode_retry(),
            metrics_interval: default_metrics_interval(),
            min_tick_interval_ms: default_min_tick_interval_ms(),
            offload_timeout_ms: default_offload_timeout_ms(),
            offload_init_timeout_ms: default_offload_init_timeout_ms(),
            clock_cadence_ms: default_clock_cadence_ms(),
        }
    }
}

impl DriverConfig {
    /// Validate driver configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.tuning.validate()?;
        if self.max_encode_retry == 0 {
            return Err("max_encode_retry must be greater than 0".into());
        }
        if !self.min_tick_interval_ms.is_finite() || self.min_tick_interval_ms < 0.0 {
            return Err("min_tick_interval_ms must be a non-negative number".into());
        }
        if self.offload_timeout_ms == 0 {
            return Err("offload_timeout_ms must be greater than 0".into());
        }
        if self.offload_init_timeout_ms == 0 {
            return Err("offload_init_timeout_ms must be greater than 0".into());
        }
        if self.clock_cadence_ms == 0 {
            return Err("clock_cadence_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse driver configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

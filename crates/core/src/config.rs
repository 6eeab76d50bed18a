//! Configuration structures for the tickbar system.

use crate::error::{Error, Result};
use crate::types::StatKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tick cleaning configuration.
    pub filter: FilterConfig,
    /// Bar sampling thresholds.
    pub thresholds: ThresholdConfig,
    /// Backfill orchestration configuration.
    pub backfill: BackfillConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.filter.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Tick filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Adaptive filter length; also sizes the warm-up window.
    pub jma_length: usize,
    /// Adaptive filter power.
    pub jma_power: f64,
    /// Adaptive filter phase in [-100, 100].
    pub jma_phase: f64,
    /// Maximum ticks kept in the lookback buffer.
    pub buffer_capacity: usize,
    /// Maximum allowed |venue - exchange| timestamp gap (ns).
    pub max_timestamp_delta_ns: i64,
    /// Maximum allowed |pct_diff| before a tick is an outlier.
    pub outlier_pct: f64,
    /// IANA name of the canonical trading timezone.
    pub timezone: String,
    /// Keep the filter recursion advanced by rejected ticks.
    pub advance_on_reject: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            jma_length: 7,
            jma_power: 2.0,
            jma_phase: 0.0,
            buffer_capacity: 100,
            max_timestamp_delta_ns: 2_000_000_000,
            outlier_pct: 0.002,
            timezone: "America/New_York".to_string(),
            advance_on_reject: true,
        }
    }
}

impl FilterConfig {
    /// Reject settings the filter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.jma_length == 0 {
            return Err(Error::config("jma_length must be at least 1"));
        }
        // Warm-up lasts while the buffer holds at most jma_length + 1 entries.
        if self.buffer_capacity <= self.jma_length + 1 {
            return Err(Error::config(format!(
                "buffer_capacity ({}) must exceed jma_length + 1 ({})",
                self.buffer_capacity,
                self.jma_length + 1
            )));
        }
        if self.max_timestamp_delta_ns < 0 {
            return Err(Error::config(format!(
                "max_timestamp_delta_ns must be non-negative, got {}",
                self.max_timestamp_delta_ns
            )));
        }
        if !self.outlier_pct.is_finite() || self.outlier_pct < 0.0 {
            return Err(Error::config(format!(
                "outlier_pct must be a non-negative number, got {}",
                self.outlier_pct
            )));
        }
        Ok(())
    }
}

/// Bar sampling thresholds.
///
/// Every rule is optional: an absent key disables it. Keys not listed here are
/// ignored when parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Statistic monitored by the renko rule.
    pub renko_return: Option<StatKey>,
    /// Base renko brick size.
    pub renko_size: Option<f64>,
    /// Multiple applied to the reversal side of the renko thresholds.
    #[serde(alias = "renko_reveral_multiple")]
    pub renko_reversal_multiple: Option<f64>,
    /// Close the bar once its duration exceeds this many seconds.
    pub max_duration_sec: Option<f64>,
    /// Close the bar once |volume imbalance| reaches this.
    pub volume_imbalance: Option<f64>,
    /// Hold the bar open until it lasts this many seconds.
    pub min_duration_sec: Option<f64>,
    /// Hold the bar open until it has this many ticks.
    pub min_tick_count: Option<f64>,
    /// Hold the bar open until its price range reaches this.
    pub min_price_range: Option<f64>,
    /// Hold the bar open until its smoothed-price range reaches this.
    pub min_jma_range: Option<f64>,
}

impl ThresholdConfig {
    /// Parse thresholds from a JSON object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse thresholds from an already-decoded JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::config("thresholds must be a JSON object"));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// True when no rule is enabled, so no bar can ever close.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renko rule parameters, if the rule is enabled.
    pub fn renko(&self) -> Option<(StatKey, f64)> {
        Some((self.renko_return?, self.renko_size?))
    }
}

/// Backfill orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Maximum symbol-dates processed concurrently.
    pub workers: usize,
    /// Retries per symbol-date after the first failure.
    pub max_retries: u32,
    /// Delay between retries (ms).
    pub retry_delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_retries: 2,
            retry_delay_ms: 2_000,
        }
    }
}

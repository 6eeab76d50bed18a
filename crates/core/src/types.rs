//! Core data types for the tickbar system.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp in nanoseconds since Unix epoch (UTC).
pub type TimestampNs = i64;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Convert a nanosecond timestamp to a UTC datetime.
#[inline]
pub fn ns_to_utc(ts_ns: TimestampNs) -> DateTime<Utc> {
    Utc.timestamp_nanos(ts_ns)
}

/// A single raw trade print as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    /// Venue (SIP) timestamp in nanoseconds.
    pub sip_ts_ns: TimestampNs,
    /// Exchange timestamp in nanoseconds.
    pub exchange_ts_ns: TimestampNs,
    /// Trade price.
    pub price: f64,
    /// Trade size in shares.
    pub size: u64,
    /// Trade carries an irregular sale condition.
    pub irregular: bool,
}

impl RawTick {
    /// Absolute distance between the venue and exchange timestamps.
    #[inline]
    pub fn timestamp_delta_ns(&self) -> u64 {
        self.sip_ts_ns.abs_diff(self.exchange_ts_ns)
    }
}

/// Outcome of cleaning a raw tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    /// Passed every check; eligible for bar accumulation.
    Clean,
    /// Filter history too short to judge the tick.
    FilterWarmUp,
    /// Size below one share.
    ZeroVolume,
    /// Irregular sale condition.
    IrregularCondition,
    /// Venue and exchange timestamps disagree.
    TimestampsDelta,
    /// Price too far from the smoothed price.
    OutlierFilter,
}

impl TickStatus {
    /// Whether the tick stays in the filter's lookback buffer.
    #[inline]
    pub fn is_retained(self) -> bool {
        matches!(self, TickStatus::Clean | TickStatus::FilterWarmUp)
    }

    /// Snake-case label, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            TickStatus::Clean => "clean",
            TickStatus::FilterWarmUp => "filter_warm_up",
            TickStatus::ZeroVolume => "zero_volume",
            TickStatus::IrregularCondition => "irregular_condition",
            TickStatus::TimestampsDelta => "timestamps_delta",
            TickStatus::OutlierFilter => "outlier_filter",
        }
    }
}

/// Trade direction inferred by the tick rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i8)]
pub enum TradeSide {
    /// Uptick (buyer-initiated).
    Buy = 1,
    /// Downtick (seller-initiated).
    Sell = -1,
    /// No direction known.
    #[default]
    Neutral = 0,
}

impl TradeSide {
    /// Get the sign as i8.
    #[inline]
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Get the sign as f64.
    #[inline]
    pub fn sign_f64(self) -> f64 {
        self.sign() as f64
    }

    /// Build a side from a sign; anything other than ±1 is neutral.
    pub fn from_sign(sign: i64) -> Self {
        match sign {
            1 => TradeSide::Buy,
            -1 => TradeSide::Sell,
            _ => TradeSide::Neutral,
        }
    }
}

/// A tick after cleaning, as recorded in the diagnostic log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTick {
    /// Venue timestamp in the canonical trading timezone.
    pub date_time: DateTime<FixedOffset>,
    /// Trade price.
    pub price: f64,
    /// Trade size in shares.
    pub size: u64,
    /// Smoothed price after this tick.
    pub jma: f64,
    /// (price - jma) / jma.
    pub pct_diff: f64,
    /// Side inferred when the tick joined a bar; neutral otherwise.
    pub side: TradeSide,
    /// Cleaning outcome.
    pub status: TickStatus,
}

/// Reason a bar closed, or `Waiting` while it is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    #[default]
    Waiting,
    RenkoUp,
    RenkoDown,
    Duration,
    VolumeImbalance,
}

impl TriggerStatus {
    /// Did a rule fire?
    #[inline]
    pub fn is_triggered(self) -> bool {
        self != TriggerStatus::Waiting
    }

    /// Snake-case label, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerStatus::Waiting => "waiting",
            TriggerStatus::RenkoUp => "renko_up",
            TriggerStatus::RenkoDown => "renko_down",
            TriggerStatus::Duration => "duration",
            TriggerStatus::VolumeImbalance => "volume_imbalance",
        }
    }
}

/// Numeric bar statistic that a renko rule can monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    PriceReturn,
    JmaReturn,
    PriceRange,
    JmaRange,
    DurationSec,
    TickCount,
    Volume,
    Dollars,
    TickImbalance,
    VolumeImbalance,
    DollarImbalance,
    /// Signed return of the last closed bar; 0 before the first bar closes.
    #[serde(alias = "last_bar_return")]
    PreviousBarReturn,
}

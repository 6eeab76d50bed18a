//! Raw tick cleaning.
//!
//! Runs every raw print through the adaptive filter, keeps a bounded lookback
//! buffer of accepted ticks and tags each tick with a [`TickStatus`]. Only
//! `Clean` ticks are meant to reach bar accumulation; every tick is returned so
//! the caller can keep a full diagnostic log.

use crate::jma::{JmaFilter, JmaState};
use chrono::{DateTime, FixedOffset, Offset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::{
    ns_to_utc, CleanTick, Error, FilterConfig, RawTick, Result, TickStatus, TimestampNs,
    TradeSide,
};
use tracing::trace;

/// One buffered tick with the filter state it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    /// The raw tick, or `None` for the seed entry.
    pub tick: Option<RawTick>,
    /// Filter state after this tick.
    pub state: JmaState,
    /// (price - jma) / jma for this tick.
    pub pct_diff: f64,
}

/// Bounded lookback buffer of accepted ticks plus the live filter recursion.
#[derive(Debug, Clone)]
pub struct FilterState {
    buffer: VecDeque<FilterEntry>,
    capacity: usize,
    /// State the next update starts from.
    latest: JmaState,
}

impl FilterState {
    /// Seed a buffer with a single entry smoothed at `price`.
    pub fn seed(price: f64, capacity: usize) -> Self {
        let state = JmaState::seed(price);
        let mut buffer = VecDeque::with_capacity(capacity + 1);
        buffer.push_back(FilterEntry {
            tick: None,
            state,
            pct_diff: 0.0,
        });
        Self {
            buffer,
            capacity,
            latest: state,
        }
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffered entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &FilterEntry> {
        self.buffer.iter()
    }

    /// State the next update starts from.
    pub fn latest_state(&self) -> &JmaState {
        &self.latest
    }

    fn push(&mut self, entry: FilterEntry) {
        self.latest = entry.state;
        self.buffer.push_back(entry);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    /// Drop the newest entry. With `rewind`, the recursion also resumes from the
    /// entry that is now newest.
    fn discard_latest(&mut self, rewind: bool) {
        self.buffer.pop_back();
        if rewind {
            if let Some(entry) = self.buffer.back() {
                self.latest = entry.state;
            }
        }
    }
}

/// Counters over every tick the filter has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Total ticks processed.
    pub total_ticks: u64,
    /// Ticks tagged `clean`.
    pub clean: u64,
    /// Ticks tagged `filter_warm_up`.
    pub warm_up: u64,
    /// Ticks tagged `zero_volume`.
    pub zero_volume: u64,
    /// Ticks tagged `irregular_condition`.
    pub irregular: u64,
    /// Ticks tagged `timestamps_delta`.
    pub timestamps_delta: u64,
    /// Ticks tagged `outlier_filter`.
    pub outlier: u64,
}

impl FilterStats {
    fn record(&mut self, status: TickStatus) {
        self.total_ticks += 1;
        *self.counter(status) += 1;
    }

    fn counter(&mut self, status: TickStatus) -> &mut u64 {
        match status {
            TickStatus::Clean => &mut self.clean,
            TickStatus::FilterWarmUp => &mut self.warm_up,
            TickStatus::ZeroVolume => &mut self.zero_volume,
            TickStatus::IrregularCondition => &mut self.irregular,
            TickStatus::TimestampsDelta => &mut self.timestamps_delta,
            TickStatus::OutlierFilter => &mut self.outlier,
        }
    }

    /// Number of ticks that received `status`.
    pub fn count(&self, status: TickStatus) -> u64 {
        match status {
            TickStatus::Clean => self.clean,
            TickStatus::FilterWarmUp => self.warm_up,
            TickStatus::ZeroVolume => self.zero_volume,
            TickStatus::IrregularCondition => self.irregular,
            TickStatus::TimestampsDelta => self.timestamps_delta,
            TickStatus::OutlierFilter => self.outlier,
        }
    }

    /// Fraction of ticks rejected outright (neither clean nor warm-up).
    pub fn rejected_frac(&self) -> f64 {
        if self.total_ticks > 0 {
            let kept = self.clean + self.warm_up;
            (self.total_ticks - kept) as f64 / self.total_ticks as f64
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Tick cleaner backed by the adaptive filter.
#[derive(Debug, Clone)]
pub struct TickFilter {
    config: FilterConfig,
    jma: JmaFilter,
    tz: Tz,
    /// Lookback buffer; created on `seed` or by the first processed tick.
    state: Option<FilterState>,
    stats: FilterStats,
}

impl TickFilter {
    /// Create a new tick filter.
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| Error::config(format!("unknown timezone {:?}: {}", config.timezone, e)))?;
        let jma = JmaFilter::new(config.jma_length, config.jma_power, config.jma_phase);

        Ok(Self {
            config,
            jma,
            tz,
            state: None,
            stats: FilterStats::default(),
        })
    }

    /// Start a fresh stream whose smoothed price begins at `price`.
    pub fn seed(&mut self, price: f64) {
        self.state = Some(FilterState::seed(price, self.config.buffer_capacity));
    }

    /// Clean a single tick.
    pub fn process(&mut self, tick: RawTick) -> CleanTick {
        let capacity = self.config.buffer_capacity;
        let state = self
            .state
            .get_or_insert_with(|| FilterState::seed(tick.price, capacity));

        let next = self.jma.update(tick.price, state.latest_state());
        let pct_diff = (tick.price - next.jma) / next.jma;
        state.push(FilterEntry {
            tick: Some(tick.clone()),
            state: next,
            pct_diff,
        });

        let status = status_for(&self.config, &tick, state.len(), pct_diff);
        if !status.is_retained() {
            state.discard_latest(!self.config.advance_on_reject);
        }
        self.stats.record(status);

        trace!(
            sip_ts_ns = tick.sip_ts_ns,
            price = tick.price,
            jma = next.jma,
            status = status.as_str(),
            "tick filtered"
        );

        CleanTick {
            date_time: to_local(tick.sip_ts_ns, &self.tz),
            price: tick.price,
            size: tick.size,
            jma: next.jma,
            pct_diff,
            side: TradeSide::Neutral,
            status,
        }
    }

    /// Current lookback buffer, if the stream has started.
    pub fn state(&self) -> Option<&FilterState> {
        self.state.as_ref()
    }

    /// Get filter statistics.
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Canonical trading timezone.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Clear all state (buffer and statistics).
    pub fn clear(&mut self) {
        self.state = None;
        self.stats.reset();
    }
}

/// Status rules, first match wins.
fn status_for(config: &FilterConfig, tick: &RawTick, buffer_len: usize, pct_diff: f64) -> TickStatus {
    if tick.size < 1 {
        TickStatus::ZeroVolume
    } else if buffer_len <= config.jma_length + 1 {
        TickStatus::FilterWarmUp
    } else if tick.irregular {
        TickStatus::IrregularCondition
    } else if tick.timestamp_delta_ns() > config.max_timestamp_delta_ns.unsigned_abs() {
        TickStatus::TimestampsDelta
    } else if pct_diff.abs() > config.outlier_pct {
        TickStatus::OutlierFilter
    } else {
        TickStatus::Clean
    }
}

/// Venue timestamp in the trading timezone, pinned to its UTC offset.
fn to_local(ts_ns: TimestampNs, tz: &Tz) -> DateTime<FixedOffset> {
    let local = ns_to_utc(ts_ns).with_timezone(tz);
    local.with_timezone(&local.offset().fix())
}

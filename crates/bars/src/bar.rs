//! Completed bar record.

use crate::accumulator::BarState;
use crate::stats::{RunningStats, TradeHistory};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tickbar_core::TriggerStatus;

/// A closed information-driven bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Event time of the first tick.
    pub open_time: DateTime<FixedOffset>,
    /// Event time of the closing tick.
    pub close_time: DateTime<FixedOffset>,
    pub open: f64,
    pub close: f64,
    /// Volume-weighted average price; `None` when the bar has no volume.
    pub vwap: Option<f64>,
    pub jma_open: f64,
    pub jma_close: f64,
    /// Statistics at close, including the trigger reason.
    pub stats: RunningStats,
    /// Every tick in the bar.
    pub trades: TradeHistory,
}

impl Bar {
    /// Build a bar from a finished state. Returns `None` if the state saw no ticks.
    pub fn from_state(state: BarState) -> Option<Self> {
        let (stats, trades) = state.into_parts();

        let open_time = *trades.date_time.first()?;
        let close_time = *trades.date_time.last()?;
        let open = *trades.price.first()?;
        let close = *trades.price.last()?;
        let jma_open = *trades.jma.first()?;
        let jma_close = *trades.jma.last()?;
        let vwap = if stats.volume > 0 {
            Some(stats.dollars / stats.volume as f64)
        } else {
            None
        };

        Some(Self {
            open_time,
            close_time,
            open,
            close,
            vwap,
            jma_open,
            jma_close,
            stats,
            trades,
        })
    }

    /// Why the bar closed.
    #[inline]
    pub fn trigger(&self) -> TriggerStatus {
        self.stats.trigger
    }

    /// Close minus open.
    #[inline]
    pub fn price_return(&self) -> f64 {
        self.stats.price_return
    }

    /// Number of ticks.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.stats.tick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tickbar_core::ThresholdConfig;

    #[test]
    fn test_empty_state_has_no_bar() {
        let state = BarState::reset(Arc::new(ThresholdConfig::default()));
        assert!(Bar::from_state(state).is_none());
    }
}

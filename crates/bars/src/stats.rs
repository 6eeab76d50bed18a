//! Running statistics and trade history of the bar being built.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use tickbar_core::{CleanTick, StatKey, TradeSide, TriggerStatus};

/// Statistics of the in-progress bar, updated once per clean tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    /// Whole seconds between the first and latest tick.
    pub duration_sec: i64,
    /// Number of ticks.
    pub tick_count: u64,
    /// Total shares traded.
    pub volume: u64,
    /// Total notional traded.
    pub dollars: f64,
    pub price_min: f64,
    pub price_max: f64,
    pub price_range: f64,
    /// Latest price minus first price.
    pub price_return: f64,
    pub jma_min: f64,
    pub jma_max: f64,
    pub jma_range: f64,
    /// Latest smoothed price minus first smoothed price.
    pub jma_return: f64,
    /// Sum of tick signs.
    pub tick_imbalance: i64,
    /// Sum of signed sizes.
    pub volume_imbalance: i64,
    /// Sum of signed notionals.
    pub dollar_imbalance: f64,
    /// `price_return` of the previous bar; unset until the first tick.
    pub previous_bar_return: Option<f64>,
    /// Trigger decision after the latest tick.
    pub trigger: TriggerStatus,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            duration_sec: 0,
            tick_count: 0,
            volume: 0,
            dollars: 0.0,
            price_min: f64::INFINITY,
            price_max: f64::NEG_INFINITY,
            price_range: 0.0,
            price_return: 0.0,
            jma_min: f64::INFINITY,
            jma_max: f64::NEG_INFINITY,
            jma_range: 0.0,
            jma_return: 0.0,
            tick_imbalance: 0,
            volume_imbalance: 0,
            dollar_imbalance: 0.0,
            previous_bar_return: None,
            trigger: TriggerStatus::Waiting,
        }
    }
}

impl RunningStats {
    /// Look up a statistic by name.
    pub fn get(&self, key: StatKey) -> f64 {
        match key {
            StatKey::PriceReturn => self.price_return,
            StatKey::JmaReturn => self.jma_return,
            StatKey::PriceRange => self.price_range,
            StatKey::JmaRange => self.jma_range,
            StatKey::DurationSec => self.duration_sec as f64,
            StatKey::TickCount => self.tick_count as f64,
            StatKey::Volume => self.volume as f64,
            StatKey::Dollars => self.dollars,
            StatKey::TickImbalance => self.tick_imbalance as f64,
            StatKey::VolumeImbalance => self.volume_imbalance as f64,
            StatKey::DollarImbalance => self.dollar_imbalance,
            StatKey::PreviousBarReturn => self.previous_bar_return.unwrap_or(0.0),
        }
    }

    /// Fold one tick into the statistics. `trades` must already contain it.
    pub(crate) fn add_tick(
        &mut self,
        tick: &CleanTick,
        side: TradeSide,
        trades: &TradeHistory,
        previous_bar_return: f64,
    ) {
        let sign = side.sign() as i64;
        self.tick_imbalance += sign;
        self.volume_imbalance += sign * tick.size as i64;
        self.dollar_imbalance += side.sign_f64() * tick.size as f64 * tick.price;

        if let Some(first) = trades.date_time.first() {
            self.duration_sec = floor_seconds(tick.date_time - *first);
        }
        self.tick_count += 1;
        self.volume += tick.size;
        self.dollars += tick.price * tick.size as f64;

        self.price_min = self.price_min.min(tick.price);
        self.price_max = self.price_max.max(tick.price);
        self.price_range = self.price_max - self.price_min;
        self.price_return = tick.price - trades.price.first().copied().unwrap_or(tick.price);

        self.jma_min = self.jma_min.min(tick.jma);
        self.jma_max = self.jma_max.max(tick.jma);
        self.jma_range = self.jma_max - self.jma_min;
        self.jma_return = tick.jma - trades.jma.first().copied().unwrap_or(tick.jma);

        self.previous_bar_return = Some(previous_bar_return);
    }
}

/// Round a duration down to whole seconds.
fn floor_seconds(delta: Duration) -> i64 {
    let secs = delta.num_seconds();
    if delta < Duration::seconds(secs) {
        secs - 1
    } else {
        secs
    }
}

/// Ticks of the in-progress bar, stored column-wise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub date_time: Vec<DateTime<FixedOffset>>,
    pub price: Vec<f64>,
    pub volume: Vec<u64>,
    pub side: Vec<TradeSide>,
    pub jma: Vec<f64>,
}

impl TradeHistory {
    /// Number of ticks.
    pub fn len(&self) -> usize {
        self.price.len()
    }

    /// Whether no tick has been added.
    pub fn is_empty(&self) -> bool {
        self.price.is_empty()
    }

    /// Price and side of the latest tick.
    pub fn last_trade(&self) -> Option<(f64, TradeSide)> {
        Some((*self.price.last()?, *self.side.last()?))
    }

    pub(crate) fn push(&mut self, tick: &CleanTick, side: TradeSide) {
        self.date_time.push(tick.date_time);
        self.price.push(tick.price);
        self.volume.push(tick.size);
        self.side.push(side);
        self.jma.push(tick.jma);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats() {
        let stats = RunningStats::default();
        assert_eq!(stats.trigger, TriggerStatus::Waiting);
        assert_eq!(stats.tick_count, 0);
        assert!(stats.previous_bar_return.is_none());
    }

    #[test]
    fn test_floor_seconds() {
        assert_eq!(floor_seconds(Duration::milliseconds(5_999)), 5);
        assert_eq!(floor_seconds(Duration::seconds(6)), 6);
        assert_eq!(floor_seconds(Duration::milliseconds(-500)), -1);
        assert_eq!(floor_seconds(Duration::zero()), 0);
    }

    #[test]
    fn test_get_by_key() {
        let stats = RunningStats {
            price_return: 0.25,
            tick_count: 12,
            volume_imbalance: -300,
            ..Default::default()
        };
        assert_eq!(stats.get(StatKey::PriceReturn), 0.25);
        assert_eq!(stats.get(StatKey::TickCount), 12.0);
        assert_eq!(stats.get(StatKey::VolumeImbalance), -300.0);
        assert_eq!(stats.get(StatKey::PreviousBarReturn), 0.0);

        let stats = RunningStats {
            previous_bar_return: Some(-1.5),
            ..Default::default()
        };
        assert_eq!(stats.get(StatKey::PreviousBarReturn), -1.5);
    }

    #[test]
    fn test_history_last_trade() {
        let mut history = TradeHistory::default();
        assert!(history.last_trade().is_none());

        let tick = CleanTick {
            date_time: DateTime::parse_from_rfc3339("2020-01-02T09:30:00-05:00").unwrap(),
            price: 100.0,
            size: 10,
            jma: 100.0,
            pct_diff: 0.0,
            side: TradeSide::Neutral,
            status: tickbar_core::TickStatus::Clean,
        };
        history.push(&tick, TradeSide::Buy);
        assert_eq!(history.len(), 1);
        assert_eq!(history.last_trade(), Some((100.0, TradeSide::Buy)));
    }
}

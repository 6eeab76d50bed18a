//! Per-bar accumulation of clean ticks.
//!
//! [`BarAccumulator`] owns the [`BarState`] of the bar in progress. Each clean
//! tick is classified with the tick rule, folded into the running statistics
//! and checked against the thresholds. When a rule fires the state is turned
//! into a [`Bar`] and replaced by a fresh one sharing the same thresholds.

use crate::bar::Bar;
use crate::stats::{RunningStats, TradeHistory};
use crate::threshold;
use std::sync::Arc;
use tickbar_core::{CleanTick, ThresholdConfig, TradeSide};
use tickbar_ingestion::tick_rule;
use tracing::debug;

/// State of the bar in progress.
#[derive(Debug, Clone)]
pub struct BarState {
    /// Shared across resets.
    thresholds: Arc<ThresholdConfig>,
    stats: RunningStats,
    trades: TradeHistory,
}

impl BarState {
    /// Fresh state for a new bar.
    pub fn reset(thresholds: Arc<ThresholdConfig>) -> Self {
        Self {
            thresholds,
            stats: RunningStats::default(),
            trades: TradeHistory::default(),
        }
    }

    /// Thresholds this state is evaluated against.
    pub fn thresholds(&self) -> &Arc<ThresholdConfig> {
        &self.thresholds
    }

    /// Running statistics.
    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Ticks accumulated so far.
    pub fn trades(&self) -> &TradeHistory {
        &self.trades
    }

    pub(crate) fn into_parts(self) -> (RunningStats, TradeHistory) {
        (self.stats, self.trades)
    }

    /// Add a tick and return the side inferred for it.
    fn apply(&mut self, tick: &CleanTick, previous_bar_return: f64) -> TradeSide {
        let side = match self.trades.last_trade() {
            Some((prev_price, last_side)) => tick_rule(tick.price, prev_price, last_side),
            None => TradeSide::Neutral,
        };
        self.trades.push(tick, side);
        self.stats
            .add_tick(tick, side, &self.trades, previous_bar_return);
        side
    }
}

/// Result of feeding one tick to the accumulator.
#[derive(Debug, Clone)]
pub struct AccumulatorUpdate {
    /// Side inferred for the tick.
    pub side: TradeSide,
    /// Bar closed by this tick, if any.
    pub bar: Option<Bar>,
}

/// Accumulates clean ticks into bars.
pub struct BarAccumulator {
    state: BarState,
}

impl BarAccumulator {
    /// Create an accumulator with its own thresholds.
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self::with_shared(Arc::new(thresholds))
    }

    /// Create an accumulator over shared thresholds.
    pub fn with_shared(thresholds: Arc<ThresholdConfig>) -> Self {
        Self {
            state: BarState::reset(thresholds),
        }
    }

    /// Add a clean tick.
    ///
    /// `completed` holds the bars closed so far; the last one's return steers
    /// the renko thresholds. The caller appends any returned bar to it.
    pub fn update(&mut self, tick: &CleanTick, completed: &[Bar]) -> AccumulatorUpdate {
        let previous_bar_return = completed.last().map_or(0.0, Bar::price_return);
        let side = self.state.apply(tick, previous_bar_return);

        let trigger = threshold::evaluate(&self.state.stats, &self.state.thresholds);
        self.state.stats.trigger = trigger;
        if !trigger.is_triggered() {
            return AccumulatorUpdate { side, bar: None };
        }

        let fresh = BarState::reset(Arc::clone(&self.state.thresholds));
        let finished = std::mem::replace(&mut self.state, fresh);
        let bar = Bar::from_state(finished);
        if let Some(bar) = &bar {
            debug!(
                trigger = bar.trigger().as_str(),
                ticks = bar.tick_count(),
                duration_sec = bar.stats.duration_sec,
                price_return = bar.price_return(),
                "bar closed"
            );
        }

        AccumulatorUpdate { side, bar }
    }

    /// State of the bar in progress.
    pub fn state(&self) -> &BarState {
        &self.state
    }

    /// Discard the bar in progress.
    pub fn reset(&mut self) {
        self.state = BarState::reset(Arc::clone(&self.state.thresholds));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, FixedOffset};
    use proptest::prelude::*;
    use tickbar_core::{StatKey, TickStatus, TriggerStatus};

    fn t0() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2020-01-02T09:30:00-05:00").unwrap()
    }

    fn make_tick(secs: i64, price: f64, size: u64) -> CleanTick {
        CleanTick {
            date_time: t0() + Duration::seconds(secs),
            price,
            size,
            jma: price,
            pct_diff: 0.0,
            side: TradeSide::Neutral,
            status: TickStatus::Clean,
        }
    }

    /// Feed ticks, collecting closed bars the way the driver does.
    fn run(acc: &mut BarAccumulator, ticks: &[CleanTick]) -> (Vec<Bar>, Vec<TradeSide>) {
        let mut bars = Vec::new();
        let mut sides = Vec::new();
        for tick in ticks {
            let update = acc.update(tick, &bars);
            sides.push(update.side);
            bars.extend(update.bar);
        }
        (bars, sides)
    }

    #[test]
    fn test_duration_bar_end_to_end() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + 0.01 * i as f64).collect();
        let ticks: Vec<_> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| make_tick(i as i64, p, 100))
            .collect();
        let mut acc = BarAccumulator::new(ThresholdConfig {
            max_duration_sec: Some(5.0),
            ..Default::default()
        });

        let (bars, _) = run(&mut acc, &ticks);

        // Closes on the first tick more than 5s after the open (t = 6s).
        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(bar.trigger(), TriggerStatus::Duration);
        assert_eq!(bar.stats.duration_sec, 6);
        assert_eq!(bar.tick_count(), 7);
        assert_relative_eq!(bar.price_return(), prices[6] - prices[0], epsilon = 1e-12);
        assert_eq!(bar.open, prices[0]);
        assert_eq!(bar.close, prices[6]);

        // Remaining ticks sit in the next bar.
        assert_eq!(acc.state().trades().len(), 3);
        assert_eq!(acc.state().stats().duration_sec, 2);
    }

    #[test]
    fn test_min_tick_count_holds_bar_open() {
        let mut acc = BarAccumulator::new(ThresholdConfig {
            max_duration_sec: Some(60.0),
            min_tick_count: Some(5.0),
            ..Default::default()
        });
        let ticks = [
            make_tick(0, 100.0, 10),
            make_tick(30, 100.1, 10),
            make_tick(61, 100.2, 10),
        ];

        let (bars, _) = run(&mut acc, &ticks);

        assert!(bars.is_empty());
        assert_eq!(acc.state().stats().duration_sec, 61);
        assert_eq!(acc.state().stats().trigger, TriggerStatus::Waiting);
    }

    #[test]
    fn test_first_side_is_neutral_and_sides_follow_tick_rule() {
        let mut acc = BarAccumulator::new(ThresholdConfig::default());
        let ticks = [
            make_tick(0, 100.0, 10),
            make_tick(1, 100.1, 20),
            make_tick(2, 100.1, 30),
            make_tick(3, 99.9, 40),
        ];

        let (_, sides) = run(&mut acc, &ticks);

        assert_eq!(
            sides,
            vec![TradeSide::Neutral, TradeSide::Buy, TradeSide::Buy, TradeSide::Sell]
        );
        let stats = acc.state().stats();
        assert_eq!(stats.tick_imbalance, 1);
        assert_eq!(stats.volume_imbalance, 20 + 30 - 40);
        assert_relative_eq!(
            stats.dollar_imbalance,
            100.1 * 20.0 + 100.1 * 30.0 - 99.9 * 40.0,
            epsilon = 1e-9
        );
        assert_eq!(stats.volume, 100);
        assert_relative_eq!(stats.price_range, 0.2, epsilon = 1e-12);
        assert_relative_eq!(stats.price_return, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_side_resets_with_each_bar() {
        let mut acc = BarAccumulator::new(ThresholdConfig {
            volume_imbalance: Some(50.0),
            ..Default::default()
        });
        let ticks = [
            make_tick(0, 100.0, 10),
            make_tick(1, 100.1, 60),
            make_tick(2, 100.2, 10),
        ];

        let (bars, sides) = run(&mut acc, &ticks);

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].trigger(), TriggerStatus::VolumeImbalance);
        // The first tick of the new bar has no predecessor.
        assert_eq!(sides[2], TradeSide::Neutral);
    }

    #[test]
    fn test_renko_uses_previous_bar_direction() {
        let mut acc = BarAccumulator::new(ThresholdConfig {
            renko_return: Some(StatKey::PriceReturn),
            renko_size: Some(1.0),
            renko_reversal_multiple: Some(2.0),
            ..Default::default()
        });
        let ticks = [
            // First bar: previous return defaults to 0, so up needs +1.
            make_tick(0, 100.0, 10),
            make_tick(1, 101.0, 10),
            // Second bar follows an up bar: down needs below -2.
            make_tick(2, 101.0, 10),
            make_tick(3, 99.5, 10),
            make_tick(4, 98.9, 10),
            // Third bar follows a down bar: up needs +2.
            make_tick(5, 99.0, 10),
            make_tick(6, 100.5, 10),
            make_tick(7, 101.0, 10),
        ];

        let (bars, _) = run(&mut acc, &ticks);

        let triggers: Vec<_> = bars.iter().map(Bar::trigger).collect();
        assert_eq!(
            triggers,
            vec![TriggerStatus::RenkoUp, TriggerStatus::RenkoDown, TriggerStatus::RenkoUp]
        );
        assert_eq!(bars[1].stats.previous_bar_return, Some(1.0));
        assert_eq!(bars[1].tick_count(), 3);
        assert_eq!(bars[2].tick_count(), 3);
    }

    #[test]
    fn test_reset_shares_thresholds() {
        let thresholds = Arc::new(ThresholdConfig {
            volume_imbalance: Some(1.0),
            ..Default::default()
        });
        let mut acc = BarAccumulator::with_shared(Arc::clone(&thresholds));
        acc.update(&make_tick(0, 100.0, 10), &[]);
        let update = acc.update(&make_tick(1, 100.1, 10), &[]);

        assert!(update.bar.is_some());
        assert!(Arc::ptr_eq(acc.state().thresholds(), &thresholds));
        assert!(acc.state().trades().is_empty());
        assert_eq!(acc.state().stats(), &RunningStats::default());
    }

    #[test]
    fn test_bar_vwap() {
        let mut acc = BarAccumulator::new(ThresholdConfig {
            max_duration_sec: Some(0.0),
            ..Default::default()
        });
        acc.update(&make_tick(0, 100.0, 100), &[]);
        let bar = acc
            .update(&make_tick(1, 101.0, 300), &[])
            .bar
            .unwrap();

        assert_relative_eq!(bar.vwap.unwrap(), (100.0 * 100.0 + 101.0 * 300.0) / 400.0);
        assert_eq!(bar.trades.len(), 2);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let ticks: Vec<_> = (0..200)
            .map(|i| make_tick(i, 100.0 + ((i * 7) % 11) as f64 * 0.05, 10 + (i % 5) as u64))
            .collect();
        let config = ThresholdConfig {
            max_duration_sec: Some(20.0),
            volume_imbalance: Some(80.0),
            min_tick_count: Some(3.0),
            ..Default::default()
        };

        let (a, _) = run(&mut BarAccumulator::new(config.clone()), &ticks);
        let (b, _) = run(&mut BarAccumulator::new(config), &ticks);

        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    fn tick_stream() -> impl Strategy<Value = Vec<CleanTick>> {
        prop::collection::vec((0i64..5, -20i32..=20, 1u64..500), 1..120).prop_map(|steps| {
            let mut secs = 0;
            let mut price = 100.0;
            steps
                .into_iter()
                .map(|(gap, cents, size)| {
                    secs += gap;
                    price += cents as f64 * 0.01;
                    make_tick(secs, price, size)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn range_is_max_minus_min_and_non_decreasing(ticks in tick_stream()) {
            let mut acc = BarAccumulator::new(ThresholdConfig::default());
            let mut last_range = 0.0;
            for tick in &ticks {
                acc.update(tick, &[]);
                let stats = acc.state().stats();
                prop_assert_eq!(stats.price_range, stats.price_max - stats.price_min);
                prop_assert!(stats.price_range >= last_range);
                last_range = stats.price_range;
            }
        }

        #[test]
        fn closed_bars_carry_exact_imbalance(ticks in tick_stream()) {
            let mut acc = BarAccumulator::new(ThresholdConfig {
                max_duration_sec: Some(10.0),
                volume_imbalance: Some(600.0),
                ..Default::default()
            });
            let (bars, sides) = run(&mut acc, &ticks);

            prop_assert_eq!(sides[0], TradeSide::Neutral);
            let mut counted = 0;
            for bar in &bars {
                prop_assert_eq!(bar.trades.side[0], TradeSide::Neutral);
                let expected: i64 = bar
                    .trades
                    .side
                    .iter()
                    .zip(&bar.trades.volume)
                    .map(|(side, &v)| side.sign() as i64 * v as i64)
                    .sum();
                prop_assert_eq!(bar.stats.volume_imbalance, expected);
                prop_assert_eq!(bar.tick_count() as usize, bar.trades.len());
                counted += bar.trades.len();
            }
            prop_assert_eq!(counted + acc.state().trades().len(), ticks.len());
        }
    }
}

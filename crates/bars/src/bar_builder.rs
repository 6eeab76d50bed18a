//! End-to-end bar building over a tick sequence.
//!
//! Raw ticks pass through a fresh [`TickFilter`]; clean ticks feed a
//! [`BarAccumulator`]. Every tick comes back with its status and inferred side
//! so a full diagnostic log can be kept alongside the bars.

use crate::accumulator::BarAccumulator;
use crate::bar::Bar;
use std::sync::Arc;
use tickbar_core::{CleanTick, Config, FilterConfig, RawTick, Result, TickStatus, ThresholdConfig};
use tickbar_ingestion::{FilterStats, TickFilter};
use tracing::debug;

/// Everything produced by one build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Bars closed during the sequence. A trailing partial bar is not included.
    pub bars: Vec<Bar>,
    /// Every input tick, tagged.
    pub ticks: Vec<CleanTick>,
    /// Filter counters for the sequence.
    pub stats: FilterStats,
}

/// Builds bars from raw tick sequences.
///
/// Each call to [`BarBuilder::build`] starts from fresh filter and bar state,
/// so the builder can be reused across days and symbols.
#[derive(Debug, Clone)]
pub struct BarBuilder {
    /// Unseeded filter cloned for each build.
    filter: TickFilter,
    thresholds: Arc<ThresholdConfig>,
}

impl BarBuilder {
    /// Create a builder.
    pub fn new(filter: FilterConfig, thresholds: ThresholdConfig) -> Result<Self> {
        Ok(Self {
            filter: TickFilter::new(filter)?,
            thresholds: Arc::new(thresholds),
        })
    }

    /// Create a builder from the full configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.filter.clone(), config.thresholds.clone())
    }

    /// Thresholds every bar is evaluated against.
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Clean `ticks` and sample them into bars.
    ///
    /// The filter is seeded with the first tick's price, whatever its status.
    pub fn build(&self, ticks: impl IntoIterator<Item = RawTick>) -> BuildOutput {
        let mut ticks = ticks.into_iter().peekable();
        let Some(first) = ticks.peek() else {
            return BuildOutput::default();
        };

        let mut filter = self.filter.clone();
        filter.seed(first.price);
        let mut accumulator = BarAccumulator::with_shared(Arc::clone(&self.thresholds));

        let mut bars = Vec::new();
        let mut log = Vec::with_capacity(ticks.size_hint().0);
        for raw in ticks {
            let mut tick = filter.process(raw);
            if tick.status == TickStatus::Clean {
                let update = accumulator.update(&tick, &bars);
                tick.side = update.side;
                bars.extend(update.bar);
            }
            log.push(tick);
        }

        let stats = filter.stats().clone();
        debug!(
            ticks = stats.total_ticks,
            clean = stats.clean,
            rejected_frac = stats.rejected_frac(),
            bars = bars.len(),
            pending = accumulator.state().trades().len(),
            "build complete"
        );

        BuildOutput {
            bars,
            ticks: log,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickbar_core::{TradeSide, TriggerStatus, NANOS_PER_SEC};

    // 2020-01-02 14:30:00 UTC, the NYSE open.
    const OPEN_NS: i64 = 1_577_975_400 * NANOS_PER_SEC;

    fn make_tick(i: i64, price: f64, size: u64) -> RawTick {
        let ts = OPEN_NS + i * NANOS_PER_SEC;
        RawTick {
            sip_ts_ns: ts,
            exchange_ts_ns: ts,
            price,
            size,
            irregular: false,
        }
    }

    fn ramp(n: i64) -> Vec<RawTick> {
        (0..n).map(|i| make_tick(i, 100.0 + 0.001 * i as f64, 100)).collect()
    }

    fn duration_builder(max: f64) -> BarBuilder {
        BarBuilder::new(
            FilterConfig::default(),
            ThresholdConfig {
                max_duration_sec: Some(max),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_empty_input() {
        let output = duration_builder(30.0).build(Vec::new());
        assert!(output.bars.is_empty());
        assert!(output.ticks.is_empty());
        assert_eq!(output.stats.total_ticks, 0);
    }

    #[test]
    fn test_all_zero_size() {
        let ticks: Vec<_> = (0..50).map(|i| make_tick(i, 100.0, 0)).collect();
        let output = duration_builder(5.0).build(ticks);

        assert!(output.bars.is_empty());
        assert_eq!(output.ticks.len(), 50);
        assert!(output.ticks.iter().all(|t| t.status == TickStatus::ZeroVolume));
        assert_eq!(output.stats.zero_volume, 50);
    }

    #[test]
    fn test_ramp_builds_duration_bars() {
        let output = duration_builder(30.0).build(ramp(200));

        assert_eq!(output.stats.warm_up, 7);
        assert_eq!(output.stats.clean, 193);
        // Clean ticks start at t = 7s; each bar spans 31s, so 32 ticks.
        assert_eq!(output.bars.len(), 6);
        for bar in &output.bars {
            assert_eq!(bar.trigger(), TriggerStatus::Duration);
            assert_eq!(bar.tick_count(), 32);
            assert_eq!(bar.stats.duration_sec, 31);
            assert!(bar.price_return() > 0.0);
        }
        assert_eq!(output.bars[0].open, output.ticks[7].price);
    }

    #[test]
    fn test_bars_never_contain_rejected_ticks() {
        let mut ticks: Vec<_> = (0..60).map(|i| make_tick(i, 100.0, 100)).collect();
        ticks[20].price = 101.0;
        ticks[30].irregular = true;
        ticks[40].size = 0;
        let output = duration_builder(5.0).build(ticks);

        assert_eq!(output.ticks[20].status, TickStatus::OutlierFilter);
        assert_eq!(output.ticks[30].status, TickStatus::IrregularCondition);
        assert_eq!(output.ticks[40].status, TickStatus::ZeroVolume);
        assert!(!output.bars.is_empty());

        let binned: usize = output.bars.iter().map(|b| b.trades.len()).sum();
        assert!(binned as u64 <= output.stats.clean);
        for bar in &output.bars {
            assert!(bar.trades.price.iter().all(|&p| p == 100.0));
            assert!(bar.trades.volume.iter().all(|&v| v > 0));
        }
    }

    #[test]
    fn test_rejected_ticks_keep_neutral_side() {
        let mut ticks = ramp(40);
        ticks[25].irregular = true;
        let output = duration_builder(1_000.0).build(ticks);

        assert_eq!(output.ticks[25].side, TradeSide::Neutral);
        // Warm-up ticks are never classified.
        assert!(output.ticks[..7].iter().all(|t| t.side == TradeSide::Neutral));
        // First clean tick opens the bar; the rest of the ramp is buying.
        assert_eq!(output.ticks[7].side, TradeSide::Neutral);
        assert_eq!(output.ticks[8].side, TradeSide::Buy);
        assert_eq!(output.ticks[39].side, TradeSide::Buy);
    }

    #[test]
    fn test_build_is_repeatable() {
        let builder = duration_builder(10.0);
        let a = builder.build(ramp(120));
        let b = builder.build(ramp(120));

        assert_eq!(a.bars, b.bars);
        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.stats, b.stats);
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let filter = FilterConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(BarBuilder::new(filter, ThresholdConfig::default()).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_json_str(r#"{"thresholds": {"max_duration_sec": 30}}"#).unwrap();
        let builder = BarBuilder::from_config(&config).unwrap();
        assert_eq!(builder.thresholds().max_duration_sec, Some(30.0));
        assert_eq!(builder.build(ramp(200)).bars.len(), 6);
    }
}

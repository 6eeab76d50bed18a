//! Bar trigger rules.
//!
//! Rules run in a fixed order and a later firing rule overrides an earlier one:
//! renko reversal, then max duration, then volume imbalance. Minimum guards
//! run last and can only send the decision back to `Waiting`.

use crate::stats::RunningStats;
use tickbar_core::{ThresholdConfig, TriggerStatus};

/// Up and down thresholds for the renko rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenkoThresholds {
    /// Close `RenkoUp` at or above this.
    pub bull: f64,
    /// Close `RenkoDown` below this.
    pub bear: f64,
}

/// Renko thresholds for the next bar.
///
/// Continuing in the previous bar's direction takes `size`; reversing takes
/// `size * multiple`. Without a previous return or a multiple the thresholds
/// are symmetric.
pub fn renko_thresholds(
    size: f64,
    previous_bar_return: Option<f64>,
    reversal_multiple: Option<f64>,
) -> RenkoThresholds {
    match (previous_bar_return, reversal_multiple) {
        (Some(prev), Some(multiple)) if prev >= 0.0 => RenkoThresholds {
            bull: size,
            bear: -size * multiple,
        },
        (Some(prev), Some(multiple)) if prev < 0.0 => RenkoThresholds {
            bull: size * multiple,
            bear: -size,
        },
        _ => RenkoThresholds {
            bull: size,
            bear: -size,
        },
    }
}

/// Decide whether the bar described by `stats` should close.
pub fn evaluate(stats: &RunningStats, config: &ThresholdConfig) -> TriggerStatus {
    let mut trigger = TriggerStatus::Waiting;

    if let Some((key, size)) = config.renko() {
        let thresholds =
            renko_thresholds(size, stats.previous_bar_return, config.renko_reversal_multiple);
        let value = stats.get(key);
        if value >= thresholds.bull {
            trigger = TriggerStatus::RenkoUp;
        }
        if value < thresholds.bear {
            trigger = TriggerStatus::RenkoDown;
        }
    }

    if let Some(max) = config.max_duration_sec {
        if stats.duration_sec as f64 > max {
            trigger = TriggerStatus::Duration;
        }
    }

    if let Some(limit) = config.volume_imbalance {
        if (stats.volume_imbalance as f64).abs() >= limit {
            trigger = TriggerStatus::VolumeImbalance;
        }
    }

    if below(stats.duration_sec as f64, config.min_duration_sec)
        || below(stats.tick_count as f64, config.min_tick_count)
        || below(stats.price_range, config.min_price_range)
        || below(stats.jma_range, config.min_jma_range)
    {
        trigger = TriggerStatus::Waiting;
    }

    trigger
}

/// A guard is unmet when it is configured and `value` is under it.
#[inline]
fn below(value: f64, min: Option<f64>) -> bool {
    min.is_some_and(|min| value < min)
}

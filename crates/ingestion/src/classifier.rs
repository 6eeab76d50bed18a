//! Trade side inference using the tick rule.
//!
//! A trade above the previous trade price is buyer-initiated, below it is
//! seller-initiated, and at the same price it inherits the previous side
//! (zero-tick continuation).

use std::cmp::Ordering;
use tickbar_core::TradeSide;

/// Classify a trade by comparing its price with the previous trade price.
///
/// Never fails: if the prices cannot be compared (NaN) the side is neutral.
#[inline]
pub fn tick_rule(latest_price: f64, prev_price: f64, last_side: TradeSide) -> TradeSide {
    match (latest_price - prev_price).partial_cmp(&0.0) {
        Some(Ordering::Greater) => TradeSide::Buy,
        Some(Ordering::Less) => TradeSide::Sell,
        Some(Ordering::Equal) => last_side,
        None => TradeSide::Neutral,
    }
}

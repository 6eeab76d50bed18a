//! Information-driven bar sampling for the tickbar system.
//!
//! This crate handles:
//! - Running per-bar statistics and trade history
//! - Threshold rules deciding when a bar closes
//! - Accumulation of clean ticks into bars
//! - End-to-end building from raw ticks

pub mod accumulator;
pub mod bar;
pub mod bar_builder;
pub mod stats;
pub mod threshold;

pub use accumulator::{AccumulatorUpdate, BarAccumulator, BarState};
pub use bar::Bar;
pub use bar_builder::{BarBuilder, BuildOutput};
pub use stats::{RunningStats, TradeHistory};
pub use threshold::{evaluate, renko_thresholds, RenkoThresholds};

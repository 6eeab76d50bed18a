//! Tick ingestion and cleaning for the tickbar system.
//!
//! This crate handles:
//! - Trade side inference (tick rule)
//! - Adaptive smoothing of the price stream
//! - Tick status tagging (warm-up, outliers, bad timestamps, irregular prints)

pub mod classifier;
pub mod jma;
pub mod tick_filter;

pub use classifier::tick_rule;
pub use jma::{jma_update, JmaFilter, JmaState};
pub use tick_filter::{FilterEntry, FilterState, FilterStats, TickFilter};

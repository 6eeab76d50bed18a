//! Backfill orchestration for the tickbar system.
//!
//! Resolves which (symbol, date) pairs still need bars, loads their ticks,
//! runs the bar builder and stores the results, many keys at a time.

pub mod calendar;
pub mod plan;
pub mod runner;
pub mod source;
pub mod store;

pub use calendar::{MarketCalendar, WeekdayCalendar};
pub use plan::{backfill_date, find_remaining_dates, plan_backfill, BackfillReport, SymbolDate};
pub use runner::{Backfill, BackfillFailure, BackfillSummary};
pub use source::{CsvTickSource, TickSource};
pub use store::{BarStore, SqliteBarStore};

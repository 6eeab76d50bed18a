//! Work planning and single-date processing.

use crate::calendar::MarketCalendar;
use crate::source::TickSource;
use crate::store::BarStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tickbar_bars::BarBuilder;
use tickbar_core::Result;
use tracing::info;

/// One unit of backfill work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolDate {
    pub symbol: String,
    pub date: NaiveDate,
}

impl SymbolDate {
    pub fn new(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
        }
    }
}

impl fmt::Display for SymbolDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.date)
    }
}

/// Outcome of one processed symbol-date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub key: SymbolDate,
    /// Raw ticks loaded.
    pub ticks: u64,
    /// Ticks that reached bar accumulation.
    pub clean: u64,
    /// Bars saved.
    pub bars: usize,
}

/// Requested dates not already present, in request order.
pub fn find_remaining_dates(requested: &[NaiveDate], existing: &BTreeSet<NaiveDate>) -> Vec<NaiveDate> {
    requested
        .iter()
        .filter(|d| !existing.contains(*d))
        .copied()
        .collect()
}

/// Every (symbol, open date) pair in `[start, end]` the store does not have yet.
pub fn plan_backfill(
    calendar: &dyn MarketCalendar,
    store: &dyn BarStore,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SymbolDate>> {
    let requested = calendar.open_dates(start, end);
    let mut plan = Vec::new();
    for symbol in symbols {
        let existing = store.existing_dates(symbol)?;
        let remaining = find_remaining_dates(&requested, &existing);
        info!(
            symbol = symbol.as_str(),
            requested = requested.len(),
            remaining = remaining.len(),
            "planned"
        );
        plan.extend(remaining.into_iter().map(|date| SymbolDate::new(symbol.clone(), date)));
    }
    Ok(plan)
}

/// Load, build and save one symbol-date.
pub fn backfill_date(
    source: &dyn TickSource,
    store: &dyn BarStore,
    builder: &BarBuilder,
    key: &SymbolDate,
) -> Result<BackfillReport> {
    let ticks = source.load_ticks(&key.symbol, key.date)?;
    let output = builder.build(ticks);
    store.save(&key.symbol, key.date, &output)?;

    Ok(BackfillReport {
        key: key.clone(),
        ticks: output.stats.total_ticks,
        clean: output.stats.clean,
        bars: output.bars.len(),
    })
}

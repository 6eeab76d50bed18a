//! Persistence of built bars.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tickbar_bars::BuildOutput;
use tickbar_core::{Error, Result};
use tickbar_ingestion::FilterStats;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stores bar output and reports which dates are already done.
pub trait BarStore: Send + Sync {
    /// Dates already processed for `symbol`.
    fn existing_dates(&self, symbol: &str) -> Result<BTreeSet<NaiveDate>>;

    /// Persist the output of one symbol-date, replacing any earlier run.
    fn save(&self, symbol: &str, date: NaiveDate, output: &BuildOutput) -> Result<()>;
}

/// SQLite-backed store.
///
/// `runs` holds one row per processed symbol-date with its filter counters;
/// `bars` holds the bars, their trade history encoded as JSON.
pub struct SqliteBarStore {
    conn: Mutex<Connection>,
}

impl SqliteBarStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path).map_err(db_err)?)
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                total_ticks INTEGER NOT NULL,
                clean INTEGER NOT NULL,
                warm_up INTEGER NOT NULL,
                zero_volume INTEGER NOT NULL,
                irregular INTEGER NOT NULL,
                timestamps_delta INTEGER NOT NULL,
                outlier INTEGER NOT NULL,
                bar_count INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS bars (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                seq INTEGER NOT NULL,
                open_time TEXT NOT NULL,
                close_time TEXT NOT NULL,
                open REAL NOT NULL,
                close REAL NOT NULL,
                vwap REAL,
                jma_open REAL NOT NULL,
                jma_close REAL NOT NULL,
                duration_sec INTEGER NOT NULL,
                tick_count INTEGER NOT NULL,
                volume INTEGER NOT NULL,
                dollars REAL NOT NULL,
                price_range REAL NOT NULL,
                price_return REAL NOT NULL,
                jma_range REAL NOT NULL,
                jma_return REAL NOT NULL,
                tick_imbalance INTEGER NOT NULL,
                volume_imbalance INTEGER NOT NULL,
                dollar_imbalance REAL NOT NULL,
                trigger_status TEXT NOT NULL,
                trades TEXT NOT NULL,
                PRIMARY KEY (symbol, date, seq)
            );",
        )
        .map_err(db_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::database("connection lock poisoned"))
    }

    /// Number of bars stored for a symbol-date.
    pub fn bar_count(&self, symbol: &str, date: NaiveDate) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bars WHERE symbol = ?1 AND date = ?2",
                params![symbol, date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Filter counters recorded for a symbol-date, if it was processed.
    pub fn run_stats(&self, symbol: &str, date: NaiveDate) -> Result<Option<FilterStats>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT total_ticks, clean, warm_up, zero_volume, irregular, timestamps_delta, outlier
             FROM runs WHERE symbol = ?1 AND date = ?2",
            params![symbol, date.format(DATE_FORMAT).to_string()],
            |row| {
                Ok(FilterStats {
                    total_ticks: row.get::<_, i64>(0)? as u64,
                    clean: row.get::<_, i64>(1)? as u64,
                    warm_up: row.get::<_, i64>(2)? as u64,
                    zero_volume: row.get::<_, i64>(3)? as u64,
                    irregular: row.get::<_, i64>(4)? as u64,
                    timestamps_delta: row.get::<_, i64>(5)? as u64,
                    outlier: row.get::<_, i64>(6)? as u64,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }
}

impl BarStore for SqliteBarStore {
    fn existing_dates(&self, symbol: &str) -> Result<BTreeSet<NaiveDate>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT date FROM runs WHERE symbol = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![symbol], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut dates = BTreeSet::new();
        for row in rows {
            let text = row.map_err(db_err)?;
            let date = NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|e| Error::data(format!("bad stored date {:?}: {}", text, e)))?;
            dates.insert(date);
        }
        Ok(dates)
    }

    fn save(&self, symbol: &str, date: NaiveDate, output: &BuildOutput) -> Result<()> {
        let date = date.format(DATE_FORMAT).to_string();
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "DELETE FROM bars WHERE symbol = ?1 AND date = ?2",
            params![symbol, date],
        )
        .map_err(db_err)?;

        for (seq, bar) in output.bars.iter().enumerate() {
            let trades = serde_json::to_string(&bar.trades)?;
            let s = &bar.stats;
            tx.execute(
                "INSERT INTO bars (
                    symbol, date, seq, open_time, close_time, open, close, vwap,
                    jma_open, jma_close, duration_sec, tick_count, volume, dollars,
                    price_range, price_return, jma_range, jma_return,
                    tick_imbalance, volume_imbalance, dollar_imbalance, trigger_status, trades
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                          ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    symbol,
                    date,
                    seq as i64,
                    bar.open_time.to_rfc3339(),
                    bar.close_time.to_rfc3339(),
                    bar.open,
                    bar.close,
                    bar.vwap,
                    bar.jma_open,
                    bar.jma_close,
                    s.duration_sec,
                    s.tick_count as i64,
                    s.volume as i64,
                    s.dollars,
                    s.price_range,
                    s.price_return,
                    s.jma_range,
                    s.jma_return,
                    s.tick_imbalance,
                    s.volume_imbalance,
                    s.dollar_imbalance,
                    s.trigger.as_str(),
                    trades,
                ],
            )
            .map_err(db_err)?;
        }

        let f = &output.stats;
        tx.execute(
            "INSERT OR REPLACE INTO runs (
                symbol, date, total_ticks, clean, warm_up, zero_volume, irregular,
                timestamps_delta, outlier, bar_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                symbol,
                date,
                f.total_ticks as i64,
                f.clean as i64,
                f.warm_up as i64,
                f.zero_volume as i64,
                f.irregular as i64,
                f.timestamps_delta as i64,
                f.outlier as i64,
                output.bars.len() as i64,
            ],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

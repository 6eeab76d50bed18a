//! Historical tick loading.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tickbar_core::{Error, RawTick, Result};
use tracing::debug;

/// Loads the raw ticks of one symbol on one date.
pub trait TickSource: Send + Sync {
    /// Ticks in venue-timestamp order.
    ///
    /// A date whose data cannot be found is an error, so it is retried on the
    /// next run instead of being recorded as done. A file with no rows yields an
    /// empty vector.
    fn load_ticks(&self, symbol: &str, date: NaiveDate) -> Result<Vec<RawTick>>;
}

/// Reads `<root>/<SYMBOL>/<YYYY-MM-DD>.csv` files.
///
/// Each file has a header row and the columns
/// `sip_ts_ns,exchange_ts_ns,price,size,irregular`.
#[derive(Debug, Clone)]
pub struct CsvTickSource {
    root: PathBuf,
}

impl CsvTickSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File holding the ticks of `symbol` on `date`.
    pub fn path_for(&self, symbol: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(symbol)
            .join(format!("{}.csv", date.format("%Y-%m-%d")))
    }
}

impl TickSource for CsvTickSource {
    fn load_ticks(&self, symbol: &str, date: NaiveDate) -> Result<Vec<RawTick>> {
        let path = self.path_for(symbol, date);
        if !path.exists() {
            return Err(Error::data(format!("no tick file {}", path.display())));
        }

        let mut ticks = read_ticks(&path)?;
        ticks.sort_by_key(|t| t.sip_ts_ns);
        debug!(symbol, %date, ticks = ticks.len(), "ticks loaded");
        Ok(ticks)
    }
}

fn read_ticks(path: &Path) -> Result<Vec<RawTick>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::data(format!("{}: {}", path.display(), e)))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| Error::data(format!("{}: {}", path.display(), e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
    }

    fn write_file(dir: &TempDir, symbol: &str, body: &str) {
        let symbol_dir = dir.path().join(symbol);
        fs::create_dir_all(&symbol_dir).unwrap();
        fs::write(symbol_dir.join("2020-01-02.csv"), body).unwrap();
    }

    #[test]
    fn test_loads_and_sorts_ticks() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "GLD",
            "sip_ts_ns,exchange_ts_ns,price,size,irregular\n\
             2000,1990,143.5,200,false\n\
             1000,990,143.4,100,true\n",
        );
        let source = CsvTickSource::new(dir.path());

        let ticks = source.load_ticks("GLD", date()).unwrap();

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].sip_ts_ns, 1000);
        assert!(ticks[0].irregular);
        assert_eq!(ticks[1].price, 143.5);
        assert_eq!(ticks[1].size, 200);
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let dir = TempDir::new().unwrap();
        let source = CsvTickSource::new(dir.path());

        let err = source.load_ticks("GLD", date()).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert!(err.to_string().contains("2020-01-02.csv"));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "GLD", "sip_ts_ns,exchange_ts_ns,price,size,irregular\n");
        let source = CsvTickSource::new(dir.path());
        assert!(source.load_ticks("GLD", date()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_row_is_data_error() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "GLD",
            "sip_ts_ns,exchange_ts_ns,price,size,irregular\n1000,990,abc,100,false\n",
        );
        let source = CsvTickSource::new(dir.path());

        let err = source.load_ticks("GLD", date()).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_path_layout() {
        let source = CsvTickSource::new("/data");
        assert_eq!(
            source.path_for("GLD", date()),
            PathBuf::from("/data/GLD/2020-01-02.csv")
        );
    }
}

//! PyO3 bindings for the tickbar pipeline.
//!
//! Exposes the Rust bar builder to Python research code:
//! - Raw and cleaned tick records
//! - Tick rule classification
//! - End-to-end bar building with a threshold dict

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use tickbar_bars::{Bar as RustBar, BarBuilder};
use tickbar_core::{
    CleanTick as RustCleanTick, FilterConfig, RawTick as RustRawTick, ThresholdConfig,
    TradeSide,
};

fn to_py_err(e: tickbar_core::Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// A raw trade print.
#[pyclass]
#[derive(Clone)]
pub struct RawTick {
    /// Venue (SIP) timestamp, ns since the Unix epoch.
    #[pyo3(get, set)]
    pub sip_ts_ns: i64,
    /// Exchange timestamp, ns since the Unix epoch.
    #[pyo3(get, set)]
    pub exchange_ts_ns: i64,
    #[pyo3(get, set)]
    pub price: f64,
    #[pyo3(get, set)]
    pub size: u64,
    #[pyo3(get, set)]
    pub irregular: bool,
}

#[pymethods]
impl RawTick {
    #[new]
    #[pyo3(signature = (sip_ts_ns, exchange_ts_ns, price, size, irregular=false))]
    fn new(sip_ts_ns: i64, exchange_ts_ns: i64, price: f64, size: u64, irregular: bool) -> Self {
        RawTick {
            sip_ts_ns,
            exchange_ts_ns,
            price,
            size,
            irregular,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "RawTick(sip_ts_ns={}, price={}, size={}, irregular={})",
            self.sip_ts_ns, self.price, self.size, self.irregular
        )
    }
}

impl From<RawTick> for RustRawTick {
    fn from(t: RawTick) -> Self {
        RustRawTick {
            sip_ts_ns: t.sip_ts_ns,
            exchange_ts_ns: t.exchange_ts_ns,
            price: t.price,
            size: t.size,
            irregular: t.irregular,
        }
    }
}

/// A tick after cleaning, with its status and inferred side.
#[pyclass]
#[derive(Clone)]
pub struct CleanTick {
    /// Event time in the trading timezone, RFC 3339.
    #[pyo3(get)]
    pub date_time: String,
    #[pyo3(get)]
    pub price: f64,
    #[pyo3(get)]
    pub size: u64,
    #[pyo3(get)]
    pub jma: f64,
    #[pyo3(get)]
    pub pct_diff: f64,
    /// +1 buy, -1 sell, 0 neutral.
    #[pyo3(get)]
    pub side: i8,
    #[pyo3(get)]
    pub status: String,
}

#[pymethods]
impl CleanTick {
    #[getter]
    fn is_clean(&self) -> bool {
        self.status == "clean"
    }

    fn __repr__(&self) -> String {
        format!(
            "CleanTick(date_time={}, price={}, status={})",
            self.date_time, self.price, self.status
        )
    }
}

impl From<RustCleanTick> for CleanTick {
    fn from(t: RustCleanTick) -> Self {
        CleanTick {
            date_time: t.date_time.to_rfc3339(),
            price: t.price,
            size: t.size,
            jma: t.jma,
            pct_diff: t.pct_diff,
            side: t.side.sign(),
            status: t.status.as_str().to_string(),
        }
    }
}

/// A closed information-driven bar.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    #[pyo3(get)]
    pub open_time: String,
    #[pyo3(get)]
    pub close_time: String,
    #[pyo3(get)]
    pub open: f64,
    #[pyo3(get)]
    pub close: f64,
    #[pyo3(get)]
    pub vwap: Option<f64>,
    #[pyo3(get)]
    pub jma_open: f64,
    #[pyo3(get)]
    pub jma_close: f64,
    #[pyo3(get)]
    pub duration_sec: i64,
    #[pyo3(get)]
    pub tick_count: u64,
    #[pyo3(get)]
    pub volume: u64,
    #[pyo3(get)]
    pub dollars: f64,
    #[pyo3(get)]
    pub price_high: f64,
    #[pyo3(get)]
    pub price_low: f64,
    #[pyo3(get)]
    pub price_range: f64,
    #[pyo3(get)]
    pub price_return: f64,
    #[pyo3(get)]
    pub jma_high: f64,
    #[pyo3(get)]
    pub jma_low: f64,
    #[pyo3(get)]
    pub jma_range: f64,
    #[pyo3(get)]
    pub jma_return: f64,
    #[pyo3(get)]
    pub tick_imbalance: i64,
    #[pyo3(get)]
    pub volume_imbalance: i64,
    #[pyo3(get)]
    pub dollar_imbalance: f64,
    #[pyo3(get)]
    pub bar_trigger: String,
    /// In-bar trade history, one entry per tick.
    #[pyo3(get)]
    pub trade_times: Vec<String>,
    #[pyo3(get)]
    pub trade_prices: Vec<f64>,
    #[pyo3(get)]
    pub trade_volumes: Vec<u64>,
    #[pyo3(get)]
    pub trade_sides: Vec<i8>,
    #[pyo3(get)]
    pub trade_jma: Vec<f64>,
}

#[pymethods]
impl Bar {
    fn __repr__(&self) -> String {
        format!(
            "Bar(open_time={}, close_time={}, ticks={}, trigger={})",
            self.open_time, self.close_time, self.tick_count, self.bar_trigger
        )
    }
}

impl From<RustBar> for Bar {
    fn from(b: RustBar) -> Self {
        let s = b.stats;
        let trades = b.trades;
        Bar {
            open_time: b.open_time.to_rfc3339(),
            close_time: b.close_time.to_rfc3339(),
            open: b.open,
            close: b.close,
            vwap: b.vwap,
            jma_open: b.jma_open,
            jma_close: b.jma_close,
            duration_sec: s.duration_sec,
            tick_count: s.tick_count,
            volume: s.volume,
            dollars: s.dollars,
            price_high: s.price_max,
            price_low: s.price_min,
            price_range: s.price_range,
            price_return: s.price_return,
            jma_high: s.jma_max,
            jma_low: s.jma_min,
            jma_range: s.jma_range,
            jma_return: s.jma_return,
            tick_imbalance: s.tick_imbalance,
            volume_imbalance: s.volume_imbalance,
            dollar_imbalance: s.dollar_imbalance,
            bar_trigger: s.trigger.as_str().to_string(),
            trade_times: trades.date_time.iter().map(|t| t.to_rfc3339()).collect(),
            trade_prices: trades.price,
            trade_volumes: trades.volume,
            trade_sides: trades.side.iter().map(|s| s.sign()).collect(),
            trade_jma: trades.jma,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Infer the side of the latest trade from the previous price and side.
#[pyfunction]
fn tick_rule(latest_price: f64, prev_price: f64, last_side: i8) -> i8 {
    tickbar_ingestion::tick_rule(latest_price, prev_price, TradeSide::from_sign(last_side as i64))
        .sign()
}

/// Convert a Python threshold dict. Unknown keys and `None` values are ignored.
fn thresholds_from_dict(dict: &Bound<'_, PyDict>) -> PyResult<ThresholdConfig> {
    let mut map = serde_json::Map::new();
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        if value.is_none() {
            continue;
        }
        let json = if let Ok(text) = value.extract::<String>() {
            serde_json::Value::String(text)
        } else if let Ok(number) = value.extract::<f64>() {
            match serde_json::Number::from_f64(number) {
                Some(n) => serde_json::Value::Number(n),
                None => {
                    return Err(PyValueError::new_err(format!(
                        "threshold {:?} must be finite",
                        key
                    )))
                }
            }
        } else {
            continue;
        };
        map.insert(key, json);
    }
    ThresholdConfig::from_json_value(serde_json::Value::Object(map)).map_err(to_py_err)
}

// ============================================================================
// Python-exposed Engine Classes
// ============================================================================

/// Bar builder over whole tick sequences.
#[pyclass]
pub struct PyBarBuilder {
    inner: BarBuilder,
}

#[pymethods]
impl PyBarBuilder {
    #[new]
    #[pyo3(signature = (thresholds=None, jma_length=7, jma_power=2.0, timezone="America/New_York"))]
    fn new(
        thresholds: Option<&Bound<'_, PyDict>>,
        jma_length: usize,
        jma_power: f64,
        timezone: &str,
    ) -> PyResult<Self> {
        let thresholds = match thresholds {
            Some(dict) => thresholds_from_dict(dict)?,
            None => ThresholdConfig::default(),
        };
        let filter = FilterConfig {
            jma_length,
            jma_power,
            timezone: timezone.to_string(),
            ..Default::default()
        };
        Ok(PyBarBuilder {
            inner: BarBuilder::new(filter, thresholds).map_err(to_py_err)?,
        })
    }

    /// Clean `ticks` and sample them into bars.
    ///
    /// Returns the closed bars and the status-tagged log of every tick.
    fn build(&self, py: Python<'_>, ticks: Vec<RawTick>) -> (Vec<Bar>, Vec<CleanTick>) {
        let output = py.allow_threads(|| {
            self.inner
                .build(ticks.into_iter().map(RustRawTick::from))
        });
        (
            output.bars.into_iter().map(Bar::from).collect(),
            output.ticks.into_iter().map(CleanTick::from).collect(),
        )
    }

    /// Filter counters of a build, as a dict keyed by status.
    fn build_stats<'py>(&self, py: Python<'py>, ticks: Vec<RawTick>) -> PyResult<Bound<'py, PyDict>> {
        let output = py.allow_threads(|| {
            self.inner
                .build(ticks.into_iter().map(RustRawTick::from))
        });
        let s = output.stats;
        let dict = PyDict::new_bound(py);
        dict.set_item("total_ticks", s.total_ticks)?;
        dict.set_item("clean", s.clean)?;
        dict.set_item("filter_warm_up", s.warm_up)?;
        dict.set_item("zero_volume", s.zero_volume)?;
        dict.set_item("irregular_condition", s.irregular)?;
        dict.set_item("timestamps_delta", s.timestamps_delta)?;
        dict.set_item("outlier_filter", s.outlier)?;
        dict.set_item("bars", output.bars.len())?;
        Ok(dict)
    }
}

// ============================================================================
// Module Definition
// ============================================================================

/// tickbar - information-driven bars from raw trade ticks.
#[pymodule]
fn tickbar(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<RawTick>()?;
    m.add_class::<CleanTick>()?;
    m.add_class::<Bar>()?;

    // Functions
    m.add_function(wrap_pyfunction!(tick_rule, m)?)?;

    // Engine classes
    m.add_class::<PyBarBuilder>()?;

    Ok(())
}

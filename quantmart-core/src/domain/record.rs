//! Canonical normalized rows, one per (date, entity).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One normalized daily price row for a tradable instrument.
///
/// Individual OHLCV fields may be null without disqualifying the row;
/// upstream responses routinely have holes (halts, partial listings).
/// `adj_close` is absent entirely for sources that never report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
    pub source: String,
}

/// One normalized daily macro-proxy row.
///
/// `symbol` is the raw upstream identifier (e.g. `^TNX`), `metric` the
/// canonical name it maps to. Rows with a null value are dropped before
/// this type is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub metric: String,
    pub value: f64,
    pub source: String,
}

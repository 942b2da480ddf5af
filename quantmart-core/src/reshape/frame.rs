//! Record ↔ frame conversions for the canonical normalized layouts.
//!
//! Column order and names are part of the loader contract:
//! prices: `date, symbol, open, high, low, close, adj_close, volume, source`
//! macro:  `date, symbol, metric, value, source`

use super::ReshapeError;
use crate::domain::{MacroRecord, PriceRecord};
use chrono::NaiveDate;
use polars::prelude::*;

/// Build the canonical price frame from normalized records.
pub fn price_frame(records: &[PriceRecord]) -> Result<DataFrame, ReshapeError> {
    let dates: Vec<i32> = records.iter().map(|r| epoch_days(r.date)).collect();
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let opens: Vec<Option<f64>> = records.iter().map(|r| r.open).collect();
    let highs: Vec<Option<f64>> = records.iter().map(|r| r.high).collect();
    let lows: Vec<Option<f64>> = records.iter().map(|r| r.low).collect();
    let closes: Vec<Option<f64>> = records.iter().map(|r| r.close).collect();
    let adj_closes: Vec<Option<f64>> = records.iter().map(|r| r.adj_close).collect();
    let volumes: Vec<Option<f64>> = records.iter().map(|r| r.volume).collect();
    let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();

    DataFrame::new(vec![
        date_column(dates)?,
        Column::new("symbol".into(), symbols),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("adj_close".into(), adj_closes),
        Column::new("volume".into(), volumes),
        Column::new("source".into(), sources),
    ])
    .map_err(|e| ReshapeError::Frame(format!("price frame construction: {e}")))
}

/// Read price records back out of a canonical price frame.
///
/// A missing `adj_close` column is tolerated (null substituted); every
/// other column is required.
pub fn price_records(frame: &DataFrame) -> Result<Vec<PriceRecord>, ReshapeError> {
    let n = frame.height();
    let dates = date_values(required_column(frame, "date")?)?;
    let symbols = str_values(frame, "symbol")?;
    let opens = f64_values(frame, "open")?;
    let highs = f64_values(frame, "high")?;
    let lows = f64_values(frame, "low")?;
    let closes = f64_values(frame, "close")?;
    let volumes = f64_values(frame, "volume")?;
    let sources = str_values(frame, "source")?;
    let adj_closes = match frame.column("adj_close") {
        Ok(_) => f64_values(frame, "adj_close")?,
        Err(_) => vec![None; n],
    };

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        records.push(PriceRecord {
            date: dates[i],
            symbol: symbols[i].clone(),
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            adj_close: adj_closes[i],
            volume: volumes[i],
            source: sources[i].clone(),
        });
    }
    Ok(records)
}

/// Build the canonical macro frame from normalized records.
pub fn macro_frame(records: &[MacroRecord]) -> Result<DataFrame, ReshapeError> {
    let dates: Vec<i32> = records.iter().map(|r| epoch_days(r.date)).collect();
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let metrics: Vec<&str> = records.iter().map(|r| r.metric.as_str()).collect();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();

    DataFrame::new(vec![
        date_column(dates)?,
        Column::new("symbol".into(), symbols),
        Column::new("metric".into(), metrics),
        Column::new("value".into(), values),
        Column::new("source".into(), sources),
    ])
    .map_err(|e| ReshapeError::Frame(format!("macro frame construction: {e}")))
}

/// Read macro records back out of a canonical macro frame.
///
/// Rows with a null value are dropped, matching the macro-path policy.
/// A missing `symbol` column falls back to the metric name.
pub fn macro_records(frame: &DataFrame) -> Result<Vec<MacroRecord>, ReshapeError> {
    let n = frame.height();
    let dates = date_values(required_column(frame, "date")?)?;
    let metrics = str_values(frame, "metric")?;
    let values = f64_values(frame, "value")?;
    let sources = str_values(frame, "source")?;
    let symbols = match frame.column("symbol") {
        Ok(_) => str_values(frame, "symbol")?,
        Err(_) => metrics.clone(),
    };

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let Some(value) = values[i] else { continue };
        records.push(MacroRecord {
            date: dates[i],
            symbol: symbols[i].clone(),
            metric: metrics[i].clone(),
            value,
            source: sources[i].clone(),
        });
    }
    Ok(records)
}

// ── Column helpers ──────────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub(crate) fn date_column(days: Vec<i32>) -> Result<Column, ReshapeError> {
    Column::new("date".into(), days)
        .cast(&DataType::Date)
        .map_err(|e| ReshapeError::Frame(format!("date cast: {e}")))
}

fn required_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column, ReshapeError> {
    frame.column(name).map_err(|_| ReshapeError::ShapeMismatch {
        expected: format!("column '{name}'"),
        observed: super::flatten::column_names(frame),
    })
}

/// Extract calendar dates from a temporal column.
///
/// Accepts Date, Datetime (time-of-day stripped), and ISO-formatted String
/// columns, since staged files and hand-built frames differ in what they
/// carry. Null dates are an error: a keyless row cannot be merged.
pub(crate) fn date_values(col: &Column) -> Result<Vec<NaiveDate>, ReshapeError> {
    match col.dtype() {
        DataType::Date => {
            let ca = col
                .date()
                .map_err(|e| ReshapeError::Frame(format!("date column: {e}")))?;
            (0..ca.len())
                .map(|i| {
                    let days = ca.get(i).ok_or_else(|| {
                        ReshapeError::Frame(format!("null date at row {i}"))
                    })?;
                    Ok(epoch() + chrono::Duration::days(days as i64))
                })
                .collect()
        }
        DataType::Datetime(_, _) => {
            let casted = col
                .cast(&DataType::Date)
                .map_err(|e| ReshapeError::Frame(format!("datetime to date cast: {e}")))?;
            date_values(&casted)
        }
        DataType::String => {
            let ca = col
                .str()
                .map_err(|e| ReshapeError::Frame(format!("date column: {e}")))?;
            ca.into_iter()
                .enumerate()
                .map(|(i, s)| {
                    let s = s.ok_or_else(|| {
                        ReshapeError::Frame(format!("null date at row {i}"))
                    })?;
                    parse_date(s).ok_or_else(|| {
                        ReshapeError::Frame(format!("unparseable date '{s}' at row {i}"))
                    })
                })
                .collect()
        }
        other => Err(ReshapeError::Frame(format!(
            "unsupported temporal dtype {other:?} in column '{}'",
            col.name()
        ))),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

fn f64_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, ReshapeError> {
    let col = required_column(frame, name)?;
    let casted = col
        .cast(&DataType::Float64)
        .map_err(|e| ReshapeError::Frame(format!("column '{name}' to f64: {e}")))?;
    let ca = casted
        .f64()
        .map_err(|e| ReshapeError::Frame(format!("column '{name}': {e}")))?;
    Ok(ca.into_iter().collect())
}

fn str_values(frame: &DataFrame, name: &str) -> Result<Vec<String>, ReshapeError> {
    let col = required_column(frame, name)?;
    let ca = col
        .str()
        .map_err(|e| ReshapeError::Frame(format!("column '{name}': {e}")))?;
    ca.into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.map(str::to_string)
                .ok_or_else(|| ReshapeError::Frame(format!("null '{name}' at row {i}")))
        })
        .collect()
}

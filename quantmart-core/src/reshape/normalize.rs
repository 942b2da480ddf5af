//! Long-format normalization of flattened wide datasets.
//!
//! The melt/pivot is explicit iteration into ordered maps rather than a
//! frame-library pivot: the first-wins duplicate policy, the calendar-date
//! coercion, and the (entity, date) output ordering all fall out of the
//! map structure directly, and the observed-columns bookkeeping feeds the
//! error messages the validation contract requires.

use super::flatten::{column_names, RawTable, FIELD_JOIN};
use super::{frame, ReshapeError};
use crate::domain::{MacroRecord, PriceRecord};
use crate::metrics::map_metric;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Upstream field names with a canonical lower-case spelling.
static FIELD_RENAMES: &[(&str, &str)] = &[
    ("Open", "open"),
    ("High", "high"),
    ("Low", "low"),
    ("Close", "close"),
    ("Adj Close", "adj_close"),
    ("Volume", "volume"),
];

/// Fields that must be present after the pivot for price data.
const REQUIRED_PRICE_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

const CLOSE_PREFIX: &str = "Close__";

fn canonical_field(raw: &str) -> &str {
    FIELD_RENAMES
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw)
}

/// Normalize a wide price dataset into the canonical price frame.
///
/// One output row per (date, symbol), one column per canonical field,
/// sorted by (symbol, date) ascending. Rows with partially-null OHLC
/// fields are retained; a (date, symbol) pair with no non-null field at
/// all never materializes.
pub fn normalize_prices(raw: RawTable, source: &str) -> Result<DataFrame, ReshapeError> {
    if raw.height() == 0 {
        return Err(ReshapeError::EmptyInput("price dataset has no rows"));
    }
    let flat = raw.flatten()?;
    let dates = temporal_values(&flat)?;
    let value_cols = value_columns(&flat, |name| name.contains(FIELD_JOIN))?;

    // Melt and first-wins pivot in one pass: cell (symbol, date, field)
    // keeps the first non-null value it sees.
    let mut cells: BTreeMap<(String, NaiveDate), BTreeMap<String, f64>> = BTreeMap::new();
    let mut observed_fields: BTreeSet<String> = BTreeSet::new();
    for name in &value_cols {
        // Split on the FIRST delimiter: symbols may contain underscores.
        let Some((field, symbol)) = name.split_once(FIELD_JOIN) else {
            continue;
        };
        let field = canonical_field(field);
        let values = numeric_values(&flat, name)?;
        for (i, value) in values.into_iter().enumerate() {
            let Some(value) = value else { continue };
            observed_fields.insert(field.to_string());
            cells
                .entry((symbol.to_string(), dates[i]))
                .or_default()
                .entry(field.to_string())
                .or_insert(value);
        }
    }

    let missing: Vec<String> = REQUIRED_PRICE_FIELDS
        .iter()
        .filter(|f| !observed_fields.contains(**f))
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReshapeError::Validation {
            missing,
            observed: observed_fields.into_iter().collect(),
        });
    }

    let records: Vec<PriceRecord> = cells
        .into_iter()
        .map(|((symbol, date), fields)| PriceRecord {
            date,
            symbol,
            open: fields.get("open").copied(),
            high: fields.get("high").copied(),
            low: fields.get("low").copied(),
            close: fields.get("close").copied(),
            adj_close: fields.get("adj_close").copied(),
            volume: fields.get("volume").copied(),
            source: source.to_string(),
        })
        .collect();

    frame::price_frame(&records)
}

/// Normalize a wide macro-proxy dataset into the canonical macro frame.
///
/// Only the `Close__<symbol>` columns are melted; the close becomes the
/// bare `value`, the raw symbol is mapped to its canonical metric name,
/// and rows with a null value are dropped. Output is sorted by
/// (metric, date) ascending.
pub fn normalize_macro(raw: RawTable, source: &str) -> Result<DataFrame, ReshapeError> {
    if raw.height() == 0 {
        return Err(ReshapeError::EmptyInput("macro dataset has no rows"));
    }
    let flat = raw.flatten()?;
    let dates = temporal_values(&flat)?;
    let close_cols = value_columns(&flat, |name| name.starts_with(CLOSE_PREFIX))?;

    let mut rows: BTreeMap<(String, NaiveDate), (String, f64)> = BTreeMap::new();
    for name in &close_cols {
        let symbol = &name[CLOSE_PREFIX.len()..];
        let metric = map_metric(symbol);
        let values = numeric_values(&flat, name)?;
        for (i, value) in values.into_iter().enumerate() {
            let Some(value) = value else { continue };
            rows.entry((metric.to_string(), dates[i]))
                .or_insert((symbol.to_string(), value));
        }
    }
    if rows.is_empty() {
        return Err(ReshapeError::EmptyInput(
            "macro dataset has no non-null values",
        ));
    }

    let records: Vec<MacroRecord> = rows
        .into_iter()
        .map(|((metric, date), (symbol, value))| MacroRecord {
            date,
            symbol,
            metric,
            value,
            source: source.to_string(),
        })
        .collect();

    frame::macro_frame(&records)
}

// ── Shared steps ────────────────────────────────────────────────────

/// Identify the temporal column and coerce it to calendar dates.
///
/// Preference order: a column named `date`, then `Date`, then the first
/// column of the frame.
fn temporal_values(flat: &DataFrame) -> Result<Vec<NaiveDate>, ReshapeError> {
    let col = if let Ok(col) = flat.column("date") {
        col
    } else if let Ok(col) = flat.column("Date") {
        col
    } else {
        flat.get_columns()
            .first()
            .ok_or_else(|| ReshapeError::ShapeMismatch {
                expected: "a temporal column".to_string(),
                observed: vec![],
            })?
    };
    frame::date_values(col)
}

fn value_columns(
    flat: &DataFrame,
    is_value: impl Fn(&str) -> bool,
) -> Result<Vec<String>, ReshapeError> {
    let names: Vec<String> = column_names(flat)
        .into_iter()
        .filter(|name| is_value(name))
        .collect();
    if names.is_empty() {
        return Err(ReshapeError::ShapeMismatch {
            expected: "at least one field__symbol value column".to_string(),
            observed: column_names(flat),
        });
    }
    Ok(names)
}

fn numeric_values(flat: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, ReshapeError> {
    let col = flat
        .column(name)
        .map_err(|e| ReshapeError::Frame(format!("column '{name}': {e}")))?;
    let casted = col
        .cast(&DataType::Float64)
        .map_err(|e| ReshapeError::Frame(format!("column '{name}' to f64: {e}")))?;
    let ca = casted
        .f64()
        .map_err(|e| ReshapeError::Frame(format!("column '{name}': {e}")))?;
    Ok(ca.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::flatten::column_key;
    use crate::reshape::frame::{macro_records, price_records};

    fn wide_price_table() -> RawTable {
        // Two dates × two symbols, full OHLCV per symbol.
        let mut columns: Vec<Column> = vec![Column::new(
            "Date".into(),
            vec!["2024-01-02", "2024-01-03"],
        )];
        let mut keys = vec![column_key(Some("Date"), Some(""))];
        for field in ["Open", "High", "Low", "Close", "Adj Close", "Volume"] {
            for symbol in ["FBTC", "IBIT"] {
                let base = if symbol == "FBTC" { 38.0 } else { 24.0 };
                columns.push(Column::new(
                    format!("c{}", columns.len()).into(),
                    vec![base, base + 1.0],
                ));
                keys.push(column_key(Some(field), Some(symbol)));
            }
        }
        RawTable::Hierarchical {
            frame: DataFrame::new(columns).unwrap(),
            keys,
        }
    }

    #[test]
    fn wide_prices_normalize_to_one_row_per_date_symbol() {
        let frame = normalize_prices(wide_price_table(), "yahoo_finance").unwrap();
        assert_eq!(frame.height(), 4); // 2 dates × 2 symbols

        let records = price_records(&frame).unwrap();
        // Sorted by (symbol, date) ascending.
        let keys: Vec<(String, NaiveDate)> = records
            .iter()
            .map(|r| (r.symbol.clone(), r.date))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(records[0].symbol, "FBTC");
        assert_eq!(records[0].close, Some(38.0));
        assert_eq!(records[0].source, "yahoo_finance");
    }

    #[test]
    fn close_only_input_fails_validation_naming_the_missing_fields() {
        let frame = df!(
            "date" => &["2024-01-02", "2024-01-03"],
            "Close__FBTC" => &[38.0, 38.5],
            "Close__IBIT" => &[24.0, 24.5],
        )
        .unwrap();
        let err = normalize_prices(RawTable::Flat(frame), "yahoo_finance").unwrap_err();
        match err {
            ReshapeError::Validation { missing, observed } => {
                assert!(missing.contains(&"volume".to_string()));
                assert!(missing.contains(&"open".to_string()));
                assert_eq!(observed, vec!["close".to_string()]);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_fails_before_any_transformation() {
        let frame = df!(
            "date" => &Vec::<String>::new(),
            "Close__FBTC" => &Vec::<f64>::new(),
        )
        .unwrap();
        assert!(matches!(
            normalize_prices(RawTable::Flat(frame), "s"),
            Err(ReshapeError::EmptyInput(_))
        ));
    }

    #[test]
    fn no_value_columns_is_a_shape_error_listing_observed() {
        let frame = df!(
            "date" => &["2024-01-02"],
            "Close" => &[38.0],
        )
        .unwrap();
        match normalize_prices(RawTable::Flat(frame), "s").unwrap_err() {
            ReshapeError::ShapeMismatch { observed, .. } => {
                assert!(observed.contains(&"Close".to_string()));
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_dates_resolve_to_the_first_non_null_value() {
        let frame = df!(
            "date" => &["2024-01-02", "2024-01-02"],
            "Open__X" => &[Some(1.0), Some(9.0)],
            "High__X" => &[Some(2.0), Some(9.0)],
            "Low__X" => &[Some(0.5), Some(9.0)],
            "Close__X" => &[None::<f64>, Some(7.0)],
            "Volume__X" => &[Some(100.0), Some(900.0)],
        )
        .unwrap();
        let out = normalize_prices(RawTable::Flat(frame), "s").unwrap();
        assert_eq!(out.height(), 1);
        let rec = &price_records(&out).unwrap()[0];
        assert_eq!(rec.open, Some(1.0)); // first row wins
        assert_eq!(rec.close, Some(7.0)); // first NON-NULL wins
        assert_eq!(rec.volume, Some(100.0));
    }

    #[test]
    fn datetime_temporal_column_is_coerced_to_calendar_date() {
        let ts = Column::new("date".into(), vec![1_704_188_700_000i64]) // 2024-01-02T09:45 UTC
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let frame = DataFrame::new(vec![
            ts,
            Column::new("Open__X".into(), vec![1.0]),
            Column::new("High__X".into(), vec![2.0]),
            Column::new("Low__X".into(), vec![0.5]),
            Column::new("Close__X".into(), vec![1.5]),
            Column::new("Volume__X".into(), vec![10.0]),
        ])
        .unwrap();
        let out = normalize_prices(RawTable::Flat(frame), "s").unwrap();
        let rec = &price_records(&out).unwrap()[0];
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn macro_path_melts_closes_and_maps_metric_names() {
        let frame = df!(
            "Date" => &["2024-01-02", "2024-01-03"],
            "Close__^TNX" => &[Some(4.12), None],
            "Close__GC=F" => &[Some(2_060.5), Some(2_071.0)],
        )
        .unwrap();
        let out = normalize_macro(RawTable::Flat(frame), "yahoo_finance").unwrap();
        let records = macro_records(&out).unwrap();
        // The null ^TNX value on 2024-01-03 is dropped: 3 rows remain.
        assert_eq!(records.len(), 3);
        // Sorted by (metric, date): GOLD rows precede the treasury yield.
        assert_eq!(records[0].metric, "GOLD");
        assert_eq!(records[0].symbol, "GC=F");
        assert_eq!(records[2].metric, "US_10Y_TREASURY_YIELD");
        assert_eq!(records[2].value, 4.12);
    }

    #[test]
    fn macro_path_requires_close_columns() {
        let frame = df!(
            "date" => &["2024-01-02"],
            "Open__GC=F" => &[2_050.0],
        )
        .unwrap();
        assert!(matches!(
            normalize_macro(RawTable::Flat(frame), "s"),
            Err(ReshapeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn unmapped_macro_symbol_passes_through_as_metric() {
        let frame = df!(
            "date" => &["2024-01-02"],
            "Close__SI=F" => &[24.1],
        )
        .unwrap();
        let out = normalize_macro(RawTable::Flat(frame), "s").unwrap();
        let records = macro_records(&out).unwrap();
        assert_eq!(records[0].metric, "SI=F");
        assert_eq!(records[0].symbol, "SI=F");
    }

    #[test]
    fn hierarchical_and_preflattened_inputs_agree() {
        let direct = normalize_prices(wide_price_table(), "s").unwrap();
        let flat = wide_price_table().flatten().unwrap();
        let via_flat = normalize_prices(RawTable::Flat(flat), "s").unwrap();
        assert!(direct.equals_missing(&via_flat));
    }
}

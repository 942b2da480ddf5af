//! Yahoo Finance chart fetcher.
//!
//! Fetches daily OHLCV bars from the v8 chart API, one request per
//! ticker, and assembles the multi-ticker result into the field-major
//! (field × ticker) wide shape with two-level column keys. That shape is
//! exactly what the column flattener and normalizer expect, so the same
//! downstream path serves both the price and macro-proxy pipelines.
//!
//! Yahoo has no official API and is subject to unannounced format
//! changes; parse failures surface as `FormatChanged`.

use super::FetchError;
use crate::reshape::flatten::{column_key, RawTable};
use crate::reshape::frame::epoch_days;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Fetch parameters for a multi-ticker download.
#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    /// Exclusive upper bound; `None` means "through today".
    pub end: Option<NaiveDate>,
}

// ── v8 chart API response ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// One ticker's daily series, keyed by calendar date.
struct SymbolSeries {
    days: BTreeMap<NaiveDate, DayQuote>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DayQuote {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adj_close: Option<f64>,
    volume: Option<f64>,
}

const FIELDS: [&str; 6] = ["Open", "High", "Low", "Close", "Adj Close", "Volume"];

impl DayQuote {
    fn field(&self, name: &str) -> Option<f64> {
        match name {
            "Open" => self.open,
            "High" => self.high,
            "Low" => self.low,
            "Close" => self.close,
            "Adj Close" => self.adj_close,
            "Volume" => self.volume,
            _ => None,
        }
    }
}

/// Yahoo Finance chart client.
pub struct YahooClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: "https://query2.finance.yahoo.com".to_string(),
        }
    }

    /// Fetch all tickers and assemble the hierarchical wide table.
    ///
    /// Columns come out field-major: `(Date, "")`, then every ticker's
    /// Open, then every ticker's High, and so on. Dates are the union
    /// across tickers; holes are nulls.
    pub fn fetch_prices(&self, cfg: &YahooConfig) -> Result<RawTable, FetchError> {
        if cfg.tickers.is_empty() {
            return Err(FetchError::NoTickers);
        }

        let mut series: Vec<(String, SymbolSeries)> = Vec::with_capacity(cfg.tickers.len());
        for ticker in &cfg.tickers {
            let one = self.fetch_symbol(ticker, cfg.start, cfg.end)?;
            series.push((ticker.clone(), one));
        }

        let all_dates: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|(_, s)| s.days.keys().copied())
            .collect();
        if all_dates.is_empty() {
            return Err(FetchError::EmptyResponse { provider: "yahoo" });
        }
        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

        // Temporal column first, keyed (Date, "").
        let day_numbers: Vec<i32> = dates.iter().map(|d| epoch_days(*d)).collect();
        let date_col = Column::new("Date".into(), day_numbers)
            .cast(&DataType::Date)
            .map_err(|e| FetchError::Frame(e.to_string()))?;
        let mut columns = vec![date_col];
        let mut keys = vec![column_key(Some("Date"), None)];

        for field in FIELDS {
            for (ticker, s) in &series {
                let values: Vec<Option<f64>> = dates
                    .iter()
                    .map(|d| s.days.get(d).and_then(|q| q.field(field)))
                    .collect();
                // Positional names; the real names come from the keys at
                // flatten time.
                columns.push(Column::new(format!("c{}", columns.len()).into(), values));
                keys.push(column_key(Some(field), Some(ticker)));
            }
        }

        let frame =
            DataFrame::new(columns).map_err(|e| FetchError::Frame(e.to_string()))?;
        Ok(RawTable::Hierarchical { frame, keys })
    }

    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<SymbolSeries, FetchError> {
        let url = self.chart_url(symbol, start, end);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let parsed: ChartResponse = resp
            .json()
            .map_err(|e| FetchError::FormatChanged(e.to_string()))?;
        parse_response(symbol, parsed)
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: Option<NaiveDate>) -> String {
        let start_ts = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        let end_ts = end
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one chart response into a per-date series.
fn parse_response(symbol: &str, resp: ChartResponse) -> Result<SymbolSeries, FetchError> {
    let result = resp.chart.result.ok_or_else(|| {
        if let Some(err) = resp.chart.error {
            if err.code == "Not Found" {
                FetchError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }
            } else {
                FetchError::FormatChanged(format!("{}: {}", err.code, err.description))
            }
        } else {
            FetchError::FormatChanged("empty result with no error".into())
        }
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::FormatChanged("result array is empty".into()))?;

    let timestamps = data
        .timestamp
        .ok_or_else(|| FetchError::FormatChanged("no timestamps".into()))?;

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::FormatChanged("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut days = BTreeMap::new();
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| FetchError::FormatChanged(format!("invalid timestamp: {ts}")))?;

        let q = DayQuote {
            open: quote.open.get(i).copied().flatten(),
            high: quote.high.get(i).copied().flatten(),
            low: quote.low.get(i).copied().flatten(),
            close: quote.close.get(i).copied().flatten(),
            adj_close: adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
            volume: quote.volume.get(i).copied().flatten(),
        };

        // Skip bars where everything is null (holidays/non-trading days).
        if q.open.is_none()
            && q.high.is_none()
            && q.low.is_none()
            && q.close.is_none()
            && q.volume.is_none()
        {
            continue;
        }
        days.insert(date, q);
    }

    Ok(SymbolSeries { days })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_json(symbol_ok: bool) -> String {
        if symbol_ok {
            // Two trading days; the second has a null open.
            r#"{
                "chart": {
                    "result": [{
                        "timestamp": [1704153600, 1704240000],
                        "indicators": {
                            "quote": [{
                                "open": [38.2, null],
                                "high": [39.0, 39.4],
                                "low": [38.0, 38.6],
                                "close": [38.7, 39.1],
                                "volume": [1000000.0, 1200000.0]
                            }],
                            "adjclose": [{"adjclose": [38.7, 39.1]}]
                        }
                    }],
                    "error": null
                }
            }"#
            .to_string()
        } else {
            r#"{
                "chart": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "No data found"}
                }
            }"#
            .to_string()
        }
    }

    #[test]
    fn chart_response_parses_into_dated_quotes() {
        let resp: ChartResponse = serde_json::from_str(&chart_json(true)).unwrap();
        let series = parse_response("FBTC", resp).unwrap();

        assert_eq!(series.days.len(), 2);
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let jan3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(series.days[&jan2].open, Some(38.2));
        assert_eq!(series.days[&jan3].open, None);
        assert_eq!(series.days[&jan3].close, Some(39.1));
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let resp: ChartResponse = serde_json::from_str(&chart_json(false)).unwrap();
        assert!(matches!(
            parse_response("NOPE", resp),
            Err(FetchError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn assembled_table_flattens_to_joined_column_names() {
        // Assemble a two-ticker table by hand, the way fetch_prices does.
        let dates = [
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ];
        let day_numbers: Vec<i32> = dates.iter().map(|d| epoch_days(*d)).collect();
        let date_col = Column::new("Date".into(), day_numbers)
            .cast(&DataType::Date)
            .unwrap();
        let mut columns = vec![date_col];
        let mut keys = vec![column_key(Some("Date"), None)];
        for field in ["Close", "Volume"] {
            for ticker in ["FBTC", "IBIT"] {
                columns.push(Column::new(
                    format!("c{}", columns.len()).into(),
                    vec![Some(1.0), Some(2.0)],
                ));
                keys.push(column_key(Some(field), Some(ticker)));
            }
        }
        let raw = RawTable::Hierarchical {
            frame: DataFrame::new(columns).unwrap(),
            keys,
        };

        let flat = raw.flatten().unwrap();
        let names: Vec<String> = flat
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Date",
                "Close__FBTC",
                "Close__IBIT",
                "Volume__FBTC",
                "Volume__IBIT"
            ]
        );
    }
}

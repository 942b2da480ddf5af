//! Coinbase Exchange daily candles.
//!
//! The candles endpoint returns plain JSON arrays
//! `[time, low, high, open, close, volume]`, newest first. The output is
//! already a single-symbol flat table, so this fetcher emits the
//! canonical price frame directly; nothing here needs the flattener.

use super::FetchError;
use crate::domain::PriceRecord;
use crate::reshape::frame::price_frame;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::time::Duration;

const SOURCE: &str = "coinbase_exchange";

/// Fetch parameters for one product.
#[derive(Debug, Clone)]
pub struct CoinbaseConfig {
    pub product_id: String,
    /// Candle width in seconds; 86400 is daily.
    pub granularity: u32,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for CoinbaseConfig {
    fn default() -> Self {
        Self {
            product_id: "BTC-USD".to_string(),
            granularity: 86_400,
            start: None,
            end: None,
        }
    }
}

/// Coinbase Exchange public market-data client.
pub struct CoinbaseClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl CoinbaseClient {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("quantmart/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: "https://api.exchange.coinbase.com".to_string(),
        }
    }

    /// Fetch candles and return the canonical price frame, sorted by date
    /// ascending.
    pub fn fetch_candles(&self, cfg: &CoinbaseConfig) -> Result<DataFrame, FetchError> {
        let url = format!("{}/products/{}/candles", self.base_url, cfg.product_id);
        let mut params: Vec<(&str, String)> =
            vec![("granularity", cfg.granularity.to_string())];
        if let Some(start) = cfg.start {
            params.push(("start", iso_midnight_utc(start)));
        }
        if let Some(end) = cfg.end {
            params.push(("end", iso_midnight_utc(end)));
        }

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::SymbolNotFound {
                symbol: cfg.product_id.clone(),
            });
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let candles: Vec<[f64; 6]> = resp
            .json()
            .map_err(|e| FetchError::FormatChanged(e.to_string()))?;

        candles_to_frame(&cfg.product_id, candles)
    }
}

impl Default for CoinbaseClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert raw candle rows into the canonical price frame.
fn candles_to_frame(
    product_id: &str,
    candles: Vec<[f64; 6]>,
) -> Result<DataFrame, FetchError> {
    if candles.is_empty() {
        return Err(FetchError::EmptyResponse {
            provider: "coinbase",
        });
    }

    let mut records = Vec::with_capacity(candles.len());
    for [time, low, high, open, close, volume] in candles {
        let date = chrono::DateTime::from_timestamp(time as i64, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| {
                FetchError::FormatChanged(format!("invalid candle timestamp: {time}"))
            })?;
        records.push(PriceRecord {
            date,
            symbol: product_id.to_string(),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            adj_close: None,
            volume: Some(volume),
            source: SOURCE.to_string(),
        });
    }
    // Candles arrive newest first; the canonical layout is date ascending.
    records.sort_by(|a, b| (&a.symbol, a.date).cmp(&(&b.symbol, b.date)));

    price_frame(&records).map_err(|e| FetchError::Frame(e.to_string()))
}

/// Coinbase accepts RFC3339 timestamps; dates become midnight UTC.
fn iso_midnight_utc(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::frame::price_records;

    #[test]
    fn candles_become_an_ascending_canonical_frame() {
        // Newest-first, as the API returns them.
        let candles = vec![
            [1_704_240_000.0, 41_000.0, 43_500.0, 42_500.0, 43_100.0, 980.0], // 2024-01-03
            [1_704_153_600.0, 41_500.0, 43_000.0, 42_000.0, 42_800.0, 1_234.5], // 2024-01-02
        ];
        let frame = candles_to_frame("BTC-USD", candles).unwrap();
        let records = price_records(&frame).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(records[0].open, Some(42_000.0));
        assert_eq!(records[0].low, Some(41_500.0));
        assert_eq!(records[0].adj_close, None);
        assert_eq!(records[0].source, "coinbase_exchange");
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn empty_candles_are_an_empty_response_error() {
        assert!(matches!(
            candles_to_frame("BTC-USD", vec![]),
            Err(FetchError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn candle_payload_parses_from_json() {
        let json = "[[1704153600, 41500.0, 43000.0, 42000.0, 42800.0, 1234.5]]";
        let candles: Vec<[f64; 6]> = serde_json::from_str(json).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0][3], 42_000.0);
    }

    #[test]
    fn start_and_end_render_as_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(iso_midnight_utc(date), "2024-01-01T00:00:00Z");
    }
}

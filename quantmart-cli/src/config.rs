//! Serializable job configuration for `quantmart run`.
//!
//! A job file describes which pipelines to run and where their staged
//! files and the warehouse live. Every parameter is explicit; nothing is
//! read from ambient state.

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level job file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Warehouse database file.
    #[serde(default = "default_warehouse")]
    pub warehouse: PathBuf,

    pub coinbase: Option<CoinbaseJob>,
    pub yahoo: Option<YahooJob>,
    pub macro_proxies: Option<MacroJob>,
}

/// Coinbase daily-candle extract + load.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseJob {
    #[serde(default = "default_product")]
    pub product_id: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default = "default_coinbase_out")]
    pub out: PathBuf,
    #[serde(default = "default_crypto_type")]
    pub asset_type: String,
}

/// Yahoo multi-ticker price extract + load.
#[derive(Debug, Clone, Deserialize)]
pub struct YahooJob {
    #[serde(default = "default_price_tickers")]
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    #[serde(default = "default_yahoo_out")]
    pub out: PathBuf,
    #[serde(default = "default_etf_type")]
    pub asset_type: String,
}

/// Yahoo macro-proxy extract + load.
#[derive(Debug, Clone, Deserialize)]
pub struct MacroJob {
    #[serde(default = "default_macro_tickers")]
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    #[serde(default = "default_macro_out")]
    pub out: PathBuf,
}

impl JobConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read job config {}: {e}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("parse job config: {e}"))
    }
}

fn default_warehouse() -> PathBuf {
    PathBuf::from("warehouse.duckdb")
}

fn default_product() -> String {
    "BTC-USD".to_string()
}

fn default_coinbase_out() -> PathBuf {
    PathBuf::from("data/raw/coinbase_btc_usd_daily.parquet")
}

fn default_yahoo_out() -> PathBuf {
    PathBuf::from("data/raw/yahoo_prices.parquet")
}

fn default_macro_out() -> PathBuf {
    PathBuf::from("data/raw/yahoo_macro_proxies.parquet")
}

fn default_crypto_type() -> String {
    "CRYPTO".to_string()
}

fn default_etf_type() -> String {
    "ETF".to_string()
}

/// Spot BTC ETFs tracked by default.
fn default_price_tickers() -> Vec<String> {
    ["IBIT", "FBTC", "GBTC", "BITB", "ARKB"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Macro proxies tracked by default.
fn default_macro_tickers() -> Vec<String> {
    ["^TNX", "DX-Y.NYB", "GC=F", "CL=F"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_job_file_fills_in_defaults() {
        let cfg = JobConfig::from_toml(
            r#"
            [yahoo]
            start = "2024-01-01"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.warehouse, PathBuf::from("warehouse.duckdb"));
        assert!(cfg.coinbase.is_none());
        let yahoo = cfg.yahoo.unwrap();
        assert_eq!(yahoo.tickers.len(), 5);
        assert_eq!(yahoo.asset_type, "ETF");
        assert_eq!(
            yahoo.start,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn full_job_file_parses() {
        let cfg = JobConfig::from_toml(
            r#"
            warehouse = "wh.duckdb"

            [coinbase]
            product_id = "ETH-USD"
            start = "2024-02-01"
            asset_type = "CRYPTO"

            [macro_proxies]
            tickers = ["^TNX"]
            start = "2024-02-01"
            out = "staged/macro.parquet"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.warehouse, PathBuf::from("wh.duckdb"));
        assert_eq!(cfg.coinbase.unwrap().product_id, "ETH-USD");
        let mac = cfg.macro_proxies.unwrap();
        assert_eq!(mac.tickers, vec!["^TNX"]);
        assert_eq!(mac.out, PathBuf::from("staged/macro.parquet"));
    }

    #[test]
    fn bad_date_is_a_parse_error() {
        let result = JobConfig::from_toml(
            r#"
            [yahoo]
            start = "not-a-date"
            "#,
        );
        assert!(result.is_err());
    }
}

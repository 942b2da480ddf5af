//! Extraction collaborators: blocking HTTP fetchers for upstream APIs.
//!
//! Fetchers only produce raw or canonical frames; all reshaping policy
//! lives in `reshape`. No retries here: a failed fetch surfaces
//! immediately and the run stops.

pub mod coinbase;
pub mod yahoo;

pub use coinbase::{CoinbaseClient, CoinbaseConfig};
pub use yahoo::{YahooClient, YahooConfig};

use thiserror::Error;

/// Structured error types for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("empty response from {provider} (check symbols or date range)")]
    EmptyResponse { provider: &'static str },

    #[error("response format changed: {0}")]
    FormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("ticker list is empty")]
    NoTickers,

    #[error("frame construction: {0}")]
    Frame(String),
}

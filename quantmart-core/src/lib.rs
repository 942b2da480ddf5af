//! QuantMart core — the normalization-and-load pipeline for daily market data.
//!
//! This crate contains the heart of the warehouse pipeline:
//! - Raw dataset representation and column flattening (`reshape::flatten`)
//! - Long-format normalization of wide API responses (`reshape::normalize`)
//! - Raw-identifier to canonical metric-name mapping (`metrics`)
//! - Parquet staging between extract and load (`stage`)
//! - Coinbase / Yahoo chart fetchers (`fetch`)
//! - Warehouse schema management and upsert loading (`warehouse`)
//!
//! Data flow: fetcher → `RawTable` → flatten → normalize → stage → load.
//! The warehouse is a single DuckDB file with one dimension table
//! (`dim_asset`) and two fact tables (`fact_prices_daily`,
//! `fact_macro_market_daily`).

pub mod domain;
pub mod fetch;
pub mod metrics;
pub mod reshape;
pub mod stage;
pub mod warehouse;

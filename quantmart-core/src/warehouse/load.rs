//! Upsert loading: merge normalized frames into the warehouse.
//!
//! Each load is one transaction: ensure schema, stage the batch into a
//! temporary relation, upsert the dimension, upsert the fact, drop the
//! stage, commit. The dimension upsert must complete before the fact
//! upsert so the fact table's foreign key holds at every point a row is
//! inserted. Any failure before commit rolls the whole load back.

use super::schema::ensure_schema;
use super::WarehouseError;
use crate::domain::{MacroRecord, PriceRecord};
use crate::reshape::frame::{macro_records, price_records};
use duckdb::{params, Connection};
use polars::prelude::DataFrame;
use std::collections::BTreeSet;

/// What a load call merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    /// Distinct entities (symbols or metrics) in the batch.
    pub entities: usize,
    /// Fact rows staged and merged.
    pub rows: usize,
}

/// Merge a canonical price frame into `dim_asset` + `fact_prices_daily`.
///
/// Every distinct symbol is upserted into the dimension with the given
/// `asset_type` (last write wins on conflict); every row is upserted into
/// the fact table keyed on (date, symbol), overwriting all non-key
/// columns on conflict. Currency is fixed to USD. A frame without an
/// `adj_close` column loads with nulls substituted.
pub fn load_prices(
    conn: &mut Connection,
    frame: &DataFrame,
    asset_type: &str,
) -> Result<LoadSummary, WarehouseError> {
    let records = price_records(frame)?;
    if records.is_empty() {
        return Err(WarehouseError::EmptyBatch);
    }
    // A single merge statement cannot update the same target row twice,
    // so an in-batch duplicate key is rejected up front. The normalizer's
    // first-wins pivot guarantees this never fires on the normal path.
    let mut symbols = BTreeSet::new();
    let mut keys = BTreeSet::new();
    for r in &records {
        symbols.insert(r.symbol.as_str());
        if !keys.insert((r.date, r.symbol.as_str())) {
            return Err(WarehouseError::DuplicateKey {
                key: format!("({}, {})", r.date, r.symbol),
            });
        }
    }
    let entities = symbols.len();

    let tx = conn.transaction()?;
    ensure_schema(&tx)?;
    stage_prices(&tx, &records)?;

    // Dimension first: the fact FK must hold when fact rows land.
    tx.execute(
        "INSERT INTO dim_asset (symbol, asset_type, source)
         SELECT DISTINCT symbol, ? AS asset_type, source
         FROM stg_prices
         ON CONFLICT (symbol) DO UPDATE SET
             asset_type = EXCLUDED.asset_type,
             source = EXCLUDED.source",
        params![asset_type],
    )?;

    tx.execute_batch(
        "INSERT INTO fact_prices_daily (
            date, symbol, open, high, low, close, adj_close, volume, currency, source
         )
         SELECT
             CAST(date AS DATE) AS date,
             symbol,
             open, high, low, close,
             adj_close,
             volume,
             'USD' AS currency,
             source
         FROM stg_prices
         ON CONFLICT (date, symbol) DO UPDATE SET
             open = EXCLUDED.open,
             high = EXCLUDED.high,
             low = EXCLUDED.low,
             close = EXCLUDED.close,
             adj_close = EXCLUDED.adj_close,
             volume = EXCLUDED.volume,
             currency = EXCLUDED.currency,
             source = EXCLUDED.source;

         DROP TABLE stg_prices;",
    )?;

    tx.commit()?;
    Ok(LoadSummary {
        entities,
        rows: records.len(),
    })
}

/// Merge a canonical macro frame into `fact_macro_market_daily`.
///
/// Structurally the same as the price load with no dimension table;
/// the composite key is (date, metric).
pub fn load_macro(
    conn: &mut Connection,
    frame: &DataFrame,
) -> Result<LoadSummary, WarehouseError> {
    let records = macro_records(frame)?;
    if records.is_empty() {
        return Err(WarehouseError::EmptyBatch);
    }
    let mut metrics = BTreeSet::new();
    let mut keys = BTreeSet::new();
    for r in &records {
        metrics.insert(r.metric.as_str());
        if !keys.insert((r.date, r.metric.as_str())) {
            return Err(WarehouseError::DuplicateKey {
                key: format!("({}, {})", r.date, r.metric),
            });
        }
    }
    let entities = metrics.len();

    let tx = conn.transaction()?;
    ensure_schema(&tx)?;
    stage_macro(&tx, &records)?;

    tx.execute_batch(
        "INSERT INTO fact_macro_market_daily (date, metric, value, source)
         SELECT CAST(date AS DATE), metric, value, source
         FROM stg_macro_mkt
         ON CONFLICT (date, metric) DO UPDATE SET
             value = EXCLUDED.value,
             source = EXCLUDED.source;

         DROP TABLE stg_macro_mkt;",
    )?;

    tx.commit()?;
    Ok(LoadSummary {
        entities,
        rows: records.len(),
    })
}

// ── Staging ─────────────────────────────────────────────────────────

/// Dates are staged as ISO text and cast to DATE in the merge, which
/// keeps the staging relation trivially appendable.
fn stage_prices(tx: &Connection, records: &[PriceRecord]) -> Result<(), WarehouseError> {
    tx.execute_batch(
        "CREATE TEMPORARY TABLE stg_prices (
            date TEXT,
            symbol TEXT,
            open DOUBLE,
            high DOUBLE,
            low DOUBLE,
            close DOUBLE,
            adj_close DOUBLE,
            volume DOUBLE,
            source TEXT
        );",
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO stg_prices VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for r in records {
        stmt.execute(params![
            r.date.to_string(),
            r.symbol,
            r.open,
            r.high,
            r.low,
            r.close,
            r.adj_close,
            r.volume,
            r.source,
        ])?;
    }
    Ok(())
}

fn stage_macro(tx: &Connection, records: &[MacroRecord]) -> Result<(), WarehouseError> {
    tx.execute_batch(
        "CREATE TEMPORARY TABLE stg_macro_mkt (
            date TEXT,
            metric TEXT,
            value DOUBLE,
            source TEXT
        );",
    )?;
    let mut stmt = tx.prepare("INSERT INTO stg_macro_mkt VALUES (?, ?, ?, ?)")?;
    for r in records {
        stmt.execute(params![r.date.to_string(), r.metric, r.value, r.source])?;
    }
    Ok(())
}

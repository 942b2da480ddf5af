//! Warehouse schema: one dimension table, two fact tables.

use super::WarehouseError;
use duckdb::Connection;

/// Ensure the warehouse tables exist.
///
/// Create-if-not-exists only: existing tables are never altered or
/// dropped, so this is safe to call at the start of every run (and the
/// loader does exactly that).
pub fn ensure_schema(conn: &Connection) -> Result<(), WarehouseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dim_asset (
            symbol TEXT PRIMARY KEY,
            asset_type TEXT,
            source TEXT
        );

        CREATE TABLE IF NOT EXISTS fact_prices_daily (
            date DATE,
            symbol TEXT,
            open DOUBLE,
            high DOUBLE,
            low DOUBLE,
            close DOUBLE,
            adj_close DOUBLE,
            volume DOUBLE,
            currency TEXT,
            source TEXT,
            PRIMARY KEY (date, symbol),
            FOREIGN KEY (symbol) REFERENCES dim_asset(symbol)
        );

        CREATE TABLE IF NOT EXISTS fact_macro_market_daily (
            date DATE,
            metric TEXT,
            value DOUBLE,
            source TEXT,
            PRIMARY KEY (date, metric)
        );",
    )?;
    Ok(())
}

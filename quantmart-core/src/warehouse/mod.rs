//! Warehouse: DuckDB schema management and upsert loading.

pub mod load;
pub mod schema;

pub use load::{load_macro, load_prices, LoadSummary};
pub use schema::ensure_schema;

use crate::reshape::ReshapeError;
use thiserror::Error;

/// Persistence-layer errors. Any failure inside a load transaction rolls
/// the whole load back; no partial dimension/fact state survives.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("database error: {0}")]
    Db(#[from] duckdb::Error),

    #[error("staged dataset has no rows")]
    EmptyBatch,

    #[error("staged dataset is malformed: {0}")]
    Batch(#[from] ReshapeError),

    #[error("duplicate composite key in staged dataset: {key}")]
    DuplicateKey { key: String },
}

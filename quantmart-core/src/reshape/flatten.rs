//! Column flattening for two-level-keyed upstream responses.
//!
//! Multi-ticker chart APIs hand back a (field × instrument) column grid,
//! e.g. `(Close, FBTC)`, `(Volume, IBIT)`, with the temporal column keyed
//! `(Date, "")`. Whether a response is flat or hierarchical is decided once
//! at the ingestion boundary by constructing the matching `RawTable`
//! variant; nothing downstream ever re-inspects column shape.

use super::ReshapeError;
use polars::prelude::*;

/// Join delimiter for flattened column names.
///
/// Double underscore, because field and symbol names may legitimately
/// contain single underscores.
pub const FIELD_JOIN: &str = "__";

/// A raw tabular dataset as handed over by an extraction collaborator.
#[derive(Debug, Clone)]
pub enum RawTable {
    /// Columns are already single-level names.
    Flat(DataFrame),

    /// Columns carry a two-level `(outer, inner)` key, one pair per column
    /// in frame order. Missing key components are empty strings.
    Hierarchical {
        frame: DataFrame,
        keys: Vec<(String, String)>,
    },
}

impl RawTable {
    /// Number of rows in the underlying frame.
    pub fn height(&self) -> usize {
        match self {
            RawTable::Flat(frame) => frame.height(),
            RawTable::Hierarchical { frame, .. } => frame.height(),
        }
    }

    /// Collapse two-level column keys into single-level names.
    ///
    /// Flat input is returned unchanged, so flattening is idempotent.
    pub fn flatten(self) -> Result<DataFrame, ReshapeError> {
        match self {
            RawTable::Flat(frame) => Ok(frame),
            RawTable::Hierarchical { frame, keys } => {
                if keys.len() != frame.width() {
                    return Err(ReshapeError::ShapeMismatch {
                        expected: format!(
                            "{} column keys, got {}",
                            frame.width(),
                            keys.len()
                        ),
                        observed: column_names(&frame),
                    });
                }
                let columns = frame
                    .get_columns()
                    .iter()
                    .zip(&keys)
                    .map(|(col, (outer, inner))| {
                        let mut col = col.clone();
                        col.rename(flat_name(outer, inner).into());
                        col
                    })
                    .collect::<Vec<_>>();
                DataFrame::new(columns).map_err(|e| ReshapeError::Frame(e.to_string()))
            }
        }
    }
}

/// The join rule: `(Close, "ABC")` → `"Close__ABC"`, `(Date, "")` → `"Date"`.
///
/// A blank or "nan"-like inner key marks a single-level column (the
/// temporal/index column in practice).
pub fn flat_name(outer: &str, inner: &str) -> String {
    let inner = inner.trim();
    if inner.is_empty() || inner.eq_ignore_ascii_case("nan") {
        outer.to_string()
    } else {
        format!("{outer}{FIELD_JOIN}{inner}")
    }
}

/// Build a column key from possibly-missing components.
///
/// Upstream key tuples can have null halves; both are normalized to empty
/// strings here so the flattener never has to handle absence.
pub fn column_key(outer: Option<&str>, inner: Option<&str>) -> (String, String) {
    (
        outer.unwrap_or_default().to_string(),
        inner.unwrap_or_default().to_string(),
    )
}

pub(crate) fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

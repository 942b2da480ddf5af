//! Parquet staging between extract and load.
//!
//! Extract and load run as separate batch steps; the handoff is a parquet
//! file plus a JSON metadata sidecar (`{stem}.meta.json`). Writes are
//! atomic: the frame goes to a `.tmp` path first and is renamed into
//! place, so a crashed extract never leaves a half-written staging file
//! for the loader to trip over.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("staging I/O error: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("staged file {} has no rows", .0.display())]
    Empty(PathBuf),

    #[error("sidecar error: {0}")]
    Meta(String),
}

/// Metadata sidecar written next to each staged parquet file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMeta {
    pub rows: usize,
    pub columns: Vec<String>,
    /// blake3 hash of the parquet bytes, for integrity checks downstream.
    pub data_hash: String,
    pub staged_at: chrono::NaiveDateTime,
}

/// Write a normalized frame to a staging path, atomically, with sidecar.
pub fn write_staged(frame: &DataFrame, path: &Path) -> Result<StageMeta, StageError> {
    if frame.height() == 0 {
        return Err(StageError::Empty(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StageError::Io(format!("create staging dir: {e}")))?;
    }

    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|e| StageError::Io(format!("create {}: {e}", tmp_path.display())))?;
    ParquetWriter::new(file)
        .finish(&mut frame.clone())
        .map_err(|e| StageError::Parquet(format!("write {}: {e}", tmp_path.display())))?;

    let bytes = fs::read(&tmp_path)
        .map_err(|e| StageError::Io(format!("hash {}: {e}", tmp_path.display())))?;
    let meta = StageMeta {
        rows: frame.height(),
        columns: frame
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        data_hash: blake3::hash(&bytes).to_hex().to_string(),
        staged_at: chrono::Local::now().naive_local(),
    };

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StageError::Io(format!("atomic rename failed: {e}"))
    })?;

    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| StageError::Meta(format!("serialize: {e}")))?;
    fs::write(meta_path(path), meta_json)
        .map_err(|e| StageError::Meta(format!("write sidecar: {e}")))?;

    Ok(meta)
}

/// Read a staged parquet file back, rejecting empty files.
pub fn read_staged(path: &Path) -> Result<DataFrame, StageError> {
    let file = fs::File::open(path)
        .map_err(|e| StageError::Io(format!("open {}: {e}", path.display())))?;
    let frame = ParquetReader::new(file)
        .finish()
        .map_err(|e| StageError::Parquet(format!("read {}: {e}", path.display())))?;
    if frame.height() == 0 {
        return Err(StageError::Empty(path.to_path_buf()));
    }
    Ok(frame)
}

/// Read the metadata sidecar for a staged file, if present.
pub fn read_meta(path: &Path) -> Option<StageMeta> {
    let content = fs::read_to_string(meta_path(path)).ok()?;
    serde_json::from_str(&content).ok()
}

fn meta_path(path: &Path) -> PathBuf {
    path.with_extension("meta.json")
}

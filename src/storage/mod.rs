// src/storage/mod.rs
pub mod filings;
pub mod models;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::StorageError;

pub use filings::{FilingStore, StoredFiling};

/// A row type that is persisted as a CSV table.
///
/// `COLUMNS` must list the serialized field names in declaration order; it is
/// written as the header when a table has no rows.
pub trait Tabular {
    const COLUMNS: &'static [&'static str];
}

/// Reads and writes the pipeline's JSON stores and CSV tables under one directory.
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Loads a JSON document. A missing file is not an error: it is logged and
    /// the empty value is returned so later stages run on reduced data.
    pub fn load_json<T>(&self, name: &str) -> Result<T, StorageError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(name);
        if !path.exists() {
            tracing::warn!("{} not found, continuing with empty data", path.display());
            return Ok(T::default());
        }

        let raw = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            StorageError::SerializationError(format!("{}: {}", path.display(), e))
        })?;
        tracing::info!("Loaded {}", path.display());
        Ok(value)
    }

    /// Writes pretty-printed JSON, replacing any previous file.
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.path(name);

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, json).map_err(StorageError::IoError)?;

        tracing::info!("Saved {}", file_path.display());
        Ok(file_path)
    }

    /// Writes a table with a header row; an empty table still gets its header.
    pub fn save_csv<T>(&self, name: &str, rows: &[T]) -> Result<PathBuf, StorageError>
    where
        T: Serialize + Tabular,
    {
        let file_path = self.path(name);
        let mut writer = csv::Writer::from_path(&file_path)?;

        if rows.is_empty() {
            writer.write_record(T::COLUMNS)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(StorageError::IoError)?;

        tracing::info!("Saved {} rows to {}", rows.len(), file_path.display());
        Ok(file_path)
    }

    /// Reads a table written by [`save_csv`](Self::save_csv). A missing file
    /// yields an empty table.
    pub fn load_csv<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StorageError> {
        let path = self.path(name);
        if !path.exists() {
            tracing::warn!("{} not found, continuing with an empty table", path.display());
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let rows = reader.deserialize().collect::<Result<Vec<T>, csv::Error>>()?;
        tracing::info!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

//! Data sources and the per-path series cache.

use super::series::TimeSeries;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from loading or validating a time series.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognised timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row} goes back in time")]
    NotSorted { row: usize },

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("series is empty")]
    Empty,
}

/// Where a series comes from.
#[derive(Debug, Clone)]
pub enum SeriesSource {
    /// CSV file with Date/Open/High/Low/Close columns.
    Csv(PathBuf),
    /// Already-loaded rows (tests, synthetic data, embedding hosts).
    Memory(Arc<TimeSeries>),
}

impl SeriesSource {
    pub fn csv(path: impl Into<PathBuf>) -> Self {
        SeriesSource::Csv(path.into())
    }

    pub fn memory(series: TimeSeries) -> Self {
        SeriesSource::Memory(Arc::new(series))
    }

    /// Short human-readable label for logs.
    pub fn label(&self) -> String {
        match self {
            SeriesSource::Csv(path) => path.display().to_string(),
            SeriesSource::Memory(series) => format!("memory:{}", series.fingerprint().short()),
        }
    }
}

/// Loaded series keyed by canonical path.
///
/// Reconfiguring with the same path reuses the loaded rows instead of
/// parsing the file again.
#[derive(Debug, Default)]
pub struct SeriesCache {
    loaded: HashMap<PathBuf, Arc<TimeSeries>>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a source to loaded rows. Empty series are rejected.
    pub fn load(&mut self, source: &SeriesSource) -> Result<Arc<TimeSeries>, DataError> {
        let series = match source {
            SeriesSource::Memory(series) => Arc::clone(series),
            SeriesSource::Csv(path) => self.load_csv(path)?,
        };
        if series.is_empty() {
            return Err(DataError::Empty);
        }
        Ok(series)
    }

    fn load_csv(&mut self, path: &Path) -> Result<Arc<TimeSeries>, DataError> {
        let key = path.canonicalize().map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(series) = self.loaded.get(&key) {
            tracing::debug!(path = %key.display(), "series cache hit");
            return Ok(Arc::clone(series));
        }
        let series = Arc::new(super::csv::read_csv(&key)?);
        tracing::info!(
            path = %key.display(),
            rows = series.len(),
            fingerprint = %series.fingerprint().short(),
            "loaded series"
        );
        self.loaded.insert(key, Arc::clone(&series));
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}

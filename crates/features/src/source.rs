//! The series-source contract between the analytics engine and stored data.

use std::cell::RefCell;
use std::collections::HashMap;

use glci_config::Registry;
use glci_primitives::Date;
use glci_storage::DataStore;
use glci_transforms::{DATE_COL, VALUE_COL, date_values, numeric_values, series_frame};
use polars::prelude::DataFrame;

/// Errors surfaced by a series source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The series is not configured.
    #[error("series '{0}' not found in configuration")]
    NotFound(String),

    /// The series is configured but no data is available for the window.
    #[error("series '{series}' unavailable: {reason}")]
    Unavailable {
        /// Configured series id.
        series: String,
        /// Why the series could not be served.
        reason: String,
    },

    /// The underlying table is malformed.
    #[error("series '{series}' has invalid data: {reason}")]
    InvalidData {
        /// Configured series id.
        series: String,
        /// What is wrong with the table.
        reason: String,
    },
}

/// Serves `(date, value)` tables for configured series ids.
///
/// Implementations must return rows sorted by date with no duplicates. The
/// analytics engine depends only on this contract, never on how the rows were
/// obtained.
pub trait SeriesSource {
    /// Fetch a series restricted to the `[start, end]` window (either bound
    /// may be open).
    fn series(
        &self,
        series_id: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, SourceError>;
}

/// Source backed by raw artifacts in the store.
///
/// This is what the batch pipeline uses: the fetcher has already landed raw
/// artifacts, and analytics reads them back through the registry's
/// `series id -> source` mapping.
#[derive(Debug)]
pub struct StoreSource<'a> {
    registry: &'a Registry,
    store: &'a DataStore,
}

impl<'a> StoreSource<'a> {
    /// Source reading raw artifacts resolved through `registry`.
    #[must_use]
    pub const fn new(registry: &'a Registry, store: &'a DataStore) -> Self {
        Self { registry, store }
    }
}

impl SeriesSource for StoreSource<'_> {
    fn series(
        &self,
        series_id: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, SourceError> {
        let cfg = self
            .registry
            .series(series_id)
            .map_err(|_| SourceError::NotFound(series_id.to_string()))?;

        let loaded = self
            .store
            .load_raw(&cfg.source, series_id)
            .map_err(|e| SourceError::Unavailable {
                series: series_id.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| SourceError::Unavailable {
                series: series_id.to_string(),
                reason: "no raw artifact".to_string(),
            })?;

        window_series(&loaded, series_id, start, end)
    }
}

/// In-memory source, mainly for tests and offline experiments.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<String, DataFrame>,
}

impl MemorySource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `(date, value)` table for a series id.
    pub fn insert(&mut self, series_id: impl Into<String>, df: DataFrame) {
        self.tables.insert(series_id.into(), df);
    }
}

impl SeriesSource for MemorySource {
    fn series(
        &self,
        series_id: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, SourceError> {
        let df = self
            .tables
            .get(series_id)
            .ok_or_else(|| SourceError::NotFound(series_id.to_string()))?;
        window_series(df, series_id, start, end)
    }
}

/// Memoizing wrapper keyed by `(series, start, end)`.
///
/// Scoped to one orchestrator run: build it, run the pipeline, drop it.
/// Holding one at process scope would serve stale data across runs.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    cache: RefCell<HashMap<(String, Option<Date>, Option<Date>), DataFrame>>,
}

impl<S: SeriesSource> CachedSource<S> {
    /// Wrap a source with a per-run cache.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner, cache: RefCell::new(HashMap::new()) }
    }

    /// Number of cached windows.
    #[must_use]
    pub fn cached_windows(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<S: SeriesSource> SeriesSource for CachedSource<S> {
    fn series(
        &self,
        series_id: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, SourceError> {
        let key = (series_id.to_string(), start, end);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let df = self.inner.series(series_id, start, end)?;
        self.cache.borrow_mut().insert(key, df.clone());
        Ok(df)
    }
}

/// Restrict a table to `[start, end]`, sort by date, and keep `(date, value)`.
fn window_series(
    df: &DataFrame,
    series_id: &str,
    start: Option<Date>,
    end: Option<Date>,
) -> Result<DataFrame, SourceError> {
    let invalid = |reason: String| SourceError::InvalidData {
        series: series_id.to_string(),
        reason,
    };

    let dates = date_values(df, DATE_COL).map_err(|e| invalid(e.to_string()))?;
    let values = numeric_values(df, VALUE_COL).map_err(|e| invalid(e.to_string()))?;

    let mut rows: Vec<(Date, f64)> = dates
        .into_iter()
        .zip(values)
        .filter(|(d, _)| start.is_none_or(|s| *d >= s) && end.is_none_or(|e| *d <= e))
        .collect();
    rows.sort_by_key(|(d, _)| *d);

    let (out_dates, out_values): (Vec<Date>, Vec<f64>) = rows.into_iter().unzip();
    series_frame(&out_dates, &out_values).map_err(|e| invalid(e.to_string()))
}

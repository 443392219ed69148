//! The two-tier artifact store.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glci_primitives::Date;
use glci_transforms::{DATE_COL, date_values};
use polars::prelude::*;
use tracing::debug;

use crate::StorageError;

/// One committed artifact, as reported by the list operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Source (raw tier) or category (curated tier).
    pub group: String,
    /// Artifact name (sanitized series id or dataset name).
    pub name: String,
    /// Path of the committed parquet file.
    pub path: PathBuf,
    /// Last modification time of the committed file.
    pub modified: Option<DateTime<Utc>>,
}

/// Handle to the raw and curated artifact trees.
///
/// The fetcher owns the raw tier and the analytics engine owns the curated
/// tier. All writes are temp-file + fsync + rename, so concurrent readers
/// only ever see committed files; no lock service is involved.
#[derive(Debug, Clone)]
pub struct DataStore {
    raw_root: PathBuf,
    curated_root: PathBuf,
}

impl DataStore {
    /// Open (creating if necessary) the store rooted at `data_root`.
    pub fn open(data_root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let raw_root = data_root.as_ref().join("raw");
        let curated_root = data_root.as_ref().join("curated");
        fs::create_dir_all(&raw_root)?;
        fs::create_dir_all(&curated_root)?;
        Ok(Self { raw_root, curated_root })
    }

    /// Root of the raw tier.
    #[must_use]
    pub fn raw_root(&self) -> &Path {
        &self.raw_root
    }

    /// Root of the curated tier.
    #[must_use]
    pub fn curated_root(&self) -> &Path {
        &self.curated_root
    }

    // ---- raw tier -----------------------------------------------------

    /// Write a raw series table, replacing any existing artifact.
    pub fn save_raw(
        &self,
        df: &DataFrame,
        source: &str,
        series_id: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self.raw_path(source, series_id);
        write_parquet_atomic(&path, df)?;
        debug!(source, series_id, rows = df.height(), "saved raw artifact");
        Ok(path)
    }

    /// Load a raw series table, or `None` when it was never written.
    pub fn load_raw(
        &self,
        source: &str,
        series_id: &str,
    ) -> Result<Option<DataFrame>, StorageError> {
        read_parquet_opt(&self.raw_path(source, series_id))
    }

    /// Append rows to a raw series, deduplicating on the date key.
    ///
    /// When both the existing artifact and the delta carry a row for the same
    /// date, the delta's row wins (it carries the later `fetched_at`). Rows
    /// come out sorted by date.
    pub fn append_raw(
        &self,
        delta: &DataFrame,
        source: &str,
        series_id: &str,
    ) -> Result<PathBuf, StorageError> {
        let merged = match self.load_raw(source, series_id)? {
            Some(existing) => {
                let mut combined = existing;
                combined.vstack_mut(delta)?;
                dedup_by_date_keep_last(&combined)?
            }
            None => dedup_by_date_keep_last(delta)?,
        };
        self.save_raw(&merged, source, series_id)
    }

    /// List committed raw artifacts, optionally restricted to one source.
    pub fn list_raw_series(
        &self,
        source: Option<&str>,
    ) -> Result<Vec<ArtifactEntry>, StorageError> {
        list_tier(&self.raw_root, source)
    }

    /// Latest date present in a raw series, when the artifact exists.
    pub fn get_latest_date(
        &self,
        source: &str,
        series_id: &str,
    ) -> Result<Option<Date>, StorageError> {
        Ok(self.get_date_range(source, series_id)?.map(|(_, last)| last))
    }

    /// First and last dates of a raw series, when the artifact exists.
    pub fn get_date_range(
        &self,
        source: &str,
        series_id: &str,
    ) -> Result<Option<(Date, Date)>, StorageError> {
        let Some(df) = self.load_raw(source, series_id)? else {
            return Ok(None);
        };
        let dates = date_values(&df, DATE_COL)
            .map_err(|e| StorageError::InvalidTable(e.to_string()))?;
        Ok(dates
            .iter()
            .min()
            .zip(dates.iter().max())
            .map(|(first, last)| (*first, *last)))
    }

    // ---- curated tier -------------------------------------------------

    /// Write a curated table with optional metadata.
    ///
    /// Metadata gets a `saved_at` stamp and lands as a `{name}_meta.json`
    /// sibling, written with the same atomicity as the body.
    pub fn save_curated(
        &self,
        df: &DataFrame,
        category: &str,
        name: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<PathBuf, StorageError> {
        let path = self.curated_path(category, name);
        write_parquet_atomic(&path, df)?;

        if let Some(meta) = metadata {
            let mut stamped = meta.clone();
            if let Some(obj) = stamped.as_object_mut() {
                obj.insert(
                    "saved_at".to_string(),
                    serde_json::Value::String(Utc::now().to_rfc3339()),
                );
            }
            let meta_path = self.curated_meta_path(category, name);
            write_json_atomic(&meta_path, &stamped)?;
        }
        debug!(category, name, rows = df.height(), "saved curated artifact");
        Ok(path)
    }

    /// Load a curated table, or `None` when it was never written.
    pub fn load_curated(
        &self,
        category: &str,
        name: &str,
    ) -> Result<Option<DataFrame>, StorageError> {
        read_parquet_opt(&self.curated_path(category, name))
    }

    /// Load the metadata sibling of a curated table, when present.
    pub fn load_curated_metadata(
        &self,
        category: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        let path = self.curated_meta_path(category, name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// List committed curated artifacts, optionally restricted to a category.
    pub fn list_curated(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<ArtifactEntry>, StorageError> {
        list_tier(&self.curated_root, category)
    }

    /// Write a free-standing JSON artifact into a curated category.
    pub fn save_curated_json(
        &self,
        category: &str,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.curated_root.join(sanitize_id(category));
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", sanitize_id(name)));
        write_json_atomic(&path, payload)?;
        Ok(path)
    }

    /// Load a free-standing JSON artifact from a curated category.
    pub fn load_curated_json(
        &self,
        category: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        let path =
            self.curated_root.join(sanitize_id(category)).join(format!("{}.json", sanitize_id(name)));
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn raw_path(&self, source: &str, series_id: &str) -> PathBuf {
        self.raw_root.join(sanitize_id(source)).join(format!("{}.parquet", sanitize_id(series_id)))
    }

    fn curated_path(&self, category: &str, name: &str) -> PathBuf {
        self.curated_root.join(sanitize_id(category)).join(format!("{}.parquet", sanitize_id(name)))
    }

    fn curated_meta_path(&self, category: &str, name: &str) -> PathBuf {
        self.curated_root
            .join(sanitize_id(category))
            .join(format!("{}_meta.json", sanitize_id(name)))
    }
}

/// Replace path-hostile characters in an artifact id.
fn sanitize_id(id: &str) -> String {
    id.replace([':', '/'], "_")
}

/// Keep the last row for each date, sorted ascending by date.
fn dedup_by_date_keep_last(df: &DataFrame) -> Result<DataFrame, StorageError> {
    let dates =
        date_values(df, DATE_COL).map_err(|e| StorageError::InvalidTable(e.to_string()))?;

    // Last occurrence of each date wins.
    let mut keep: std::collections::BTreeMap<Date, usize> = std::collections::BTreeMap::new();
    for (i, date) in dates.iter().enumerate() {
        keep.insert(*date, i);
    }
    let indices: Vec<u32> = keep.values().map(|&i| i as u32).collect();
    let idx = IdxCa::from_vec("idx".into(), indices);
    Ok(df.take(&idx)?)
}

fn write_parquet_atomic(path: &Path, df: &DataFrame) -> Result<(), StorageError> {
    let dir = path.parent().ok_or_else(|| {
        StorageError::InvalidTable(format!("artifact path has no parent: {}", path.display()))
    })?;
    fs::create_dir_all(dir)?;

    let tmp = temp_sibling(path);
    let file = File::create(&tmp)?;
    let mut body = df.clone();
    ParquetWriter::new(&file).finish(&mut body)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json_atomic(path: &Path, payload: &serde_json::Value) -> Result<(), StorageError> {
    let dir = path.parent().ok_or_else(|| {
        StorageError::InvalidTable(format!("artifact path has no parent: {}", path.display()))
    })?;
    fs::create_dir_all(dir)?;

    let tmp = temp_sibling(path);
    let file = File::create(&tmp)?;
    serde_json::to_writer_pretty(&file, payload)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Temp path in the same directory, so the final rename stays on one
/// filesystem.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn read_parquet_opt(path: &Path) -> Result<Option<DataFrame>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    Ok(Some(ParquetReader::new(file).finish()?))
}

fn list_tier(root: &Path, group: Option<&str>) -> Result<Vec<ArtifactEntry>, StorageError> {
    let mut entries = Vec::new();
    let groups: Vec<PathBuf> = match group {
        Some(g) => vec![root.join(sanitize_id(g))],
        None => {
            let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            dirs.sort();
            dirs
        }
    };

    for dir in groups {
        if !dir.is_dir() {
            continue;
        }
        let group_name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            // Temp files start with a dot and are never listed.
            .filter(|p| {
                p.file_name().is_some_and(|n| !n.to_string_lossy().starts_with('.'))
            })
            .collect();
        files.sort();

        for path in files {
            let name =
                path.file_stem().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            entries.push(ArtifactEntry { group: group_name.clone(), name, path, modified });
        }
    }
    Ok(entries)
}

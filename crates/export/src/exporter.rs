//! The static API tree writer.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;
use glci_config::{GLCI_INDEX_ID, IndexConfig, Registry, SeriesType};
use glci_primitives::{Date, Regime};
use glci_storage::DataStore;
use glci_transforms::{DATE_COL, date_values, numeric_values};
use polars::prelude::DataFrame;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    ExportError,
    payload::{
        DataPoint, FreshnessItem, GlciLatest, GlciPayload, IndexPayload, IndexSummary,
        PillarSlice, RegimePeriod, SeriesLatest, SeriesPayload, SeriesSummary,
    },
};

/// Days after which a composite component counts as stale.
const FRESHNESS_STALE_DAYS: i64 = 14;

/// Observations looked back for the series "change" field.
const CHANGE_LOOKBACK: usize = 7;

/// What the export run accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStatus {
    /// Series endpoints written.
    pub series_written: usize,
    /// Series skipped for missing raw data.
    pub series_skipped: usize,
    /// Index endpoints written.
    pub indices_written: usize,
    /// Whether the composite endpoints were written.
    pub glci_written: bool,
    /// Whether the risk endpoints were written.
    pub risk_written: bool,
}

/// Writes the API tree from configured series and curated artifacts.
///
/// Every endpoint path maps to `<path>.json` on disk, so list endpoints and
/// their children can coexist as a file next to a directory. Writes are
/// temp-file + rename; an endpoint whose inputs are missing is skipped
/// without error.
#[derive(Debug)]
pub struct JsonExporter<'a> {
    registry: &'a Registry,
    store: &'a DataStore,
    output_root: PathBuf,
}

impl<'a> JsonExporter<'a> {
    /// Exporter writing under `output_root` (typically `export/latest`).
    pub fn new(registry: &'a Registry, store: &'a DataStore, output_root: impl AsRef<Path>) -> Self {
        Self { registry, store, output_root: output_root.as_ref().to_path_buf() }
    }

    /// Export the whole tree; optionally snapshot it by date afterwards.
    pub fn export_all(&self, snapshot: bool) -> Result<ExportStatus, ExportError> {
        let mut status = ExportStatus::default();

        self.export_series_list()?;
        for (series_id, _) in self.registry.all_series() {
            if self.export_single_series(series_id)? {
                status.series_written += 1;
            } else {
                status.series_skipped += 1;
            }
        }

        self.export_indices_list()?;
        for (index_id, cfg) in self.registry.all_indices() {
            if matches!(cfg, IndexConfig::Arithmetic { .. })
                && self.export_single_index(index_id)?
            {
                status.indices_written += 1;
            }
        }

        status.glci_written = self.export_glci()?;
        if status.glci_written {
            self.export_freshness()?;
        }
        status.risk_written = self.export_risk()?;

        if snapshot {
            self.snapshot()?;
        }

        info!(
            series = status.series_written,
            skipped = status.series_skipped,
            indices = status.indices_written,
            glci = status.glci_written,
            risk = status.risk_written,
            "export complete"
        );
        Ok(status)
    }

    fn export_series_list(&self) -> Result<(), ExportError> {
        let items: Vec<SeriesSummary> = self
            .registry
            .all_series()
            .map(|(id, cfg)| SeriesSummary {
                id: id.to_string(),
                name: if cfg.description.is_empty() {
                    id.to_string()
                } else {
                    cfg.description.clone()
                },
                source: cfg.source.to_uppercase(),
                category: category_label(cfg.series_type).to_string(),
                frequency: cfg.frequency.to_string(),
                unit: cfg.unit.clone(),
            })
            .collect();
        self.write_endpoint("api/series", &items)
    }

    fn export_single_series(&self, series_id: &str) -> Result<bool, ExportError> {
        let Ok(cfg) = self.registry.series(series_id) else {
            return Ok(false);
        };
        let Some(df) = self.store.load_raw(&cfg.source, series_id)? else {
            return Ok(false);
        };
        let (dates, values) = sorted_rows(&df, "value")?;
        let data = data_points(&dates, &values);
        if data.is_empty() {
            return Ok(false);
        }

        let payload = SeriesPayload {
            id: series_id.to_string(),
            name: if cfg.description.is_empty() {
                series_id.to_string()
            } else {
                cfg.description.clone()
            },
            source: cfg.source.to_uppercase(),
            unit: cfg.unit.clone(),
            data,
        };
        self.write_endpoint(&format!("api/series/{series_id}"), &payload)?;

        let last = payload.data.len() - 1;
        let change = if payload.data.len() > CHANGE_LOOKBACK {
            let prev = payload.data[last - CHANGE_LOOKBACK].value;
            if prev != 0.0 {
                round2((payload.data[last].value - prev) / prev * 100.0)
            } else {
                0.0
            }
        } else {
            0.0
        };
        let latest = SeriesLatest {
            id: series_id.to_string(),
            date: payload.data[last].date.clone(),
            value: payload.data[last].value,
            change,
            unit: cfg.unit.clone(),
        };
        self.write_endpoint(&format!("api/series/{series_id}/latest"), &latest)?;
        Ok(true)
    }

    fn export_indices_list(&self) -> Result<(), ExportError> {
        let items: Vec<IndexSummary> = self
            .registry
            .all_indices()
            .map(|(id, cfg)| IndexSummary {
                id: id.to_string(),
                name: title_case(id),
                description: cfg.description().to_string(),
                frequency: cfg.frequency().to_string(),
                components: cfg.component_count(),
            })
            .collect();
        self.write_endpoint("api/indices", &items)
    }

    fn export_single_index(&self, index_id: &str) -> Result<bool, ExportError> {
        let Some(df) = self.store.load_curated("indices", index_id)? else {
            return Ok(false);
        };
        let (dates, values) = sorted_rows(&df, "value")?;
        let data = data_points(&dates, &values);
        if data.is_empty() {
            return Ok(false);
        }

        let description = self
            .registry
            .index(index_id)
            .map(|cfg| cfg.description().to_string())
            .unwrap_or_default();
        let payload = IndexPayload {
            id: index_id.to_string(),
            name: title_case(index_id),
            description,
            data,
        };
        self.write_endpoint(&format!("api/indices/{index_id}"), &payload)?;
        Ok(true)
    }

    fn export_glci(&self) -> Result<bool, ExportError> {
        let Some(glci) = self.store.load_curated("indices", "glci")? else {
            return Ok(false);
        };
        let Some(pillars) = self.store.load_curated("indices", "glci_pillars")? else {
            return Ok(false);
        };
        let Some(weights) = self.store.load_curated_json("indices", "glci_weights")? else {
            return Ok(false);
        };
        if glci.height() == 0 || pillars.height() == 0 {
            return Ok(false);
        }

        let dates = date_values(&glci, DATE_COL)?;
        let values = numeric_values(&glci, "value")?;
        let zscores = numeric_values(&glci, "zscore")?;
        let regimes: Vec<i32> =
            numeric_values(&glci, "regime")?.iter().map(|r| *r as i32).collect();
        let momenta = numeric_values(&glci, "momentum")?;
        let probs = numeric_values(&glci, "prob_regime_change")?;
        let last = glci.height() - 1;
        let regime = Regime::from_code(regimes[last]);

        let pillar_weights: Vec<(String, f64)> = weights["pillar_weights"]
            .as_object()
            .map(|m| {
                m.iter().map(|(k, v)| (k.clone(), v.as_f64().unwrap_or(0.0))).collect()
            })
            .unwrap_or_default();

        let pillar_dates = date_values(&pillars, DATE_COL)?;
        let pillar_last = pillar_dates.len() - 1;
        let mut pillar_slices = Vec::new();
        let mut pillar_data = serde_json::Map::new();
        for (name, weight) in &pillar_weights {
            let Ok(column) = numeric_values(&pillars, name) else {
                continue;
            };
            let latest_value = finite_or_zero(column[pillar_last]);
            pillar_slices.push(PillarSlice {
                name: name.clone(),
                value: latest_value,
                weight: *weight,
                contribution: latest_value * weight,
            });
            let history = data_points(&pillar_dates, &column);
            pillar_data.insert(name.clone(), serde_json::to_value(history)?);
        }

        let payload = GlciPayload {
            value: finite_or_zero(values[last]),
            zscore: finite_or_zero(zscores[last]),
            regime: regime.label().to_string(),
            regime_code: regime.code(),
            date: fmt_date(dates[last]),
            momentum: finite_or_zero(momenta[last]),
            prob_regime_change: finite_or_zero(probs[last]),
            pillars: pillar_slices.clone(),
            data: data_points(&dates, &values),
            pillar_data,
        };
        self.write_endpoint("api/glci", &payload)?;

        let latest = GlciLatest {
            date: fmt_date(dates[last]),
            value: finite_or_zero(values[last]),
            zscore: finite_or_zero(zscores[last]),
            regime: regime.code(),
            regime_label: regime.label().to_string(),
            momentum: finite_or_zero(momenta[last]),
        };
        self.write_endpoint("api/glci/latest", &latest)?;

        let breakdown = json!({
            "date": fmt_date(pillar_dates[pillar_last]),
            "pillars": pillar_slices
                .iter()
                .map(|p| {
                    (p.name.clone(), json!({
                        "value": p.value,
                        "weight": p.weight,
                        "contribution": p.contribution,
                    }))
                })
                .collect::<serde_json::Map<_, _>>(),
        });
        self.write_endpoint("api/glci/pillars", &breakdown)?;

        self.export_regime_history(&dates, &regimes)?;
        Ok(true)
    }

    /// Compress the regime path into contiguous labelled periods.
    fn export_regime_history(&self, dates: &[Date], regimes: &[i32]) -> Result<(), ExportError> {
        let mut periods: Vec<RegimePeriod> = Vec::new();
        let mut counts: serde_json::Map<String, serde_json::Value> = serde_json::Map::new();
        let mut current: Option<(Regime, Date)> = None;

        for (date, code) in dates.iter().zip(regimes.iter()) {
            let regime = Regime::from_code(*code);
            let entry = counts.entry(regime.label().to_string()).or_insert(json!(0));
            *entry = json!(entry.as_i64().unwrap_or(0) + 1);

            match current {
                Some((active, start)) if active != regime => {
                    periods.push(RegimePeriod {
                        regime: active.label().to_string(),
                        start: fmt_date(start),
                        end: fmt_date(*date),
                    });
                    current = Some((regime, *date));
                }
                None => current = Some((regime, *date)),
                _ => {}
            }
        }
        let current_label = if let Some((active, start)) = current {
            periods.push(RegimePeriod {
                regime: active.label().to_string(),
                start: fmt_date(start),
                end: dates.last().map(|d| fmt_date(*d)).unwrap_or_default(),
            });
            Some(active.label().to_string())
        } else {
            None
        };

        let payload = json!({
            "periods": periods,
            "counts": counts,
            "current": current_label,
        });
        self.write_endpoint("api/glci/regime-history", &payload)
    }

    /// Per-component staleness, straight from the raw tier.
    fn export_freshness(&self) -> Result<(), ExportError> {
        let Ok(pillars) = self.registry.pillars(GLCI_INDEX_ID) else {
            return Ok(());
        };
        let today = Utc::now().date_naive();

        let mut items = Vec::new();
        for (pillar_name, pillar) in pillars.iter() {
            for component in &pillar.components {
                let source = self
                    .registry
                    .series(&component.series)
                    .map(|cfg| cfg.source.clone())
                    .unwrap_or_default();
                let last = self.store.get_latest_date(&source, &component.series)?;

                let item = match last {
                    Some(last_date) => {
                        let days_old = (today - last_date).num_days();
                        FreshnessItem {
                            series_id: component.series.clone(),
                            pillar: pillar_name.to_string(),
                            last_date: fmt_date(last_date),
                            days_old,
                            is_stale: days_old > FRESHNESS_STALE_DAYS,
                        }
                    }
                    None => FreshnessItem {
                        series_id: component.series.clone(),
                        pillar: pillar_name.to_string(),
                        last_date: "unknown".to_string(),
                        days_old: -1,
                        is_stale: true,
                    },
                };
                items.push(item);
            }
        }
        self.write_endpoint("api/glci/freshness", &items)
    }

    fn export_risk(&self) -> Result<bool, ExportError> {
        let Some(metrics) = self.store.load_curated("risk", "risk_metrics")? else {
            return Ok(false);
        };
        if metrics.height() == 0 {
            return Ok(false);
        }
        let meta = self
            .store
            .load_curated_metadata("risk", "risk_metrics")?
            .unwrap_or_else(|| json!({}));

        let ids = string_column(&metrics, "asset_id")?;
        let names = string_column(&metrics, "name")?;
        let categories = string_column(&metrics, "category")?;

        let scalar = |col: &str| numeric_values(&metrics, col).map_err(ExportError::from);
        let sharpe = scalar("current_sharpe")?;
        let ret = scalar("annualized_return")?;
        let vol = scalar("annualized_volatility")?;
        let dd = scalar("max_drawdown")?;
        let corr = scalar("correlation_with_glci")?;
        let by_regime: Vec<(String, Vec<f64>)> = [
            "sharpe_tight", "sharpe_neutral", "sharpe_loose",
            "return_tight", "return_neutral", "return_loose",
            "volatility_tight", "volatility_neutral", "volatility_loose",
        ]
        .iter()
        .map(|col| scalar(col).map(|v| ((*col).to_string(), v)))
        .collect::<Result<_, _>>()?;

        let regime_field = |row: usize, prefix: &str| -> serde_json::Value {
            let mut map = serde_json::Map::new();
            for label in ["tight", "neutral", "loose"] {
                let col = format!("{prefix}_{label}");
                let value = by_regime
                    .iter()
                    .find(|(name, _)| name == &col)
                    .map(|(_, v)| v[row])
                    .unwrap_or(f64::NAN);
                map.insert(label.to_string(), finite_or_null(value));
            }
            serde_json::Value::Object(map)
        };

        let mut assets = Vec::new();
        let mut matrix_assets = Vec::new();
        let mut sharpe_rows = Vec::new();
        let mut return_rows = Vec::new();
        for row in 0..metrics.height() {
            let rolling = self
                .store
                .load_curated("risk", &format!("rolling_sharpe_{}", ids[row]))?
                .map(|df| -> Result<Vec<DataPoint>, ExportError> {
                    let (dates, values) = sorted_rows(&df, "value")?;
                    Ok(data_points(&dates, &values))
                })
                .transpose()?
                .unwrap_or_default();

            assets.push(json!({
                "id": ids[row],
                "name": names[row],
                "category": categories[row],
                "current_sharpe": finite_or_zero(sharpe[row]),
                "annualized_return": finite_or_zero(ret[row]),
                "annualized_volatility": finite_or_zero(vol[row]),
                "max_drawdown": finite_or_zero(dd[row]),
                "sharpe_by_regime": regime_field(row, "sharpe"),
                "return_by_regime": regime_field(row, "return"),
                "volatility_by_regime": regime_field(row, "volatility"),
                "correlation_with_glci": finite_or_zero(corr[row]),
                "rolling_sharpe": rolling,
            }));

            matrix_assets.push(names[row].clone());
            let pick = |prefix: &str| -> Vec<serde_json::Value> {
                ["tight", "neutral", "loose"]
                    .iter()
                    .map(|label| {
                        let col = format!("{prefix}_{label}");
                        let value = by_regime
                            .iter()
                            .find(|(name, _)| name == &col)
                            .map(|(_, v)| v[row])
                            .unwrap_or(f64::NAN);
                        finite_or_null(value)
                    })
                    .collect()
            };
            sharpe_rows.push(pick("sharpe"));
            return_rows.push(pick("return"));
        }

        let dashboard = json!({
            "computed_at": meta.get("computed_at").cloned().unwrap_or(json!(null)),
            "risk_free_rate": meta.get("risk_free_rate").cloned().unwrap_or(json!(0.0)),
            "current_regime": meta.get("current_regime").cloned().unwrap_or(json!("neutral")),
            "assets": assets,
            "regime_matrix": {
                "assets": matrix_assets,
                "regimes": ["tight", "neutral", "loose"],
                "sharpe_data": sharpe_rows,
                "return_data": return_rows,
            },
        });
        self.write_endpoint("api/risk", &dashboard)?;

        for (row, asset) in dashboard["assets"].as_array().into_iter().flatten().enumerate() {
            self.write_endpoint(&format!("api/risk/{}", ids[row]), asset)?;
        }
        Ok(true)
    }

    /// Copy the exported tree to a dated snapshot, replacing any prior
    /// snapshot of the same date.
    fn snapshot(&self) -> Result<(), ExportError> {
        let stamp = Utc::now().format("%Y-%m-%d").to_string();
        let parent = self.output_root.parent().unwrap_or(&self.output_root);
        let snap_dir = parent.join("snapshots").join(&stamp);
        if snap_dir.exists() {
            fs::remove_dir_all(&snap_dir)?;
        }
        copy_tree(&self.output_root, &snap_dir)?;
        info!(snapshot = %snap_dir.display(), "snapshot copied");
        Ok(())
    }

    /// Write one endpoint as `<path>.json` through a temp file and rename.
    fn write_endpoint<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<(), ExportError> {
        let path = self.endpoint_path(endpoint);
        let dir = path.parent().ok_or_else(|| {
            ExportError::Malformed(format!("endpoint path has no parent: {}", path.display()))
        })?;
        fs::create_dir_all(dir)?;

        let file_name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));
        let file = File::create(&tmp)?;
        serde_json::to_writer_pretty(&file, payload)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Filesystem path of an endpoint.
    #[must_use]
    pub fn endpoint_path(&self, endpoint: &str) -> PathBuf {
        self.output_root.join(format!("{endpoint}.json"))
    }
}

fn category_label(series_type: SeriesType) -> &'static str {
    match series_type {
        SeriesType::Level => "Central Banks & Aggregates",
        SeriesType::Rate => "Funding Rates",
        SeriesType::Spread => "Credit Spreads",
        SeriesType::Stress => "Volatility",
        SeriesType::Credit => "Bank Credit",
        SeriesType::Price => "Assets",
        SeriesType::Fx => "FX",
        SeriesType::Other => "Other",
    }
}

fn fmt_date(date: Date) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn title_case(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn finite_or_null(v: f64) -> serde_json::Value {
    if v.is_finite() { json!(v) } else { serde_json::Value::Null }
}

/// Sorted `(dates, values)` of a curated table column.
fn sorted_rows(df: &DataFrame, col: &str) -> Result<(Vec<Date>, Vec<f64>), ExportError> {
    let dates = date_values(df, DATE_COL)?;
    let values = numeric_values(df, col)?;
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);
    Ok((
        order.iter().map(|&i| dates[i]).collect(),
        order.iter().map(|&i| values[i]).collect(),
    ))
}

/// Observations with missing rows dropped.
fn data_points(dates: &[Date], values: &[f64]) -> Vec<DataPoint> {
    dates
        .iter()
        .zip(values.iter())
        .filter(|(_, v)| v.is_finite())
        .map(|(d, v)| DataPoint { date: fmt_date(*d), value: *v })
        .collect()
}

fn string_column(df: &DataFrame, col: &str) -> Result<Vec<String>, ExportError> {
    let column = df
        .column(col)
        .map_err(|_| ExportError::Malformed(format!("missing column {col}")))?;
    let strings = column
        .str()
        .map_err(|_| ExportError::Malformed(format!("column {col} is not a string column")))?;
    Ok(strings.into_iter().map(|s| s.unwrap_or_default().to_string()).collect())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

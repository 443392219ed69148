//! Regime-conditioned risk metrics for the tracked asset universe.

use chrono::Utc;
use glci_features::SeriesSource;
use glci_primitives::{Date, Regime};
use glci_storage::DataStore;
use glci_transforms::{DATE_COL, date_values, numeric_values, series_frame};
use polars::prelude::{Column, DataFrame};
use serde_json::json;
use tracing::{info, warn};

use crate::RiskError;

/// Trading days per year, used for annualization throughout.
const ANNUALIZATION: f64 = 252.0;

/// Minimum in-regime observations before a per-regime statistic is reported.
const MIN_REGIME_OBS: usize = 20;

/// Rolling Sharpe window in trading days.
const ROLLING_WINDOW: usize = 252;

/// Static descriptor of one tracked asset.
#[derive(Debug, Clone, Copy)]
pub struct AssetInfo {
    /// Configured series id of the price series.
    pub asset_id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Asset-class bucket.
    pub category: &'static str,
}

/// The tracked asset universe.
pub const ASSET_UNIVERSE: [AssetInfo; 7] = [
    AssetInfo { asset_id: "sp500_price", name: "S&P 500", category: "Large Cap Equities" },
    AssetInfo { asset_id: "russell2000_price", name: "Russell 2000", category: "Small Cap Equities" },
    AssetInfo { asset_id: "gold_price", name: "Gold", category: "Commodities" },
    AssetInfo { asset_id: "silver_price", name: "Silver", category: "Commodities" },
    AssetInfo { asset_id: "bitcoin_price", name: "Bitcoin", category: "Crypto" },
    AssetInfo { asset_id: "ethereum_price", name: "Ethereum", category: "Crypto" },
    AssetInfo { asset_id: "long_bond_price", name: "Long Bonds (TLT)", category: "Fixed Income" },
];

/// Per-regime values keyed tight/neutral/loose; `None` below the observation
/// floor.
pub type RegimeValues = [(Regime, Option<f64>); 3];

/// Risk metrics for one asset.
#[derive(Debug, Clone)]
pub struct AssetRiskMetrics {
    /// Configured series id.
    pub asset_id: String,
    /// Display name.
    pub name: String,
    /// Asset-class bucket.
    pub category: String,
    /// Annualized Sharpe over the full sample.
    pub current_sharpe: f64,
    /// Annualized simple return, percent.
    pub annualized_return: f64,
    /// Annualized volatility, percent.
    pub annualized_volatility: f64,
    /// Worst peak-to-trough drawdown, percent (negative).
    pub max_drawdown: f64,
    /// Sharpe per regime.
    pub sharpe_by_regime: RegimeValues,
    /// Annualized return per regime, percent.
    pub return_by_regime: RegimeValues,
    /// Annualized volatility per regime, percent.
    pub volatility_by_regime: RegimeValues,
    /// Correlation of daily returns with composite changes (0 when
    /// undefined).
    pub correlation_with_glci: f64,
    /// Rolling annualized Sharpe, only full non-degenerate windows.
    pub rolling_sharpe: Vec<(Date, f64)>,
}

/// Heatmap matrix: assets by regime, for Sharpe and return.
#[derive(Debug, Clone)]
pub struct RegimeMatrix {
    /// Asset display names, row order.
    pub assets: Vec<String>,
    /// Regime labels, column order.
    pub regimes: [&'static str; 3],
    /// Sharpe per asset per regime.
    pub sharpe_data: Vec<[Option<f64>; 3]>,
    /// Return per asset per regime.
    pub return_data: Vec<[Option<f64>; 3]>,
}

/// Complete risk dashboard for one run.
#[derive(Debug, Clone)]
pub struct RiskDashboard {
    /// When the dashboard was computed.
    pub computed_at: String,
    /// Latest annual risk-free rate, percent.
    pub risk_free_rate: f64,
    /// Label of the current composite regime.
    pub current_regime: String,
    /// Per-asset metrics, universe order.
    pub assets: Vec<AssetRiskMetrics>,
    /// Regime heatmap matrix.
    pub regime_matrix: RegimeMatrix,
}

/// Computes regime-conditioned risk metrics.
#[derive(Debug)]
pub struct RiskComputer<'a, S> {
    source: &'a S,
    store: &'a DataStore,
}

impl<'a, S: SeriesSource> RiskComputer<'a, S> {
    /// Computer over a series source and the curated store.
    #[must_use]
    pub const fn new(source: &'a S, store: &'a DataStore) -> Self {
        Self { source, store }
    }

    /// Compute metrics for the whole universe.
    ///
    /// Requires the composite artifact to exist; per-asset failures are
    /// skipped with a warning so one bad price feed cannot sink the
    /// dashboard.
    pub fn compute(
        &self,
        start: Option<Date>,
        end: Option<Date>,
        save_output: bool,
    ) -> Result<RiskDashboard, RiskError> {
        let glci = self
            .store
            .load_curated("indices", "glci")?
            .ok_or(RiskError::MissingComposite)?;
        if glci.height() == 0 {
            return Err(RiskError::MissingComposite);
        }
        let glci_dates = date_values(&glci, DATE_COL)?;
        let glci_values = numeric_values(&glci, "value")?;
        let glci_regimes: Vec<i32> =
            numeric_values(&glci, "regime")?.iter().map(|r| *r as i32).collect();

        let rf = self.load_risk_free();
        let current_rf = rf.last().map_or(0.0, |(_, annual, _)| *annual);

        let mut assets = Vec::new();
        for info in ASSET_UNIVERSE {
            match self.compute_asset(
                info,
                &glci_dates,
                &glci_values,
                &glci_regimes,
                &rf,
                start,
                end,
            ) {
                Ok(metrics) => {
                    info!(
                        asset = info.asset_id,
                        sharpe = metrics.current_sharpe,
                        "computed asset metrics"
                    );
                    assets.push(metrics);
                }
                Err(err) => {
                    warn!(asset = info.asset_id, error = %err, "asset skipped");
                }
            }
        }

        let current_regime =
            Regime::from_code(*glci_regimes.last().unwrap_or(&0)).label().to_string();
        let regime_matrix = build_regime_matrix(&assets);

        let dashboard = RiskDashboard {
            computed_at: Utc::now().to_rfc3339(),
            risk_free_rate: current_rf,
            current_regime,
            assets,
            regime_matrix,
        };

        if save_output {
            self.save(&dashboard)?;
        }
        Ok(dashboard)
    }

    /// 3-month Treasury as `(date, annual percent, daily rate)` rows.
    fn load_risk_free(&self) -> Vec<(Date, f64, f64)> {
        match self.source.series("treasury_3m", None, None) {
            Ok(df) => match (date_values(&df, DATE_COL), numeric_values(&df, "value")) {
                (Ok(dates), Ok(values)) => dates
                    .into_iter()
                    .zip(values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(d, v)| (d, v, v / 100.0 / ANNUALIZATION))
                    .collect(),
                _ => Vec::new(),
            },
            Err(err) => {
                warn!(error = %err, "risk-free rate unavailable, using zero");
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_asset(
        &self,
        info: AssetInfo,
        glci_dates: &[Date],
        glci_values: &[f64],
        glci_regimes: &[i32],
        rf: &[(Date, f64, f64)],
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<AssetRiskMetrics, RiskError> {
        let prices_df = self.source.series(info.asset_id, start, end)?;
        let dates = date_values(&prices_df, DATE_COL)?;
        let prices = numeric_values(&prices_df, "value")?;
        if dates.len() < 2 {
            return Err(RiskError::InsufficientHistory(info.asset_id.to_string()));
        }

        // Daily simple returns; the first row has none and is dropped from
        // every statistic below.
        let mut rows: Vec<AssetRow> = Vec::with_capacity(dates.len().saturating_sub(1));
        for i in 1..dates.len() {
            let ret = if prices[i].is_finite() && prices[i - 1].is_finite() && prices[i - 1] != 0.0
            {
                prices[i] / prices[i - 1] - 1.0
            } else {
                f64::NAN
            };
            if !ret.is_finite() {
                continue;
            }
            let date = dates[i];
            let regime = asof_lookup(glci_dates, glci_regimes, date).unwrap_or(0);
            let glci_value = asof_lookup(glci_dates, glci_values, date).unwrap_or(f64::NAN);
            let daily_rf = asof_lookup_rf(rf, date).unwrap_or(0.0);
            rows.push(AssetRow { date, ret, excess: ret - daily_rf, regime, glci_value });
        }
        if rows.is_empty() {
            return Err(RiskError::InsufficientHistory(info.asset_id.to_string()));
        }

        let returns: Vec<f64> = rows.iter().map(|r| r.ret).collect();
        let excess: Vec<f64> = rows.iter().map(|r| r.excess).collect();

        let current_sharpe = sharpe(&excess);
        let annualized_return = mean(&returns) * ANNUALIZATION * 100.0;
        let annualized_volatility = std(&returns) * ANNUALIZATION.sqrt() * 100.0;
        let max_drawdown = drawdown(&prices);

        let mut sharpe_by_regime = empty_regime_values();
        let mut return_by_regime = empty_regime_values();
        let mut volatility_by_regime = empty_regime_values();
        for (slot, regime) in Regime::ALL.iter().enumerate() {
            let subset: Vec<&AssetRow> =
                rows.iter().filter(|r| r.regime == regime.code()).collect();
            if subset.len() >= MIN_REGIME_OBS {
                let sub_returns: Vec<f64> = subset.iter().map(|r| r.ret).collect();
                let sub_excess: Vec<f64> = subset.iter().map(|r| r.excess).collect();
                sharpe_by_regime[slot].1 = Some(sharpe(&sub_excess));
                return_by_regime[slot].1 = Some(mean(&sub_returns) * ANNUALIZATION * 100.0);
                volatility_by_regime[slot].1 =
                    Some(std(&sub_returns) * ANNUALIZATION.sqrt() * 100.0);
            }
        }

        let rolling_sharpe = rolling_sharpe(&rows);

        // Composite changes on the asset's dates; undefined correlation
        // (constant composite between observations) maps to zero.
        let glci_changes: Vec<f64> = rows
            .windows(2)
            .map(|w| {
                if w[0].glci_value.is_finite()
                    && w[1].glci_value.is_finite()
                    && w[0].glci_value != 0.0
                {
                    w[1].glci_value / w[0].glci_value - 1.0
                } else {
                    f64::NAN
                }
            })
            .collect();
        let paired_returns: Vec<f64> = returns[1..].to_vec();
        let corr = correlation(&paired_returns, &glci_changes);
        let correlation_with_glci = if corr.is_finite() { corr } else { 0.0 };

        Ok(AssetRiskMetrics {
            asset_id: info.asset_id.to_string(),
            name: info.name.to_string(),
            category: info.category.to_string(),
            current_sharpe,
            annualized_return,
            annualized_volatility,
            max_drawdown,
            sharpe_by_regime,
            return_by_regime,
            volatility_by_regime,
            correlation_with_glci,
            rolling_sharpe,
        })
    }

    fn save(&self, dashboard: &RiskDashboard) -> Result<(), RiskError> {
        let mut ids = Vec::new();
        let mut names = Vec::new();
        let mut categories = Vec::new();
        let mut flat: Vec<(&str, Vec<Option<f64>>)> = vec![
            ("current_sharpe", Vec::new()),
            ("annualized_return", Vec::new()),
            ("annualized_volatility", Vec::new()),
            ("max_drawdown", Vec::new()),
            ("sharpe_tight", Vec::new()),
            ("sharpe_neutral", Vec::new()),
            ("sharpe_loose", Vec::new()),
            ("return_tight", Vec::new()),
            ("return_neutral", Vec::new()),
            ("return_loose", Vec::new()),
            ("volatility_tight", Vec::new()),
            ("volatility_neutral", Vec::new()),
            ("volatility_loose", Vec::new()),
            ("correlation_with_glci", Vec::new()),
        ];

        for asset in &dashboard.assets {
            ids.push(asset.asset_id.clone());
            names.push(asset.name.clone());
            categories.push(asset.category.clone());
            let values: [Option<f64>; 14] = [
                Some(asset.current_sharpe),
                Some(asset.annualized_return),
                Some(asset.annualized_volatility),
                Some(asset.max_drawdown),
                asset.sharpe_by_regime[0].1,
                asset.sharpe_by_regime[1].1,
                asset.sharpe_by_regime[2].1,
                asset.return_by_regime[0].1,
                asset.return_by_regime[1].1,
                asset.return_by_regime[2].1,
                asset.volatility_by_regime[0].1,
                asset.volatility_by_regime[1].1,
                asset.volatility_by_regime[2].1,
                Some(asset.correlation_with_glci),
            ];
            for (column, value) in flat.iter_mut().zip(values) {
                column.1.push(value);
            }
        }

        let mut columns = vec![
            Column::new("asset_id".into(), ids),
            Column::new("name".into(), names),
            Column::new("category".into(), categories),
        ];
        for (name, values) in flat {
            columns.push(Column::new(name.into(), values));
        }
        let df = DataFrame::new(columns)?;

        let metadata = json!({
            "computed_at": dashboard.computed_at,
            "risk_free_rate": dashboard.risk_free_rate,
            "current_regime": dashboard.current_regime,
            "rolling_window": ROLLING_WINDOW,
            "annualization_factor": ANNUALIZATION,
            "n_assets": dashboard.assets.len(),
        });
        self.store.save_curated(&df, "risk", "risk_metrics", Some(&metadata))?;

        for asset in &dashboard.assets {
            if asset.rolling_sharpe.is_empty() {
                continue;
            }
            let (dates, values): (Vec<Date>, Vec<f64>) =
                asset.rolling_sharpe.iter().copied().unzip();
            let rolling = series_frame(&dates, &values)?;
            self.store.save_curated(
                &rolling,
                "risk",
                &format!("rolling_sharpe_{}", asset.asset_id),
                None,
            )?;
        }
        info!(assets = dashboard.assets.len(), "saved risk artifacts");
        Ok(())
    }
}

/// One merged daily observation for an asset.
#[derive(Debug, Clone, Copy)]
struct AssetRow {
    date: Date,
    ret: f64,
    excess: f64,
    regime: i32,
    glci_value: f64,
}

/// Most recent right-hand value at or before `date` (backward as-of).
fn asof_lookup<T: Copy>(dates: &[Date], values: &[T], date: Date) -> Option<T> {
    let pos = dates.partition_point(|d| *d <= date);
    if pos == 0 { None } else { Some(values[pos - 1]) }
}

fn asof_lookup_rf(rf: &[(Date, f64, f64)], date: Date) -> Option<f64> {
    let pos = rf.partition_point(|(d, _, _)| *d <= date);
    if pos == 0 { None } else { Some(rf[pos - 1].2) }
}

fn empty_regime_values() -> RegimeValues {
    [(Regime::Tight, None), (Regime::Neutral, None), (Regime::Loose, None)]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt()
}

/// Annualized Sharpe with the degenerate cases mapped to zero.
fn sharpe(excess: &[f64]) -> f64 {
    if excess.len() < MIN_REGIME_OBS {
        return 0.0;
    }
    let s = std(excess);
    if !s.is_finite() || s == 0.0 {
        return 0.0;
    }
    mean(excess) / s * ANNUALIZATION.sqrt()
}

/// Worst drawdown from a running peak, in percent.
fn drawdown(prices: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &p in prices {
        if !p.is_finite() {
            continue;
        }
        peak = peak.max(p);
        if peak > 0.0 {
            worst = worst.min((p - peak) / peak);
        }
    }
    worst * 100.0
}

/// Rolling annualized Sharpe over full windows only.
///
/// A point is emitted only when the trailing window holds exactly
/// `ROLLING_WINDOW` finite excess returns with positive dispersion; anything
/// else is dropped rather than padded.
fn rolling_sharpe(rows: &[AssetRow]) -> Vec<(Date, f64)> {
    let mut out = Vec::new();
    if rows.len() < ROLLING_WINDOW {
        return out;
    }
    for i in (ROLLING_WINDOW - 1)..rows.len() {
        let window = &rows[i + 1 - ROLLING_WINDOW..=i];
        if window.iter().any(|r| !r.excess.is_finite()) {
            continue;
        }
        let excess: Vec<f64> = window.iter().map(|r| r.excess).collect();
        let s = std(&excess);
        if !s.is_finite() || s <= 0.0 {
            continue;
        }
        let value = mean(&excess) / s * ANNUALIZATION.sqrt();
        out.push((rows[i].date, (value * 1000.0).round() / 1000.0));
    }
    out
}

fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let ma = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mb = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in &pairs {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va <= 0.0 || vb <= 0.0 { f64::NAN } else { cov / (va.sqrt() * vb.sqrt()) }
}

/// Assets-by-regime heatmap of Sharpe and return.
fn build_regime_matrix(assets: &[AssetRiskMetrics]) -> RegimeMatrix {
    let mut matrix = RegimeMatrix {
        assets: Vec::with_capacity(assets.len()),
        regimes: ["tight", "neutral", "loose"],
        sharpe_data: Vec::with_capacity(assets.len()),
        return_data: Vec::with_capacity(assets.len()),
    };
    for asset in assets {
        matrix.assets.push(asset.name.clone());
        matrix.sharpe_data.push([
            asset.sharpe_by_regime[0].1.map(|v| (v * 100.0).round() / 100.0),
            asset.sharpe_by_regime[1].1.map(|v| (v * 100.0).round() / 100.0),
            asset.sharpe_by_regime[2].1.map(|v| (v * 100.0).round() / 100.0),
        ]);
        matrix.return_data.push([
            asset.return_by_regime[0].1.map(|v| (v * 10.0).round() / 10.0),
            asset.return_by_regime[1].1.map(|v| (v * 10.0).round() / 10.0),
            asset.return_by_regime[2].1.map(|v| (v * 10.0).round() / 10.0),
        ]);
    }
    matrix
}

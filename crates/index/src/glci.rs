//! The Global Liquidity & Credit Index computer.

use chrono::Utc;
use glci_config::{GLCI_INDEX_ID, IndexConfig, NormalizeConfig, Registry};
use glci_primitives::{Date, Frequency, Regime, RegimeThresholds};
use glci_storage::DataStore;
use glci_transforms::{
    DATE_COL, append_values, date_values, detect_regime, momentum, numeric_values,
    regime_probability, series_frame, zscore,
};
use glci_features::{DataQualityReport, FeatureMatrixBuilder, SeriesSource};
use glci_model::{
    FactorMethod, FactorModel, FactorModelConfig, FeaturePanel, combine_factors,
    optimize_pillar_weights,
};
use polars::prelude::{Column, DataFrame};
use serde_json::json;
use tracing::{info, warn};

use crate::IndexError;

/// Momentum windows on the composite (short and long, in target-frequency
/// ticks).
const MOMENTUM_SHORT: usize = 4;
const MOMENTUM_LONG: usize = 12;

/// Regime-probability trend window and smoothing, in ticks.
const PROB_WINDOW: usize = 13;
const PROB_SMOOTHING: usize = 4;

/// Days after which a component series counts as stale for the composite.
const FRESHNESS_STALE_DAYS: i64 = 14;

/// Options for one GLCI run.
#[derive(Debug, Clone)]
pub struct GlciOptions {
    /// Inclusive start of the computation window.
    pub start: Option<Date>,
    /// Inclusive end of the computation window.
    pub end: Option<Date>,
    /// Frequency of the composite grid.
    pub target_freq: Frequency,
    /// Factor extraction method.
    pub factor_method: FactorMethod,
    /// Persist curated artifacts after computing.
    pub save_output: bool,
    /// Derive time-varying pillar weights from predictive regressions.
    pub optimize_weights: bool,
}

impl Default for GlciOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            target_freq: Frequency::Weekly,
            factor_method: FactorMethod::Auto,
            save_output: false,
            optimize_weights: false,
        }
    }
}

/// Outcome of one pillar's factor extraction.
#[derive(Debug, Clone)]
pub struct PillarOutcome {
    /// Pillar name.
    pub name: String,
    /// The extracted factor, after any pillar-level sign inversion.
    pub factor: Vec<(Date, f64)>,
    /// Feature loadings.
    pub loadings: Vec<(String, f64)>,
    /// Share of variance explained.
    pub explained_variance: f64,
    /// Estimation method that produced the factor.
    pub method: &'static str,
    /// Whether estimation converged.
    pub converged: bool,
    /// Number of features used.
    pub n_variables: usize,
    /// Pillar data-quality report.
    pub quality: DataQualityReport,
}

/// Freshness of one component series.
#[derive(Debug, Clone)]
pub struct FreshnessEntry {
    /// Configured series id.
    pub series_id: String,
    /// Pillar the component belongs to.
    pub pillar: String,
    /// Last observed date, when any data exists.
    pub last_date: Option<Date>,
    /// Days since the last observation; -1 when unknown.
    pub days_old: i64,
    /// Whether the component is stale for composite purposes.
    pub is_stale: bool,
}

/// Complete result of a GLCI run.
#[derive(Debug)]
pub struct GlciResult {
    /// Composite table: `date, value, zscore, regime, momentum,
    /// prob_regime_change, index_id`.
    pub glci: DataFrame,
    /// Pillar factors aligned on the composite dates.
    pub pillars: DataFrame,
    /// Regime table: `date, regime, zscore, regime_label, dist_to_tight,
    /// dist_to_loose`.
    pub regimes: DataFrame,
    /// Pillar weights, signs, and loadings.
    pub weights: serde_json::Value,
    /// Run metadata, including per-pillar stats and the current regime.
    pub metadata: serde_json::Value,
    /// Per-pillar outcomes, in configuration order.
    pub pillar_results: Vec<PillarOutcome>,
    /// Pillars that failed this run.
    pub missing_pillars: Vec<String>,
}

/// Computes the GLCI from configured pillars.
#[derive(Debug)]
pub struct GlciComputer<'a, S> {
    registry: &'a Registry,
    source: &'a S,
    store: &'a DataStore,
    index_id: &'a str,
}

impl<'a, S: SeriesSource> GlciComputer<'a, S> {
    /// Computer for the default GLCI index.
    #[must_use]
    pub const fn new(registry: &'a Registry, source: &'a S, store: &'a DataStore) -> Self {
        Self { registry, source, store, index_id: GLCI_INDEX_ID }
    }

    /// Computer for another pillarized index.
    #[must_use]
    pub const fn for_index(
        registry: &'a Registry,
        source: &'a S,
        store: &'a DataStore,
        index_id: &'a str,
    ) -> Self {
        Self { registry, source, store, index_id }
    }

    /// Run the full pipeline.
    ///
    /// Pillar failures are isolated: a failing pillar is dropped and its
    /// weight redistributed proportionally over the survivors. The run is
    /// fatal only when no pillar factor can be computed at all.
    pub fn compute(&self, options: &GlciOptions) -> Result<GlciResult, IndexError> {
        let normalize = match self.registry.index(self.index_id)? {
            IndexConfig::Pillarized { normalize, .. } => *normalize,
            IndexConfig::Arithmetic { .. } => {
                return Err(glci_config::ConfigError::WrongIndexForm(
                    self.index_id.to_string(),
                    "pillarized",
                )
                .into());
            }
        };

        let configured_weights = self.registry.pillar_weights(self.index_id)?;
        let pillar_signs = self.registry.pillar_signs(self.index_id)?;
        info!(index = self.index_id, pillars = configured_weights.len(), "computing composite");

        // Step 1: one factor per pillar, failures isolated.
        let builder = FeatureMatrixBuilder::new(self.registry, self.source);
        let mut outcomes: Vec<PillarOutcome> = Vec::new();
        let mut missing_pillars: Vec<String> = Vec::new();

        for (pillar_name, _) in &configured_weights {
            match self.compute_pillar(&builder, pillar_name, options) {
                Ok(outcome) => {
                    info!(
                        pillar = %pillar_name,
                        method = outcome.method,
                        explained = outcome.explained_variance,
                        "extracted pillar factor"
                    );
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(pillar = %pillar_name, error = %err, "pillar failed, dropping");
                    missing_pillars.push(pillar_name.clone());
                }
            }
        }
        if outcomes.is_empty() {
            return Err(IndexError::NoPillars);
        }

        // Step 2: redistribute weight over the surviving pillars.
        let surviving: f64 = configured_weights
            .iter()
            .filter(|(name, _)| outcomes.iter().any(|o| &o.name == name))
            .map(|(_, w)| w)
            .sum();
        let weights: Vec<(String, f64)> = configured_weights
            .iter()
            .filter(|(name, _)| outcomes.iter().any(|o| &o.name == name))
            .map(|(name, w)| (name.clone(), w / surviving))
            .collect();
        if !missing_pillars.is_empty() {
            info!(?missing_pillars, ?weights, "redistributed pillar weights");
        }

        // Step 3: pillar-level sign (the stress pillar is inverted so that a
        // higher composite always means looser conditions).
        for outcome in &mut outcomes {
            let sign = pillar_signs
                .iter()
                .find(|(name, _)| name == &outcome.name)
                .map(|(_, s)| *s)
                .unwrap_or_default();
            if sign.is_negative() {
                for (_, v) in &mut outcome.factor {
                    *v = -*v;
                }
            }
        }

        // Step 4: combine and rescale.
        let named: Vec<(String, Vec<(Date, f64)>)> =
            outcomes.iter().map(|o| (o.name.clone(), o.factor.clone())).collect();
        let composite = combine_factors(&named, &weights)?;
        if composite.is_empty() {
            return Err(IndexError::EmptyIndex(self.index_id.to_string()));
        }
        let dates: Vec<Date> = composite.iter().map(|(d, _)| *d).collect();
        let rescaled: Vec<f64> =
            composite.iter().map(|(_, z)| z * normalize.stdev + normalize.mean).collect();

        // Step 5: rolling two-year z-score, regimes, momentum, probability.
        let glci = self.classify(&dates, &rescaled, options.target_freq)?;

        let pillars = pillars_frame(&dates, &outcomes)?;
        let regimes = regimes_frame(&glci)?;

        let dynamic_weights = if options.optimize_weights {
            self.optimize_weights(&named, options)
        } else {
            None
        };

        let weights_json = weights_payload(&weights, &pillar_signs, &outcomes, &dynamic_weights);
        let metadata = self.metadata_payload(
            &glci,
            &outcomes,
            &missing_pillars,
            options,
            normalize,
        )?;

        let result = GlciResult {
            glci,
            pillars,
            regimes,
            weights: weights_json,
            metadata,
            pillar_results: outcomes,
            missing_pillars,
        };

        // Step 6: persist only after everything computed cleanly.
        if options.save_output {
            self.save(&result)?;
        }
        Ok(result)
    }

    /// Latest composite point from the curated artifact.
    pub fn latest(&self) -> Result<Option<serde_json::Value>, IndexError> {
        let Some(glci) = self.store.load_curated("indices", "glci")? else {
            return Ok(None);
        };
        if glci.height() == 0 {
            return Ok(None);
        }
        let dates = date_values(&glci, DATE_COL)?;
        let values = numeric_values(&glci, "value")?;
        let zscores = numeric_values(&glci, "zscore")?;
        let regimes = numeric_values(&glci, "regime")?;
        let momenta = numeric_values(&glci, "momentum")?;
        let i = glci.height() - 1;

        let regime = Regime::from_code(regimes[i] as i32);
        Ok(Some(json!({
            "date": dates[i].format("%Y-%m-%d").to_string(),
            "value": finite_or_zero(values[i]),
            "zscore": finite_or_zero(zscores[i]),
            "regime": regime.code(),
            "regime_label": regime.label(),
            "momentum": finite_or_zero(momenta[i]),
        })))
    }

    /// Staleness of every component series of the index.
    pub fn data_freshness(&self) -> Result<Vec<FreshnessEntry>, IndexError> {
        let pillars = self.registry.pillars(self.index_id)?;
        let today = Utc::now().date_naive();

        let mut entries = Vec::new();
        for (pillar_name, pillar) in pillars.iter() {
            for component in &pillar.components {
                let last_date = self
                    .source
                    .series(&component.series, None, None)
                    .ok()
                    .and_then(|df| date_values(&df, DATE_COL).ok())
                    .and_then(|dates| dates.into_iter().max());

                let (days_old, is_stale) = match last_date {
                    Some(last) => {
                        let days = (today - last).num_days();
                        (days, days > FRESHNESS_STALE_DAYS)
                    }
                    None => (-1, true),
                };
                entries.push(FreshnessEntry {
                    series_id: component.series.clone(),
                    pillar: pillar_name.to_string(),
                    last_date,
                    days_old,
                    is_stale,
                });
            }
        }
        Ok(entries)
    }

    fn compute_pillar(
        &self,
        builder: &FeatureMatrixBuilder<'_, S>,
        pillar_name: &str,
        options: &GlciOptions,
    ) -> Result<PillarOutcome, IndexError> {
        let (matrix, metadata) = builder.build_pillar_matrix(
            self.index_id,
            pillar_name,
            options.start,
            options.end,
            options.target_freq,
        )?;
        let quality = builder.validate_pillar_data(self.index_id, pillar_name, &metadata)?;

        let panel = FeaturePanel::from_frame(&matrix)?;
        let config = FactorModelConfig { method: options.factor_method, ..Default::default() };
        let fit = FactorModel::with_config(config).fit(&panel)?;

        let factor: Vec<(Date, f64)> = fit
            .dates
            .iter()
            .zip(fit.factors.iter())
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| (*d, *v))
            .collect();

        Ok(PillarOutcome {
            name: pillar_name.to_string(),
            factor,
            loadings: fit.loadings,
            explained_variance: fit.explained_variance,
            method: fit.method.name(),
            converged: fit.converged,
            n_variables: fit.n_variables,
            quality,
        })
    }

    /// Rolling z-score, regime labels, momentum, and change probability on
    /// the rescaled composite.
    fn classify(
        &self,
        dates: &[Date],
        values: &[f64],
        freq: Frequency,
    ) -> Result<DataFrame, IndexError> {
        let base = series_frame(dates, values)?;
        let scored = zscore(&base, Some(freq.zscore_window()), 20)?;
        let with_regime = detect_regime(&scored, RegimeThresholds::default())?;
        let with_prob = regime_probability(&with_regime, PROB_WINDOW, PROB_SMOOTHING)?;

        let with_momentum = momentum(&base, MOMENTUM_SHORT, MOMENTUM_LONG)?;
        let momentum_values = numeric_values(&with_momentum, "momentum")?;

        let mut glci = with_prob;
        append_values(&mut glci, "momentum", &momentum_values)?;
        glci.with_column(Column::new(
            "index_id".into(),
            vec![self.index_id.to_string(); dates.len()],
        ))?;
        Ok(glci)
    }

    fn optimize_weights(
        &self,
        factors: &[(String, Vec<(Date, f64)>)],
        options: &GlciOptions,
    ) -> Option<(Vec<Date>, Vec<Vec<f64>>)> {
        let prices = self
            .source
            .series("sp500_price", options.start, options.end)
            .ok()?;
        let resampled =
            glci_transforms::resample(&prices, options.target_freq, glci_transforms::Agg::Last)
                .ok()?;
        let dates = date_values(&resampled, DATE_COL).ok()?;
        let values = numeric_values(&resampled, "value").ok()?;

        let returns: Vec<(Date, f64)> = dates
            .iter()
            .skip(1)
            .zip(values.windows(2))
            .map(|(d, w)| (*d, if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { f64::NAN }))
            .collect();

        match optimize_pillar_weights(factors, &returns, 156, 13, 0.5) {
            Ok(weights) => Some(weights),
            Err(err) => {
                warn!(error = %err, "dynamic weight optimization failed");
                None
            }
        }
    }

    fn metadata_payload(
        &self,
        glci: &DataFrame,
        outcomes: &[PillarOutcome],
        missing_pillars: &[String],
        options: &GlciOptions,
        normalize: NormalizeConfig,
    ) -> Result<serde_json::Value, IndexError> {
        let dates = date_values(glci, DATE_COL)?;
        let values = numeric_values(glci, "value")?;
        let zscores = numeric_values(glci, "zscore")?;
        let regimes = numeric_values(glci, "regime")?;
        let momenta = numeric_values(glci, "momentum")?;
        let last = glci.height() - 1;
        let regime = Regime::from_code(regimes[last] as i32);

        let pillar_stats: serde_json::Map<String, serde_json::Value> = outcomes
            .iter()
            .map(|o| {
                (
                    o.name.clone(),
                    json!({
                        "method": o.method,
                        "explained_variance": o.explained_variance,
                        "converged": o.converged,
                        "n_variables": o.n_variables,
                        "data_quality": {
                            "total_series": o.quality.total_series,
                            "loaded_series": o.quality.loaded_series,
                            "missing_series": o.quality.missing_series,
                            "low_coverage": o.quality.low_coverage_series
                                .iter().map(|(s, _)| s.clone()).collect::<Vec<_>>(),
                        },
                    }),
                )
            })
            .collect();

        Ok(json!({
            "computed_at": Utc::now().to_rfc3339(),
            "index_id": self.index_id,
            "start_date": dates.first().map(|d| d.format("%Y-%m-%d").to_string()),
            "end_date": dates.last().map(|d| d.format("%Y-%m-%d").to_string()),
            "n_observations": glci.height(),
            "target_frequency": options.target_freq.code(),
            "factor_method": format!("{:?}", options.factor_method).to_lowercase(),
            "normalize": { "mean": normalize.mean, "stdev": normalize.stdev },
            "missing_pillars": missing_pillars,
            "pillar_stats": pillar_stats,
            "current_regime": {
                "value": finite_or_zero(values[last]),
                "zscore": finite_or_zero(zscores[last]),
                "regime": regime.code(),
                "regime_label": regime.label(),
                "momentum": finite_or_zero(momenta[last]),
            },
        }))
    }

    fn save(&self, result: &GlciResult) -> Result<(), IndexError> {
        self.store.save_curated(&result.glci, "indices", "glci", Some(&result.metadata))?;
        self.store.save_curated(&result.pillars, "indices", "glci_pillars", None)?;
        self.store.save_curated_json("indices", "glci_weights", &result.weights)?;
        self.store.save_curated_json("indices", "glci_meta", &result.metadata)?;
        info!("saved curated composite artifacts");
        Ok(())
    }
}

/// Pillar factors reindexed to the composite date grid.
fn pillars_frame(dates: &[Date], outcomes: &[PillarOutcome]) -> Result<DataFrame, IndexError> {
    let mut df = series_frame(dates, &vec![f64::NAN; dates.len()])?;
    let _ = df.drop_in_place("value")?;

    for outcome in outcomes {
        let map: std::collections::BTreeMap<Date, f64> =
            outcome.factor.iter().copied().collect();
        let column: Vec<f64> =
            dates.iter().map(|d| map.get(d).copied().unwrap_or(f64::NAN)).collect();
        append_values(&mut df, &outcome.name, &column)?;
    }
    Ok(df)
}

/// The regime view of the composite table.
fn regimes_frame(glci: &DataFrame) -> Result<DataFrame, IndexError> {
    let dates = date_values(glci, DATE_COL)?;
    let zscores = numeric_values(glci, "zscore")?;
    let regimes = numeric_values(glci, "regime")?;
    let tight = numeric_values(glci, "dist_to_tight")?;
    let loose = numeric_values(glci, "dist_to_loose")?;

    let labels: Vec<String> = regimes
        .iter()
        .map(|r| Regime::from_code(*r as i32).label().to_string())
        .collect();
    let codes: Vec<i32> = regimes.iter().map(|r| *r as i32).collect();

    let mut df = series_frame(&dates, &zscores)?;
    let _ = df.rename("value", "zscore".into())?;
    df.with_column(Column::new("regime".into(), codes))?;
    df.with_column(Column::new("regime_label".into(), labels))?;
    append_values(&mut df, "dist_to_tight", &tight)?;
    append_values(&mut df, "dist_to_loose", &loose)?;
    Ok(df)
}

fn weights_payload(
    weights: &[(String, f64)],
    signs: &[(String, glci_primitives::Sign)],
    outcomes: &[PillarOutcome],
    dynamic: &Option<(Vec<Date>, Vec<Vec<f64>>)>,
) -> serde_json::Value {
    let pillar_weights: serde_json::Map<String, serde_json::Value> =
        weights.iter().map(|(name, w)| (name.clone(), json!(w))).collect();
    let pillar_signs: serde_json::Map<String, serde_json::Value> =
        signs.iter().map(|(name, s)| (name.clone(), json!(s.value()))).collect();
    let loadings: serde_json::Map<String, serde_json::Value> = outcomes
        .iter()
        .map(|o| {
            let inner: serde_json::Map<String, serde_json::Value> = o
                .loadings
                .iter()
                .map(|(feature, l)| (feature.clone(), json!(l)))
                .collect();
            (o.name.clone(), serde_json::Value::Object(inner))
        })
        .collect();

    let mut payload = json!({
        "pillar_weights": pillar_weights,
        "pillar_signs": pillar_signs,
        "loadings": loadings,
    });
    if let Some((dates, weight_rows)) = dynamic {
        if let (Some(date), Some(row)) = (dates.last(), weight_rows.last()) {
            let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
            let latest: serde_json::Map<String, serde_json::Value> = names
                .iter()
                .zip(row.iter())
                .map(|(name, w)| ((*name).to_string(), json!(w)))
                .collect();
            payload["dynamic_weights"] = json!({
                "as_of": date.format("%Y-%m-%d").to_string(),
                "weights": latest,
            });
        }
    }
    payload
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use glci_features::MemorySource;
    use glci_transforms::series_frame;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    const TEST_CONFIG: &str = r"
series:
  liq_a:
    source: fred
    source_id: LIQA
    frequency: weekly
    unit: index
  liq_b:
    source: fred
    source_id: LIQB
    frequency: weekly
    unit: index
  cred_a:
    source: fred
    source_id: CREDA
    frequency: weekly
    unit: index
  cred_b:
    source: fred
    source_id: CREDB
    frequency: weekly
    unit: index
  stress_a:
    source: fred
    source_id: STRA
    frequency: weekly
    unit: index
  stress_b:
    source: fred
    source_id: STRB
    frequency: weekly
    unit: index
indices:
  glci_test:
    frequency: weekly
    normalize: { mean: 100, stdev: 10 }
    pillars:
      liquidity:
        weight: 0.4
        transforms: [level]
        components:
          - series: liq_a
          - series: liq_b
      credit:
        weight: 0.3
        transforms: [level]
        components:
          - series: cred_a
          - series: cred_b
      stress:
        weight: 0.3
        sign: -1
        transforms: [level]
        components:
          - series: stress_a
          - series: stress_b
";

    fn weekly(i: usize) -> Date {
        NaiveDate::from_ymd_opt(2019, 1, 4).unwrap() + chrono::Duration::weeks(i as i64)
    }

    fn noisy_series(seed: u64, n: usize) -> DataFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut level = 100.0;
        let values: Vec<f64> = (0..n)
            .map(|_| {
                level += rng.gen_range(-1.0..1.2);
                level
            })
            .collect();
        let dates: Vec<Date> = (0..n).map(weekly).collect();
        series_frame(&dates, &values).unwrap()
    }

    fn full_source(n: usize) -> MemorySource {
        let mut source = MemorySource::new();
        for (seed, id) in
            ["liq_a", "liq_b", "cred_a", "cred_b", "stress_a", "stress_b"].iter().enumerate()
        {
            source.insert(*id, noisy_series(seed as u64 + 1, n));
        }
        source
    }

    fn computer<'a>(
        registry: &'a Registry,
        source: &'a MemorySource,
        store: &'a DataStore,
    ) -> GlciComputer<'a, MemorySource> {
        GlciComputer::for_index(registry, source, store, "glci_test")
    }

    #[test]
    fn computes_composite_with_all_pillars() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let source = full_source(200);
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let result =
            computer(&registry, &source, &store).compute(&GlciOptions::default()).unwrap();

        assert!(result.missing_pillars.is_empty());
        assert_eq!(result.pillar_results.len(), 3);
        assert!(result.glci.height() > 100);

        // Regime invariant: -1 iff zscore < -1, +1 iff zscore > 1.
        let zscores = numeric_values(&result.glci, "zscore").unwrap();
        let regimes = numeric_values(&result.glci, "regime").unwrap();
        for (z, r) in zscores.iter().zip(regimes.iter()) {
            let code = *r as i32;
            if z.is_finite() {
                if *z < -1.0 {
                    assert_eq!(code, -1);
                } else if *z > 1.0 {
                    assert_eq!(code, 1);
                } else {
                    assert_eq!(code, 0);
                }
            } else {
                assert_eq!(code, 0);
            }
        }
    }

    #[test]
    fn empty_stress_pillar_redistributes_weights() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let mut source = MemorySource::new();
        for (seed, id) in ["liq_a", "liq_b", "cred_a", "cred_b"].iter().enumerate() {
            source.insert(*id, noisy_series(seed as u64 + 1, 200));
        }
        // Stress components return no data at all.
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let result =
            computer(&registry, &source, &store).compute(&GlciOptions::default()).unwrap();

        assert_eq!(result.missing_pillars, vec!["stress".to_string()]);

        let weights = result.weights["pillar_weights"].as_object().unwrap();
        let liq = weights["liquidity"].as_f64().unwrap();
        let cred = weights["credit"].as_f64().unwrap();
        assert!((liq - 0.4 / 0.7).abs() < 1e-9, "liquidity weight {liq}");
        assert!((cred - 0.3 / 0.7).abs() < 1e-9, "credit weight {cred}");
        assert!(weights.get("stress").is_none());

        // Metadata still reports a current regime.
        assert!(result.metadata["current_regime"]["regime_label"].is_string());
        assert_eq!(
            result.metadata["missing_pillars"],
            serde_json::json!(["stress"])
        );
    }

    #[test]
    fn all_pillars_failing_is_fatal() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let source = MemorySource::new();
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let result = computer(&registry, &source, &store).compute(&GlciOptions::default());
        assert!(matches!(result, Err(IndexError::NoPillars)));
    }

    #[test]
    fn save_output_persists_curated_artifacts() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let source = full_source(200);
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let options = GlciOptions { save_output: true, ..Default::default() };
        computer(&registry, &source, &store).compute(&options).unwrap();

        assert!(store.load_curated("indices", "glci").unwrap().is_some());
        assert!(store.load_curated("indices", "glci_pillars").unwrap().is_some());
        assert!(store.load_curated_json("indices", "glci_weights").unwrap().is_some());
        assert!(store.load_curated_json("indices", "glci_meta").unwrap().is_some());
        assert!(store.load_curated_metadata("indices", "glci").unwrap().is_some());
    }

    #[test]
    fn stress_pillar_factor_is_inverted() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let source = full_source(200);
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let result =
            computer(&registry, &source, &store).compute(&GlciOptions::default()).unwrap();

        // With the pre-flip (components negated going in) and the pillar-level
        // inversion coming out, the stored stress factor moves against its raw
        // component levels: verify the pillar column exists and is populated.
        let stress = numeric_values(&result.pillars, "stress").unwrap();
        assert!(stress.iter().filter(|v| v.is_finite()).count() > 100);
    }

    #[test]
    fn pre_flipped_components_correlate_positively_with_factor() {
        // One liquidity component declared with sign -1: after the builder's
        // pre-flip, every matrix column must co-move with the extracted
        // factor.
        const CONFIG: &str = r"
series:
  up:
    source: fred
    source_id: UP
    frequency: weekly
    unit: index
  down:
    source: fred
    source_id: DOWN
    frequency: weekly
    unit: index
indices:
  two_leg:
    frequency: weekly
    pillars:
      liquidity:
        weight: 1.0
        transforms: [level]
        components:
          - series: up
          - series: down
            sign: -1
";
        let registry = Registry::from_yaml(CONFIG).unwrap();
        let mut source = MemorySource::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut level = 0.0;
        let latent: Vec<f64> = (0..200)
            .map(|_| {
                level += rng.gen_range(-1.0..1.1);
                level
            })
            .collect();
        let dates: Vec<Date> = (0..200).map(weekly).collect();
        let up: Vec<f64> =
            latent.iter().map(|l| 100.0 + l + rng.gen_range(-0.3..0.3)).collect();
        let down: Vec<f64> =
            latent.iter().map(|l| 100.0 - l + rng.gen_range(-0.3..0.3)).collect();
        source.insert("up", series_frame(&dates, &up).unwrap());
        source.insert("down", series_frame(&dates, &down).unwrap());

        let builder = glci_features::FeatureMatrixBuilder::new(&registry, &source);
        let (matrix, _) = builder
            .build_pillar_matrix("two_leg", "liquidity", None, None, Frequency::Weekly)
            .unwrap();

        let panel = glci_model::FeaturePanel::from_frame(&matrix).unwrap();
        let fit = glci_model::FactorModel::new().fit(&panel).unwrap();

        for column in &panel.names {
            let idx = panel.names.iter().position(|n| n == column).unwrap();
            let pairs: Vec<(f64, f64)> = (0..panel.n_rows())
                .filter(|&i| panel.data[[i, idx]].is_finite() && fit.factors[i].is_finite())
                .map(|i| (panel.data[[i, idx]], fit.factors[i]))
                .collect();
            let n = pairs.len() as f64;
            let mx = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
            let my = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
            let cov: f64 = pairs.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
            assert!(cov >= 0.0, "column {column} moves against the factor");
        }
    }

    #[test]
    fn freshness_marks_missing_series_stale() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let mut source = MemorySource::new();
        source.insert("liq_a", noisy_series(1, 50));
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();

        let entries = computer(&registry, &source, &store).data_freshness().unwrap();
        assert_eq!(entries.len(), 6);

        let missing = entries.iter().find(|e| e.series_id == "stress_a").unwrap();
        assert_eq!(missing.days_old, -1);
        assert!(missing.is_stale);
        assert!(missing.last_date.is_none());

        let present = entries.iter().find(|e| e.series_id == "liq_a").unwrap();
        assert!(present.last_date.is_some());
    }

    #[test]
    fn latest_reads_back_saved_composite() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let source = full_source(200);
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let glci = computer(&registry, &source, &store);

        assert!(glci.latest().unwrap().is_none());

        let options = GlciOptions { save_output: true, ..Default::default() };
        glci.compute(&options).unwrap();

        let latest = glci.latest().unwrap().unwrap();
        assert!(latest["value"].is_f64());
        assert!(latest["regime_label"].is_string());
    }
}

//! The per-pillar feature-matrix builder.

use chrono::Utc;
use glci_config::{PillarComponent, PillarConfig, Registry, TransformKind};
use glci_primitives::{Date, FeatureMetadata, Frequency, Sign};
use glci_transforms::{
    Agg, DATE_COL, GrowthMethod, StandardizeMethod, align_outer, apply_sign_flip, bounded_fill,
    credit_impulse, date_values, growth_rate, hp_filter_gap, numeric_values, resample, rolling_gap,
    series_frame, standardize, zscore,
};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::{DataQualityReport, FeatureError, SeriesSource, SourceError};

/// Minimum finite points a derived transform must produce to become a
/// feature.
const MIN_TRANSFORM_POINTS: usize = 10;

/// Minimum window observations for rolling statistics inside features.
const MIN_PERIODS: usize = 20;

/// Builds standardized feature matrices for a pillar from configured
/// components.
///
/// One builder per orchestrator run: the underlying source is expected to
/// memoize `(series, window)` fetches for the builder's lifetime.
#[derive(Debug)]
pub struct FeatureMatrixBuilder<'a, S> {
    registry: &'a Registry,
    source: &'a S,
}

impl<'a, S: SeriesSource> FeatureMatrixBuilder<'a, S> {
    /// Builder over a registry and a series source.
    #[must_use]
    pub const fn new(registry: &'a Registry, source: &'a S) -> Self {
        Self { registry, source }
    }

    /// Build the feature matrix and metadata for one pillar of a pillarized
    /// index.
    ///
    /// Each configured component is fetched, pre-flipped when its effective
    /// sign is negative, resampled to `target_freq`, run through its
    /// transforms, and standardized. The columns are outer-joined on date and
    /// filled forward up to one quarter then backward up to one month.
    pub fn build_pillar_matrix(
        &self,
        index_id: &str,
        pillar_name: &str,
        start: Option<Date>,
        end: Option<Date>,
        target_freq: Frequency,
    ) -> Result<(DataFrame, Vec<FeatureMetadata>), FeatureError> {
        let pillar = self.registry.pillar(index_id, pillar_name)?;

        let mut features: Vec<(String, DataFrame)> = Vec::new();
        let mut metadata: Vec<FeatureMetadata> = Vec::new();

        for component in &pillar.components {
            match self.build_component(pillar_name, pillar, component, start, end, target_freq) {
                Ok(built) => {
                    for (name, df, meta) in built {
                        features.push((name, df));
                        metadata.push(meta);
                    }
                }
                Err(FeatureError::Source(SourceError::NotFound(series)))
                | Err(FeatureError::Source(SourceError::Unavailable { series, .. })) => {
                    warn!(pillar = pillar_name, series = %series, "component unavailable, skipping");
                }
                Err(err) => {
                    warn!(pillar = pillar_name, series = %component.series, error = %err, "component failed, skipping");
                }
            }
        }

        if features.is_empty() {
            return Err(FeatureError::NoFeatures(pillar_name.to_string()));
        }

        let aligned = align_outer(&features)?;
        let feature_names: Vec<&str> =
            features.iter().map(|(name, _)| name.as_str()).collect();
        let (ffill, bfill) = target_freq.fill_limits();
        let filled = bounded_fill(&aligned, &feature_names, ffill, bfill)?;

        // Coverage is measured on the aligned grid the model will see.
        for meta in &mut metadata {
            let column = numeric_values(&filled, &meta.column_name())?;
            let finite = column.iter().filter(|v| v.is_finite()).count();
            meta.data_quality =
                if column.is_empty() { 0.0 } else { finite as f64 / column.len() as f64 };
        }

        debug!(
            pillar = pillar_name,
            features = features.len(),
            rows = filled.height(),
            "built feature matrix"
        );
        Ok((filled, metadata))
    }

    /// Data-quality report for a pillar build.
    pub fn validate_pillar_data(
        &self,
        index_id: &str,
        pillar_name: &str,
        metadata: &[FeatureMetadata],
    ) -> Result<DataQualityReport, FeatureError> {
        let pillar = self.registry.pillar(index_id, pillar_name)?;
        let expected: Vec<String> =
            pillar.components.iter().map(|c| c.series.clone()).collect();
        Ok(DataQualityReport::from_metadata(
            pillar_name,
            &expected,
            metadata,
            Utc::now().date_naive(),
        ))
    }

    fn build_component(
        &self,
        pillar_name: &str,
        pillar: &PillarConfig,
        component: &PillarComponent,
        start: Option<Date>,
        end: Option<Date>,
        target_freq: Frequency,
    ) -> Result<Vec<(String, DataFrame, FeatureMetadata)>, FeatureError> {
        let series_id = &component.series;
        let raw = self.source.series(series_id, start, end)?;
        if raw.height() == 0 {
            return Err(SourceError::Unavailable {
                series: series_id.clone(),
                reason: "empty window".to_string(),
            }
            .into());
        }

        let (unit, source_freq, config_country) = match self.registry.series(series_id) {
            Ok(cfg) => {
                (cfg.unit.clone(), cfg.frequency.to_string(), cfg.country.clone())
            }
            Err(_) => (String::new(), String::new(), String::new()),
        };
        let country = if component.country.is_empty() { config_country } else { component.country.clone() };

        let last_updated = date_values(&raw, DATE_COL)?.into_iter().max();

        let resampled = resample(&raw, target_freq, Agg::Last)?;
        if resampled.height() == 0 {
            return Err(SourceError::Unavailable {
                series: series_id.clone(),
                reason: "no observations after resampling".to_string(),
            }
            .into());
        }

        // Pre-flip before any transform so factor loadings come out positive.
        let effective = pillar.sign.product(component.sign);
        let oriented = apply_sign_flip(&resampled, effective)?;

        let transforms: Vec<TransformKind> = component
            .transform
            .as_ref()
            .map(|spec| spec.to_vec())
            .unwrap_or_else(|| {
                if pillar.transforms.is_empty() {
                    vec![TransformKind::Zscore]
                } else {
                    pillar.transforms.clone()
                }
            });

        let mut built = Vec::new();
        for kind in transforms {
            let Some(values) = self.apply_transform(&oriented, kind, target_freq)? else {
                debug!(series = %series_id, transform = kind.name(), "insufficient output, skipped");
                continue;
            };

            let dates = date_values(&oriented, DATE_COL)?;
            let feature_name = format!("{series_id}_{}", kind.name());
            let df = series_frame(&dates, &values)?;

            let finite = values.iter().filter(|v| v.is_finite()).count();
            built.push((
                feature_name,
                df,
                FeatureMetadata {
                    series_id: series_id.clone(),
                    pillar: pillar_name.to_string(),
                    country: country.clone(),
                    transform: kind.name().to_string(),
                    unit: unit.clone(),
                    // Always positive after the pre-flip.
                    sign: Sign::Positive,
                    source_frequency: source_freq.clone(),
                    data_quality: if values.is_empty() {
                        0.0
                    } else {
                        finite as f64 / values.len() as f64
                    },
                    last_updated,
                },
            ));
        }
        Ok(built)
    }

    /// Apply one transform and standardize its output to a z-score feature.
    ///
    /// Returns `None` when the transform produced too few finite points to be
    /// a usable feature.
    fn apply_transform(
        &self,
        df: &DataFrame,
        kind: TransformKind,
        freq: Frequency,
    ) -> Result<Option<Vec<f64>>, FeatureError> {
        let values = match kind {
            TransformKind::Level => {
                // Raw level on an expanding z-score so early history is not
                // rescaled by late-sample moments.
                let scored = zscore(df, None, MIN_PERIODS)?;
                numeric_values(&scored, "zscore")?
            }
            TransformKind::Zscore => {
                let scored = zscore(df, Some(freq.zscore_window()), MIN_PERIODS)?;
                numeric_values(&scored, "zscore")?
            }
            TransformKind::Growth => {
                let grown = growth_rate(df, freq.growth_periods(), GrowthMethod::Pct)?;
                standardize_column(&grown, "growth_rate")?
            }
            TransformKind::Gap => {
                let gapped = rolling_gap(df, freq.gap_window())?;
                standardize_column(&gapped, "gap_pct")?
            }
            TransformKind::Impulse => {
                let impulse = credit_impulse(df, freq.growth_periods())?;
                let raw = numeric_values(&impulse, "credit_impulse")?;
                if raw.iter().filter(|v| v.is_finite()).count() <= MIN_TRANSFORM_POINTS {
                    return Ok(None);
                }
                standardize_column(&impulse, "credit_impulse")?
            }
            TransformKind::HpGap => {
                let filtered = hp_filter_gap(df, freq.hp_lambda())?;
                let raw = numeric_values(&filtered, "hp_gap")?;
                if raw.iter().filter(|v| v.is_finite()).count() <= MIN_TRANSFORM_POINTS {
                    return Ok(None);
                }
                standardize_column(&filtered, "hp_gap")?
            }
        };

        if values.iter().filter(|v| v.is_finite()).count() < 2 {
            return Ok(None);
        }
        Ok(Some(values))
    }
}

/// Standardize a derived column to a full-sample z-score.
fn standardize_column(df: &DataFrame, col: &str) -> Result<Vec<f64>, FeatureError> {
    let dates = date_values(df, DATE_COL)?;
    let raw = numeric_values(df, col)?;
    let tmp = series_frame(&dates, &raw)?;
    let scored = standardize(&tmp, StandardizeMethod::Zscore, None)?;
    Ok(numeric_values(&scored, "standardized")?)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use glci_config::Registry;
    use super::*;
    use crate::MemorySource;

    const TEST_CONFIG: &str = r"
series:
  flows:
    source: fred
    source_id: FLOWS
    frequency: weekly
    unit: usd_billions
  drains:
    source: fred
    source_id: DRAINS
    frequency: weekly
    unit: usd_billions
indices:
  test_index:
    frequency: weekly
    pillars:
      liquidity:
        weight: 1.0
        transforms: [level]
        components:
          - series: flows
          - series: drains
            sign: -1
          - series: absent
";

    fn weekly(i: usize) -> Date {
        NaiveDate::from_ymd_opt(2020, 1, 3).unwrap() + chrono::Duration::weeks(i as i64)
    }

    fn weekly_series(values: &[f64]) -> DataFrame {
        let dates: Vec<Date> = (0..values.len()).map(weekly).collect();
        series_frame(&dates, values).unwrap()
    }

    fn setup() -> (Registry, MemorySource) {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let mut source = MemorySource::new();
        let base: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
        let inverse: Vec<f64> = (0..120).map(|i| 500.0 - 2.0 * i as f64).collect();
        source.insert("flows", weekly_series(&base));
        source.insert("drains", weekly_series(&inverse));
        (registry, source)
    }

    #[test]
    fn builds_matrix_with_expected_columns() {
        let (registry, source) = setup();
        let builder = FeatureMatrixBuilder::new(&registry, &source);

        let (matrix, metadata) = builder
            .build_pillar_matrix("test_index", "liquidity", None, None, Frequency::Weekly)
            .unwrap();

        let columns: Vec<String> =
            matrix.get_column_names().iter().map(|c| c.to_string()).collect();
        assert!(columns.contains(&"flows_level".to_string()));
        assert!(columns.contains(&"drains_level".to_string()));
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn every_emitted_sign_is_positive() {
        let (registry, source) = setup();
        let builder = FeatureMatrixBuilder::new(&registry, &source);

        let (_, metadata) = builder
            .build_pillar_matrix("test_index", "liquidity", None, None, Frequency::Weekly)
            .unwrap();

        assert!(metadata.iter().all(|m| m.sign == Sign::Positive));
    }

    #[test]
    fn negative_sign_component_is_pre_flipped() {
        let (registry, source) = setup();
        let builder = FeatureMatrixBuilder::new(&registry, &source);

        let (matrix, _) = builder
            .build_pillar_matrix("test_index", "liquidity", None, None, Frequency::Weekly)
            .unwrap();

        // "drains" falls over time, but with sign -1 its standardized level
        // feature must rise alongside "flows".
        let flows = numeric_values(&matrix, "flows_level").unwrap();
        let drains = numeric_values(&matrix, "drains_level").unwrap();
        let finite: Vec<(f64, f64)> = flows
            .iter()
            .zip(drains.iter())
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .collect();
        assert!(finite.len() > 50);
        let rising = finite.windows(2).filter(|w| w[1].1 > w[0].1).count();
        assert!(rising as f64 / finite.len() as f64 > 0.9);
    }

    #[test]
    fn missing_component_is_skipped_and_reported() {
        let (registry, source) = setup();
        let builder = FeatureMatrixBuilder::new(&registry, &source);

        let (_, metadata) = builder
            .build_pillar_matrix("test_index", "liquidity", None, None, Frequency::Weekly)
            .unwrap();

        let report =
            builder.validate_pillar_data("test_index", "liquidity", &metadata).unwrap();
        assert_eq!(report.total_series, 3);
        assert_eq!(report.loaded_series, 2);
        assert_eq!(report.missing_series, vec!["absent".to_string()]);
    }

    #[test]
    fn all_components_missing_is_an_error() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let source = MemorySource::new();
        let builder = FeatureMatrixBuilder::new(&registry, &source);

        let result =
            builder.build_pillar_matrix("test_index", "liquidity", None, None, Frequency::Weekly);
        assert!(matches!(result, Err(FeatureError::NoFeatures(_))));
    }

    #[test]
    fn matrix_dates_are_strictly_increasing() {
        let (registry, source) = setup();
        let builder = FeatureMatrixBuilder::new(&registry, &source);

        let (matrix, _) = builder
            .build_pillar_matrix("test_index", "liquidity", None, None, Frequency::Weekly)
            .unwrap();

        let dates = date_values(&matrix, DATE_COL).unwrap();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }
}

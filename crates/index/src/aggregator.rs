//! Arithmetic-form composite indices.

use glci_config::{AggregationMethod, ComponentOp, IndexConfig, Operation, Registry};
use glci_primitives::{Date, Frequency};
use glci_transforms::{
    Agg, DATE_COL, align_outer, bounded_fill, date_values, numeric_values, resample, series_frame,
    zscore,
};
use polars::prelude::{Column, DataFrame};
use tracing::warn;

use crate::IndexError;

/// Rolling window for the z-score averaging method, roughly one year of
/// daily ticks.
const ZSCORE_WINDOW: usize = 252;

/// Computes arithmetic-form composite indices from configured components.
#[derive(Debug)]
pub struct Aggregator<'a, S> {
    registry: &'a Registry,
    source: &'a S,
}

impl<'a, S: glci_features::SeriesSource> Aggregator<'a, S> {
    /// Aggregator over a registry and series source.
    #[must_use]
    pub const fn new(registry: &'a Registry, source: &'a S) -> Self {
        Self { registry, source }
    }

    /// Compute one arithmetic-form index as a `(date, value, index_id)`
    /// table.
    pub fn compute_index(
        &self,
        index_id: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, IndexError> {
        let (method, frequency, components) = match self.registry.index(index_id)? {
            IndexConfig::Arithmetic { method, frequency, components, .. } => {
                (*method, *frequency, components.clone())
            }
            IndexConfig::Pillarized { .. } => {
                return Err(glci_config::ConfigError::WrongIndexForm(
                    index_id.to_string(),
                    "arithmetic",
                )
                .into());
            }
        };

        let result = match method {
            AggregationMethod::Arithmetic => {
                self.compute_arithmetic(&components, frequency, start, end)?
            }
            AggregationMethod::ZscoreAverage => {
                self.compute_zscore_average(&components, frequency, start, end)?
            }
            AggregationMethod::SumNormalized => {
                self.compute_weighted_sum(&components, frequency, start, end, false)?
            }
            AggregationMethod::WeightedAverage => {
                self.compute_weighted_sum(&components, frequency, start, end, true)?
            }
        };

        let (dates, values) = result;
        if dates.is_empty() {
            return Err(IndexError::EmptyIndex(index_id.to_string()));
        }
        let mut df = series_frame(&dates, &values)?;
        df.with_column(Column::new("index_id".into(), vec![index_id.to_string(); dates.len()]))?;
        Ok(df)
    }

    /// Compute every configured arithmetic-form index, skipping failures.
    pub fn compute_all(
        &self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Vec<(String, Result<DataFrame, IndexError>)> {
        self.registry
            .all_indices()
            .filter(|(_, cfg)| matches!(cfg, IndexConfig::Arithmetic { .. }))
            .map(|(id, _)| {
                let result = self.compute_index(id, start, end);
                if let Err(err) = &result {
                    warn!(index = id, error = %err, "index computation failed");
                }
                (id.to_string(), result)
            })
            .collect()
    }

    /// Signed add/subtract/multiply combination on the inner date grid.
    fn compute_arithmetic(
        &self,
        components: &[ComponentOp],
        frequency: Frequency,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<(Vec<Date>, Vec<f64>), IndexError> {
        let aligned = self.aligned_components(components, frequency, Agg::Last, start, end)?;
        let (dates, columns) = inner_rows(&aligned)?;

        let mut values = vec![0.0; dates.len()];
        for (comp, column) in components.iter().zip(columns.iter()) {
            for (i, v) in column.iter().enumerate() {
                match comp.operation {
                    Operation::Add => values[i] += v * comp.weight,
                    Operation::Subtract => values[i] -= v * comp.weight,
                    // TODO: multiply folds the weight into the product term;
                    // confirm the intended scaling with domain review.
                    Operation::Multiply => values[i] *= v * comp.weight,
                }
            }
        }
        Ok((dates, values))
    }

    /// Weighted average of rolling z-scores on the inner date grid.
    fn compute_zscore_average(
        &self,
        components: &[ComponentOp],
        frequency: Frequency,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<(Vec<Date>, Vec<f64>), IndexError> {
        let mut scored: Vec<(String, DataFrame)> = Vec::with_capacity(components.len());
        for comp in components {
            let raw = self.source.series(&comp.series, start, end)?;
            let resampled = resample(&raw, frequency, Agg::Mean)?;
            let with_scores = zscore(&resampled, Some(ZSCORE_WINDOW), 20)?;
            let dates = date_values(&with_scores, DATE_COL)?;
            let scores = numeric_values(&with_scores, "zscore")?;
            scored.push((comp.series.clone(), series_frame(&dates, &scores)?));
        }

        let aligned = align_outer(&scored)?;
        let (dates, columns) = inner_rows(&aligned)?;

        let total_weight: f64 = components.iter().map(|c| c.weight).sum();
        let mut values = vec![0.0; dates.len()];
        for (comp, column) in components.iter().zip(columns.iter()) {
            for (i, v) in column.iter().enumerate() {
                values[i] += v * comp.weight;
            }
        }
        if total_weight > 0.0 {
            for v in &mut values {
                *v /= total_weight;
            }
        }
        Ok((dates, values))
    }

    /// Weighted sum over the outer grid with bounded forward fill.
    ///
    /// With `average` the sum is divided by the total weight, and country GDP
    /// weights take precedence over the configured component weight.
    fn compute_weighted_sum(
        &self,
        components: &[ComponentOp],
        frequency: Frequency,
        start: Option<Date>,
        end: Option<Date>,
        average: bool,
    ) -> Result<(Vec<Date>, Vec<f64>), IndexError> {
        let aligned = self.aligned_components(components, frequency, Agg::Last, start, end)?;
        let names: Vec<&str> = components.iter().map(|c| c.series.as_str()).collect();
        let (ffill, _) = frequency.fill_limits();
        let filled = bounded_fill(&aligned, &names, ffill, 0)?;

        let dates = date_values(&filled, DATE_COL)?;
        let country_weights = self.registry.country_weights();

        let mut values = vec![0.0; dates.len()];
        let mut total_weight = 0.0;
        for comp in components {
            let weight = if average {
                country_weights.get(&comp.country).copied().unwrap_or(comp.weight)
            } else {
                comp.weight
            };
            total_weight += weight;

            let column = numeric_values(&filled, &comp.series)?;
            for (i, v) in column.iter().enumerate() {
                if v.is_finite() {
                    values[i] += v * weight;
                }
            }
        }
        if average && total_weight > 0.0 {
            for v in &mut values {
                *v /= total_weight;
            }
        }
        Ok((dates, values))
    }

    fn aligned_components(
        &self,
        components: &[ComponentOp],
        frequency: Frequency,
        agg: Agg,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, IndexError> {
        let mut resampled: Vec<(String, DataFrame)> = Vec::with_capacity(components.len());
        for comp in components {
            let raw = self.source.series(&comp.series, start, end)?;
            resampled.push((comp.series.clone(), resample(&raw, frequency, agg)?));
        }
        Ok(align_outer(&resampled)?)
    }
}

/// Rows of the aligned grid where every component is present.
fn inner_rows(aligned: &DataFrame) -> Result<(Vec<Date>, Vec<Vec<f64>>), IndexError> {
    let dates = date_values(aligned, DATE_COL)?;
    let names: Vec<String> = aligned
        .get_column_names()
        .iter()
        .filter(|c| c.as_str() != DATE_COL)
        .map(|c| c.to_string())
        .collect();

    let columns: Vec<Vec<f64>> = names
        .iter()
        .map(|name| numeric_values(aligned, name))
        .collect::<Result<_, _>>()?;

    let keep: Vec<usize> = (0..dates.len())
        .filter(|&i| columns.iter().all(|col| col[i].is_finite()))
        .collect();

    let kept_dates: Vec<Date> = keep.iter().map(|&i| dates[i]).collect();
    let kept_columns: Vec<Vec<f64>> = columns
        .iter()
        .map(|col| keep.iter().map(|&i| col[i]).collect())
        .collect();
    Ok((kept_dates, kept_columns))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use glci_features::MemorySource;
    use glci_transforms::series_frame;

    use super::*;

    const TEST_CONFIG: &str = r"
series:
  assets:
    source: fred
    source_id: ASSETS
    frequency: weekly
    unit: usd_billions
  tga:
    source: fred
    source_id: TGA
    frequency: weekly
    unit: usd_billions
  rrp:
    source: fred
    source_id: RRP
    frequency: weekly
    unit: usd_billions
indices:
  net_liquidity:
    method: arithmetic
    frequency: weekly
    components:
      - series: assets
        operation: add
      - series: tga
        operation: subtract
      - series: rrp
        operation: subtract
  blended:
    method: weighted_average
    frequency: weekly
    components:
      - series: assets
        country: US
      - series: tga
        country: JP
country_weights:
  US: 0.75
  JP: 0.25
";

    fn weekly_frame(values: &[f64]) -> DataFrame {
        let dates: Vec<Date> = (0..values.len())
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 5).unwrap() + chrono::Duration::weeks(i as i64))
            .collect();
        series_frame(&dates, values).unwrap()
    }

    fn setup() -> (Registry, MemorySource) {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let mut source = MemorySource::new();
        source.insert("assets", weekly_frame(&[100.0, 110.0, 120.0]));
        source.insert("tga", weekly_frame(&[20.0, 25.0, 30.0]));
        source.insert("rrp", weekly_frame(&[10.0, 10.0, 15.0]));
        (registry, source)
    }

    #[test]
    fn arithmetic_index_subtracts_drains() {
        let (registry, source) = setup();
        let aggregator = Aggregator::new(&registry, &source);

        let df = aggregator.compute_index("net_liquidity", None, None).unwrap();
        let values = numeric_values(&df, "value").unwrap();
        assert_eq!(values, vec![70.0, 75.0, 75.0]);
    }

    #[test]
    fn weighted_average_prefers_country_weights() {
        let (registry, source) = setup();
        let aggregator = Aggregator::new(&registry, &source);

        let df = aggregator.compute_index("blended", None, None).unwrap();
        let values = numeric_values(&df, "value").unwrap();
        // 0.75 * assets + 0.25 * tga over a total weight of 1.
        assert_eq!(values[0], 0.75 * 100.0 + 0.25 * 20.0);
    }

    #[test]
    fn missing_component_fails_the_index() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let mut source = MemorySource::new();
        source.insert("assets", weekly_frame(&[100.0]));
        let aggregator = Aggregator::new(&registry, &source);

        assert!(aggregator.compute_index("net_liquidity", None, None).is_err());
    }

    #[test]
    fn pillarized_index_is_rejected() {
        let registry = Registry::default_config().unwrap();
        let source = MemorySource::new();
        let aggregator = Aggregator::new(&registry, &source);

        assert!(matches!(
            aggregator.compute_index("global_liquidity_credit_index", None, None),
            Err(IndexError::Config(_))
        ));
    }

    #[test]
    fn compute_all_skips_failures() {
        let registry = Registry::from_yaml(TEST_CONFIG).unwrap();
        let mut source = MemorySource::new();
        source.insert("assets", weekly_frame(&[100.0, 110.0]));
        source.insert("tga", weekly_frame(&[20.0, 25.0]));
        // rrp missing: net_liquidity fails, blended succeeds.
        let aggregator = Aggregator::new(&registry, &source);

        let results = aggregator.compute_all(None, None);
        assert_eq!(results.len(), 2);
        let net = results.iter().find(|(id, _)| id == "net_liquidity").unwrap();
        assert!(net.1.is_err());
        let blended = results.iter().find(|(id, _)| id == "blended").unwrap();
        assert!(blended.1.is_ok());
    }
}

//! Pillar-level data-quality reporting.

use glci_primitives::{Date, FeatureMetadata};

/// Coverage below which a feature is reported as low-coverage.
const LOW_COVERAGE: f64 = 0.5;

/// Age in days beyond which a component counts as stale for pillar health.
const STALE_DAYS: i64 = 30;

/// Data-quality summary for one pillar build.
#[derive(Debug, Clone)]
pub struct DataQualityReport {
    /// Pillar name.
    pub pillar: String,
    /// Number of configured component series.
    pub total_series: usize,
    /// Number of component series that produced at least one feature.
    pub loaded_series: usize,
    /// Configured series that produced no feature at all.
    pub missing_series: Vec<String>,
    /// Features with coverage below one half, as `(series_id, coverage)`.
    pub low_coverage_series: Vec<(String, f64)>,
    /// Series whose last observation is older than 30 days, as
    /// `(series_id, days_since_update)`.
    pub stale_series: Vec<(String, i64)>,
}

impl DataQualityReport {
    /// Build a report from configured series ids and the emitted metadata.
    #[must_use]
    pub fn from_metadata(
        pillar: &str,
        expected_series: &[String],
        metadata: &[FeatureMetadata],
        as_of: Date,
    ) -> Self {
        let loaded: Vec<&str> = {
            let mut seen: Vec<&str> = Vec::new();
            for meta in metadata {
                if !seen.contains(&meta.series_id.as_str()) {
                    seen.push(&meta.series_id);
                }
            }
            seen
        };

        let missing_series: Vec<String> = expected_series
            .iter()
            .filter(|s| !loaded.contains(&s.as_str()))
            .cloned()
            .collect();

        let mut low_coverage = Vec::new();
        let mut stale = Vec::new();
        for meta in metadata {
            if meta.data_quality < LOW_COVERAGE {
                low_coverage.push((meta.series_id.clone(), meta.data_quality));
            }
            if let Some(last) = meta.last_updated {
                let days_old = (as_of - last).num_days();
                if days_old > STALE_DAYS
                    && !stale.iter().any(|(s, _): &(String, i64)| s == &meta.series_id)
                {
                    stale.push((meta.series_id.clone(), days_old));
                }
            }
        }

        Self {
            pillar: pillar.to_string(),
            total_series: expected_series.len(),
            loaded_series: loaded.len(),
            missing_series,
            low_coverage_series: low_coverage,
            stale_series: stale,
        }
    }
}

//! Regime classification and regime-change probability.

use glci_primitives::{Regime, RegimeThresholds};
use polars::prelude::DataFrame;

use crate::{TransformError, frame, stats, zscore};

/// Minimum finite values before an expanding z-score is emitted.
const DEFAULT_MIN_PERIODS: usize = 20;

/// Classify each row into a regime from its z-score.
///
/// Uses the `zscore` column when present, otherwise computes an expanding
/// z-score from `value` first. Classification is strict: the regime is tight
/// only below the low threshold and loose only above the high one. Rows with
/// a missing z-score are neutral.
pub fn detect_regime(
    df: &DataFrame,
    thresholds: RegimeThresholds,
) -> Result<DataFrame, TransformError> {
    let with_scores = if df.get_column_names().iter().any(|c| c.as_str() == "zscore") {
        df.clone()
    } else {
        zscore(df, None, DEFAULT_MIN_PERIODS)?
    };

    let scores = frame::numeric_values(&with_scores, "zscore")?;
    let regimes: Vec<i32> = scores
        .iter()
        .map(|&z| {
            if z.is_finite() { Regime::classify(z, thresholds).code() } else { Regime::Neutral.code() }
        })
        .collect();

    let mut out = with_scores;
    out.with_column(polars::prelude::Column::new("regime".into(), regimes))?;
    Ok(out)
}

/// Distance-to-threshold features and a regime-change probability.
///
/// Emits `dist_to_tight` (z-score minus the low threshold), `dist_to_loose`
/// (high threshold minus z-score), `zscore_trend` (average per-tick change of
/// the z-score over `window`), and `prob_regime_change`. The probability is
/// piecewise by trend direction: a falling z-score is scored by its proximity
/// to the tight threshold and a rising one by its proximity to the loose
/// threshold, then smoothed over `smoothing` ticks and clipped to [0, 1].
pub fn regime_probability(
    df: &DataFrame,
    window: usize,
    smoothing: usize,
) -> Result<DataFrame, TransformError> {
    if window == 0 || smoothing == 0 {
        return Err(TransformError::InvalidParameter(
            "window and smoothing must be positive".to_string(),
        ));
    }
    let thresholds = RegimeThresholds::default();
    let scores = frame::numeric_values(df, "zscore")?;
    let n = scores.len();

    let dist_to_tight: Vec<f64> = scores.iter().map(|z| z - thresholds.low).collect();
    let dist_to_loose: Vec<f64> = scores.iter().map(|z| thresholds.high - z).collect();

    let mut trend = vec![f64::NAN; n];
    for i in window..n {
        if scores[i].is_finite() && scores[i - window].is_finite() {
            trend[i] = (scores[i] - scores[i - window]) / window as f64;
        }
    }

    let mut raw = vec![f64::NAN; n];
    for i in 0..n {
        if !trend[i].is_finite() || !scores[i].is_finite() {
            continue;
        }
        let dist = if trend[i] < 0.0 { dist_to_tight[i] } else { dist_to_loose[i] };
        // Inside the band the probability decays with distance to the
        // threshold being approached; beyond it a change is imminent.
        raw[i] = (-dist.max(0.0)).exp();
    }

    let smoothed = stats::rolling_apply(&raw, Some(smoothing), 1, stats::nan_mean);
    let prob: Vec<f64> =
        smoothed.iter().map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { f64::NAN }).collect();

    let mut out = df.clone();
    frame::append_values(&mut out, "dist_to_tight", &dist_to_tight)?;
    frame::append_values(&mut out, "dist_to_loose", &dist_to_loose)?;
    frame::append_values(&mut out, "zscore_trend", &trend)?;
    frame::append_values(&mut out, "prob_regime_change", &prob)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use glci_primitives::Date;
    use polars::prelude::Column;

    use super::*;
    use crate::{frame::series_frame, numeric_values};

    fn dates(n: usize) -> Vec<Date> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect()
    }

    fn with_zscores(zscores: &[f64]) -> DataFrame {
        let mut df = series_frame(&dates(zscores.len()), zscores).unwrap();
        let nullable: Vec<Option<f64>> =
            zscores.iter().map(|z| if z.is_finite() { Some(*z) } else { None }).collect();
        df.with_column(Column::new("zscore".into(), nullable)).unwrap();
        df
    }

    #[test]
    fn classifies_spec_example() {
        let df = with_zscores(&[-1.2, -0.9, 0.0, 1.1, 2.0]);
        let out = detect_regime(&df, RegimeThresholds::default()).unwrap();
        let regimes = numeric_values(&out, "regime").unwrap();
        let codes: Vec<i32> = regimes.iter().map(|r| *r as i32).collect();
        assert_eq!(codes, vec![-1, 0, 0, 1, 1]);
    }

    #[test]
    fn missing_zscore_is_neutral() {
        let df = with_zscores(&[f64::NAN, 1.5]);
        let out = detect_regime(&df, RegimeThresholds::default()).unwrap();
        let regimes = numeric_values(&out, "regime").unwrap();
        assert_eq!(regimes[0] as i32, 0);
        assert_eq!(regimes[1] as i32, 1);
    }

    #[test]
    fn computes_zscore_when_absent() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let df = series_frame(&dates(30), &values).unwrap();
        let out = detect_regime(&df, RegimeThresholds::default()).unwrap();
        assert!(out.get_column_names().iter().any(|c| c.as_str() == "zscore"));
    }

    #[test]
    fn probability_rises_near_thresholds() {
        // A steadily falling z-score approaching the tight threshold.
        let falling: Vec<f64> = (0..20).map(|i| 1.0 - 0.12 * i as f64).collect();
        let df = with_zscores(&falling);
        let out = regime_probability(&df, 4, 2).unwrap();
        let prob = numeric_values(&out, "prob_regime_change").unwrap();
        let trend = numeric_values(&out, "zscore_trend").unwrap();

        assert!(trend[10] < 0.0);
        // Later points are closer to the threshold, so probability increases.
        assert!(prob[19] > prob[6]);
        assert!(prob[19] <= 1.0);
    }

    #[test]
    fn distances_use_default_thresholds() {
        let df = with_zscores(&[0.0]);
        let out = regime_probability(&df, 1, 1).unwrap();
        let tight = numeric_values(&out, "dist_to_tight").unwrap();
        let loose = numeric_values(&out, "dist_to_loose").unwrap();
        assert_eq!(tight[0], 1.0);
        assert_eq!(loose[0], 1.0);
    }
}

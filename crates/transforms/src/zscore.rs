//! Z-score and standardization transforms.

use polars::prelude::DataFrame;

use crate::{TransformError, frame, stats};

/// Rolling (or expanding) z-score, in a `zscore` column.
///
/// With a window the statistics are computed over the trailing `window`
/// ticks; without one the window expands from the start of the sample. Points
/// where fewer than `min_periods` finite values are available, or where the
/// dispersion is zero, come out as NaN.
pub fn zscore(
    df: &DataFrame,
    window: Option<usize>,
    min_periods: usize,
) -> Result<DataFrame, TransformError> {
    if window == Some(0) {
        return Err(TransformError::InvalidParameter("window must be positive".to_string()));
    }
    let (dates, values) = frame::sorted_series_parts(df)?;

    let means = stats::rolling_apply(&values, window, min_periods, stats::nan_mean);
    let stds = stats::rolling_apply(&values, window, min_periods, stats::nan_std);

    let scores: Vec<f64> = values
        .iter()
        .zip(means.iter().zip(stds.iter()))
        .map(|(v, (m, s))| {
            if v.is_finite() && m.is_finite() && s.is_finite() && *s > 0.0 {
                (v - m) / s
            } else {
                f64::NAN
            }
        })
        .collect();

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "zscore", &scores)?;
    Ok(out)
}

/// Standardization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardizeMethod {
    /// Subtract mean, divide by sample standard deviation.
    Zscore,
    /// Scale to the [0, 1] range.
    MinMax,
    /// Subtract median, divide by interquartile range.
    Robust,
}

/// Standardize a series, in a `standardized` column.
///
/// Without a window the statistics come from the full sample; with one they
/// come from the trailing window at each point.
pub fn standardize(
    df: &DataFrame,
    method: StandardizeMethod,
    window: Option<usize>,
) -> Result<DataFrame, TransformError> {
    let (dates, values) = frame::sorted_series_parts(df)?;

    let standardized = match window {
        None => standardize_full(&values, method),
        Some(w) => {
            if w == 0 {
                return Err(TransformError::InvalidParameter(
                    "window must be positive".to_string(),
                ));
            }
            let mut out = vec![f64::NAN; values.len()];
            for i in 0..values.len() {
                let start = i.saturating_sub(w - 1);
                let slice = &values[start..=i];
                out[i] = standardize_point(values[i], slice, method);
            }
            out
        }
    };

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "standardized", &standardized)?;
    Ok(out)
}

fn standardize_full(values: &[f64], method: StandardizeMethod) -> Vec<f64> {
    values.iter().map(|&v| standardize_point(v, values, method)).collect()
}

fn standardize_point(value: f64, sample: &[f64], method: StandardizeMethod) -> f64 {
    if !value.is_finite() {
        return f64::NAN;
    }
    match method {
        StandardizeMethod::Zscore => {
            let (mean, std) = (stats::nan_mean(sample), stats::nan_std(sample));
            if std.is_finite() && std > 0.0 { (value - mean) / std } else { f64::NAN }
        }
        StandardizeMethod::MinMax => {
            let min = sample.iter().copied().filter(|v| v.is_finite()).fold(f64::INFINITY, f64::min);
            let max =
                sample.iter().copied().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range.is_finite() && range > 0.0 { (value - min) / range } else { f64::NAN }
        }
        StandardizeMethod::Robust => {
            let median = stats::nan_median(sample);
            let iqr = stats::nan_quantile(sample, 0.75) - stats::nan_quantile(sample, 0.25);
            if iqr.is_finite() && iqr > 0.0 { (value - median) / iqr } else { f64::NAN }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use glci_primitives::Date;

    use super::*;
    use crate::{frame::series_frame, numeric_values};

    fn dates(n: usize) -> Vec<Date> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + chrono::Duration::weeks(i as i64))
            .collect()
    }

    #[test]
    fn expanding_zscore_standardizes_last_point() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let df = series_frame(&dates(5), &values).unwrap();

        let out = zscore(&df, None, 3).unwrap();
        let z = numeric_values(&out, "zscore").unwrap();

        assert!(z[0].is_nan());
        assert!(z[1].is_nan());
        // At i=4 the expanding mean is 3 and sample std is sqrt(2.5).
        assert_relative_eq!(z[4], 2.0 / 2.5_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn rolling_zscore_uses_window_only() {
        let values = vec![0.0, 0.0, 0.0, 10.0, 20.0, 30.0];
        let df = series_frame(&dates(6), &values).unwrap();

        let out = zscore(&df, Some(3), 2).unwrap();
        let z = numeric_values(&out, "zscore").unwrap();

        // At i=5 the window is [10, 20, 30]: mean 20, std 10.
        assert_relative_eq!(z[5], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_dispersion_gives_nan() {
        let values = vec![5.0; 6];
        let df = series_frame(&dates(6), &values).unwrap();

        let out = zscore(&df, None, 2).unwrap();
        let z = numeric_values(&out, "zscore").unwrap();
        assert!(z.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn minmax_scales_to_unit_range() {
        let values = vec![0.0, 25.0, 50.0, 75.0, 100.0];
        let df = series_frame(&dates(5), &values).unwrap();

        let out = standardize(&df, StandardizeMethod::MinMax, None).unwrap();
        let s = numeric_values(&out, "standardized").unwrap();
        assert_relative_eq!(s[0], 0.0);
        assert_relative_eq!(s[2], 0.5);
        assert_relative_eq!(s[4], 1.0);
    }

    #[test]
    fn robust_uses_median_and_iqr() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let df = series_frame(&dates(5), &values).unwrap();

        let out = standardize(&df, StandardizeMethod::Robust, None).unwrap();
        let s = numeric_values(&out, "standardized").unwrap();
        // Median 3, IQR 2.
        assert_relative_eq!(s[0], -1.0);
        assert_relative_eq!(s[4], 1.0);
    }

    #[test]
    fn full_sample_zscore_has_zero_mean() {
        let values = vec![3.0, 7.0, 11.0, 19.0];
        let df = series_frame(&dates(4), &values).unwrap();

        let out = standardize(&df, StandardizeMethod::Zscore, None).unwrap();
        let s = numeric_values(&out, "standardized").unwrap();
        let mean = s.iter().sum::<f64>() / s.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
    }
}

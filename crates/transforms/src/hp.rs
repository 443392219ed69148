//! Hodrick-Prescott trend extraction.

use polars::prelude::DataFrame;

use crate::{TransformError, frame, stats};

/// Observations below which the filter falls back to a rolling-mean trend.
const MIN_FILTER_LEN: usize = 4;

/// Hodrick-Prescott filter gap.
///
/// Emits `hp_trend` (the smoothed trend solving `(I + lambda D'D) tau = y`)
/// and `hp_gap` (value minus trend). Missing observations stay missing; the
/// filter runs over the finite subsequence. Series too short for the filter
/// fall back to a short rolling-mean trend.
pub fn hp_filter_gap(df: &DataFrame, lambda: f64) -> Result<DataFrame, TransformError> {
    if !lambda.is_finite() || lambda <= 0.0 {
        return Err(TransformError::InvalidParameter(format!(
            "lambda must be positive, got {lambda}"
        )));
    }
    let (dates, values) = frame::sorted_series_parts(df)?;
    let n = values.len();

    let finite_idx: Vec<usize> = (0..n).filter(|&i| values[i].is_finite()).collect();

    let mut trend = vec![f64::NAN; n];
    if finite_idx.len() >= MIN_FILTER_LEN {
        let compact: Vec<f64> = finite_idx.iter().map(|&i| values[i]).collect();
        let compact_trend = solve_hp(&compact, lambda)?;
        for (pos, &i) in finite_idx.iter().enumerate() {
            trend[i] = compact_trend[pos];
        }
    } else {
        // Too short for the second-difference penalty to be meaningful.
        trend = stats::rolling_apply(&values, Some(MIN_FILTER_LEN), 2, stats::nan_mean);
    }

    let gap: Vec<f64> = values
        .iter()
        .zip(trend.iter())
        .map(|(v, t)| if v.is_finite() && t.is_finite() { v - t } else { f64::NAN })
        .collect();

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "hp_trend", &trend)?;
    frame::append_values(&mut out, "hp_gap", &gap)?;
    Ok(out)
}

/// Solve the HP system for a complete series.
///
/// The coefficient matrix `I + lambda D'D` is symmetric pentadiagonal, so a
/// banded LU elimination keeps the solve linear in the series length.
fn solve_hp(y: &[f64], lambda: f64) -> Result<Vec<f64>, TransformError> {
    let n = y.len();
    // Band storage: row i holds entries for columns i-2 .. i+2.
    let mut band = vec![[0.0f64; 5]; n];
    let mut rhs = y.to_vec();

    for i in 0..n {
        band[i][2] = 1.0 + lambda * center_coeff(i, n);
        if i + 1 < n {
            let c = off_one_coeff(i, n);
            band[i][3] = lambda * c;
            band[i + 1][1] = lambda * c;
        }
        if i + 2 < n {
            band[i][4] = lambda;
            band[i + 2][0] = lambda;
        }
    }

    // Banded Gaussian elimination; the system is positive definite so no
    // pivoting is needed and fill-in stays inside the band.
    for k in 0..n {
        let pivot = band[k][2];
        if pivot.abs() < 1e-14 {
            return Err(TransformError::Numerical("singular HP system".to_string()));
        }
        for i in (k + 1)..n.min(k + 3) {
            let offset = i - k; // 1 or 2
            let factor = band[i][2 - offset] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in k..n.min(k + 3) {
                let col = j + 2 - i;
                let pivot_col = j + 2 - k;
                band[i][col] -= factor * band[k][pivot_col];
            }
            rhs[i] -= factor * rhs[k];
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n.min(i + 3) {
            sum -= band[i][j + 2 - i] * x[j];
        }
        x[i] = sum / band[i][2];
    }
    Ok(x)
}

/// Diagonal coefficient of `D'D` at row `i`.
fn center_coeff(i: usize, n: usize) -> f64 {
    if n < 3 {
        return 0.0;
    }
    let edge = i.min(n - 1 - i);
    match edge {
        0 => 1.0,
        1 => 5.0,
        _ => 6.0,
    }
}

/// First off-diagonal coefficient of `D'D` between rows `i` and `i+1`.
fn off_one_coeff(i: usize, n: usize) -> f64 {
    if n < 3 {
        return 0.0;
    }
    if i == 0 || i + 2 == n { -2.0 } else { -4.0 }
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
            .map(|i| NaiveDate::from_ymd_opt(2015, 1, 1).unwrap() + chrono::Duration::days(91 * i as i64))
            .collect()
    }

    #[test]
    fn linear_trend_has_zero_gap() {
        // A perfectly linear series has no second-difference penalty, so the
        // trend reproduces it exactly and the gap vanishes.
        let n = 40;
        let values: Vec<f64> = (0..n).map(|i| 2.0 + 0.5 * i as f64).collect();
        let df = series_frame(&dates(n), &values).unwrap();

        let out = hp_filter_gap(&df, 1600.0).unwrap();
        let gap = numeric_values(&out, "hp_gap").unwrap();
        for g in gap {
            assert_relative_eq!(g, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn trend_smooths_oscillation() {
        let n = 60;
        let values: Vec<f64> =
            (0..n).map(|i| 10.0 + 0.1 * i as f64 + (i as f64).sin()).collect();
        let df = series_frame(&dates(n), &values).unwrap();

        let out = hp_filter_gap(&df, 1600.0).unwrap();
        let trend = numeric_values(&out, "hp_trend").unwrap();
        let gap = numeric_values(&out, "hp_gap").unwrap();

        // Trend variance should be well below the raw oscillation variance.
        let trend_wiggle: f64 =
            trend.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (n - 1) as f64;
        assert!(trend_wiggle < 0.5);
        // Gap reconstructs the series.
        for i in 0..n {
            assert_relative_eq!(trend[i] + gap[i], values[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn short_series_uses_rolling_fallback() {
        let values = vec![1.0, 2.0, 4.0];
        let df = series_frame(&dates(3), &values).unwrap();

        let out = hp_filter_gap(&df, 1600.0).unwrap();
        let trend = numeric_values(&out, "hp_trend").unwrap();
        assert!(trend[0].is_nan());
        assert_relative_eq!(trend[1], 1.5);
        assert_relative_eq!(trend[2], 7.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn missing_values_stay_missing() {
        let n = 20;
        let mut values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        values[7] = f64::NAN;
        let df = series_frame(&dates(n), &values).unwrap();

        let out = hp_filter_gap(&df, 100.0).unwrap();
        let gap = numeric_values(&out, "hp_gap").unwrap();
        assert!(gap[7].is_nan());
        assert!(gap[8].is_finite());
    }

    #[test]
    fn rejects_nonpositive_lambda() {
        let df = series_frame(&dates(5), &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!(hp_filter_gap(&df, 0.0).is_err());
    }
}

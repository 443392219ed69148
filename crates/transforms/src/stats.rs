//! NaN-aware statistics shared by the transforms.

/// Mean of the finite values; NaN when none exist.
pub(crate) fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// Sample standard deviation of the finite values; NaN with fewer than two.
pub(crate) fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for &v in values {
        if v.is_finite() {
            sum_sq += (v - mean).powi(2);
            count += 1;
        }
    }
    if count < 2 { f64::NAN } else { (sum_sq / (count - 1) as f64).sqrt() }
}

/// Number of finite values.
pub(crate) fn finite_count(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_finite()).count()
}

/// Median of the finite values; NaN when none exist.
pub(crate) fn nan_median(values: &[f64]) -> f64 {
    nan_quantile(values, 0.5)
}

/// Linear-interpolation quantile of the finite values.
pub(crate) fn nan_quantile(values: &[f64], q: f64) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = finite.len();
    if n == 1 {
        return finite[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        finite[lower]
    } else {
        let frac = pos - lower as f64;
        finite[lower] * (1.0 - frac) + finite[upper] * frac
    }
}

/// Apply `f` over trailing windows of `window` ticks (or expanding when
/// `window` is `None`), emitting NaN until `min_periods` finite values are
/// available in the window.
pub(crate) fn rolling_apply(
    values: &[f64],
    window: Option<usize>,
    min_periods: usize,
    f: impl Fn(&[f64]) -> f64,
) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    for i in 0..n {
        let start = match window {
            Some(w) => i.saturating_sub(w.saturating_sub(1)),
            None => 0,
        };
        let slice = &values[start..=i];
        if finite_count(slice) >= min_periods.max(1) {
            out[i] = f(slice);
        }
    }
    out
}

/// Pearson correlation over pairs where both values are finite; NaN when
/// fewer than two such pairs exist or either side is constant.
pub(crate) fn nan_correlation(a: &[f64], b: &[f64]) -> f64 {
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
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn mean_ignores_nan() {
        assert_relative_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn std_is_sample_std() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(nan_std(&values), 2.5_f64.sqrt(), epsilon = 1e-12);
        assert!(nan_std(&[1.0]).is_nan());
    }

    #[test]
    fn median_interpolates() {
        assert_relative_eq!(nan_median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(nan_median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn quantile_matches_iqr_bounds() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(nan_quantile(&values, 0.25), 2.0);
        assert_relative_eq!(nan_quantile(&values, 0.75), 4.0);
    }

    #[test]
    fn rolling_respects_min_periods() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let out = rolling_apply(&values, Some(3), 2, nan_mean);
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 1.5);
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 3.0);
    }

    #[test]
    fn correlation_of_identical_series_is_one() {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(nan_correlation(&a, &a), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn correlation_of_constant_is_nan() {
        let a = [1.0, 2.0, 3.0];
        let b = [5.0, 5.0, 5.0];
        assert!(nan_correlation(&a, &b).is_nan());
    }
}

//! Growth, year-over-year change, and momentum transforms.

use polars::prelude::DataFrame;

use crate::{TransformError, frame, stats};

/// How growth between observations is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthMethod {
    /// Simple percent change.
    Pct,
    /// Log change, `ln(x_t / x_{t-k})`, in percent.
    Log,
}

/// Year-over-year percent change, in a `yoy_change` column.
///
/// When `periods` is not given the look-back is detected from the median gap
/// between observations: daily data looks back 252 ticks, weekly 52, monthly
/// 12, quarterly 4, annual 1.
pub fn yoy_change(df: &DataFrame, periods: Option<usize>) -> Result<DataFrame, TransformError> {
    let (dates, values) = frame::sorted_series_parts(df)?;
    let lookback = periods.unwrap_or_else(|| auto_periods(&dates));
    let changes = pct_change(&values, lookback);

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "yoy_change", &changes)?;
    Ok(out)
}

/// Growth over `periods` ticks, in a `growth_rate` column.
pub fn growth_rate(
    df: &DataFrame,
    periods: usize,
    method: GrowthMethod,
) -> Result<DataFrame, TransformError> {
    if periods == 0 {
        return Err(TransformError::InvalidParameter("periods must be positive".to_string()));
    }
    let (dates, values) = frame::sorted_series_parts(df)?;
    let n = values.len();
    let mut growth = vec![f64::NAN; n];
    for i in periods..n {
        let (prev, curr) = (values[i - periods], values[i]);
        if !prev.is_finite() || !curr.is_finite() {
            continue;
        }
        growth[i] = match method {
            GrowthMethod::Pct => {
                if prev == 0.0 {
                    f64::NAN
                } else {
                    (curr / prev - 1.0) * 100.0
                }
            }
            GrowthMethod::Log => {
                if prev > 0.0 && curr > 0.0 {
                    (curr / prev).ln() * 100.0
                } else {
                    f64::NAN
                }
            }
        };
    }

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "growth_rate", &growth)?;
    Ok(out)
}

/// Momentum over short and long windows.
///
/// Emits `momentum` (difference over the short window), `momentum_macd`
/// (short moving average minus long moving average), and `roc` (percent
/// change over the long window).
pub fn momentum(df: &DataFrame, short: usize, long: usize) -> Result<DataFrame, TransformError> {
    if short == 0 || long <= short {
        return Err(TransformError::InvalidParameter(format!(
            "need 0 < short < long, got short={short} long={long}"
        )));
    }
    let (dates, values) = frame::sorted_series_parts(df)?;
    let n = values.len();

    let mut diff = vec![f64::NAN; n];
    for i in short..n {
        if values[i].is_finite() && values[i - short].is_finite() {
            diff[i] = values[i] - values[i - short];
        }
    }

    let short_ma = stats::rolling_apply(&values, Some(short), short, stats::nan_mean);
    let long_ma = stats::rolling_apply(&values, Some(long), long, stats::nan_mean);
    let macd: Vec<f64> = short_ma.iter().zip(long_ma.iter()).map(|(s, l)| s - l).collect();

    let roc = pct_change(&values, long);

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "momentum", &diff)?;
    frame::append_values(&mut out, "momentum_macd", &macd)?;
    frame::append_values(&mut out, "roc", &roc)?;
    Ok(out)
}

fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if periods == 0 {
        return out;
    }
    for i in periods..n {
        let (prev, curr) = (values[i - periods], values[i]);
        if prev.is_finite() && curr.is_finite() && prev != 0.0 {
            out[i] = (curr / prev - 1.0) * 100.0;
        }
    }
    out
}

/// Detect the year-over-year look-back from the median gap between dates.
fn auto_periods(dates: &[glci_primitives::Date]) -> usize {
    if dates.len() < 2 {
        return 1;
    }
    let mut gaps: Vec<i64> =
        dates.windows(2).map(|pair| (pair[1] - pair[0]).num_days()).collect();
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2];
    if median <= 7 {
        252
    } else if median <= 14 {
        52
    } else if median <= 45 {
        12
    } else if median <= 100 {
        4
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use glci_primitives::Date;

    use super::*;
    use crate::{frame::series_frame, numeric_values};

    fn monthly_dates(n: usize) -> Vec<Date> {
        (0..n)
            .map(|i| {
                NaiveDate::from_ymd_opt(2020 + (i / 12) as i32, (i % 12) as u32 + 1, 28).unwrap()
            })
            .collect()
    }

    #[test]
    fn yoy_auto_detects_monthly_lookback() {
        let dates = monthly_dates(14);
        let values: Vec<f64> = (0..14).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let df = series_frame(&dates, &values).unwrap();

        let out = yoy_change(&df, None).unwrap();
        let yoy = numeric_values(&out, "yoy_change").unwrap();

        assert!(yoy[11].is_nan());
        // 12-period compounded 1% growth.
        assert_relative_eq!(yoy[12], (1.01_f64.powi(12) - 1.0) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn growth_pct_and_log_agree_for_small_moves() {
        let dates = monthly_dates(3);
        let values = vec![100.0, 100.5, 101.0];
        let df = series_frame(&dates, &values).unwrap();

        let pct = growth_rate(&df, 1, GrowthMethod::Pct).unwrap();
        let log = growth_rate(&df, 1, GrowthMethod::Log).unwrap();
        let pct_vals = numeric_values(&pct, "growth_rate").unwrap();
        let log_vals = numeric_values(&log, "growth_rate").unwrap();

        assert_relative_eq!(pct_vals[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(pct_vals[1], log_vals[1], epsilon = 2e-3);
    }

    #[test]
    fn growth_through_zero_is_nan() {
        let dates = monthly_dates(3);
        let values = vec![0.0, 5.0, 10.0];
        let df = series_frame(&dates, &values).unwrap();

        let out = growth_rate(&df, 1, GrowthMethod::Pct).unwrap();
        let vals = numeric_values(&out, "growth_rate").unwrap();
        assert!(vals[1].is_nan());
        assert_relative_eq!(vals[2], 100.0);
    }

    #[test]
    fn momentum_macd_is_short_minus_long_ma() {
        let dates = monthly_dates(12);
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        let df = series_frame(&dates, &values).unwrap();

        let out = momentum(&df, 2, 4).unwrap();
        let macd = numeric_values(&out, "momentum_macd").unwrap();
        let diff = numeric_values(&out, "momentum").unwrap();

        // At i=3: short MA = (3+4)/2 = 3.5, long MA = (1+2+3+4)/4 = 2.5.
        assert_relative_eq!(macd[3], 1.0, epsilon = 1e-12);
        assert_relative_eq!(diff[2], 2.0);
        assert!(diff[1].is_nan());
    }

    #[test]
    fn momentum_rejects_bad_windows() {
        let dates = monthly_dates(4);
        let values = vec![1.0; 4];
        let df = series_frame(&dates, &values).unwrap();
        assert!(momentum(&df, 4, 4).is_err());
    }
}

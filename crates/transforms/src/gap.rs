//! Trailing-mean gap and credit-impulse transforms.

use polars::prelude::DataFrame;

use crate::{TransformError, frame, stats};

/// Deviation from the trailing mean over `window` ticks.
///
/// Emits `gap` (value minus trailing mean) and `gap_pct` (gap as a percent of
/// the trailing mean).
pub fn rolling_gap(df: &DataFrame, window: usize) -> Result<DataFrame, TransformError> {
    if window < 2 {
        return Err(TransformError::InvalidParameter("window must be at least 2".to_string()));
    }
    let (dates, values) = frame::sorted_series_parts(df)?;
    let min_periods = (window / 2).max(2);
    let trailing = stats::rolling_apply(&values, Some(window), min_periods, stats::nan_mean);

    let n = values.len();
    let mut gap = vec![f64::NAN; n];
    let mut gap_pct = vec![f64::NAN; n];
    for i in 0..n {
        if values[i].is_finite() && trailing[i].is_finite() {
            gap[i] = values[i] - trailing[i];
            if trailing[i] != 0.0 {
                gap_pct[i] = gap[i] / trailing[i] * 100.0;
            }
        }
    }

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "gap", &gap)?;
    frame::append_values(&mut out, "gap_pct", &gap_pct)?;
    Ok(out)
}

/// Credit impulse: first and second differences of a level series.
///
/// `credit_flow` is the `periods`-tick difference of the level (the flow of
/// new credit) and `credit_impulse` is the same difference of the flow. The
/// impulse leads activity where the level merely accumulates.
pub fn credit_impulse(df: &DataFrame, periods: usize) -> Result<DataFrame, TransformError> {
    if periods == 0 {
        return Err(TransformError::InvalidParameter("periods must be positive".to_string()));
    }
    let (dates, values) = frame::sorted_series_parts(df)?;

    let flow = diff(&values, periods);
    let impulse = diff(&flow, periods);

    let mut out = frame::series_frame(&dates, &values)?;
    frame::append_values(&mut out, "credit_flow", &flow)?;
    frame::append_values(&mut out, "credit_impulse", &impulse)?;
    Ok(out)
}

fn diff(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    for i in periods..n {
        if values[i].is_finite() && values[i - periods].is_finite() {
            out[i] = values[i] - values[i - periods];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use glci_primitives::Date;

    use super::*;
    use crate::{frame::series_frame, numeric_values};

    fn quarterly_dates(n: usize) -> Vec<Date> {
        (0..n)
            .map(|i| {
                let month = (i % 4) * 3 + 3;
                NaiveDate::from_ymd_opt(2020 + (i / 4) as i32, month as u32, 28).unwrap()
            })
            .collect()
    }

    #[test]
    fn credit_impulse_ordering() {
        // Quarterly credit-to-GDP levels.
        let dates = quarterly_dates(5);
        let values = vec![100.0, 102.0, 105.0, 107.0, 108.0];
        let df = series_frame(&dates, &values).unwrap();

        let out = credit_impulse(&df, 1).unwrap();
        let flow = numeric_values(&out, "credit_flow").unwrap();
        let impulse = numeric_values(&out, "credit_impulse").unwrap();

        assert!(flow[0].is_nan());
        assert_eq!(&flow[1..], &[2.0, 3.0, 2.0, 1.0]);

        assert!(impulse[0].is_nan());
        assert!(impulse[1].is_nan());
        assert_eq!(&impulse[2..], &[1.0, -1.0, -1.0]);
    }

    #[test]
    fn gap_measures_deviation_from_trailing_mean() {
        let dates = quarterly_dates(6);
        let values = vec![10.0, 10.0, 10.0, 10.0, 10.0, 16.0];
        let df = series_frame(&dates, &values).unwrap();

        let out = rolling_gap(&df, 4).unwrap();
        let gap = numeric_values(&out, "gap").unwrap();
        let gap_pct = numeric_values(&out, "gap_pct").unwrap();

        // Trailing mean of the last 4 values at i=5 is (10+10+10+16)/4 = 11.5.
        assert_relative_eq!(gap[5], 4.5, epsilon = 1e-12);
        assert_relative_eq!(gap_pct[5], 4.5 / 11.5 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn nan_input_yields_nan_flow() {
        let dates = quarterly_dates(4);
        let values = vec![100.0, f64::NAN, 105.0, 107.0];
        let df = series_frame(&dates, &values).unwrap();

        let out = credit_impulse(&df, 1).unwrap();
        let flow = numeric_values(&out, "credit_flow").unwrap();
        assert!(flow[1].is_nan());
        assert!(flow[2].is_nan());
        assert_relative_eq!(flow[3], 2.0);
    }
}

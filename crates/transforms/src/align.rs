//! Alignment, bounded filling, as-of merging, and small series utilities.

use std::collections::BTreeMap;

use glci_primitives::{Date, Frequency, Sign};
use polars::prelude::{Column, DataFrame};

use crate::{DATE_COL, TransformError, frame};

/// Outer-join named series on their date grids.
///
/// The result has one `date` column (sorted, distinct) and one column per
/// input series, with NaN where a series has no observation.
pub fn align_outer(series: &[(String, DataFrame)]) -> Result<DataFrame, TransformError> {
    if series.is_empty() {
        return Err(TransformError::EmptyData);
    }

    let mut grid: BTreeMap<Date, Vec<f64>> = BTreeMap::new();
    let n_series = series.len();

    let mut parts = Vec::with_capacity(n_series);
    for (_, df) in series {
        parts.push(frame::sorted_series_parts(df)?);
    }

    for (idx, (dates, values)) in parts.iter().enumerate() {
        for (date, value) in dates.iter().zip(values.iter()) {
            let row = grid.entry(*date).or_insert_with(|| vec![f64::NAN; n_series]);
            row[idx] = *value;
        }
    }

    let out_dates: Vec<Date> = grid.keys().copied().collect();
    let mut df = DataFrame::new(vec![Column::new(DATE_COL.into(), out_dates)])?;
    for (idx, (name, _)) in series.iter().enumerate() {
        let column: Vec<f64> = grid.values().map(|row| row[idx]).collect();
        frame::append_values(&mut df, name, &column)?;
    }
    Ok(df)
}

/// Forward-fill then backward-fill columns with hard bounds.
///
/// Bounds are in rows: a gap is only filled while within `ffill_limit` of the
/// last real observation (resp. `bfill_limit` of the next one). Unbounded
/// fills would let stale values dominate the ragged edge, so both limits are
/// always enforced.
pub fn bounded_fill(
    df: &DataFrame,
    cols: &[&str],
    ffill_limit: usize,
    bfill_limit: usize,
) -> Result<DataFrame, TransformError> {
    let mut out = df.clone();
    for col in cols {
        let mut values = frame::numeric_values(df, col)?;

        let mut last_seen: Option<(usize, f64)> = None;
        for i in 0..values.len() {
            if values[i].is_finite() {
                last_seen = Some((i, values[i]));
            } else if let Some((j, v)) = last_seen {
                if i - j <= ffill_limit {
                    values[i] = v;
                }
            }
        }

        let mut next_seen: Option<(usize, f64)> = None;
        for i in (0..values.len()).rev() {
            if values[i].is_finite() {
                next_seen = Some((i, values[i]));
            } else if let Some((j, v)) = next_seen {
                if j - i <= bfill_limit {
                    values[i] = v;
                }
            }
        }

        frame::append_values(&mut out, col, &values)?;
    }
    Ok(out)
}

/// Backward as-of merge: match each left row to the most recent right row at
/// or before its date.
///
/// Appends the named right-hand columns to the left table (replacing any
/// same-named left column), with NaN where no earlier right row exists. The
/// backward direction is deliberate; matching forward would leak future
/// information into the joined metrics.
pub fn merge_asof_backward(
    left: &DataFrame,
    right: &DataFrame,
    cols: &[&str],
) -> Result<DataFrame, TransformError> {
    let left_dates = frame::date_values(left, DATE_COL)?;
    let right_dates = frame::date_values(right, DATE_COL)?;

    let mut right_order: Vec<usize> = (0..right_dates.len()).collect();
    right_order.sort_by_key(|&i| right_dates[i]);

    let mut out = left.clone();
    for col in cols {
        let right_values = frame::numeric_values(right, col)?;
        let mut merged = vec![f64::NAN; left_dates.len()];

        for (i, left_date) in left_dates.iter().enumerate() {
            // Last right row with date <= left_date.
            let pos = right_order.partition_point(|&j| right_dates[j] <= *left_date);
            if pos > 0 {
                merged[i] = right_values[right_order[pos - 1]];
            }
        }
        frame::append_values(&mut out, col, &merged)?;
    }
    Ok(out)
}

/// Negate the value column when the expected sign is negative.
///
/// Flipping happens before any transform or fit, so factor loadings come out
/// positive by construction.
pub fn apply_sign_flip(df: &DataFrame, sign: Sign) -> Result<DataFrame, TransformError> {
    if !sign.is_negative() {
        return Ok(df.clone());
    }
    let values = frame::numeric_values(df, crate::VALUE_COL)?;
    let flipped: Vec<f64> = values.iter().map(|v| -v).collect();
    let mut out = df.clone();
    frame::append_values(&mut out, crate::VALUE_COL, &flipped)?;
    Ok(out)
}

/// Detect a series' frequency from the median gap between observations.
///
/// Fewer than two observations default to monthly.
pub fn detect_frequency(df: &DataFrame) -> Result<Frequency, TransformError> {
    let dates = frame::date_values(df, DATE_COL)?;
    if dates.len() < 2 {
        return Ok(Frequency::Monthly);
    }
    let mut sorted = dates;
    sorted.sort_unstable();
    let mut gaps: Vec<i64> =
        sorted.windows(2).map(|pair| (pair[1] - pair[0]).num_days()).collect();
    gaps.sort_unstable();
    Ok(Frequency::from_median_gap_days(gaps[gaps.len() / 2]))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{frame::series_frame, numeric_values};

    fn day(d: u32) -> Date {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn outer_join_covers_all_dates() {
        let a = series_frame(&[day(1), day(3)], &[1.0, 3.0]).unwrap();
        let b = series_frame(&[day(2), day(3)], &[20.0, 30.0]).unwrap();

        let aligned =
            align_outer(&[("a".to_string(), a), ("b".to_string(), b)]).unwrap();

        assert_eq!(aligned.height(), 3);
        let a_vals = numeric_values(&aligned, "a").unwrap();
        let b_vals = numeric_values(&aligned, "b").unwrap();
        assert_eq!(a_vals[0], 1.0);
        assert!(b_vals[0].is_nan());
        assert_eq!(b_vals[1], 20.0);
        assert!(a_vals[1].is_nan());
        assert_eq!(a_vals[2], 3.0);
        assert_eq!(b_vals[2], 30.0);
    }

    #[test]
    fn bounded_ffill_stops_at_limit() {
        let dates: Vec<Date> = (1..=6).map(day).collect();
        let values = vec![1.0, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN];
        let df = series_frame(&dates, &values).unwrap();

        let filled = bounded_fill(&df, &["value"], 2, 0).unwrap();
        let vals = numeric_values(&filled, "value").unwrap();

        assert_eq!(vals[1], 1.0);
        assert_eq!(vals[2], 1.0);
        assert!(vals[3].is_nan());
        assert!(vals[5].is_nan());
    }

    #[test]
    fn bounded_bfill_seeds_initial_rows() {
        let dates: Vec<Date> = (1..=4).map(day).collect();
        let values = vec![f64::NAN, f64::NAN, f64::NAN, 4.0];
        let df = series_frame(&dates, &values).unwrap();

        let filled = bounded_fill(&df, &["value"], 0, 1).unwrap();
        let vals = numeric_values(&filled, "value").unwrap();

        assert!(vals[0].is_nan());
        assert!(vals[1].is_nan());
        assert_eq!(vals[2], 4.0);
    }

    #[test]
    fn asof_backward_picks_latest_earlier_row() {
        let left = series_frame(&[day(5), day(10), day(20)], &[0.0, 0.0, 0.0]).unwrap();
        let right = series_frame(&[day(4), day(10), day(15)], &[1.0, 2.0, 3.0]).unwrap();

        let merged = merge_asof_backward(&left, &right, &["value"]).unwrap();
        let vals = numeric_values(&merged, "value").unwrap();
        assert_eq!(vals, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn asof_backward_never_looks_forward() {
        let left = series_frame(&[day(1)], &[0.0]).unwrap();
        let right = series_frame(&[day(2)], &[9.0]).unwrap();

        let merged = merge_asof_backward(&left, &right, &["value"]).unwrap();
        let vals = numeric_values(&merged, "value").unwrap();
        assert!(vals[0].is_nan());
    }

    #[test]
    fn sign_flip_negates_only_negative_sign() {
        let df = series_frame(&[day(1), day(2)], &[1.0, -2.0]).unwrap();

        let flipped = apply_sign_flip(&df, Sign::Negative).unwrap();
        let vals = numeric_values(&flipped, "value").unwrap();
        assert_eq!(vals, vec![-1.0, 2.0]);

        let unchanged = apply_sign_flip(&df, Sign::Positive).unwrap();
        let vals = numeric_values(&unchanged, "value").unwrap();
        assert_eq!(vals, vec![1.0, -2.0]);
    }

    #[test]
    fn frequency_detection_from_gaps() {
        let weekly: Vec<Date> = (0..5)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::weeks(i))
            .collect();
        let df = series_frame(&weekly, &[1.0; 5]).unwrap();
        assert_eq!(detect_frequency(&df).unwrap(), Frequency::Weekly);
    }

    #[test]
    fn two_monthly_points_detect_monthly() {
        let dates = vec![day(1), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()];
        let df = series_frame(&dates, &[1.0, 2.0]).unwrap();
        assert_eq!(detect_frequency(&df).unwrap(), Frequency::Monthly);
    }

    #[test]
    fn single_point_defaults_to_monthly() {
        let df = series_frame(&[day(1)], &[1.0]).unwrap();
        assert_eq!(detect_frequency(&df).unwrap(), Frequency::Monthly);
    }
}

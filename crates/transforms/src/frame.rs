//! Extraction and reconstruction of `(date, value)` tables.
//!
//! Transforms operate on plain vectors: dates as `NaiveDate` and values as
//! `f64` with missing encoded as NaN. Columnar nulls become NaN on the way in
//! and NaN becomes null on the way out, so artifacts stay cleanly nullable.

use glci_primitives::{Date, date_from_epoch_days};
use polars::prelude::*;

use crate::{DATE_COL, TransformError, VALUE_COL};

/// Extract the date column of a table as calendar dates.
pub fn date_values(df: &DataFrame, col: &str) -> Result<Vec<Date>, TransformError> {
    let column = df
        .column(col)
        .map_err(|_| TransformError::MissingColumn(col.to_string()))?;
    let days = column.cast(&DataType::Int32)?;
    let days = days.i32()?;
    days.into_iter()
        .map(|opt| {
            opt.map(date_from_epoch_days)
                .ok_or_else(|| TransformError::Numerical(format!("null date in column {col}")))
        })
        .collect()
}

/// Extract a numeric column as `f64` with nulls mapped to NaN.
pub fn numeric_values(df: &DataFrame, col: &str) -> Result<Vec<f64>, TransformError> {
    let column = df
        .column(col)
        .map_err(|_| TransformError::MissingColumn(col.to_string()))?;
    let floats = column.cast(&DataType::Float64)?;
    let floats = floats.f64()?;
    Ok(floats.into_iter().map(|opt| opt.unwrap_or(f64::NAN)).collect())
}

/// Extract `(dates, values)` from a series table without reordering.
pub fn series_parts(df: &DataFrame) -> Result<(Vec<Date>, Vec<f64>), TransformError> {
    if df.height() == 0 {
        return Err(TransformError::EmptyData);
    }
    Ok((date_values(df, DATE_COL)?, numeric_values(df, VALUE_COL)?))
}

/// Extract `(dates, values)` sorted ascending by date.
pub fn sorted_series_parts(df: &DataFrame) -> Result<(Vec<Date>, Vec<f64>), TransformError> {
    let (dates, values) = series_parts(df)?;
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);
    let sorted_dates = order.iter().map(|&i| dates[i]).collect();
    let sorted_values = order.iter().map(|&i| values[i]).collect();
    Ok((sorted_dates, sorted_values))
}

/// Build a `(date, value)` table, mapping non-finite values to null.
pub fn series_frame(dates: &[Date], values: &[f64]) -> Result<DataFrame, TransformError> {
    let mut df = DataFrame::new(vec![Column::new(DATE_COL.into(), dates.to_vec())])?;
    append_values(&mut df, VALUE_COL, values)?;
    Ok(df)
}

/// Append a numeric column, mapping non-finite values to null.
pub fn append_values(
    df: &mut DataFrame,
    name: &str,
    values: &[f64],
) -> Result<(), TransformError> {
    let nullable: Vec<Option<f64>> =
        values.iter().map(|v| if v.is_finite() { Some(*v) } else { None }).collect();
    df.with_column(Column::new(name.into(), nullable))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(d: u32) -> Date {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn round_trip_preserves_values() {
        let dates = vec![day(1), day(2), day(3)];
        let values = vec![1.0, f64::NAN, 3.0];
        let df = series_frame(&dates, &values).unwrap();

        let (out_dates, out_values) = series_parts(&df).unwrap();
        assert_eq!(out_dates, dates);
        assert_eq!(out_values[0], 1.0);
        assert!(out_values[1].is_nan());
        assert_eq!(out_values[2], 3.0);
    }

    #[test]
    fn sorted_parts_reorder_by_date() {
        let dates = vec![day(3), day(1), day(2)];
        let values = vec![30.0, 10.0, 20.0];
        let df = series_frame(&dates, &values).unwrap();

        let (out_dates, out_values) = sorted_series_parts(&df).unwrap();
        assert_eq!(out_dates, vec![day(1), day(2), day(3)]);
        assert_eq!(out_values, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let df = series_frame(&[], &[]).unwrap();
        assert!(matches!(series_parts(&df), Err(TransformError::EmptyData)));
    }

    #[test]
    fn missing_column_is_reported() {
        let df = DataFrame::new(vec![Column::new("other".into(), vec![1.0])]).unwrap();
        assert!(matches!(
            numeric_values(&df, VALUE_COL),
            Err(TransformError::MissingColumn(_))
        ));
    }
}

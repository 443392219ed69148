//! Resampling to a target observation frequency.

use chrono::{Datelike, Duration, Weekday};
use glci_primitives::{Date, Frequency, month_end};

use crate::{TransformError, frame, stats};

/// Aggregation applied within each resampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agg {
    /// Last finite observation of the period.
    Last,
    /// Mean of the finite observations.
    Mean,
    /// Sum of the finite observations.
    Sum,
    /// First finite observation of the period.
    First,
}

/// Resample a series to `target`, labelling each period by its end date.
///
/// Periods with no input rows are dropped rather than emitted as null, so
/// resampling with `Agg::Last` is idempotent.
pub fn resample(
    df: &polars::prelude::DataFrame,
    target: Frequency,
    agg: Agg,
) -> Result<polars::prelude::DataFrame, TransformError> {
    let (dates, values) = frame::sorted_series_parts(df)?;

    let mut out_dates: Vec<Date> = Vec::new();
    let mut out_values: Vec<f64> = Vec::new();
    let mut bucket: Vec<f64> = Vec::new();
    let mut current_label: Option<Date> = None;

    for (date, value) in dates.iter().zip(values.iter()) {
        let label = period_end(*date, target);
        if current_label != Some(label) {
            if let Some(prev) = current_label {
                if let Some(aggregated) = aggregate(&bucket, agg) {
                    out_dates.push(prev);
                    out_values.push(aggregated);
                }
            }
            bucket.clear();
            current_label = Some(label);
        }
        bucket.push(*value);
    }
    if let Some(prev) = current_label {
        if let Some(aggregated) = aggregate(&bucket, agg) {
            out_dates.push(prev);
            out_values.push(aggregated);
        }
    }

    frame::series_frame(&out_dates, &out_values)
}

fn aggregate(bucket: &[f64], agg: Agg) -> Option<f64> {
    let finite: Vec<f64> = bucket.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let value = match agg {
        Agg::Last => *finite.last()?,
        Agg::First => *finite.first()?,
        Agg::Mean => stats::nan_mean(&finite),
        Agg::Sum => finite.iter().sum(),
    };
    Some(value)
}

/// End date of the period containing `date` at the given frequency.
///
/// Weekly periods end on Friday; month, quarter, and year periods end on the
/// last calendar day.
fn period_end(date: Date, freq: Frequency) -> Date {
    match freq {
        Frequency::Daily => date,
        Frequency::Weekly => {
            let days_until_friday =
                (7 + Weekday::Fri.num_days_from_monday() as i64
                    - date.weekday().num_days_from_monday() as i64)
                    % 7;
            date + Duration::days(days_until_friday)
        }
        Frequency::Monthly => month_end(date),
        Frequency::Quarterly => {
            let quarter_last_month = ((date.month() - 1) / 3) * 3 + 3;
            month_end(
                Date::from_ymd_opt(date.year(), quarter_last_month, 1)
                    .expect("valid quarter month"),
            )
        }
        Frequency::Annual => {
            Date::from_ymd_opt(date.year(), 12, 31).expect("valid year end")
        }
    }
}

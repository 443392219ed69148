//! Feature-panel extraction and preprocessing.

use glci_primitives::Date;
use glci_transforms::{DATE_COL, date_values, numeric_values};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;

use crate::ModelError;

/// A numeric feature matrix with its date index and column names.
///
/// Missing observations are NaN.
#[derive(Debug, Clone)]
pub struct FeaturePanel {
    /// Date of each row.
    pub dates: Vec<Date>,
    /// Name of each column.
    pub names: Vec<String>,
    /// Observations x features, NaN for missing.
    pub data: Array2<f64>,
}

impl FeaturePanel {
    /// Extract a panel from a table with a `date` column and one numeric
    /// column per feature.
    pub fn from_frame(df: &DataFrame) -> Result<Self, ModelError> {
        let dates = date_values(df, DATE_COL)
            .map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .filter(|c| c.as_str() != DATE_COL)
            .map(|c| c.to_string())
            .collect();
        if names.is_empty() {
            return Err(ModelError::EmptyData);
        }

        let n = dates.len();
        let mut data = Array2::from_elem((n, names.len()), f64::NAN);
        for (j, name) in names.iter().enumerate() {
            let values = numeric_values(df, name)
                .map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
            for (i, v) in values.iter().enumerate() {
                data[[i, j]] = *v;
            }
        }
        Ok(Self { dates, names, data })
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    /// Drop the named columns, returning a new panel.
    #[must_use]
    pub fn without_columns(&self, drop: &[String]) -> Self {
        let keep: Vec<usize> = (0..self.names.len())
            .filter(|&j| !drop.contains(&self.names[j]))
            .collect();
        let names = keep.iter().map(|&j| self.names[j].clone()).collect();
        let mut data = Array2::from_elem((self.n_rows(), keep.len()), f64::NAN);
        for (new_j, &j) in keep.iter().enumerate() {
            for i in 0..self.n_rows() {
                data[[i, new_j]] = self.data[[i, j]];
            }
        }
        Self { dates: self.dates.clone(), names, data }
    }
}

/// Impute missing values per column: forward fill then backward fill, both
/// bounded by `limit` rows, then the column mean (zero when the whole column
/// is missing).
#[must_use]
pub fn impute_bounded(data: &Array2<f64>, limit: usize) -> Array2<f64> {
    let (n, p) = data.dim();
    let mut out = data.clone();

    for j in 0..p {
        let mut last: Option<(usize, f64)> = None;
        for i in 0..n {
            if out[[i, j]].is_finite() {
                last = Some((i, out[[i, j]]));
            } else if let Some((k, v)) = last {
                if i - k <= limit {
                    out[[i, j]] = v;
                }
            }
        }

        let mut next: Option<(usize, f64)> = None;
        for i in (0..n).rev() {
            if out[[i, j]].is_finite() {
                next = Some((i, out[[i, j]]));
            } else if let Some((k, v)) = next {
                if k - i <= limit {
                    out[[i, j]] = v;
                }
            }
        }

        let finite: Vec<f64> = (0..n).map(|i| out[[i, j]]).filter(|v| v.is_finite()).collect();
        let mean = if finite.is_empty() {
            0.0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        for i in 0..n {
            if !out[[i, j]].is_finite() {
                out[[i, j]] = mean;
            }
        }
    }
    out
}

/// Standardize each column to mean zero and unit sample standard deviation,
/// computing moments over the finite entries and leaving NaN in place.
///
/// Returns the standardized matrix with per-column `(mean, std)`.
pub fn standardize_columns(
    data: &Array2<f64>,
) -> Result<(Array2<f64>, Vec<(f64, f64)>), ModelError> {
    let (n, p) = data.dim();
    if n == 0 || p == 0 {
        return Err(ModelError::EmptyData);
    }
    let mut out = data.clone();
    let mut moments = Vec::with_capacity(p);

    for j in 0..p {
        let finite: Vec<f64> = (0..n).map(|i| data[[i, j]]).filter(|v| v.is_finite()).collect();
        if finite.len() < 2 {
            return Err(ModelError::InsufficientData(format!(
                "column {j} has {} finite values",
                finite.len()
            )));
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let var =
            finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
        let std = var.sqrt();
        if !std.is_finite() || std < 1e-12 {
            return Err(ModelError::LinearAlgebra(format!("column {j} has zero variance")));
        }
        for i in 0..n {
            if out[[i, j]].is_finite() {
                out[[i, j]] = (out[[i, j]] - mean) / std;
            }
        }
        moments.push((mean, std));
    }
    Ok((out, moments))
}

/// Mean and sample standard deviation of a vector's finite entries.
pub(crate) fn vector_moments(values: &Array1<f64>) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    if finite.len() < 2 {
        return (mean, f64::NAN);
    }
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    (mean, var.sqrt())
}

/// Standardize a factor series to mean zero and unit standard deviation.
pub(crate) fn standardize_vector(values: &Array1<f64>) -> Array1<f64> {
    let (mean, std) = vector_moments(values);
    if !std.is_finite() || std < 1e-12 {
        return values.clone();
    }
    values.mapv(|v| if v.is_finite() { (v - mean) / std } else { f64::NAN })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use glci_transforms::{append_values, series_frame};
    use ndarray::array;

    use super::*;

    #[test]
    fn panel_extraction_keeps_column_order() {
        let dates: Vec<Date> =
            (1..=3).map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap()).collect();
        let mut df = series_frame(&dates, &[1.0, 2.0, 3.0]).unwrap();
        append_values(&mut df, "extra", &[4.0, f64::NAN, 6.0]).unwrap();

        let panel = FeaturePanel::from_frame(&df).unwrap();
        assert_eq!(panel.names, vec!["value", "extra"]);
        assert_eq!(panel.n_rows(), 3);
        assert!(panel.data[[1, 1]].is_nan());
        assert_eq!(panel.data[[2, 1]], 6.0);
    }

    #[test]
    fn without_columns_drops_by_name() {
        let dates: Vec<Date> =
            (1..=2).map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap()).collect();
        let mut df = series_frame(&dates, &[1.0, 2.0]).unwrap();
        append_values(&mut df, "keep", &[3.0, 4.0]).unwrap();
        let panel = FeaturePanel::from_frame(&df).unwrap();

        let trimmed = panel.without_columns(&["value".to_string()]);
        assert_eq!(trimmed.names, vec!["keep"]);
        assert_eq!(trimmed.data[[0, 0]], 3.0);
    }

    #[test]
    fn impute_fills_interior_then_mean() {
        let data = array![[1.0, f64::NAN], [f64::NAN, f64::NAN], [3.0, f64::NAN]];
        let imputed = impute_bounded(&data, 1);
        // Interior gap forward-filled within the bound.
        assert_eq!(imputed[[1, 0]], 1.0);
        // Fully missing column becomes zeros.
        assert_eq!(imputed[[0, 1]], 0.0);
    }

    #[test]
    fn standardize_ignores_nan_for_moments() {
        let data = array![[1.0], [f64::NAN], [3.0]];
        let (z, moments) = standardize_columns(&data).unwrap();
        assert_relative_eq!(moments[0].0, 2.0);
        assert!(z[[1, 0]].is_nan());
        assert_relative_eq!(z[[0, 0]], -z[[2, 0]], epsilon = 1e-12);
    }

    #[test]
    fn standardize_rejects_constant_column() {
        let data = array![[1.0], [1.0], [1.0]];
        assert!(standardize_columns(&data).is_err());
    }
}

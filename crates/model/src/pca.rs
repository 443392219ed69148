//! PCA-based factor extraction, plain and with Ridge-shrunk loadings.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::{
    ModelError, linalg,
    matrix::{impute_bounded, standardize_columns, standardize_vector},
};

/// Fill bound (in rows) applied before the column-mean imputation.
const IMPUTE_LIMIT: usize = 26;

/// Output of one PCA fit.
#[derive(Debug, Clone)]
pub(crate) struct PcaFit {
    /// Factor score per input row, standardized.
    pub factors: Array1<f64>,
    /// Loading per column.
    pub loadings: Array1<f64>,
    /// Share of total variance carried by the factor.
    pub explained_variance: f64,
}

/// Plain first-principal-component extraction.
///
/// Missing values are imputed (bounded fill then column mean), columns are
/// standardized, and the leading eigenvector of the correlation matrix is the
/// loading vector.
pub(crate) fn fit_pca(data: &Array2<f64>) -> Result<PcaFit, ModelError> {
    let (z, eigenvalue, v) = principal_axis(data)?;
    let scores = z.dot(&v);
    let trace = z.ncols() as f64;

    Ok(PcaFit {
        factors: standardize_vector(&scores),
        loadings: v,
        explained_variance: (eigenvalue / trace).clamp(0.0, 1.0),
    })
}

/// PCA with loadings re-estimated by Ridge regression.
///
/// Each standardized column is regressed on the raw factor score with
/// penalty `alpha`; with one factor the Ridge coefficient has the closed form
/// `(f . x) / (f . f + alpha)`. Shrinkage stabilizes the loadings when the
/// columns are strongly correlated.
pub(crate) fn fit_pca_shrunk(data: &Array2<f64>, alpha: f64) -> Result<PcaFit, ModelError> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(ModelError::InvalidConfig(format!("alpha must be non-negative, got {alpha}")));
    }
    let (z, eigenvalue, v) = principal_axis(data)?;
    let raw_scores = z.dot(&v);

    let ff = raw_scores.dot(&raw_scores);
    if !ff.is_finite() || ff < 1e-12 {
        return Err(ModelError::LinearAlgebra("degenerate factor score".to_string()));
    }

    let p = z.ncols();
    let mut shrunk = Array1::zeros(p);
    for j in 0..p {
        let column = z.column(j);
        let fx = raw_scores.dot(&column);
        shrunk[j] = fx / (ff + alpha);
    }
    debug!(alpha, p, "shrunk PCA loadings estimated");

    let combined = z.dot(&shrunk);
    let trace = p as f64;

    Ok(PcaFit {
        factors: standardize_vector(&combined),
        loadings: shrunk,
        explained_variance: (eigenvalue / trace).clamp(0.0, 1.0),
    })
}

/// Shared preprocessing: impute, standardize, and find the leading eigenpair
/// of the correlation matrix.
fn principal_axis(data: &Array2<f64>) -> Result<(Array2<f64>, f64, Array1<f64>), ModelError> {
    let n = data.nrows();
    if n < 10 {
        return Err(ModelError::InsufficientData(format!("{n} rows, need at least 10")));
    }

    let imputed = impute_bounded(data, IMPUTE_LIMIT);
    let (z, _) = standardize_columns(&imputed)?;
    if z.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("standardized matrix".to_string()));
    }

    let cov = z.t().dot(&z) / (n as f64 - 1.0);
    let (eigenvalue, v) = linalg::power_iteration(&cov, 1_000)?;
    Ok((z, eigenvalue, v))
}

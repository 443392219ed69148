//! Dense linear-algebra kernels for factor estimation.

use ndarray::{Array1, Array2};

use crate::ModelError;

/// Solve a linear system `Ax = b` by Gaussian elimination with partial
/// pivoting.
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    let n = a.nrows();
    if n == 0 {
        return Err(ModelError::EmptyData);
    }
    if a.ncols() != n {
        return Err(ModelError::LinearAlgebra("matrix must be square".to_string()));
    }
    if b.len() != n {
        return Err(ModelError::DimensionMismatch { expected: n, actual: b.len() });
    }

    // Augmented matrix [A | b]
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    // Gaussian elimination with partial pivoting
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[[col, col]].abs();
        for row in (col + 1)..n {
            if aug[[row, col]].abs() > max_val {
                max_val = aug[[row, col]].abs();
                max_row = row;
            }
        }

        if max_val < 1e-14 {
            return Err(ModelError::LinearAlgebra(
                "matrix is singular or nearly singular".to_string(),
            ));
        }

        if max_row != col {
            for j in 0..=n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }

        for row in (col + 1)..n {
            let factor = aug[[row, col]] / aug[[col, col]];
            for j in col..=n {
                aug[[row, j]] -= factor * aug[[col, j]];
            }
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = aug[[i, n]];
        for j in (i + 1)..n {
            sum -= aug[[i, j]] * x[j];
        }
        x[i] = sum / aug[[i, i]];
    }

    Ok(x)
}

/// Ridge regression `argmin ||y - Xb||^2 + alpha ||b||^2` without intercept.
///
/// Solves the normal equations `(X'X + alpha I) b = X'y`.
pub fn ridge_regression(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
) -> Result<Array1<f64>, ModelError> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 || p == 0 {
        return Err(ModelError::EmptyData);
    }
    if y.len() != n {
        return Err(ModelError::DimensionMismatch { expected: n, actual: y.len() });
    }
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(ModelError::InvalidConfig(format!("alpha must be non-negative, got {alpha}")));
    }

    let mut xtx = x.t().dot(x);
    for i in 0..p {
        xtx[[i, i]] += alpha;
    }
    let xty = x.t().dot(y);
    solve_linear_system(&xtx, &xty)
}

/// Leading eigenpair of a symmetric matrix by power iteration.
///
/// Returns `(eigenvalue, unit eigenvector)`.
pub fn power_iteration(c: &Array2<f64>, max_iter: usize) -> Result<(f64, Array1<f64>), ModelError> {
    let p = c.nrows();
    if p == 0 || c.ncols() != p {
        return Err(ModelError::LinearAlgebra("matrix must be square and non-empty".to_string()));
    }
    if c.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("covariance matrix".to_string()));
    }

    // Deterministic start aligned with the dominant column.
    let mut v = Array1::from_elem(p, 1.0 / (p as f64).sqrt());
    let mut eigenvalue = 0.0;

    for _ in 0..max_iter.max(1) {
        let w = c.dot(&v);
        let norm = w.dot(&w).sqrt();
        if !norm.is_finite() || norm < 1e-14 {
            return Err(ModelError::LinearAlgebra(
                "power iteration collapsed to the null vector".to_string(),
            ));
        }
        let next = &w / norm;
        let next_eigenvalue = next.dot(&c.dot(&next));
        let delta = (next_eigenvalue - eigenvalue).abs();
        v = next;
        eigenvalue = next_eigenvalue;
        if delta < 1e-12 * (1.0 + eigenvalue.abs()) {
            break;
        }
    }

    Ok((eigenvalue, v))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn solves_simple_system() {
        let a = array![[2.0, 0.0], [0.0, 4.0]];
        let b = array![2.0, 8.0];
        let x = solve_linear_system(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_system_errors() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(solve_linear_system(&a, &b).is_err());
    }

    #[test]
    fn ridge_shrinks_towards_zero() {
        // y = 2x exactly; ridge pulls the coefficient below 2.
        let x = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];

        let unpenalized = ridge_regression(&x, &y, 0.0).unwrap();
        assert_relative_eq!(unpenalized[0], 2.0, epsilon = 1e-10);

        let penalized = ridge_regression(&x, &y, 10.0).unwrap();
        assert!(penalized[0] < 2.0);
        assert!(penalized[0] > 1.0);
    }

    #[test]
    fn power_iteration_finds_dominant_axis() {
        // Covariance with dominant variance on the first axis.
        let c = array![[4.0, 0.0], [0.0, 1.0]];
        let (eigenvalue, v) = power_iteration(&c, 200).unwrap();
        assert_relative_eq!(eigenvalue, 4.0, epsilon = 1e-9);
        assert_relative_eq!(v[0].abs(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v[1].abs(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn power_iteration_handles_correlated_block() {
        let c = array![[1.0, 0.9], [0.9, 1.0]];
        let (eigenvalue, v) = power_iteration(&c, 200).unwrap();
        assert_relative_eq!(eigenvalue, 1.9, epsilon = 1e-9);
        // Eigenvector is the equal-weight direction.
        assert_relative_eq!(v[0].abs(), v[1].abs(), epsilon = 1e-9);
    }
}

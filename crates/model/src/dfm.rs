//! State-space dynamic factor model estimated by EM.
//!
//! One latent AR(1) factor with white idiosyncratic noise:
//!
//! ```text
//! x_t = lambda f_t + e_t,   e_t ~ N(0, diag(psi))
//! f_t = phi f_{t-1} + n_t,  n_t ~ N(0, 1)
//! ```
//!
//! The state innovation variance is fixed to one for identification. Missing
//! observations are simply skipped by the filter, which is what makes the
//! model worth its cost on ragged panels.

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::{
    ModelError, pca,
    matrix::{standardize_columns, standardize_vector},
};

/// Relative log-likelihood change below which EM is declared converged.
const EM_TOL: f64 = 1e-6;

/// Output of a DFM fit.
#[derive(Debug, Clone)]
pub(crate) struct DfmFit {
    /// Smoothed factor per row, standardized.
    pub factors: Array1<f64>,
    /// Loading per column, on the standardized scale.
    pub loadings: Array1<f64>,
    /// Share of observed (standardized) variance explained by the factor.
    pub explained_variance: f64,
    /// Whether EM converged within the iteration cap.
    pub converged: bool,
}

struct FilterPass {
    log_likelihood: f64,
    a_filt: Vec<f64>,
    p_filt: Vec<f64>,
    a_pred: Vec<f64>,
    p_pred: Vec<f64>,
}

struct SmoothPass {
    a_smooth: Vec<f64>,
    v_smooth: Vec<f64>,
    /// `Cov(f_t, f_{t-1} | all data)`, indexed by `t` (entry 0 unused).
    cross: Vec<f64>,
}

/// Fit the model on a raw panel with missing values.
pub(crate) fn fit_dfm(data: &Array2<f64>, max_iter: usize) -> Result<DfmFit, ModelError> {
    let (t_len, p) = data.dim();
    if p == 0 || t_len == 0 {
        return Err(ModelError::EmptyData);
    }

    let (z, _) = standardize_columns(data)?;

    // Initialize from a PCA pass on the imputed panel.
    let init = pca::fit_pca(&z)?;
    let mut lambda = init.loadings.clone();
    let mut phi = ar1_coefficient(&init.factors).clamp(-0.95, 0.95);
    let mut psi: Array1<f64> = lambda.mapv(|l| (1.0 - l * l).max(0.05));

    let mut converged = false;
    let mut last_ll = f64::NEG_INFINITY;
    let mut smooth = None;

    for iter in 0..max_iter.max(1) {
        let filter = kalman_filter(&z, &lambda, &psi, phi)?;
        let pass = rts_smoother(&filter, phi);

        if !filter.log_likelihood.is_finite() {
            return Err(ModelError::Diverged("log-likelihood is not finite".to_string()));
        }
        let improvement = filter.log_likelihood - last_ll;
        if iter > 0 && improvement.abs() < EM_TOL * (1.0 + last_ll.abs()) {
            converged = true;
            smooth = Some(pass);
            debug!(iter, log_likelihood = filter.log_likelihood, "EM converged");
            break;
        }
        last_ll = filter.log_likelihood;

        // M-step.
        let mut denom_state = 0.0;
        for t in 0..t_len {
            denom_state += pass.a_smooth[t].powi(2) + pass.v_smooth[t];
        }
        if denom_state < 1e-12 {
            return Err(ModelError::Diverged("smoothed state collapsed".to_string()));
        }

        for j in 0..p {
            let mut num = 0.0;
            let mut den = 0.0;
            let mut count = 0usize;
            for t in 0..t_len {
                let x = z[[t, j]];
                if !x.is_finite() {
                    continue;
                }
                num += x * pass.a_smooth[t];
                den += pass.a_smooth[t].powi(2) + pass.v_smooth[t];
                count += 1;
            }
            if count == 0 || den < 1e-12 {
                continue;
            }
            lambda[j] = num / den;

            let mut ssq = 0.0;
            for t in 0..t_len {
                let x = z[[t, j]];
                if !x.is_finite() {
                    continue;
                }
                ssq += (x - lambda[j] * pass.a_smooth[t]).powi(2)
                    + lambda[j].powi(2) * pass.v_smooth[t];
            }
            psi[j] = (ssq / count as f64).max(1e-4);
        }

        let mut phi_num = 0.0;
        let mut phi_den = 0.0;
        for t in 1..t_len {
            phi_num += pass.a_smooth[t] * pass.a_smooth[t - 1] + pass.cross[t];
            phi_den += pass.a_smooth[t - 1].powi(2) + pass.v_smooth[t - 1];
        }
        if phi_den > 1e-12 {
            phi = (phi_num / phi_den).clamp(-0.98, 0.98);
        }

        smooth = Some(pass);
    }

    let pass = smooth.ok_or_else(|| ModelError::Diverged("EM produced no estimate".to_string()))?;
    let factors = Array1::from_vec(pass.a_smooth.clone());

    // Fit quality on the observed standardized entries.
    let mut sse = 0.0;
    let mut tss = 0.0;
    for t in 0..t_len {
        for j in 0..p {
            let x = z[[t, j]];
            if x.is_finite() {
                sse += (x - lambda[j] * factors[t]).powi(2);
                tss += x * x;
            }
        }
    }
    let explained = if tss > 0.0 { (1.0 - sse / tss).clamp(0.0, 1.0) } else { 0.0 };

    Ok(DfmFit {
        factors: standardize_vector(&factors),
        loadings: lambda,
        explained_variance: explained,
        converged,
    })
}

/// Univariate-treatment Kalman filter over the scalar state.
///
/// Each finite observation updates the state sequentially, which is exact for
/// a diagonal observation covariance and sidesteps any matrix inversion.
fn kalman_filter(
    z: &Array2<f64>,
    lambda: &Array1<f64>,
    psi: &Array1<f64>,
    phi: f64,
) -> Result<FilterPass, ModelError> {
    let (t_len, p) = z.dim();
    let mut a_filt = vec![0.0; t_len];
    let mut p_filt = vec![0.0; t_len];
    let mut a_pred = vec![0.0; t_len];
    let mut p_pred = vec![0.0; t_len];
    let mut log_likelihood = 0.0;

    // Stationary prior for the AR(1) state, capped for near-unit roots.
    let prior_var = (1.0 / (1.0 - phi * phi)).min(1e3);

    let mut a_prev = 0.0;
    let mut p_prev = prior_var;

    for t in 0..t_len {
        let (ap, pp) = if t == 0 {
            (0.0, prior_var)
        } else {
            (phi * a_prev, phi * phi * p_prev + 1.0)
        };
        a_pred[t] = ap;
        p_pred[t] = pp;

        let mut a = ap;
        let mut p_var = pp;
        for j in 0..p {
            let x = z[[t, j]];
            if !x.is_finite() {
                continue;
            }
            let innovation = x - lambda[j] * a;
            let f_var = lambda[j] * lambda[j] * p_var + psi[j];
            if f_var <= 0.0 || !f_var.is_finite() {
                return Err(ModelError::Diverged("innovation variance collapsed".to_string()));
            }
            log_likelihood -= 0.5
                * ((2.0 * std::f64::consts::PI).ln() + f_var.ln()
                    + innovation * innovation / f_var);
            let gain = p_var * lambda[j] / f_var;
            a += gain * innovation;
            p_var *= 1.0 - gain * lambda[j];
        }

        a_filt[t] = a;
        p_filt[t] = p_var;
        a_prev = a;
        p_prev = p_var;
    }

    Ok(FilterPass { log_likelihood, a_filt, p_filt, a_pred, p_pred })
}

/// Rauch-Tung-Striebel smoother with lag-one covariances.
fn rts_smoother(filter: &FilterPass, phi: f64) -> SmoothPass {
    let t_len = filter.a_filt.len();
    let mut a_smooth = vec![0.0; t_len];
    let mut v_smooth = vec![0.0; t_len];
    let mut cross = vec![0.0; t_len];

    a_smooth[t_len - 1] = filter.a_filt[t_len - 1];
    v_smooth[t_len - 1] = filter.p_filt[t_len - 1];

    for t in (0..t_len - 1).rev() {
        let gain = if filter.p_pred[t + 1] > 1e-12 {
            filter.p_filt[t] * phi / filter.p_pred[t + 1]
        } else {
            0.0
        };
        a_smooth[t] = filter.a_filt[t] + gain * (a_smooth[t + 1] - filter.a_pred[t + 1]);
        v_smooth[t] =
            filter.p_filt[t] + gain * gain * (v_smooth[t + 1] - filter.p_pred[t + 1]);
        cross[t + 1] = gain * v_smooth[t + 1];
    }

    SmoothPass { a_smooth, v_smooth, cross }
}

/// Lag-one autoregression coefficient of a series.
fn ar1_coefficient(series: &Array1<f64>) -> f64 {
    let n = series.len();
    if n < 3 {
        return 0.0;
    }
    let mut num = 0.0;
    let mut den = 0.0;
    for t in 1..n {
        if series[t].is_finite() && series[t - 1].is_finite() {
            num += series[t] * series[t - 1];
            den += series[t - 1] * series[t - 1];
        }
    }
    if den > 1e-12 { num / den } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    /// Panel driven by a persistent AR(1) factor.
    fn ar1_panel(n: usize, p: usize, phi: f64, noise: f64, seed: u64) -> (Array2<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut latent = vec![0.0; n];
        for t in 1..n {
            latent[t] = phi * latent[t - 1] + rng.gen_range(-1.0..1.0);
        }
        let mut data = Array2::zeros((n, p));
        for t in 0..n {
            for j in 0..p {
                data[[t, j]] = latent[t] + noise * rng.gen_range(-1.0..1.0);
            }
        }
        (data, latent)
    }

    fn correlation(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len() as f64;
        let ma = a.iter().sum::<f64>() / n;
        let mb = b.iter().sum::<f64>() / n;
        let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
        let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
        let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
        cov / (va.sqrt() * vb.sqrt())
    }

    #[test]
    fn recovers_persistent_factor() {
        let (data, latent) = ar1_panel(200, 5, 0.8, 0.4, 3);
        let fit = fit_dfm(&data, 100).unwrap();

        let corr = correlation(&fit.factors.to_vec(), &latent);
        assert!(corr.abs() > 0.9, "correlation {corr}");
        assert!(fit.explained_variance > 0.5);
        assert!(fit.explained_variance <= 1.0);
    }

    #[test]
    fn converges_within_cap() {
        let (data, _) = ar1_panel(150, 4, 0.7, 0.3, 11);
        let fit = fit_dfm(&data, 100).unwrap();
        assert!(fit.converged);
    }

    #[test]
    fn tolerates_ragged_edges() {
        let (mut data, latent) = ar1_panel(200, 5, 0.8, 0.4, 5);
        // Knock out a trailing block of one column and scattered interior
        // points of another.
        for t in 180..200 {
            data[[t, 0]] = f64::NAN;
        }
        for t in (0..200).step_by(9) {
            data[[t, 3]] = f64::NAN;
        }

        let fit = fit_dfm(&data, 100).unwrap();
        let corr = correlation(&fit.factors.to_vec(), &latent);
        assert!(corr.abs() > 0.85, "correlation {corr}");
        assert!(fit.factors.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn iteration_cap_reports_nonconvergence() {
        let (data, _) = ar1_panel(150, 4, 0.7, 0.3, 13);
        let fit = fit_dfm(&data, 2).unwrap();
        assert!(!fit.converged);
    }
}

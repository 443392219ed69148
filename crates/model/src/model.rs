//! The factor-model facade: validation, method selection, fallback ladder.

use glci_primitives::Date;
use ndarray::Array1;
use tracing::{debug, warn};

use crate::{ModelError, dfm, matrix::FeaturePanel, pca};

/// Variance floor below which a column counts as constant and is dropped.
const NEAR_CONSTANT_STD: f64 = 1e-8;

/// Missing fraction above which a column is flagged (but retained).
const HIGH_MISSING_FRACTION: f64 = 0.5;

/// Estimation method, or automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactorMethod {
    /// Choose from data-completeness heuristics.
    #[default]
    Auto,
    /// State-space dynamic factor model.
    Dfm,
    /// PCA with Ridge-shrunk loadings.
    PcaShrunk,
    /// Plain PCA.
    Pca,
}

/// The method that actually produced a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FittedMethod {
    /// State-space dynamic factor model.
    Dfm,
    /// PCA with Ridge-shrunk loadings.
    PcaShrunk,
    /// Plain PCA.
    Pca,
}

impl FittedMethod {
    /// Short name used in metadata and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dfm => "dfm",
            Self::PcaShrunk => "pca_shrunk",
            Self::Pca => "pca",
        }
    }
}

/// Configuration of the factor model.
#[derive(Debug, Clone)]
pub struct FactorModelConfig {
    /// Estimation method.
    pub method: FactorMethod,
    /// EM iteration cap for the DFM rung.
    pub max_iter: usize,
    /// Ridge penalty for the shrunk-loadings rung.
    pub shrinkage_alpha: f64,
    /// Minimum rows with at least one observation.
    pub min_observations: usize,
    /// Minimum usable (non-constant) columns.
    pub min_variables: usize,
}

impl Default for FactorModelConfig {
    fn default() -> Self {
        Self {
            method: FactorMethod::Auto,
            max_iter: 100,
            shrinkage_alpha: 0.1,
            min_observations: 30,
            min_variables: 2,
        }
    }
}

/// Pre-fit data quality summary.
#[derive(Debug, Clone)]
pub struct DataQualityCheck {
    /// Whether the panel passes validation.
    pub is_valid: bool,
    /// Rows with at least one finite observation.
    pub n_valid_obs: usize,
    /// Columns remaining after the near-constant drop.
    pub n_variables: usize,
    /// Fraction of cells observed.
    pub coverage: f64,
    /// Columns dropped for having essentially no variance.
    pub near_constant_cols: Vec<String>,
    /// Columns flagged (but kept) for being mostly missing.
    pub high_missing_cols: Vec<String>,
}

/// Result of a factor extraction.
#[derive(Debug, Clone)]
pub struct FactorModelResult {
    /// Date of each factor observation.
    pub dates: Vec<Date>,
    /// The standardized factor series, one value per input row.
    pub factors: Vec<f64>,
    /// Loading of each surviving feature on the factor.
    pub loadings: Vec<(String, f64)>,
    /// Share of variance explained, in `[0, 1]`.
    pub explained_variance: f64,
    /// Rung of the ladder that produced the fit.
    pub method: FittedMethod,
    /// Whether the estimation converged (always true for the PCA rungs).
    pub converged: bool,
    /// Rows used.
    pub n_observations: usize,
    /// Columns used.
    pub n_variables: usize,
    /// Pre-fit quality summary.
    pub quality: DataQualityCheck,
}

impl FactorModelResult {
    /// Loading of one variable, zero when it was dropped.
    #[must_use]
    pub fn loading(&self, name: &str) -> f64 {
        self.loadings.iter().find(|(n, _)| n == name).map_or(0.0, |(_, l)| *l)
    }

    /// Mean loading across variables.
    #[must_use]
    pub fn mean_loading(&self) -> f64 {
        if self.loadings.is_empty() {
            return 0.0;
        }
        self.loadings.iter().map(|(_, l)| l).sum::<f64>() / self.loadings.len() as f64
    }
}

/// Single-factor model over a pillar feature panel.
///
/// Sign constraints are not enforced here: components are pre-flipped before
/// the panel is built, so every expected loading is positive going in. The
/// one sign decision made post-fit is the orientation flip when the mean
/// loading comes out negative.
#[derive(Debug, Clone, Default)]
pub struct FactorModel {
    config: FactorModelConfig,
}

impl FactorModel {
    /// Model with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FactorModelConfig::default())
    }

    /// Model with explicit configuration.
    #[must_use]
    pub const fn with_config(config: FactorModelConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &FactorModelConfig {
        &self.config
    }

    /// Validate a panel without fitting.
    #[must_use]
    pub fn validate(&self, panel: &FeaturePanel) -> DataQualityCheck {
        let (n, p) = panel.data.dim();

        let mut near_constant = Vec::new();
        let mut high_missing = Vec::new();
        for j in 0..p {
            let column: Vec<f64> = (0..n).map(|i| panel.data[[i, j]]).collect();
            let finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
            let missing_frac = 1.0 - finite.len() as f64 / n.max(1) as f64;
            if missing_frac > HIGH_MISSING_FRACTION {
                high_missing.push(panel.names[j].clone());
            }
            if column_std(&finite) < NEAR_CONSTANT_STD {
                near_constant.push(panel.names[j].clone());
            }
        }

        let n_valid_obs =
            (0..n).filter(|&i| (0..p).any(|j| panel.data[[i, j]].is_finite())).count();
        let observed: usize =
            panel.data.iter().filter(|v| v.is_finite()).count();
        let coverage = if n * p > 0 { observed as f64 / (n * p) as f64 } else { 0.0 };
        let effective_vars = p - near_constant.len();

        DataQualityCheck {
            is_valid: n_valid_obs >= self.config.min_observations
                && effective_vars >= self.config.min_variables,
            n_valid_obs,
            n_variables: effective_vars,
            coverage,
            near_constant_cols: near_constant,
            high_missing_cols: high_missing,
        }
    }

    /// Extract the factor, walking down the fallback ladder on failure.
    pub fn fit(&self, panel: &FeaturePanel) -> Result<FactorModelResult, ModelError> {
        let quality = self.validate(panel);
        if !quality.is_valid {
            return Err(ModelError::InsufficientData(format!(
                "{} valid rows (need {}), {} usable columns (need {})",
                quality.n_valid_obs,
                self.config.min_observations,
                quality.n_variables,
                self.config.min_variables
            )));
        }

        let clean = panel.without_columns(&quality.near_constant_cols);
        let start = match self.config.method {
            FactorMethod::Auto => self.choose_method(&clean),
            FactorMethod::Dfm => FittedMethod::Dfm,
            FactorMethod::PcaShrunk => FittedMethod::PcaShrunk,
            FactorMethod::Pca => FittedMethod::Pca,
        };
        debug!(method = start.name(), rows = clean.n_rows(), cols = clean.n_cols(), "fitting");

        let (factors, loadings, explained, method, converged) = self.fit_ladder(&clean, start)?;

        let mut result = FactorModelResult {
            dates: clean.dates.clone(),
            factors: factors.to_vec(),
            loadings: clean.names.iter().cloned().zip(loadings.iter().copied()).collect(),
            explained_variance: explained,
            method,
            converged,
            n_observations: clean.n_rows(),
            n_variables: clean.n_cols(),
            quality,
        };
        orient_by_mean_loading(&mut result);
        Ok(result)
    }

    /// Data-completeness heuristics for the starting rung.
    ///
    /// The DFM initializer needs a solid block of complete rows, so it is
    /// only worth starting there when at least half the panel (and at least
    /// 30 rows) is complete and overall missingness is moderate.
    fn choose_method(&self, panel: &FeaturePanel) -> FittedMethod {
        let (n, p) = panel.data.dim();
        let complete_rows =
            (0..n).filter(|&i| (0..p).all(|j| panel.data[[i, j]].is_finite())).count();
        let missing: usize = panel.data.iter().filter(|v| !v.is_finite()).count();
        let missing_frac = if n * p > 0 { missing as f64 / (n * p) as f64 } else { 1.0 };

        if complete_rows >= 30.max(n / 2) && missing_frac <= 0.3 {
            FittedMethod::Dfm
        } else {
            FittedMethod::PcaShrunk
        }
    }

    fn fit_ladder(
        &self,
        panel: &FeaturePanel,
        start: FittedMethod,
    ) -> Result<(Array1<f64>, Array1<f64>, f64, FittedMethod, bool), ModelError> {
        let mut rung = start;
        loop {
            let attempt: Result<(Array1<f64>, Array1<f64>, f64, bool), ModelError> = match rung {
                FittedMethod::Dfm => dfm::fit_dfm(&panel.data, self.config.max_iter)
                    .map(|fit| (fit.factors, fit.loadings, fit.explained_variance, fit.converged)),
                FittedMethod::PcaShrunk => {
                    pca::fit_pca_shrunk(&panel.data, self.config.shrinkage_alpha)
                        .map(|fit| (fit.factors, fit.loadings, fit.explained_variance, true))
                }
                FittedMethod::Pca => pca::fit_pca(&panel.data)
                    .map(|fit| (fit.factors, fit.loadings, fit.explained_variance, true)),
            };

            match attempt {
                Ok((factors, loadings, explained, converged)) => {
                    return Ok((factors, loadings, explained, rung, converged));
                }
                Err(err) => {
                    let next = match rung {
                        FittedMethod::Dfm => Some(FittedMethod::PcaShrunk),
                        FittedMethod::PcaShrunk => Some(FittedMethod::Pca),
                        FittedMethod::Pca => None,
                    };
                    match next {
                        Some(next_rung) => {
                            warn!(from = rung.name(), to = next_rung.name(), error = %err, "falling back");
                            rung = next_rung;
                        }
                        None => return Err(err),
                    }
                }
            }
        }
    }
}

/// Flip the factor and loadings when the mean loading is negative, so the
/// factor moves with the average of its (pre-flipped) components.
fn orient_by_mean_loading(result: &mut FactorModelResult) {
    if result.mean_loading() < 0.0 {
        for f in &mut result.factors {
            *f = -*f;
        }
        for (_, l) in &mut result.loadings {
            *l = -*l;
        }
    }
}

fn column_std(finite: &[f64]) -> f64 {
    if finite.len() < 2 {
        return 0.0;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var =
        finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ndarray::Array2;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn panel_from(data: Array2<f64>) -> FeaturePanel {
        let n = data.nrows();
        FeaturePanel {
            dates: (0..n)
                .map(|i| {
                    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                        + chrono::Duration::weeks(i as i64)
                })
                .collect(),
            names: (0..data.ncols()).map(|j| format!("feat_{j}")).collect(),
            data,
        }
    }

    fn noisy_factor_panel(n: usize, p: usize, seed: u64) -> FeaturePanel {
        let mut rng = StdRng::seed_from_u64(seed);
        let latent: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut data = Array2::zeros((n, p));
        for i in 0..n {
            for j in 0..p {
                data[[i, j]] = latent[i] + 0.3 * rng.gen_range(-1.0..1.0);
            }
        }
        panel_from(data)
    }

    #[test]
    fn too_few_rows_fails_validation() {
        let panel = noisy_factor_panel(10, 3, 1);
        let model = FactorModel::new();
        assert!(matches!(model.fit(&panel), Err(ModelError::InsufficientData(_))));
    }

    #[test]
    fn near_constant_columns_are_dropped() {
        let mut panel = noisy_factor_panel(80, 3, 2);
        for i in 0..80 {
            panel.data[[i, 1]] = 5.0;
        }

        let model = FactorModel::new();
        let result = model.fit(&panel).unwrap();

        assert_eq!(result.n_variables, 2);
        assert!(result.loadings.iter().all(|(name, _)| name != "feat_1"));
        assert_eq!(result.quality.near_constant_cols, vec!["feat_1".to_string()]);
    }

    #[test]
    fn complete_panel_selects_dfm() {
        let panel = noisy_factor_panel(100, 4, 3);
        let model = FactorModel::new();
        let result = model.fit(&panel).unwrap();
        assert_eq!(result.method, FittedMethod::Dfm);
    }

    #[test]
    fn ragged_panel_selects_pca_shrunk() {
        let mut panel = noisy_factor_panel(100, 4, 4);
        // Make 60% of rows incomplete.
        for i in 0..60 {
            panel.data[[i, 0]] = f64::NAN;
        }

        let model = FactorModel::new();
        let result = model.fit(&panel).unwrap();
        assert_eq!(result.method, FittedMethod::PcaShrunk);
    }

    #[test]
    fn explained_variance_is_bounded() {
        let panel = noisy_factor_panel(120, 5, 5);
        let result = FactorModel::new().fit(&panel).unwrap();
        assert!(result.explained_variance >= 0.0);
        assert!(result.explained_variance <= 1.0);
    }

    #[test]
    fn mean_loading_is_oriented_positive() {
        for seed in [6, 7, 8] {
            let panel = noisy_factor_panel(90, 4, seed);
            let result = FactorModel::new().fit(&panel).unwrap();
            assert!(result.mean_loading() >= 0.0);
        }
    }

    #[test]
    fn explicit_method_is_respected() {
        let panel = noisy_factor_panel(100, 4, 9);
        let config = FactorModelConfig { method: FactorMethod::Pca, ..Default::default() };
        let result = FactorModel::with_config(config).fit(&panel).unwrap();
        assert_eq!(result.method, FittedMethod::Pca);
    }

    #[test]
    fn high_missing_columns_are_flagged_but_kept() {
        let mut panel = noisy_factor_panel(100, 3, 10);
        for i in 0..60 {
            panel.data[[i, 2]] = f64::NAN;
        }

        let model = FactorModel::new();
        let quality = model.validate(&panel);
        assert!(quality.high_missing_cols.contains(&"feat_2".to_string()));
        assert_eq!(quality.n_variables, 3);

        let result = model.fit(&panel).unwrap();
        assert_eq!(result.n_variables, 3);
    }
}

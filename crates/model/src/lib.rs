#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::ModelError;

mod linalg;
pub use linalg::{power_iteration, ridge_regression, solve_linear_system};

mod matrix;
pub use matrix::{FeaturePanel, impute_bounded, standardize_columns};

mod pca;

mod dfm;

mod model;
pub use model::{
    DataQualityCheck, FactorMethod, FactorModel, FactorModelConfig, FactorModelResult,
    FittedMethod,
};

mod combine;
pub use combine::{combine_factors, optimize_pillar_weights};

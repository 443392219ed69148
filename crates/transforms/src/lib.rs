#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

/// Name of the date column in every series table.
pub const DATE_COL: &str = "date";

/// Name of the value column in every series table.
pub const VALUE_COL: &str = "value";

mod frame;
pub use frame::{append_values, date_values, numeric_values, series_frame, series_parts, sorted_series_parts};

mod error;
pub use error::TransformError;

pub(crate) mod stats;

mod resample;
pub use resample::{Agg, resample};

mod change;
pub use change::{GrowthMethod, growth_rate, momentum, yoy_change};

mod gap;
pub use gap::{credit_impulse, rolling_gap};

mod hp;
pub use hp::hp_filter_gap;

mod zscore;
pub use zscore::{StandardizeMethod, standardize, zscore};

mod regime;
pub use regime::{detect_regime, regime_probability};

mod align;
pub use align::{
    align_outer, apply_sign_flip, bounded_fill, detect_frequency, merge_asof_backward,
};

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod date;
pub use date::{date_from_epoch_days, epoch_days_from_date, month_end, parse_date};

mod frequency;
pub use frequency::Frequency;

mod regime;
pub use regime::{Regime, RegimeThresholds};

mod sign;
pub use sign::Sign;

mod feature;
pub use feature::FeatureMetadata;

/// Re-export common date type.
pub type Date = chrono::NaiveDate;

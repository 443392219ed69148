#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod aggregator;
pub use aggregator::Aggregator;

mod glci;
pub use glci::{FreshnessEntry, GlciComputer, GlciOptions, GlciResult, PillarOutcome};

mod error;
pub use error::IndexError;

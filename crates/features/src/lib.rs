#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod source;
pub use source::{CachedSource, MemorySource, SeriesSource, SourceError, StoreSource};

mod builder;
pub use builder::FeatureMatrixBuilder;

mod quality;
pub use quality::DataQualityReport;

mod error;
pub use error::FeatureError;

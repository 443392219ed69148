#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod series;
pub use series::{SeriesConfig, SeriesType};

mod index;
pub use index::{
    AggregationMethod, ComponentOp, IndexConfig, NormalizeConfig, Operation, PillarComponent,
    PillarConfig, TransformKind, TransformsSpec,
};

mod ordered;
pub use ordered::OrderedMap;

mod registry;
pub use registry::{GLCI_INDEX_ID, Registry};

mod error;
pub use error::ConfigError;

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod payload;
pub use payload::{
    DataPoint, FreshnessItem, GlciLatest, GlciPayload, IndexPayload, IndexSummary, PillarSlice,
    RegimePeriod, SeriesLatest, SeriesPayload, SeriesSummary,
};

mod exporter;
pub use exporter::{ExportStatus, JsonExporter};

mod error;
pub use error::ExportError;

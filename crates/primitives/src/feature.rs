//! Feature metadata emitted by the feature-matrix builder.

use serde::{Deserialize, Serialize};

use crate::{Date, Sign};

/// Metadata for one column of a pillar feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    /// Configured series the feature was derived from.
    pub series_id: String,
    /// Pillar the feature contributes to.
    pub pillar: String,
    /// Country of the underlying series, when configured.
    pub country: String,
    /// Transform that produced the feature column.
    pub transform: String,
    /// Unit of the underlying series.
    pub unit: String,
    /// Effective sign after pre-flipping; always positive once built.
    pub sign: Sign,
    /// Native frequency of the source series.
    pub source_frequency: String,
    /// Fraction of non-missing values in the feature column.
    pub data_quality: f64,
    /// Date of the most recent underlying observation.
    pub last_updated: Option<Date>,
}

impl FeatureMetadata {
    /// Column name of the feature in the matrix.
    #[must_use]
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.series_id, self.transform)
    }
}

//! Error types for index computation.

/// Errors that can occur computing a composite index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Configuration lookup failed.
    #[error("configuration error: {0}")]
    Config(#[from] glci_config::ConfigError),

    /// Feature construction failed.
    #[error("feature error: {0}")]
    Feature(#[from] glci_features::FeatureError),

    /// Series source failed.
    #[error("source error: {0}")]
    Source(#[from] glci_features::SourceError),

    /// Factor extraction failed.
    #[error("model error: {0}")]
    Model(#[from] glci_model::ModelError),

    /// A transform failed.
    #[error("transform error: {0}")]
    Transform(#[from] glci_transforms::TransformError),

    /// Artifact persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] glci_storage::StorageError),

    /// Every pillar failed; there is nothing to combine.
    #[error("no pillar factors could be computed")]
    NoPillars,

    /// The index produced no rows for the window.
    #[error("index '{0}' produced no observations")]
    EmptyIndex(String),

    /// Polars error.
    #[error("data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(IndexError::NoPillars.to_string(), "no pillar factors could be computed");
    }
}

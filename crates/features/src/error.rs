//! Error types for feature construction.

use crate::SourceError;

/// Errors that can occur while building a feature matrix.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Configuration lookup failed.
    #[error("configuration error: {0}")]
    Config(#[from] glci_config::ConfigError),

    /// A transform failed.
    #[error("transform error: {0}")]
    Transform(#[from] glci_transforms::TransformError),

    /// The series source failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// No usable features survived for a pillar.
    #[error("no features could be built for pillar '{0}'")]
    NoFeatures(String),

    /// Polars error.
    #[error("data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FeatureError::NoFeatures("stress".to_string());
        assert!(err.to_string().contains("stress"));
    }
}

//! Error types for risk-metric computation.

/// Errors that can occur computing risk metrics.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// The composite has not been computed yet.
    #[error("composite index not found; run the index computation first")]
    MissingComposite,

    /// The series source failed for an asset.
    #[error("source error: {0}")]
    Source(#[from] glci_features::SourceError),

    /// A transform failed.
    #[error("transform error: {0}")]
    Transform(#[from] glci_transforms::TransformError),

    /// Artifact persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] glci_storage::StorageError),

    /// An asset had too little price history to compute anything.
    #[error("asset '{0}' has insufficient price history")]
    InsufficientHistory(String),

    /// Polars error.
    #[error("data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RiskError::InsufficientHistory("gold_price".to_string());
        assert!(err.to_string().contains("gold_price"));
    }
}

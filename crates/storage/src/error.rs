//! Error types for artifact storage.

/// Errors that can occur reading or writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet or other columnar error.
    #[error("columnar error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Metadata serialization error.
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    /// Table shape prevents the operation.
    #[error("invalid table: {0}")]
    InvalidTable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorageError::InvalidTable("missing date column".to_string());
        assert!(err.to_string().contains("missing date column"));
    }
}

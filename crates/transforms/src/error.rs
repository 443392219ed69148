//! Error types for series transforms.

/// Errors that can occur during transformation.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Empty input data.
    #[error("empty input data")]
    EmptyData,

    /// Invalid parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing required column.
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// Numerical error (NaN, Inf, singular system).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Polars error.
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TransformError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = TransformError::InvalidParameter("window must be positive".to_string());
        assert!(err.to_string().contains("window"));
    }
}

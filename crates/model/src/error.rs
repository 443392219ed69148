//! Error types for factor estimation.

/// Errors that can occur during factor model estimation.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Too few observations or variables survived validation.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Non-finite values where finite ones are required.
    #[error("non-finite values in {0}")]
    NonFinite(String),

    /// Dimension mismatch in input data.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Linear algebra failure (singular system, collapsed iteration).
    #[error("linear algebra error: {0}")]
    LinearAlgebra(String),

    /// EM estimation failed to make progress.
    #[error("estimation diverged: {0}")]
    Diverged(String),

    /// Empty input.
    #[error("empty data provided")]
    EmptyData,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars error while extracting a matrix.
    #[error("data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl ModelError {
    /// Whether a fallback estimation rung may still succeed after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LinearAlgebra(_) | Self::Diverged(_) | Self::NonFinite(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::InsufficientData("need 30 observations, got 5".to_string());
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn fallback_eligibility() {
        assert!(ModelError::Diverged("em".to_string()).is_recoverable());
        assert!(!ModelError::EmptyData.is_recoverable());
    }
}

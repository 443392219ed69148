//! Error types for the JSON exporter.

/// Errors that can occur while exporting the API tree.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Filesystem failure writing an endpoint.
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a curated artifact failed.
    #[error("storage error: {0}")]
    Storage(#[from] glci_storage::StorageError),

    /// A curated table is missing an expected column.
    #[error("malformed artifact: {0}")]
    Malformed(String),
}

impl From<glci_transforms::TransformError> for ExportError {
    fn from(err: glci_transforms::TransformError) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ExportError::Malformed("glci missing regime column".to_string());
        assert!(err.to_string().contains("regime"));
    }
}

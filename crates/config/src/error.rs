//! Error types for configuration loading and lookup.

/// Errors that can occur while loading or querying configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Series id not present in the registry.
    #[error("series '{0}' not found in configuration")]
    UnknownSeries(String),

    /// Index id not present in the registry.
    #[error("index '{0}' not found in configuration")]
    UnknownIndex(String),

    /// The named index is not of the expected form.
    #[error("index '{0}' is not a {1} index")]
    WrongIndexForm(String, &'static str),

    /// Pillar name not present in the index.
    #[error("pillar '{0}' not found in index '{1}'")]
    UnknownPillar(String, String),

    /// Weights cannot be normalized because they sum to zero or less.
    #[error("weights for '{0}' sum to {1}, cannot normalize")]
    InvalidWeights(String, f64),

    /// Malformed configuration document.
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Failed to read the configuration file.
    #[error("configuration io error: {0}")]
    Io(#[from] std::io::Error),
}

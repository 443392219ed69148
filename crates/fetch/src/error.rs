//! Error types for data fetching.

/// Errors that can occur while fetching series data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A credential required by the provider is missing.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Transport-level HTTP failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated by the caller.
        body: String,
    },

    /// The provider's payload did not have the expected shape.
    #[error("payload parse error: {0}")]
    Parse(String),

    /// No client is registered for the configured source.
    #[error("no provider for source '{0}'")]
    UnknownSource(String),

    /// Configuration lookup failed.
    #[error("configuration error: {0}")]
    Config(#[from] glci_config::ConfigError),

    /// All retries for a series were exhausted.
    #[error("series '{series}' failed after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Configured series id.
        series: String,
        /// How many attempts were made.
        attempts: usize,
        /// The final error, stringified.
        last_error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FetchError::MissingCredential("FRED_API_KEY".to_string());
        assert!(err.to_string().contains("FRED_API_KEY"));

        let err = FetchError::Exhausted {
            series: "vix".to_string(),
            attempts: 3,
            last_error: "timeout".to_string(),
        };
        assert!(err.to_string().contains("3 attempts"));
    }
}

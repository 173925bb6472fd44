//! Error types for the warden-provider crate.

/// Errors that can occur while talking to the model backend.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed or timed out
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status or an unusable body
    #[error("Model API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

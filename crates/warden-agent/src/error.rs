//! Error types for the warden-agent crate.

use warden_provider::ProviderError;

/// Errors that can occur while orchestrating a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Model output could not be parsed into an action
    #[error("Could not parse an action from model output: {0}")]
    ActionInvalid(String),

    /// The language model could not be reached
    #[error("Model unavailable: {0}")]
    Model(#[from] ProviderError),

    /// A tool backend failed to deliver a call
    #[error("Tool backend error: {0}")]
    Backend(String),
}

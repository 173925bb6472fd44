//! Model client trait definition.

use crate::error::ProviderError;
use async_trait::async_trait;
use warden_core::ChatMessage;

/// Trait for language-model backends.
///
/// The agent loop only needs one operation: turn a conversation into the
/// assistant's next utterance.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier of the model in use.
    fn model(&self) -> &str;

    /// Produce the assistant's response to the given conversation.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

// Compile-time check: ModelClient must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn ModelClient) {}
};

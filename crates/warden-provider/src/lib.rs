//! warden-provider: HTTP client for a locally hosted language model.

mod error;
pub mod local;
pub mod traits;

pub use error::ProviderError;
pub use local::{LocalModelClient, LocalModelConfig};
pub use traits::ModelClient;

//! Tool trait definition and the shared handler context.

use crate::audit::AuditSink;
use crate::confirm::ConfirmationStore;
use crate::error::ServerError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use warden_core::Policy;

/// State shared by every tool handler. Owned by the tool server; requests
/// are dispatched one at a time, so the store mutex is uncontended and only
/// exists to satisfy the shared-reference shape of the `Tool` trait.
#[derive(Clone)]
pub struct ServerContext {
    /// Immutable security policy loaded at startup.
    pub policy: Arc<Policy>,
    /// Pending confirmation tokens.
    pub confirmations: Arc<Mutex<ConfirmationStore>>,
    /// Append-only audit log.
    pub audit: Arc<AuditSink>,
    /// Home directory used by the SSH key tool (overridable in tests).
    pub home_dir: PathBuf,
}

/// Result of a tool execution: the text shown to the caller plus an optional
/// structured annotation (the confirmation envelope, when one is pending).
#[derive(Debug, Clone)]
pub struct ToolResponse {
    /// Output text.
    pub text: String,
    /// Structured content carried alongside the text.
    pub structured: Option<serde_json::Value>,
}

impl ToolResponse {
    /// Plain text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    /// Text response with a structured annotation.
    pub fn with_structured(text: impl Into<String>, structured: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            structured: Some(structured),
        }
    }
}

/// Trait implemented by every tool the server exposes.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Machine-readable tool name (e.g., "run").
    fn name(&self) -> &str;

    /// Description shown in tool discovery.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError>;
}

// Compile-time check: Tool must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

//! Read file tool — bounded reads confined to the sandbox.

use crate::audit::AuditEvent;
use crate::error::ServerError;
use crate::paths::resolve_sandbox_path;
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

const TRUNCATION_MARKER: &str = "\n... (file truncated)";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// File path, relative to the sandbox root.
    pub path: String,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a file inside the sandbox. Large files are truncated."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ReadFileParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: ReadFileParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let path = resolve_sandbox_path(&ctx.policy.sandbox_root, Path::new(&params.path))?;

        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(ServerError::InvalidParameters(format!(
                "'{}' is not a regular file",
                params.path
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        let limit = ctx.policy.max_file_read_bytes;
        let truncated = bytes.len() > limit;
        let shown = if truncated { &bytes[..limit] } else { &bytes[..] };

        let mut text = String::from_utf8_lossy(shown).into_owned();
        if truncated {
            text.push_str(TRUNCATION_MARKER);
        }

        ctx.audit
            .append(AuditEvent::ReadFile {
                path: path.display().to_string(),
                bytes: shown.len(),
            })
            .await;

        Ok(ToolResponse::text(text))
    }
}

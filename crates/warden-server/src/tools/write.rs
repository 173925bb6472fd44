//! Write file tool — sandbox-confined writes with an explicit mode.

use crate::audit::AuditEvent;
use crate::error::ServerError;
use crate::paths::resolve_sandbox_path;
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// How an existing file is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Replace the file's content.
    #[default]
    Overwrite,
    /// Append to the end of the file.
    Append,
    /// Create a new file; fail if it already exists.
    Create,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// File path, relative to the sandbox root.
    pub path: String,
    /// Content to write.
    pub content: String,
    /// Write mode. Default: overwrite.
    #[serde(default)]
    pub mode: WriteMode,
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write a file inside the sandbox. Modes: overwrite, append, create. Parent directories are created."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(WriteFileParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: WriteFileParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let path = resolve_sandbox_path(&ctx.policy.sandbox_root, Path::new(&params.path))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = params.content.len();
        match params.mode {
            WriteMode::Overwrite => {
                tokio::fs::write(&path, &params.content).await?;
            }
            WriteMode::Append => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(params.content.as_bytes()).await?;
                file.flush().await?;
            }
            WriteMode::Create => {
                if tokio::fs::try_exists(&path).await? {
                    return Err(ServerError::InvalidParameters(format!(
                        "'{}' already exists; use overwrite or append",
                        params.path
                    )));
                }
                tokio::fs::write(&path, &params.content).await?;
            }
        }

        ctx.audit
            .append(AuditEvent::WriteFile {
                path: path.display().to_string(),
                bytes,
            })
            .await;

        Ok(ToolResponse::text(format!(
            "Wrote {bytes} bytes to {}",
            params.path
        )))
    }
}

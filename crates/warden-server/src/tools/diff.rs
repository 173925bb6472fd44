//! Diff tool — unified diff between a sandbox file and proposed content.

use crate::audit::AuditEvent;
use crate::error::ServerError;
use crate::paths::{normalize_path, resolve_sandbox_path};
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DiffParams {
    /// File path, relative to the sandbox root. May not exist yet.
    pub path: String,
    /// Proposed new content.
    pub new_content: String,
}

pub struct DiffTool;

#[async_trait]
impl Tool for DiffTool {
    fn name(&self) -> &str {
        "diff"
    }
    fn description(&self) -> &str {
        "Show a unified diff between a file's current content and proposed new content."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(DiffParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: DiffParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let path = resolve_sandbox_path(&ctx.policy.sandbox_root, Path::new(&params.path))?;
        let old = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let root = normalize_path(&ctx.policy.sandbox_root);
        let rel = path
            .strip_prefix(&root)
            .unwrap_or(&path)
            .display()
            .to_string();

        let text = if old == params.new_content {
            "(no diff)".to_string()
        } else {
            let diff = TextDiff::from_lines(old.as_str(), params.new_content.as_str());
            let patch = diff
                .unified_diff()
                .context_radius(3)
                .header(&format!("a/{rel}"), &format!("b/{rel}"))
                .to_string();
            if patch.trim().is_empty() {
                "(no diff)".to_string()
            } else {
                patch
            }
        };

        ctx.audit
            .append(AuditEvent::Diff {
                path: path.display().to_string(),
                bytes: params.new_content.len(),
            })
            .await;

        Ok(ToolResponse::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testutil::{read_audit, test_context, test_policy};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_diff_against_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = test_context(test_policy(dir.path())).await;

        let result = DiffTool
            .execute(
                serde_json::json!({"path": "f.txt", "new_content": "one\nTWO\nthree\n"}),
                &ctx,
            )
            .await
            .unwrap();

        assert!(result.text.contains("a/f.txt"));
        assert!(result.text.contains("b/f.txt"));
        assert!(result.text.contains("-two"));
        assert!(result.text.contains("+TWO"));
        assert_eq!(read_audit(&ctx)[0]["event"], "diff");
    }

    #[tokio::test]
    async fn test_diff_missing_file_is_all_additions() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(test_policy(dir.path())).await;

        let result = DiffTool
            .execute(
                serde_json::json!({"path": "new.txt", "new_content": "hello\n"}),
                &ctx,
            )
            .await
            .unwrap();

        assert!(result.text.contains("+hello"));
    }

    #[tokio::test]
    async fn test_identical_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "same\n").unwrap();
        let ctx = test_context(test_policy(dir.path())).await;

        let result = DiffTool
            .execute(
                serde_json::json!({"path": "f.txt", "new_content": "same\n"}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(result.text, "(no diff)");
    }

    #[tokio::test]
    async fn test_escape_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(test_policy(dir.path())).await;

        let err = DiffTool
            .execute(
                serde_json::json!({"path": "/etc/passwd", "new_content": ""}),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::PathEscape(_)));
    }
}

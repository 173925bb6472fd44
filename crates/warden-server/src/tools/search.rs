//! Search tool — literal substring search across the sandbox tree.

use crate::audit::AuditEvent;
use crate::error::ServerError;
use crate::paths::normalize_path;
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use ignore::WalkBuilder;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_MATCHES: usize = 50;
const MAX_FILE_SIZE: u64 = 1024 * 1024;
const SKIP_DIRS: [&str; 4] = [".git", "node_modules", ".mcp-audit", "dist"];

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Literal substring to look for.
    pub query: String,
    /// Stop after this many matching files. Default: 50.
    #[serde(default)]
    pub max_matches: Option<usize>,
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }
    fn description(&self) -> &str {
        "Find files under the sandbox root containing a literal substring."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(SearchParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: SearchParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let max_matches = params.max_matches.unwrap_or(DEFAULT_MAX_MATCHES);
        let root = normalize_path(&ctx.policy.sandbox_root);

        let walker = WalkBuilder::new(&root)
            .standard_filters(false)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !SKIP_DIRS.contains(&name.as_ref())
            })
            .build();

        let mut matches: Vec<String> = Vec::new();
        for entry in walker.flatten() {
            if matches.len() >= max_matches {
                break;
            }
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if entry
                .metadata()
                .map(|m| m.len() > MAX_FILE_SIZE)
                .unwrap_or(true)
            {
                continue;
            }

            let path = entry.path();
            // Skip files that are not valid UTF-8 text.
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if content.contains(&params.query) {
                if let Ok(rel) = path.strip_prefix(&root) {
                    matches.push(rel.to_string_lossy().to_string());
                }
            }
        }

        ctx.audit
            .append(AuditEvent::Search {
                path: root.display().to_string(),
                query: params.query.clone(),
                matches: matches.len(),
            })
            .await;

        let text = if matches.is_empty() {
            "(no matches)".to_string()
        } else {
            matches.join("\n")
        };
        Ok(ToolResponse::text(text))
    }
}

//! Tool implementations served by the terminal tool server.

pub mod confirm;
pub mod diff;
pub mod find;
pub mod read;
pub mod run;
pub mod search;
pub mod sshkey;
pub mod write;

use crate::confirm::PendingConfirmation;
use crate::registry::ToolRegistry;
use chrono::SecondsFormat;
use std::sync::Arc;

/// Register every built-in tool into a registry.
pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(Arc::new(run::RunTool));
    registry.register(Arc::new(confirm::ConfirmTool));
    registry.register(Arc::new(confirm::CancelTool));
    registry.register(Arc::new(read::ReadFileTool));
    registry.register(Arc::new(write::WriteFileTool));
    registry.register(Arc::new(diff::DiffTool));
    registry.register(Arc::new(search::SearchTool));
    registry.register(Arc::new(find::FindFilesTool));
    registry.register(Arc::new(sshkey::GenerateSshKeyTool));
}

/// Structured annotation attached to responses that gate on a token.
pub(crate) fn confirmation_envelope(record: &PendingConfirmation) -> serde_json::Value {
    serde_json::json!({
        "requiresConfirmation": true,
        "token": record.token,
        "reason": record.reason,
        "expiresAt": expires_at_rfc3339(record.expires_at_ms),
    })
}

pub(crate) fn expires_at_rfc3339(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::audit::AuditSink;
    use crate::confirm::ConfirmationStore;
    use crate::traits::ServerContext;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use warden_core::Policy;

    /// Permissive policy rooted at `dir`, with `rm` gated.
    pub(crate) fn test_policy(dir: &Path) -> Policy {
        let json = format!(
            r#"{{
                "sandboxRoot": {root:?},
                "allowedCommands": ["ls","echo","cat","true","date","rm","git"],
                "blockedArgsRegex": ["--no-preserve-root"],
                "dangerousCommands": ["rm"],
                "dangerousPatterns": [
                    {{"command":"git","argsAnyOf":["push"]}}
                ]
            }}"#,
            root = dir.display().to_string(),
        );
        Policy::from_json(&json, dir).unwrap()
    }

    pub(crate) async fn test_context(policy: Policy) -> ServerContext {
        test_context_with_home(policy, std::env::temp_dir()).await
    }

    pub(crate) async fn test_context_with_home(
        policy: Policy,
        home: std::path::PathBuf,
    ) -> ServerContext {
        let audit = AuditSink::open(&policy.audit_log_path).await.unwrap();
        ServerContext {
            confirmations: Arc::new(Mutex::new(ConfirmationStore::new(policy.confirm_ttl))),
            policy: Arc::new(policy),
            audit: Arc::new(audit),
            home_dir: home,
        }
    }

    /// Parse every line of the context's audit log.
    pub(crate) fn read_audit(ctx: &ServerContext) -> Vec<serde_json::Value> {
        let content =
            std::fs::read_to_string(&ctx.policy.audit_log_path).unwrap_or_default();
        content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

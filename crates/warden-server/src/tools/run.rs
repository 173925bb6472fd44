//! Run tool — allowlisted command execution with a confirmation gate.

use crate::audit::AuditEvent;
use crate::danger::classify;
use crate::error::ServerError;
use crate::guard::check_args;
use crate::paths::resolve_sandbox_path;
use crate::runner::run_command;
use crate::tools::{confirmation_envelope, expires_at_rfc3339};
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use warden_core::is_safe_name;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunParams {
    /// Executable base name (must be on the policy allowlist).
    pub command: String,
    /// Argument vector, passed through verbatim.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory relative to the sandbox root. Default: the root.
    #[serde(default)]
    pub cwd: Option<String>,
}

pub struct RunTool;

#[async_trait]
impl Tool for RunTool {
    fn name(&self) -> &str {
        "run"
    }
    fn description(&self) -> &str {
        "Execute an allowlisted command inside the sandbox. Dangerous commands return a confirmation token instead of running."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(RunParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: RunParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        if !is_safe_name(&params.command)
            || !ctx.policy.allowed_commands.contains(&params.command)
        {
            return Err(ServerError::NotAllowed(params.command));
        }

        let cwd = resolve_sandbox_path(
            &ctx.policy.sandbox_root,
            Path::new(params.cwd.as_deref().unwrap_or(".")),
        )?;

        check_args(&ctx.policy, &params.args)?;

        if let Some(reason) = classify(&ctx.policy, &params.command, &params.args) {
            let record = {
                let mut store = ctx.confirmations.lock().await;
                store.issue(
                    params.command.clone(),
                    params.args.clone(),
                    cwd.clone(),
                    reason.clone(),
                )
            };
            ctx.audit
                .append(AuditEvent::RunRequiresConfirmationStage1 {
                    token: record.token.clone(),
                    command: record.command.clone(),
                    args: record.args.clone(),
                    cwd: cwd.display().to_string(),
                    reason: reason.clone(),
                })
                .await;

            let text = format!(
                "Confirmation required: {reason}\n\
                 Token: {token} (expires {expires})\n\
                 Call confirm with this token; a second confirm executes the command.",
                token = record.token,
                expires = expires_at_rfc3339(record.expires_at_ms),
            );
            return Ok(ToolResponse::with_structured(
                text,
                confirmation_envelope(&record),
            ));
        }

        let outcome = run_command(
            &params.command,
            &params.args,
            &cwd,
            ctx.policy.max_output_chars,
        )
        .await?;

        ctx.audit
            .append(AuditEvent::RunExecuted {
                command: params.command.clone(),
                args: params.args.clone(),
                cwd: cwd.display().to_string(),
                exit_code: outcome.exit_code,
            })
            .await;

        let text = match outcome.exit_code {
            Some(0) => outcome.output,
            Some(code) => format!("Exit code: {code}\n{}", outcome.output),
            None => format!("Killed by signal\n{}", outcome.output),
        };
        Ok(ToolResponse::text(text))
    }
}

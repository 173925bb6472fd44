//! Confirm and cancel tools — the user-facing side of the token state machine.

use crate::audit::AuditEvent;
use crate::confirm::Stage;
use crate::error::ServerError;
use crate::runner::run_command;
use crate::tools::{confirmation_envelope, expires_at_rfc3339};
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConfirmParams {
    /// Confirmation token from a previous response.
    pub token: String,
}

pub struct ConfirmTool;

#[async_trait]
impl Tool for ConfirmTool {
    fn name(&self) -> &str {
        "confirm"
    }
    fn description(&self) -> &str {
        "Advance a confirmation token. The first confirm issues a stage-2 token; confirming that token executes the gated command."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ConfirmParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: ConfirmParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let mut store = ctx.confirmations.lock().await;
        match store.peek_stage(&params.token)? {
            Stage::One => {
                let (retired, issued) = store.advance(&params.token)?;
                drop(store);

                ctx.audit
                    .append(AuditEvent::ConfirmStage1IssuedStage2 {
                        token1: retired.token,
                        token2: issued.token.clone(),
                        command: issued.command.clone(),
                        args: issued.args.clone(),
                        cwd: issued.cwd.display().to_string(),
                        reason: issued.reason.clone(),
                    })
                    .await;

                let text = format!(
                    "Stage 1 approved for '{command}'.\n\
                     Token: {token} (expires {expires})\n\
                     Call confirm again with this token to execute.",
                    command = render_argv(&issued.command, &issued.args),
                    token = issued.token,
                    expires = expires_at_rfc3339(issued.expires_at_ms),
                );
                Ok(ToolResponse::with_structured(
                    text,
                    confirmation_envelope(&issued),
                ))
            }
            Stage::Two => {
                let payload = store.execute(&params.token)?;
                drop(store);

                let outcome = run_command(
                    &payload.command,
                    &payload.args,
                    &payload.cwd,
                    ctx.policy.max_output_chars,
                )
                .await?;

                fixup_ssh_key_permissions(&ctx.home_dir, &payload.command, &payload.args);

                ctx.audit
                    .append(AuditEvent::ConfirmExecuted {
                        token: payload.token.clone(),
                        stage: payload.stage.as_u8(),
                        command: payload.command.clone(),
                        args: payload.args.clone(),
                        cwd: payload.cwd.display().to_string(),
                        reason: payload.reason.clone(),
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
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CancelParams {
    /// Token to discard.
    pub token: String,
}

pub struct CancelTool;

#[async_trait]
impl Tool for CancelTool {
    fn name(&self) -> &str {
        "cancel"
    }
    fn description(&self) -> &str {
        "Discard a pending confirmation token."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(CancelParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: CancelParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let existed = {
            let mut store = ctx.confirmations.lock().await;
            store.cancel(&params.token)
        };
        ctx.audit
            .append(AuditEvent::ConfirmCancel {
                token: params.token.clone(),
                existed,
            })
            .await;

        let text = if existed {
            format!("Cancelled pending confirmation {}.", params.token)
        } else {
            "Nothing to cancel for that token.".to_string()
        };
        Ok(ToolResponse::text(text))
    }
}

fn render_argv(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    }
}

/// After a confirmed `ssh-keygen` run targeting `~/.ssh`, tighten file modes
/// the way OpenSSH expects. Failures are swallowed.
fn fixup_ssh_key_permissions(home: &Path, command: &str, args: &[String]) {
    if command != "ssh-keygen" {
        return;
    }
    let Some(idx) = args.iter().position(|a| a == "-f") else {
        return;
    };
    let Some(target) = args.get(idx + 1) else {
        return;
    };
    let key_path = PathBuf::from(target);
    let ssh_dir = home.join(".ssh");
    if key_path.parent() != Some(ssh_dir.as_path()) {
        return;
    }

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&ssh_dir, Permissions::from_mode(0o700));
        let _ = std::fs::set_permissions(&key_path, Permissions::from_mode(0o600));
        let mut pub_path = key_path.into_os_string();
        pub_path.push(".pub");
        let _ = std::fs::set_permissions(PathBuf::from(pub_path), Permissions::from_mode(0o644));
    }
    #[cfg(not(unix))]
    {
        let _ = key_path;
    }
}

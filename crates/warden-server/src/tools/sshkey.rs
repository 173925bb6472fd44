//! SSH key generation tool — curates an ssh-keygen invocation behind the
//! confirmation gate. Deliberately bypasses the command allowlist for this
//! one invocation: the argv is built here, never taken from the caller.

use crate::audit::AuditEvent;
use crate::error::ServerError;
use crate::tools::{confirmation_envelope, expires_at_rfc3339};
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use warden_core::is_safe_name;

const DEFAULT_KEY_TYPE: &str = "ed25519";
const DEFAULT_FILENAME: &str = "id_ed25519";
const DEFAULT_COMMENT: &str = "smartos-mcp";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GenerateSshKeyParams {
    /// Key type: ed25519 (default) or rsa.
    #[serde(default, rename = "type")]
    pub key_type: Option<String>,
    /// Key file name inside ~/.ssh. Default: id_ed25519.
    #[serde(default)]
    pub filename: Option<String>,
    /// Key comment. Default: smartos-mcp.
    #[serde(default)]
    pub comment: Option<String>,
    /// Passphrase. Default: empty.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Replace an existing key pair. Default: false.
    #[serde(default)]
    pub overwrite: Option<bool>,
}

pub struct GenerateSshKeyTool;

#[async_trait]
impl Tool for GenerateSshKeyTool {
    fn name(&self) -> &str {
        "generate_ssh_key"
    }
    fn description(&self) -> &str {
        "Prepare an ssh-keygen run for a new key in ~/.ssh. Always returns a confirmation token; never generates immediately."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(GenerateSshKeyParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: GenerateSshKeyParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let key_type = params.key_type.unwrap_or_else(|| DEFAULT_KEY_TYPE.to_string());
        if !matches!(key_type.as_str(), "ed25519" | "rsa") {
            return Err(ServerError::InvalidParameters(format!(
                "unsupported key type '{key_type}' (expected ed25519 or rsa)"
            )));
        }

        let filename = params
            .filename
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        if filename == "." || filename == ".." || !is_safe_name(&filename) {
            return Err(ServerError::InvalidParameters(format!(
                "invalid key file name '{filename}'"
            )));
        }

        let comment = params.comment.unwrap_or_else(|| DEFAULT_COMMENT.to_string());
        let passphrase = params.passphrase.unwrap_or_default();
        let overwrite = params.overwrite.unwrap_or(false);

        let ssh_dir = ctx.home_dir.join(".ssh");
        create_ssh_dir(&ssh_dir)?;

        let key_path = ssh_dir.join(&filename);
        let pub_path = ssh_dir.join(format!("{filename}.pub"));
        if !overwrite && (key_path.exists() || pub_path.exists()) {
            return Err(ServerError::InvalidParameters(format!(
                "key '{filename}' already exists in ~/.ssh; pass overwrite to replace it"
            )));
        }

        let argv = vec![
            "-t".to_string(),
            key_type.clone(),
            "-f".to_string(),
            key_path.display().to_string(),
            "-C".to_string(),
            comment,
            "-N".to_string(),
            passphrase,
        ];

        let record = {
            let mut store = ctx.confirmations.lock().await;
            store.issue(
                "ssh-keygen",
                argv,
                ctx.home_dir.clone(),
                format!("generate a new {key_type} SSH key at {}", key_path.display()),
            )
        };

        ctx.audit
            .append(AuditEvent::SshKeygenRequiresConfirmationStage1 {
                token: record.token.clone(),
                key_type,
                key_path: key_path.display().to_string(),
                overwrite,
            })
            .await;

        let text = format!(
            "Ready to run: ssh-keygen {argv}\n\
             Token: {token} (expires {expires})\n\
             Call confirm with this token; a second confirm generates the key.",
            argv = record.args.join(" "),
            token = record.token,
            expires = expires_at_rfc3339(record.expires_at_ms),
        );
        Ok(ToolResponse::with_structured(
            text,
            confirmation_envelope(&record),
        ))
    }
}

fn create_ssh_dir(ssh_dir: &std::path::Path) -> Result<(), ServerError> {
    if ssh_dir.exists() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(ssh_dir)?;
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(ssh_dir)?;
    }
    Ok(())
}

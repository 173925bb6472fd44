//! Tool server: registration, request dispatch, and stdio framing.

use crate::audit::AuditSink;
use crate::confirm::ConfirmationStore;
use crate::error::ServerError;
use crate::registry::ToolRegistry;
use crate::tools;
use crate::traits::ServerContext;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use warden_core::Policy;

const PROTOCOL_VERSION: &str = "2025-06-18";

/// Name this server registers under in tool catalogues.
pub const SERVER_NAME: &str = "terminal-server";

/// Normalized result of one tool call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// Output text.
    pub text: String,
    /// Structured content (the confirmation envelope, when pending).
    pub structured: Option<Value>,
    /// Whether the call failed.
    pub is_error: bool,
}

/// The stateful tool server. Owns the registry, the confirmation store, and
/// the audit sink; handles requests one at a time.
pub struct ToolServer {
    registry: ToolRegistry,
    ctx: ServerContext,
}

impl ToolServer {
    /// Build a server from a loaded policy. Opens the audit log (creating
    /// its directory) before any tool is served.
    pub async fn new(policy: Policy) -> Result<Self, ServerError> {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_home_dir(policy, home_dir).await
    }

    /// Build a server with an explicit home directory for the SSH key tool.
    pub async fn with_home_dir(policy: Policy, home_dir: PathBuf) -> Result<Self, ServerError> {
        let audit = AuditSink::open(&policy.audit_log_path).await?;
        let ctx = ServerContext {
            confirmations: Arc::new(Mutex::new(ConfirmationStore::new(policy.confirm_ttl))),
            policy: Arc::new(policy),
            audit: Arc::new(audit),
            home_dir,
        };
        let mut registry = ToolRegistry::new();
        tools::register_all(&mut registry);
        Ok(Self { registry, ctx })
    }

    /// Server name used in catalogues.
    pub fn name(&self) -> &str {
        SERVER_NAME
    }

    /// Discovery entries for every registered tool.
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.registry.definitions()
    }

    /// Invoke one tool. Handler errors become error outcomes; the caller's
    /// transport stays open.
    pub async fn handle_call(&self, tool: &str, args: Value) -> CallOutcome {
        let Some(tool_impl) = self.registry.get(tool) else {
            return CallOutcome {
                text: format!("Unknown tool: {tool}"),
                structured: None,
                is_error: true,
            };
        };

        match tool_impl.execute(args, &self.ctx).await {
            Ok(response) => CallOutcome {
                text: response.text,
                structured: response.structured,
                is_error: false,
            },
            Err(e) => CallOutcome {
                text: e.to_string(),
                structured: None,
                is_error: true,
            },
        }
    }

    /// Handle one JSON-RPC message. Returns `None` for notifications.
    pub async fn handle_request(&self, message: Value) -> Option<Value> {
        let id = message.get("id").cloned()?;
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        let params = message.get("params").cloned().unwrap_or_else(|| json!({}));

        let result = match method {
            "initialize" => json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
            "tools/list" => json!({ "tools": self.tool_definitions() }),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                let arguments = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let outcome = self.handle_call(name, arguments).await;

                let mut result = json!({
                    "content": [{ "type": "text", "text": outcome.text }],
                    "isError": outcome.is_error,
                });
                if let Some(structured) = outcome.structured {
                    result["structuredContent"] = structured;
                }
                result
            }
            other => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {other}"),
                    },
                }));
            }
        };

        Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    /// Serve line-framed JSON-RPC over stdin/stdout until EOF. Requests are
    /// handled serially in arrival order.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            if stdin.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<Value>(trimmed) {
                Ok(message) => self.handle_request(message).await,
                Err(e) => Some(json!({
                    "jsonrpc": "2.0",
                    "id": Value::Null,
                    "error": { "code": -32700, "message": format!("Parse error: {e}") },
                })),
            };

            if let Some(response) = response {
                let mut payload = serde_json::to_vec(&response)?;
                payload.push(b'\n');
                stdout.write_all(&payload).await?;
                stdout.flush().await?;
            }
        }
    }
}

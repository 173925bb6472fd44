//! Interactive chat REPL backed by an in-process tool server.

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use warden_agent::{AgentConfig, AgentError, ChatSession, ToolBackend, ToolCallOutcome, ToolInfo};
use warden_core::Policy;
use warden_provider::{LocalModelClient, LocalModelConfig};
use warden_server::ToolServer;

/// Adapter exposing an in-process tool server to the agent loop.
struct LocalServerBackend {
    server: Arc<ToolServer>,
}

#[async_trait]
impl ToolBackend for LocalServerBackend {
    fn name(&self) -> &str {
        self.server.name()
    }

    fn tools(&self) -> Vec<ToolInfo> {
        self.server
            .tool_definitions()
            .iter()
            .map(|def| ToolInfo {
                name: def["name"].as_str().unwrap_or_default().to_string(),
                description: def["description"].as_str().map(ToString::to_string),
                input_schema: Some(def["inputSchema"].clone()),
            })
            .collect()
    }

    async fn call_tool(
        &self,
        tool: &str,
        args: serde_json::Value,
    ) -> Result<ToolCallOutcome, AgentError> {
        let outcome = self.server.handle_call(tool, args).await;
        Ok(ToolCallOutcome {
            text: outcome.text,
            structured: outcome.structured,
            is_error: outcome.is_error,
        })
    }
}

pub async fn run(
    policy_path: &Path,
    model: Option<&str>,
    base_url: Option<&str>,
    max_steps: Option<usize>,
) -> anyhow::Result<()> {
    let policy = Policy::load(policy_path)
        .map_err(|e| anyhow::anyhow!("cannot load policy from {}: {e}", policy_path.display()))?;

    let server = Arc::new(
        ToolServer::new(policy)
            .await
            .map_err(|e| anyhow::anyhow!("cannot start tool server: {e}"))?,
    );

    let mut model_config = LocalModelConfig::default();
    if let Some(model) = model {
        model_config.model = model.to_string();
    }
    if let Some(base_url) = base_url {
        model_config.base_url = base_url.trim_end_matches('/').to_string();
    }
    let client = Arc::new(
        LocalModelClient::new(model_config)
            .map_err(|e| anyhow::anyhow!("cannot build model client: {e}"))?,
    );

    let mut agent_config = AgentConfig::default();
    if let Some(max_steps) = max_steps {
        agent_config.max_steps = max_steps;
    }

    let backend = Arc::new(LocalServerBackend { server });
    let mut session = ChatSession::new(client, vec![backend], agent_config);

    println!("warden chat — type 'exit' to leave");
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        let reply = session.handle_message(input).await;
        println!("warden> {reply}\n");
    }

    Ok(())
}

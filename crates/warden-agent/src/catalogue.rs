//! Tool discovery types and the prompt fragment rendered from them.

use crate::error::AgentError;
use async_trait::async_trait;
use serde_json::Value;

/// Metadata for one discoverable tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Tool name as registered on its server.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Opaque JSON-schema-like value, used only for prompt rendering.
    pub input_schema: Option<Value>,
}

/// Normalized result of a dispatched tool call.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// Output text.
    pub text: String,
    /// Structured content (confirmation envelope, when pending).
    pub structured: Option<Value>,
    /// Whether the server reported an error.
    pub is_error: bool,
}

/// A connected tool server, as the agent loop sees it.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Server name used in `server.tool` action references.
    fn name(&self) -> &str;

    /// Tools discovered at connection time.
    fn tools(&self) -> Vec<ToolInfo>;

    /// Dispatch one tool call.
    async fn call_tool(&self, tool: &str, args: Value) -> Result<ToolCallOutcome, AgentError>;
}

// Compile-time check: ToolBackend must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn ToolBackend) {}
};

/// Render the deterministic, human-readable tool list inserted verbatim into
/// the system prompt: one `Server:` header per server, one line per tool.
pub fn render_catalogue(servers: &[(String, Vec<ToolInfo>)]) -> String {
    let mut out = String::new();
    for (server, tools) in servers {
        out.push_str(&format!("Server: {server}\n"));

        let mut tools: Vec<&ToolInfo> = tools.iter().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));

        for tool in tools {
            let description = tool
                .description
                .as_deref()
                .unwrap_or("(no description)");
            out.push_str(&format!(
                "- {server}.{name} — {description} (args: {args})\n",
                name = tool.name,
                args = render_args(tool.input_schema.as_ref()),
            ));
        }
    }
    out
}

/// Summarize a schema's properties as `k?:type, k:type, ...`. Required
/// fields lose the `?`; arrays render as `T[]`.
fn render_args(schema: Option<&Value>) -> String {
    let Some(properties) = schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
    else {
        return "none".to_string();
    };
    if properties.is_empty() {
        return "none".to_string();
    }

    let required: Vec<&str> = schema
        .and_then(|s| s.get("required"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut keys: Vec<&String> = properties.keys().collect();
    keys.sort();

    keys.iter()
        .map(|key| {
            let marker = if required.contains(&key.as_str()) { "" } else { "?" };
            format!("{key}{marker}:{}", render_type(&properties[key.as_str()]))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_type(property: &Value) -> String {
    match property.get("type").and_then(Value::as_str) {
        Some("array") => {
            let item = property
                .get("items")
                .map(render_type)
                .unwrap_or_else(|| "any".to_string());
            format!("{item}[]")
        }
        Some(kind) => kind.to_string(),
        None => "any".to_string(),
    }
}

/// Build the system prompt from the rendered catalogue. A pure function so
/// prompt construction stays testable in isolation.
pub fn build_system_prompt(catalogue: &str) -> String {
    format!(
        "You are a careful terminal assistant. You can call tools on connected servers.\n\
         \n\
         Available tools:\n\
         {catalogue}\n\
         Respond with exactly one JSON object and nothing else. Either\n\
         {{\"type\": \"tool\", \"server\": \"<server>\", \"tool\": \"<tool>\", \"args\": {{...}}}}\n\
         to call a tool, or\n\
         {{\"type\": \"final\", \"text\": \"<answer>\"}}\n\
         to answer the user."
    )
}

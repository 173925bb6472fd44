//! The bounded reasoning loop driving one chat session.

use crate::action::{parse_action, Action};
use crate::catalogue::{build_system_prompt, render_catalogue, ToolBackend, ToolCallOutcome};
use crate::error::AgentError;
use crate::wizard::{parse_wizard_form, wizard_prompt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use warden_core::ChatMessage;
use warden_provider::ModelClient;

const TERMINAL_SERVER: &str = "terminal-server";
const DEFAULT_MAX_STEPS: usize = 6;

const PARSE_NUDGE: &str = "Return ONLY a single valid JSON object.";
const BUDGET_NUDGE: &str =
    "Step budget nearly exhausted: respond with a final answer after this result.";

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum model/tool iterations per user turn.
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// One chat session: conversation history plus the SSH wizard flag.
/// Single-threaded; calls to the model and the tool servers are the only
/// suspension points.
pub struct ChatSession {
    model: Arc<dyn ModelClient>,
    backends: Vec<Arc<dyn ToolBackend>>,
    config: AgentConfig,
    history: Vec<ChatMessage>,
    awaiting_ssh_wizard_input: bool,
}

impl ChatSession {
    pub fn new(
        model: Arc<dyn ModelClient>,
        backends: Vec<Arc<dyn ToolBackend>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            backends,
            config,
            history: Vec::new(),
            awaiting_ssh_wizard_input: false,
        }
    }

    /// Conversation history accumulated so far.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Whether the next user message will be read as a wizard form.
    pub fn awaiting_ssh_wizard_input(&self) -> bool {
        self.awaiting_ssh_wizard_input
    }

    /// Process one user message and produce the reply shown to the user.
    pub async fn handle_message(&mut self, user_text: &str) -> String {
        self.history.push(ChatMessage::user(user_text));

        if self.awaiting_ssh_wizard_input {
            self.awaiting_ssh_wizard_input = false;
            let options = parse_wizard_form(user_text);
            let reply = self.generate_ssh_key(Value::Object(options)).await;
            self.history.push(ChatMessage::assistant(reply.clone()));
            return reply;
        }

        let lower = user_text.to_lowercase();
        if wants_ssh_key(&lower) {
            let reply = if lower.contains("default") {
                self.generate_ssh_key(Value::Object(Default::default())).await
            } else {
                self.awaiting_ssh_wizard_input = true;
                wizard_prompt().to_string()
            };
            self.history.push(ChatMessage::assistant(reply.clone()));
            return reply;
        }

        self.run_reasoning_loop().await
    }

    async fn run_reasoning_loop(&mut self) -> String {
        let mut seen_calls: HashSet<String> = HashSet::new();

        for step in 0..self.config.max_steps {
            let action = match self.next_action().await {
                Ok(action) => action,
                Err(AgentError::Model(e)) => {
                    return format!("The language model is unavailable: {e}");
                }
                Err(_) => {
                    return "Sorry, the model did not produce a usable action. \
                            Please try rephrasing your request."
                        .to_string();
                }
            };

            let (server, tool, args) = match action {
                Action::Final { text } => return text,
                Action::Tool { server, tool, args } => (server, tool, args),
            };

            if server == TERMINAL_SERVER && tool == "confirm" {
                return "Confirmations are issued manually: run the confirm tool yourself \
                        with the token you were given."
                    .to_string();
            }

            if tool == "generate_ssh_key" && args.is_empty() {
                self.awaiting_ssh_wizard_input = true;
                return wizard_prompt().to_string();
            }

            let args_value = Value::Object(args.clone());
            let call_key = format!(
                "{server}.{tool} {}",
                serde_json::to_string(&args_value).unwrap_or_default()
            );
            if !seen_calls.insert(call_key) {
                self.history.push(ChatMessage::tool(format!(
                    "You already called {server}.{tool} with those arguments this turn; \
                     the result has not changed. Choose a different action or answer the user."
                )));
                continue;
            }

            if step + 2 >= self.config.max_steps {
                self.history.push(ChatMessage::tool(BUDGET_NUDGE.to_string()));
            }

            let Some(backend) = self.backend(&server) else {
                self.history
                    .push(ChatMessage::tool(format!("Unknown server '{server}'.")));
                continue;
            };

            let outcome = match backend.call_tool(&tool, args_value).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.history
                        .push(ChatMessage::tool(format!("Tool call failed: {e}")));
                    continue;
                }
            };
            self.history.push(ChatMessage::tool(outcome.text.clone()));

            // Some results need no further model round-trip.
            if server == TERMINAL_SERVER && tool == "find_files" {
                return outcome.text;
            }
            if server == TERMINAL_SERVER
                && tool == "run"
                && args.get("command").and_then(Value::as_str) == Some("date")
            {
                return outcome.text;
            }

            if pending_confirmation(&outcome) {
                return confirmation_instructions(&outcome);
            }
        }

        "Sorry, I ran out of reasoning steps before reaching an answer. \
         Try a more specific request."
            .to_string()
    }

    /// Call the model and parse its action, retrying once with an extra
    /// nudge when the first response does not parse. The raw model text is
    /// appended to history as the assistant turn either way.
    async fn next_action(&mut self) -> Result<Action, AgentError> {
        let raw = self.call_model(false).await?;
        self.history.push(ChatMessage::assistant(raw.clone()));
        match parse_action(&raw) {
            Ok(action) => Ok(action),
            Err(first_err) => {
                tracing::debug!(error = %first_err, "action parse failed, nudging model");
                let raw = self.call_model(true).await?;
                self.history.push(ChatMessage::assistant(raw.clone()));
                parse_action(&raw)
            }
        }
    }

    async fn call_model(&self, with_parse_nudge: bool) -> Result<String, AgentError> {
        let servers: Vec<(String, Vec<crate::catalogue::ToolInfo>)> = self
            .backends
            .iter()
            .map(|backend| (backend.name().to_string(), backend.tools()))
            .collect();

        let mut messages =
            vec![ChatMessage::system(build_system_prompt(&render_catalogue(&servers)))];
        if with_parse_nudge {
            messages.push(ChatMessage::system(PARSE_NUDGE.to_string()));
        }
        messages.extend(self.history.iter().cloned());

        Ok(self.model.complete(&messages).await?)
    }

    fn backend(&self, name: &str) -> Option<Arc<dyn ToolBackend>> {
        self.backends.iter().find(|b| b.name() == name).cloned()
    }

    async fn generate_ssh_key(&self, args: Value) -> String {
        let Some(backend) = self.backend(TERMINAL_SERVER) else {
            return "No terminal server is connected; cannot generate SSH keys.".to_string();
        };
        match backend.call_tool("generate_ssh_key", args).await {
            Ok(outcome) if pending_confirmation(&outcome) => confirmation_instructions(&outcome),
            Ok(outcome) => outcome.text,
            Err(e) => format!("generate_ssh_key failed: {e}"),
        }
    }
}

fn wants_ssh_key(lower: &str) -> bool {
    (lower.contains("ssh") && lower.contains("key"))
        || lower.contains("ssh-key")
        || lower.contains("sshkey")
}

fn pending_confirmation(outcome: &ToolCallOutcome) -> bool {
    outcome
        .structured
        .as_ref()
        .and_then(|s| s.get("requiresConfirmation"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn confirmation_instructions(outcome: &ToolCallOutcome) -> String {
    let structured = outcome.structured.as_ref();
    let token = structured
        .and_then(|s| s.get("token"))
        .and_then(Value::as_str)
        .unwrap_or("<missing>");
    let reason = structured
        .and_then(|s| s.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or("this action is gated by policy");

    format!(
        "{text}\n\nThis action needs your confirmation ({reason}).\n\
         To proceed, call the confirm tool with token {token}; to abort, call cancel.",
        text = outcome.text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::ToolInfo;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use warden_core::Role;
    use warden_provider::ProviderError;

    struct ScriptedModel {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::Api("script exhausted".to_string()))
        }
    }

    struct MockBackend {
        name: String,
        calls: Mutex<Vec<(String, Value)>>,
        outcomes: Mutex<VecDeque<ToolCallOutcome>>,
    }

    impl MockBackend {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                calls: Mutex::new(Vec::new()),
                outcomes: Mutex::new(VecDeque::new()),
            })
        }

        fn push_outcome(&self, outcome: ToolCallOutcome) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolBackend for MockBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn tools(&self) -> Vec<ToolInfo> {
            vec![ToolInfo {
                name: "run".to_string(),
                description: Some("Run a command.".to_string()),
                input_schema: None,
            }]
        }

        async fn call_tool(
            &self,
            tool: &str,
            args: Value,
        ) -> Result<ToolCallOutcome, AgentError> {
            self.calls.lock().unwrap().push((tool.to_string(), args));
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ToolCallOutcome {
                    text: "ok".to_string(),
                    structured: None,
                    is_error: false,
                }))
        }
    }

    fn text_outcome(text: &str) -> ToolCallOutcome {
        ToolCallOutcome {
            text: text.to_string(),
            structured: None,
            is_error: false,
        }
    }

    fn confirmation_outcome(token: &str) -> ToolCallOutcome {
        ToolCallOutcome {
            text: format!("Confirmation required\nToken: {token}"),
            structured: Some(json!({
                "requiresConfirmation": true,
                "token": token,
                "reason": "'rm' is marked dangerous by policy",
                "expiresAt": "2026-01-01T00:00:00Z",
            })),
            is_error: false,
        }
    }

    fn session(
        model: Arc<ScriptedModel>,
        backend: Arc<MockBackend>,
    ) -> ChatSession {
        ChatSession::new(model, vec![backend], AgentConfig::default())
    }

    #[tokio::test]
    async fn test_final_action_returns_text() {
        let model = ScriptedModel::new(vec![r#"{"type":"final","text":"hello there"}"#]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("hi").await;
        assert_eq!(reply, "hello there");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_then_final() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"terminal-server","tool":"read_file","args":{"path":"a.txt"}}"#,
            r#"{"type":"final","text":"the file says hi"}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(text_outcome("hi"));
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("what does a.txt say?").await;
        assert_eq!(reply, "the file says hi");
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].0, "read_file");

        // The tool result was appended to history on the tool channel.
        assert!(chat
            .history()
            .iter()
            .any(|m| m.role == Role::Tool && m.content == "hi"));
    }

    #[tokio::test]
    async fn test_duplicate_calls_suppressed() {
        let same_call =
            r#"{"type":"tool","server":"terminal-server","tool":"read_file","args":{"path":"a.txt"}}"#;
        let model = ScriptedModel::new(vec![
            same_call,
            same_call,
            r#"{"type":"final","text":"done"}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(text_outcome("contents"));
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("read it twice").await;
        assert_eq!(reply, "done");
        assert_eq!(backend.calls().len(), 1, "second identical call must not dispatch");
        assert!(chat
            .history()
            .iter()
            .any(|m| m.role == Role::Tool && m.content.contains("already called")));
    }

    #[tokio::test]
    async fn test_confirm_tool_is_forbidden() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"terminal-server","tool":"confirm","args":{"token":"t"}}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("confirm that for me").await;
        assert!(reply.contains("manually"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ssh_intent_opens_wizard_without_tool_call() {
        let model = ScriptedModel::new(vec![]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model.clone(), backend.clone());

        let reply = chat.handle_message("create an ssh key").await;
        assert!(reply.contains("use defaults"));
        assert!(chat.awaiting_ssh_wizard_input());
        assert!(backend.calls().is_empty());
        assert_eq!(model.call_count(), 0, "intent gate must not consult the model");
    }

    #[tokio::test]
    async fn test_wizard_defaults_flow() {
        let model = ScriptedModel::new(vec![]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(confirmation_outcome("tok-1"));
        let mut chat = session(model, backend.clone());

        chat.handle_message("create an ssh key").await;
        let reply = chat.handle_message("use defaults").await;

        assert!(!chat.awaiting_ssh_wizard_input());
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "generate_ssh_key");
        assert_eq!(calls[0].1, json!({}));
        assert!(reply.contains("tok-1"));
        assert!(reply.contains("confirm"));
    }

    #[tokio::test]
    async fn test_explicit_defaults_skip_wizard() {
        let model = ScriptedModel::new(vec![]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(confirmation_outcome("tok-2"));
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("make an ssh key, use defaults").await;
        assert!(!chat.awaiting_ssh_wizard_input());
        assert_eq!(backend.calls()[0].1, json!({}));
        assert!(reply.contains("tok-2"));
    }

    #[tokio::test]
    async fn test_model_emitting_bare_generate_ssh_key_reroutes_to_wizard() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"terminal-server","tool":"generate_ssh_key","args":{}}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("set up my machine for git").await;
        assert!(reply.contains("use defaults"));
        assert!(chat.awaiting_ssh_wizard_input());
        assert!(backend.calls().is_empty(), "policy gate must precede dispatch");
    }

    #[tokio::test]
    async fn test_parse_retry_once_then_succeed() {
        let model = ScriptedModel::new(vec![
            "this is not json",
            r#"{"type":"final","text":"recovered"}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model.clone(), backend);

        let reply = chat.handle_message("hello").await;
        assert_eq!(reply, "recovered");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_parse_failure_twice_gives_up() {
        let model = ScriptedModel::new(vec!["garbage one", "garbage two"]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model.clone(), backend);

        let reply = chat.handle_message("hello").await;
        assert!(reply.contains("did not produce a usable action"));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_unavailable_reported() {
        let model = ScriptedModel::new(vec![]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model, backend);

        let reply = chat.handle_message("hello").await;
        assert!(reply.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let calls: Vec<String> = (0..6)
            .map(|i| {
                format!(
                    r#"{{"type":"tool","server":"terminal-server","tool":"read_file","args":{{"path":"f{i}.txt"}}}}"#
                )
            })
            .collect();
        let model = ScriptedModel::new(calls.iter().map(|s| s.as_str()).collect());
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("read everything").await;
        assert!(reply.contains("ran out of reasoning steps"));
        assert_eq!(backend.calls().len(), 6);
        assert!(chat
            .history()
            .iter()
            .any(|m| m.role == Role::Tool && m.content == BUDGET_NUDGE));
    }

    #[tokio::test]
    async fn test_find_files_fast_return() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"terminal-server","tool":"find_files","args":{"dir":"."}}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(text_outcome("a.rs\nb.rs"));
        let mut chat = session(model.clone(), backend);

        let reply = chat.handle_message("what files changed?").await;
        assert_eq!(reply, "a.rs\nb.rs");
        assert_eq!(model.call_count(), 1, "result must be returned without another round-trip");
    }

    #[tokio::test]
    async fn test_run_date_fast_return() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"terminal-server","tool":"run","args":{"command":"date"}}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(text_outcome("Sat Aug  1 12:00:00 UTC 2026"));
        let mut chat = session(model.clone(), backend);

        let reply = chat.handle_message("what time is it?").await;
        assert!(reply.contains("2026"));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_confirmation_surfaces_token() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"terminal-server","tool":"run","args":{"command":"rm","args":["x"]}}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        backend.push_outcome(confirmation_outcome("tok-3"));
        let mut chat = session(model, backend);

        let reply = chat.handle_message("delete x").await;
        assert!(reply.contains("tok-3"));
        assert!(reply.contains("confirm"));
        assert!(reply.contains("cancel"));
    }

    #[tokio::test]
    async fn test_unknown_server_feeds_back_to_model() {
        let model = ScriptedModel::new(vec![
            r#"{"type":"tool","server":"ghost","tool":"run","args":{}}"#,
            r#"{"type":"final","text":"sorry"}"#,
        ]);
        let backend = MockBackend::new(TERMINAL_SERVER);
        let mut chat = session(model, backend.clone());

        let reply = chat.handle_message("do something").await;
        assert_eq!(reply, "sorry");
        assert!(backend.calls().is_empty());
        assert!(chat
            .history()
            .iter()
            .any(|m| m.role == Role::Tool && m.content.contains("Unknown server")));
    }
}

//! Action parsing: extract one JSON action from free-form model output.

use crate::error::AgentError;
use serde_json::{Map, Value};

/// A model-emitted directive for the next step of the reasoning loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Answer the user and end the turn.
    Final { text: String },
    /// Call `server.tool` with the given arguments.
    Tool {
        server: String,
        tool: String,
        args: Map<String, Value>,
    },
}

impl Action {
    /// Canonical JSON form of this action.
    pub fn to_json(&self) -> Value {
        match self {
            Action::Final { text } => serde_json::json!({
                "type": "final",
                "text": text,
            }),
            Action::Tool { server, tool, args } => serde_json::json!({
                "type": "tool",
                "server": server,
                "tool": tool,
                "args": args,
            }),
        }
    }
}

/// Parse a single action out of raw model output. Tolerates a surrounding
/// code fence and prose around the JSON object; everything else is
/// `ActionInvalid`.
pub fn parse_action(raw: &str) -> Result<Action, AgentError> {
    let stripped = strip_code_fence(raw.trim());
    let object_text = extract_first_object(stripped).ok_or_else(|| {
        AgentError::ActionInvalid("no JSON object found in output".to_string())
    })?;

    let value: Value = serde_json::from_str(object_text)
        .map_err(|e| AgentError::ActionInvalid(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ActionInvalid("missing 'type' field".to_string()))?;

    match kind {
        "final" => {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AgentError::ActionInvalid("final action requires a 'text' string".to_string())
                })?;
            Ok(Action::Final {
                text: text.to_string(),
            })
        }
        "tool" => {
            let server = require_string(&value, "server")?;
            let tool = require_string(&value, "tool")?;
            let args = match value.get("args") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(_) => {
                    return Err(AgentError::ActionInvalid(
                        "'args' must be an object".to_string(),
                    ))
                }
            };
            Ok(Action::Tool { server, tool, args })
        }
        other => Err(AgentError::ActionInvalid(format!(
            "unknown action type '{other}'"
        ))),
    }
}

fn require_string(value: &Value, field: &str) -> Result<String, AgentError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| AgentError::ActionInvalid(format!("tool action requires a '{field}' string")))
}

/// Drop one leading fenced-code marker line and a trailing fence.
fn strip_code_fence(s: &str) -> &str {
    let mut s = s;
    if s.starts_with("```") {
        s = s.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    }
    s.trim_end().strip_suffix("```").unwrap_or(s).trim()
}

/// Find the first balanced `{...}` while respecting quoted strings and
/// backslash escapes. A naive "find `}`" breaks on nested braces or braces
/// inside strings.
fn extract_first_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // Braces, quotes, and backslashes are ASCII, so a byte scan is safe and
    // the slice below always lands on char boundaries.
    for (offset, byte) in s.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_final() {
        let action = parse_action(r#"{"type":"final","text":"done"}"#).unwrap();
        assert_eq!(
            action,
            Action::Final {
                text: "done".to_string()
            }
        );
    }

    #[test]
    fn test_parse_tool_with_default_args() {
        let action =
            parse_action(r#"{"type":"tool","server":"terminal-server","tool":"run"}"#).unwrap();
        match action {
            Action::Tool { server, tool, args } => {
                assert_eq!(server, "terminal-server");
                assert_eq!(tool, "run");
                assert!(args.is_empty());
            }
            other => panic!("expected tool action, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_code_fence() {
        let raw = "```json\n{\"type\":\"final\",\"text\":\"fenced\"}\n```";
        let action = parse_action(raw).unwrap();
        assert_eq!(
            action,
            Action::Final {
                text: "fenced".to_string()
            }
        );
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let raw = "Sure, I will run that now:\n{\"type\":\"tool\",\"server\":\"s\",\"tool\":\"t\",\"args\":{}}\nLet me know!";
        assert!(parse_action(raw).is_ok());
    }

    #[test]
    fn test_nested_braces_and_braces_in_strings() {
        let raw = r#"{"type":"tool","server":"s","tool":"write_file","args":{"path":"a.json","content":"{\"nested\": {\"deep\": 1}}"}}"#;
        let action = parse_action(raw).unwrap();
        match action {
            Action::Tool { args, .. } => {
                assert!(args["content"].as_str().unwrap().contains("nested"));
            }
            other => panic!("expected tool action, got {other:?}"),
        }
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let raw = r#"{"type":"final","text":"he said \"hi\" {not a brace}"}"#;
        let action = parse_action(raw).unwrap();
        assert_eq!(
            action,
            Action::Final {
                text: "he said \"hi\" {not a brace}".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_inputs() {
        for raw in [
            "",
            "just prose",
            r#"{"type":"teleport"}"#,
            r#"{"no_type":true}"#,
            r#"{"type":"final"}"#,
            r#"{"type":"tool","server":"s"}"#,
            r#"{"type":"tool","server":"s","tool":"t","args":[1,2]}"#,
            "{\"type\":\"final\",\"text\":\"unterminated",
        ] {
            assert!(
                matches!(parse_action(raw), Err(AgentError::ActionInvalid(_))),
                "expected rejection for {raw:?}"
            );
        }
    }

    #[test]
    fn test_first_object_wins() {
        let raw = r#"{"type":"final","text":"first"} {"type":"final","text":"second"}"#;
        let action = parse_action(raw).unwrap();
        assert_eq!(
            action,
            Action::Final {
                text: "first".to_string()
            }
        );
    }

    #[test]
    fn test_roundtrip() {
        let actions = vec![
            Action::Final {
                text: "all done".to_string(),
            },
            Action::Tool {
                server: "terminal-server".to_string(),
                tool: "run".to_string(),
                args: json!({"command": "ls", "args": ["-la"]})
                    .as_object()
                    .unwrap()
                    .clone(),
            },
            Action::Tool {
                server: "s".to_string(),
                tool: "t".to_string(),
                args: Map::new(),
            },
        ];

        for action in actions {
            let rendered = action.to_json().to_string();
            assert_eq!(parse_action(&rendered).unwrap(), action);
        }
    }
}

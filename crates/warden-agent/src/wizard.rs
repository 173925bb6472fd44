//! SSH key wizard: a deterministic intent gate with a fuzzy form parser.
//!
//! The wizard is deliberately heuristic; it turns one freeform reply into
//! `generate_ssh_key` options.

use regex::Regex;
use serde_json::{Map, Value};
use warden_core::is_safe_name;

/// Prompt shown when the wizard engages.
pub fn wizard_prompt() -> &'static str {
    "Let's set up an SSH key. You can specify any of:\n\
     - type: ed25519 (default) or rsa\n\
     - filename: key file name under ~/.ssh (default id_ed25519)\n\
     - comment: \"your comment\"\n\
     - passphrase: \"secret\" (or say: no passphrase)\n\
     - overwrite, to replace an existing key\n\
     Or just say 'use defaults'."
}

/// Parse one wizard reply into `generate_ssh_key` arguments.
pub fn parse_wizard_form(input: &str) -> Map<String, Value> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let mut options = Map::new();

    if matches!(lower.as_str(), "use defaults" | "defaults" | "default") {
        return options;
    }

    // A bare word is taken as the filename, unless it looks like it was
    // meant to name another field.
    if is_safe_name(trimmed)
        && !lower.contains("type")
        && !lower.contains("pass")
        && !lower.contains("comment")
    {
        options.insert("filename".to_string(), Value::String(trimmed.to_string()));
        return options;
    }

    if let Some(captures) = re(r"(?i)\b(ed25519|rsa)\b").captures(trimmed) {
        options.insert(
            "type".to_string(),
            Value::String(captures[1].to_lowercase()),
        );
    }

    if let Some(captures) = re(r"(?i)filename\s*[:=]?\s*([A-Za-z0-9._-]+)").captures(trimmed) {
        options.insert(
            "filename".to_string(),
            Value::String(captures[1].to_string()),
        );
    }

    if let Some(captures) = re(r#"(?i)comment\s*[:=]?\s*"([^"]*)""#).captures(trimmed) {
        options.insert("comment".to_string(), Value::String(captures[1].to_string()));
    } else if let Some(captures) = re(r"(?i)\bcomment\s*[:=]?\s*(\S.*)$").captures(trimmed) {
        options.insert(
            "comment".to_string(),
            Value::String(captures[1].trim().to_string()),
        );
    }

    if lower.contains("no passphrase") || lower.contains("empty passphrase") {
        options.insert("passphrase".to_string(), Value::String(String::new()));
    } else if let Some(captures) =
        re(r#"(?i)passphrase\s*[:=]?\s*"([^"]*)""#).captures(trimmed)
    {
        options.insert(
            "passphrase".to_string(),
            Value::String(captures[1].to_string()),
        );
    }

    if lower.contains("no overwrite") {
        options.insert("overwrite".to_string(), Value::Bool(false));
    } else if lower.contains("overwrite") {
        options.insert("overwrite".to_string(), Value::Bool(true));
    }

    options
}

fn re(pattern: &'static str) -> Regex {
    Regex::new(pattern).expect("static pattern should compile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_variants() {
        for input in ["use defaults", "defaults", "default", "  Use Defaults  "] {
            assert!(parse_wizard_form(input).is_empty(), "for {input:?}");
        }
    }

    #[test]
    fn test_bare_word_is_filename() {
        let options = parse_wizard_form("deploy_key");
        assert_eq!(options.get("filename"), Some(&json!("deploy_key")));
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn test_bare_word_naming_a_field_is_not_a_filename() {
        // "mykeytype" contains "type"; fall through to field extraction.
        let options = parse_wizard_form("mykeytype");
        assert!(options.get("filename").is_none());
    }

    #[test]
    fn test_full_form() {
        let options = parse_wizard_form(
            r#"rsa filename: work_key comment "laptop key" passphrase "hunter2" overwrite"#,
        );
        assert_eq!(options.get("type"), Some(&json!("rsa")));
        assert_eq!(options.get("filename"), Some(&json!("work_key")));
        assert_eq!(options.get("comment"), Some(&json!("laptop key")));
        assert_eq!(options.get("passphrase"), Some(&json!("hunter2")));
        assert_eq!(options.get("overwrite"), Some(&json!(true)));
    }

    #[test]
    fn test_no_passphrase_phrases() {
        let options = parse_wizard_form("ed25519 with no passphrase");
        assert_eq!(options.get("type"), Some(&json!("ed25519")));
        assert_eq!(options.get("passphrase"), Some(&json!("")));

        let options = parse_wizard_form("empty passphrase please");
        assert_eq!(options.get("passphrase"), Some(&json!("")));
    }

    #[test]
    fn test_no_overwrite() {
        let options = parse_wizard_form("ed25519, no overwrite");
        assert_eq!(options.get("overwrite"), Some(&json!(false)));
    }

    #[test]
    fn test_trailing_comment() {
        let options = parse_wizard_form("filename work comment build machine");
        assert_eq!(options.get("filename"), Some(&json!("work")));
        assert_eq!(options.get("comment"), Some(&json!("build machine")));
    }

    #[test]
    fn test_case_insensitive_type() {
        let options = parse_wizard_form("an RSA key please");
        assert_eq!(options.get("type"), Some(&json!("rsa")));
    }
}

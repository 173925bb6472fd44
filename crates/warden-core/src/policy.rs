//! Declarative security policy: file format, validation, and the loaded form.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIRM_TTL_SECONDS: u64 = 90;
const DEFAULT_MAX_OUTPUT_CHARS: usize = 20_000;
const DEFAULT_MAX_FILE_READ_BYTES: usize = 200_000;
const DEFAULT_AUDIT_LOG_PATH: &str = ".mcp-audit/audit.log";

/// Errors raised while loading or validating a policy file.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Policy file could not be read
    #[error("Cannot read policy file: {0}")]
    Io(#[from] std::io::Error),

    /// Policy file is not valid JSON
    #[error("Policy file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Policy content failed validation
    #[error("Invalid policy: {0}")]
    Invalid(String),
}

/// Raw serde model of the policy document. Unknown keys are ignored so older
/// binaries keep loading newer policy files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PolicyFile {
    sandbox_root: PathBuf,
    audit_log_path: PathBuf,
    allowed_commands: Vec<String>,
    blocked_args_regex: Vec<String>,
    dangerous_commands: Vec<String>,
    dangerous_patterns: Vec<DangerRuleFile>,
    confirm_ttl_seconds: u64,
    max_output_chars: usize,
    max_file_read_bytes: usize,
}

impl Default for PolicyFile {
    fn default() -> Self {
        Self {
            sandbox_root: PathBuf::from("."),
            audit_log_path: PathBuf::from(DEFAULT_AUDIT_LOG_PATH),
            allowed_commands: Vec::new(),
            blocked_args_regex: Vec::new(),
            dangerous_commands: Vec::new(),
            dangerous_patterns: Vec::new(),
            confirm_ttl_seconds: DEFAULT_CONFIRM_TTL_SECONDS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            max_file_read_bytes: DEFAULT_MAX_FILE_READ_BYTES,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DangerRuleFile {
    command: String,
    args_any_of: Vec<String>,
    args_regex_any_of: Vec<String>,
}

/// One entry of `dangerousPatterns`: a command plus argument shapes that
/// require confirmation.
#[derive(Debug, Clone)]
pub struct DangerRule {
    /// Executable base name this rule applies to.
    pub command: String,
    /// Literal arguments; any intersection with the call's arguments is dangerous.
    pub args_any_of: Vec<String>,
    /// Compiled patterns; any match against any argument is dangerous.
    pub args_regex_any_of: Vec<Regex>,
}

/// Validated, immutable security policy loaded at startup.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Directory subtree all tool operations are confined to.
    pub sandbox_root: PathBuf,
    /// Audit log destination (absolute after loading).
    pub audit_log_path: PathBuf,
    /// Executable base names the runner may spawn.
    pub allowed_commands: HashSet<String>,
    /// Patterns that deny an argument anywhere.
    pub blocked_args_regex: Vec<Regex>,
    /// Commands that always require confirmation.
    pub dangerous_commands: HashSet<String>,
    /// (command, args) shapes that require confirmation.
    pub dangerous_patterns: Vec<DangerRule>,
    /// Lifetime of each confirmation stage.
    pub confirm_ttl: Duration,
    /// Per-stream clamp for captured process output, in characters.
    pub max_output_chars: usize,
    /// Clamp for `read_file`, in bytes.
    pub max_file_read_bytes: usize,
}

/// Whether a string is a plain executable or file base name:
/// `[A-Za-z0-9._-]+` with no separators.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl Policy {
    /// Load and validate a policy file, resolving `sandboxRoot` against the
    /// current working directory.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path)?;
        let base = std::env::current_dir()?;
        Self::from_json(&content, &base)
    }

    /// Parse and validate a policy document against an explicit base directory.
    pub fn from_json(json: &str, base_dir: &Path) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_json::from_str(json)?;
        Self::from_file(file, base_dir)
    }

    fn from_file(file: PolicyFile, base_dir: &Path) -> Result<Self, PolicyError> {
        if file.allowed_commands.is_empty() {
            return Err(PolicyError::Invalid(
                "allowedCommands must list at least one executable".to_string(),
            ));
        }

        let mut allowed_commands = HashSet::new();
        for name in file.allowed_commands {
            check_command_name(&name)?;
            allowed_commands.insert(name);
        }

        let mut dangerous_commands = HashSet::new();
        for name in file.dangerous_commands {
            check_command_name(&name)?;
            dangerous_commands.insert(name);
        }

        let blocked_args_regex = file
            .blocked_args_regex
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut dangerous_patterns = Vec::new();
        for rule in file.dangerous_patterns {
            check_command_name(&rule.command)?;
            dangerous_patterns.push(DangerRule {
                command: rule.command,
                args_any_of: rule.args_any_of,
                args_regex_any_of: rule
                    .args_regex_any_of
                    .iter()
                    .map(|p| compile_pattern(p))
                    .collect::<Result<Vec<_>, _>>()?,
            });
        }

        let sandbox_root = if file.sandbox_root.is_absolute() {
            file.sandbox_root
        } else {
            base_dir.join(file.sandbox_root)
        };

        let audit_log_path = if file.audit_log_path.is_absolute() {
            file.audit_log_path
        } else {
            sandbox_root.join(file.audit_log_path)
        };

        Ok(Self {
            sandbox_root,
            audit_log_path,
            allowed_commands,
            blocked_args_regex,
            dangerous_commands,
            dangerous_patterns,
            confirm_ttl: Duration::from_secs(file.confirm_ttl_seconds),
            max_output_chars: file.max_output_chars,
            max_file_read_bytes: file.max_file_read_bytes,
        })
    }
}

fn check_command_name(name: &str) -> Result<(), PolicyError> {
    if is_safe_name(name) {
        Ok(())
    } else {
        Err(PolicyError::Invalid(format!(
            "executable name '{name}' contains characters outside [A-Za-z0-9._-]"
        )))
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, PolicyError> {
    Regex::new(pattern)
        .map_err(|e| PolicyError::Invalid(format!("bad pattern '{pattern}': {e}")))
}

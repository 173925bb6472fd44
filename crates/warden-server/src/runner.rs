//! Process runner: spawns an exact argument vector and captures bounded output.

use crate::error::ServerError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

const TRUNCATION_SUFFIX: &str = "\n... (output truncated)";

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Combined stdout/stderr text, clamped per stream.
    pub output: String,
    /// Exit code; `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Spawn `command` with the exact argv. The command is never routed through
/// a shell and arguments are never concatenated into a command line. Stdin
/// is closed; stdout and stderr are captured, decoded lossily, and each
/// clamped to `max_output_chars`. There is no timeout: the output clamp is
/// the principal bound on runaway commands.
pub async fn run_command(
    command: &str,
    args: &[String],
    cwd: &Path,
    max_output_chars: usize,
) -> Result<RunOutcome, ServerError> {
    let output = Command::new(command)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ServerError::SpawnFailure {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    let stdout = clamp_chars(&String::from_utf8_lossy(&output.stdout), max_output_chars);
    let stderr = clamp_chars(&String::from_utf8_lossy(&output.stderr), max_output_chars);

    let mut text = stdout;
    if !stderr.is_empty() {
        text.push_str("\n[stderr]\n");
        text.push_str(&stderr);
    }
    if text.is_empty() {
        text = "(no output)".to_string();
    }

    Ok(RunOutcome {
        output: text,
        exit_code: output.status.code(),
    })
}

/// Clamp to `max` characters, appending a truncation suffix on overflow.
fn clamp_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            let mut out = s[..byte_idx].to_string();
            out.push_str(TRUNCATION_SUFFIX);
            out
        }
        None => s.to_string(),
    }
}

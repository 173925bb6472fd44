//! Error types for the warden-server crate.

/// Errors surfaced by tool handlers and the policy checks they run.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Command is not on the allowlist or has an invalid name
    #[error("Command not allowed: {0}")]
    NotAllowed(String),

    /// A path or path-shaped argument leaves the sandbox
    #[error("Path escapes the sandbox: {0}")]
    PathEscape(String),

    /// An argument matched a deny pattern
    #[error("Argument blocked by policy: {0}")]
    BlockedArgument(String),

    /// Token not found (never issued, already consumed, or cancelled)
    #[error("No pending confirmation for that token")]
    ConfirmationMissing,

    /// Token found but past its TTL
    #[error("Confirmation token has expired")]
    ConfirmationExpired,

    /// Execution attempted with a stage-1 token
    #[error("Token is still at stage 1; confirm it once more to execute")]
    WrongStage,

    /// Executable missing or the kernel refused to spawn it
    #[error("Failed to spawn '{command}': {message}")]
    SpawnFailure { command: String, message: String },

    /// Tool arguments did not match the schema
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// File read/write/mkdir failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

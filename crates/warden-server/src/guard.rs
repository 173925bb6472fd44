//! Coarse argument filter applied before any process spawn.

use crate::error::ServerError;
use crate::paths::resolve_sandbox_path;
use std::path::Path;
use warden_core::Policy;

/// Reject arguments that match a deny pattern, contain `..`, or are absolute
/// paths outside the sandbox. Semantic checks beyond these lexical ones are
/// the danger classifier's job.
pub fn check_args(policy: &Policy, args: &[String]) -> Result<(), ServerError> {
    for arg in args {
        for pattern in &policy.blocked_args_regex {
            if pattern.is_match(arg) {
                return Err(ServerError::BlockedArgument(arg.clone()));
            }
        }

        if arg.contains("..") {
            return Err(ServerError::BlockedArgument(arg.clone()));
        }

        if arg.starts_with('/') {
            resolve_sandbox_path(&policy.sandbox_root, Path::new(arg))?;
        }
    }
    Ok(())
}

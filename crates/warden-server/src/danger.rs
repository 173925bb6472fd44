//! Decides whether a (command, args) pair requires two-stage confirmation.

use warden_core::Policy;

/// Returns `None` when the call is safe, otherwise a human-readable reason
/// surfaced to the user and the audit log.
pub fn classify(policy: &Policy, command: &str, args: &[String]) -> Option<String> {
    if policy.dangerous_commands.contains(command) {
        return Some(format!("'{command}' is marked dangerous by policy"));
    }

    for rule in &policy.dangerous_patterns {
        if rule.command != command {
            continue;
        }
        for literal in &rule.args_any_of {
            if args.iter().any(|a| a == literal) {
                return Some(format!("'{command} {literal}' requires confirmation"));
            }
        }
        for pattern in &rule.args_regex_any_of {
            if let Some(arg) = args.iter().find(|a| pattern.is_match(a)) {
                return Some(format!(
                    "'{command}' argument '{arg}' matches a dangerous pattern"
                ));
            }
        }
    }

    None
}

//! Two-stage confirmation token state machine.

use crate::error::ServerError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Which confirmation the token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    One,
    Two,
}

impl Stage {
    /// Numeric form used in audit records.
    pub fn as_u8(self) -> u8 {
        match self {
            Stage::One => 1,
            Stage::Two => 2,
        }
    }
}

/// A gated command captured until the user confirms or the token expires.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// Opaque single-use identifier (UUID v4).
    pub token: String,
    /// Current stage of the state machine.
    pub stage: Stage,
    /// Wall-clock milliseconds at creation.
    pub created_at_ms: u64,
    /// Wall-clock milliseconds past which the token is dead.
    pub expires_at_ms: u64,
    /// Captured executable base name.
    pub command: String,
    /// Captured argument vector.
    pub args: Vec<String>,
    /// Captured working directory.
    pub cwd: PathBuf,
    /// Why the call was gated.
    pub reason: String,
}

/// Token store owned by the tool server. Holds at most one live record at a
/// time; expiry is checked lazily on access, so no background sweeper runs.
pub struct ConfirmationStore {
    pending: HashMap<String, PendingConfirmation>,
    ttl: Duration,
}

impl ConfirmationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
        }
    }

    /// Create a stage-1 record for a gated command. Any previously issued
    /// token is retired: only one token value exists at any instant.
    pub fn issue(
        &mut self,
        command: impl Into<String>,
        args: Vec<String>,
        cwd: PathBuf,
        reason: impl Into<String>,
    ) -> PendingConfirmation {
        self.pending.clear();
        let now = now_ms();
        let record = PendingConfirmation {
            token: Uuid::new_v4().to_string(),
            stage: Stage::One,
            created_at_ms: now,
            expires_at_ms: now + self.ttl.as_millis() as u64,
            command: command.into(),
            args,
            cwd,
            reason: reason.into(),
        };
        self.pending.insert(record.token.clone(), record.clone());
        record
    }

    /// Look up a live token's stage without consuming it.
    pub fn peek_stage(&mut self, token: &str) -> Result<Stage, ServerError> {
        let record = self.take_live(token)?;
        let stage = record.stage;
        self.pending.insert(record.token.clone(), record);
        Ok(stage)
    }

    /// Retire a stage-1 token and issue a stage-2 token for the same payload
    /// with a fresh TTL. Returns `(retired, issued)`.
    pub fn advance(
        &mut self,
        token: &str,
    ) -> Result<(PendingConfirmation, PendingConfirmation), ServerError> {
        let retired = self.take_live(token)?;
        if retired.stage != Stage::One {
            self.pending.insert(retired.token.clone(), retired);
            return Err(ServerError::WrongStage);
        }

        let now = now_ms();
        let issued = PendingConfirmation {
            token: Uuid::new_v4().to_string(),
            stage: Stage::Two,
            created_at_ms: now,
            expires_at_ms: now + self.ttl.as_millis() as u64,
            command: retired.command.clone(),
            args: retired.args.clone(),
            cwd: retired.cwd.clone(),
            reason: retired.reason.clone(),
        };
        self.pending.insert(issued.token.clone(), issued.clone());
        Ok((retired, issued))
    }

    /// Retire a stage-2 token and return its payload for execution. A
    /// stage-1 token fails with `WrongStage` and is consumed anyway: tokens
    /// are single-use no matter the outcome.
    pub fn execute(&mut self, token: &str) -> Result<PendingConfirmation, ServerError> {
        let record = self.take_live(token)?;
        if record.stage != Stage::Two {
            return Err(ServerError::WrongStage);
        }
        Ok(record)
    }

    /// Idempotent removal. Returns whether a record existed.
    pub fn cancel(&mut self, token: &str) -> bool {
        self.pending.remove(token).is_some()
    }

    fn take_live(&mut self, token: &str) -> Result<PendingConfirmation, ServerError> {
        let record = self
            .pending
            .remove(token)
            .ok_or(ServerError::ConfirmationMissing)?;
        if now_ms() >= record.expires_at_ms {
            return Err(ServerError::ConfirmationExpired);
        }
        Ok(record)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

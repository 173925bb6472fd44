//! Append-only JSONL audit log.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One policy-relevant event. Serialized with an `event` discriminator and
/// camelCase payload fields, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AuditEvent {
    RunRequiresConfirmationStage1 {
        token: String,
        command: String,
        args: Vec<String>,
        cwd: String,
        reason: String,
    },
    RunExecuted {
        command: String,
        args: Vec<String>,
        cwd: String,
        exit_code: Option<i32>,
    },
    ConfirmStage1IssuedStage2 {
        token1: String,
        token2: String,
        command: String,
        args: Vec<String>,
        cwd: String,
        reason: String,
    },
    ConfirmExecuted {
        token: String,
        stage: u8,
        command: String,
        args: Vec<String>,
        cwd: String,
        reason: String,
        exit_code: Option<i32>,
    },
    ConfirmCancel {
        token: String,
        existed: bool,
    },
    SshKeygenRequiresConfirmationStage1 {
        token: String,
        key_type: String,
        key_path: String,
        overwrite: bool,
    },
    ReadFile {
        path: String,
        bytes: usize,
    },
    WriteFile {
        path: String,
        bytes: usize,
    },
    Diff {
        path: String,
        bytes: usize,
    },
    Search {
        path: String,
        query: String,
        matches: usize,
    },
    FindFiles {
        path: String,
        results: usize,
    },
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

/// Append-mode JSONL sink. The file handle is opened once and guarded by a
/// mutex so concurrent appends never interleave within a line.
pub struct AuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditSink {
    /// Open the audit log for appending, creating parent directories first.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Failures are logged and swallowed: a lost audit
    /// line must not fail the tool call that produced it.
    pub async fn append(&self, event: AuditEvent) {
        if let Err(e) = self.try_append(&event).await {
            tracing::warn!(path = %self.path.display(), error = %e, "audit append failed");
        }
    }

    async fn try_append(&self, event: &AuditEvent) -> std::io::Result<()> {
        let record = AuditRecord {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await
    }
}

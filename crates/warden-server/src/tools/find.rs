//! Find files tool — filtered walk sorted by modification time.

use crate::audit::AuditEvent;
use crate::error::ServerError;
use crate::paths::{normalize_path, resolve_sandbox_path};
use crate::traits::{ServerContext, Tool, ToolResponse};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DEFAULT_MAX_RESULTS: usize = 50;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindFilesParams {
    /// Directory to start from, relative to the sandbox root.
    pub dir: String,
    /// File extensions to include, with or without the leading dot.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// Case-insensitive substring the file name must contain.
    #[serde(default)]
    pub name_contains: Option<String>,
    /// Maximum number of results. Default: 50.
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Only include files modified within this many minutes.
    #[serde(default)]
    pub modified_within_minutes: Option<u64>,
    /// Follow symlinked directories. Default: true.
    #[serde(default)]
    pub follow_symlinks: Option<bool>,
}

pub struct FindFilesTool;

#[async_trait]
impl Tool for FindFilesTool {
    fn name(&self) -> &str {
        "find_files"
    }
    fn description(&self) -> &str {
        "List files under a directory, filtered by extension, name, and age, newest first."
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(FindFilesParams))
            .expect("schema serialization should not fail")
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ServerContext,
    ) -> Result<ToolResponse, ServerError> {
        let params: FindFilesParams = serde_json::from_value(args)
            .map_err(|e| ServerError::InvalidParameters(e.to_string()))?;

        let start = resolve_sandbox_path(&ctx.policy.sandbox_root, Path::new(&params.dir))?;
        let root = normalize_path(&ctx.policy.sandbox_root);
        let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        let follow_symlinks = params.follow_symlinks.unwrap_or(true);

        let extensions: Option<Vec<String>> = params.extensions.map(|exts| {
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        });
        let name_contains = params.name_contains.map(|n| n.to_ascii_lowercase());
        let cutoff = params
            .modified_within_minutes
            .map(|minutes| SystemTime::now() - Duration::from_secs(minutes * 60));

        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        let mut stack = vec![start.clone()];
        let mut visited: HashSet<(u64, u64)> = HashSet::new();

        while let Some(dir) = stack.pop() {
            let Ok(dir_meta) = std::fs::metadata(&dir) else {
                continue;
            };
            if let Some(key) = inode_key(&dir_meta) {
                if !visited.insert(key) {
                    continue;
                }
            }
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };

            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let path = entry.path();

                if file_type.is_symlink() {
                    if !follow_symlinks {
                        continue;
                    }
                    match std::fs::metadata(&path) {
                        Ok(m) if m.is_dir() => stack.push(path),
                        Ok(m) if m.is_file() => {
                            if let Ok(mtime) = m.modified() {
                                consider(
                                    &mut files,
                                    path,
                                    mtime,
                                    &extensions,
                                    &name_contains,
                                    cutoff,
                                );
                            }
                        }
                        _ => {}
                    }
                } else if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    let Ok(meta) = entry.metadata() else {
                        continue;
                    };
                    if let Ok(mtime) = meta.modified() {
                        consider(&mut files, path, mtime, &extensions, &name_contains, cutoff);
                    }
                }
            }
        }

        files.sort_by(|a, b| b.1.cmp(&a.1));
        files.truncate(max_results);

        ctx.audit
            .append(AuditEvent::FindFiles {
                path: start.display().to_string(),
                results: files.len(),
            })
            .await;

        let lines: Vec<String> = files
            .iter()
            .map(|(path, _)| {
                path.strip_prefix(&root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        let text = if lines.is_empty() {
            "(no matching files)".to_string()
        } else {
            lines.join("\n")
        };
        Ok(ToolResponse::text(text))
    }
}

fn consider(
    files: &mut Vec<(PathBuf, SystemTime)>,
    path: PathBuf,
    mtime: SystemTime,
    extensions: &Option<Vec<String>>,
    name_contains: &Option<String>,
    cutoff: Option<SystemTime>,
) {
    if let Some(exts) = extensions {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext {
            Some(ext) if exts.contains(&ext) => {}
            _ => return,
        }
    }
    if let Some(needle) = name_contains {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !name.contains(needle.as_str()) {
            return;
        }
    }
    if let Some(cutoff) = cutoff {
        if mtime < cutoff {
            return;
        }
    }
    files.push((path, mtime));
}

#[cfg(unix)]
fn inode_key(meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn inode_key(_meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    None
}

//! Work-directory actions: file access and shell commands

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::context::{ActionContext, ActionError};
use super::{Action, optional_str, required_str};
use crate::domain::{ActionOutcome, ActionParams};
use crate::error::Result;

const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 120_000;
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Read a file from the work directory
pub struct ReadFile {
    ctx: ActionContext,
    file_name: String,
}

impl ReadFile {
    pub const NAME: &'static str = "read_file";

    pub fn build(params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let file_name = required_str(Self::NAME, params, "file_name")?;
        Ok(Box::new(Self {
            ctx: ctx.clone(),
            file_name,
        }))
    }
}

#[async_trait]
impl Action for ReadFile {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        let path = match self.ctx.resolve_path(&self.file_name) {
            Ok(path) => path,
            Err(e) => return Ok(ActionOutcome::failure(e.to_string())),
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ActionOutcome::success(content)),
            Err(e) => Ok(ActionOutcome::failure(format!(
                "Error reading file {}: {}",
                self.file_name, e
            ))),
        }
    }
}

/// Create or overwrite a file in the work directory
pub struct WriteFile {
    ctx: ActionContext,
    file_name: String,
    content: String,
}

impl WriteFile {
    pub const NAME: &'static str = "write_file";

    pub fn build(params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let file_name = required_str(Self::NAME, params, "file_name")?;
        let content = optional_str(params, "content").unwrap_or_default();
        Ok(Box::new(Self {
            ctx: ctx.clone(),
            file_name,
            content,
        }))
    }
}

#[async_trait]
impl Action for WriteFile {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        let path = match self.ctx.resolve_path(&self.file_name) {
            Ok(path) => path,
            Err(e) => return Ok(ActionOutcome::failure(e.to_string())),
        };
        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ActionOutcome::failure(format!(
                "Error creating directory for {}: {}",
                self.file_name, e
            )));
        }
        match tokio::fs::write(&path, &self.content).await {
            Ok(()) => Ok(ActionOutcome::success(format!(
                "File {} written ({} bytes).",
                self.file_name,
                self.content.len()
            ))),
            Err(e) => Ok(ActionOutcome::failure(format!(
                "Error writing file {}: {}",
                self.file_name, e
            ))),
        }
    }
}

/// List files under the work directory (or a subdirectory of it)
pub struct ListFiles {
    ctx: ActionContext,
    path: String,
}

impl ListFiles {
    pub const NAME: &'static str = "list_files";

    pub fn build(params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        Ok(Box::new(Self {
            ctx: ctx.clone(),
            path: optional_str(params, "path").unwrap_or_else(|| ".".to_string()),
        }))
    }
}

#[async_trait]
impl Action for ListFiles {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        let root = match self.path.as_str() {
            "." | "" => self.ctx.work_directory.clone(),
            other => match self.ctx.resolve_path(other) {
                Ok(path) => path,
                Err(e) => return Ok(ActionOutcome::failure(e.to_string())),
            },
        };
        match list_work_directory(&root).await {
            Ok(files) if files.is_empty() => Ok(ActionOutcome::success("(empty directory)")),
            Ok(files) => Ok(ActionOutcome::success(files.join("\n"))),
            Err(e) => Ok(ActionOutcome::failure(format!("Error listing {}: {}", self.path, e))),
        }
    }
}

/// Recursively list regular files under `root`, as sorted relative paths
pub async fn list_work_directory(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_string_lossy().to_string());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Run a shell command in the work directory with a timeout
pub struct RunCommand {
    ctx: ActionContext,
    command: String,
    timeout_ms: u64,
}

impl RunCommand {
    pub const NAME: &'static str = "run_command";

    pub fn build(params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let command = required_str(Self::NAME, params, "command")?;
        let timeout_ms = params
            .get("timeout_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS);
        Ok(Box::new(Self {
            ctx: ctx.clone(),
            command,
            timeout_ms,
        }))
    }
}

#[async_trait]
impl Action for RunCommand {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        log::debug!("run_command in {:?}: {}", self.ctx.work_directory, self.command);

        let run = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.ctx.work_directory)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(Duration::from_millis(self.timeout_ms), run).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                let error = ActionError::Io {
                    operation: format!("spawning '{}'", self.command),
                    source,
                };
                return Ok(ActionOutcome::failure(error.to_string()));
            }
            Err(_) => {
                let error = ActionError::CommandTimeout {
                    timeout_ms: self.timeout_ms,
                };
                return Ok(ActionOutcome::failure(error.to_string()));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let result = if stdout.is_empty() && !stderr.is_empty() {
            stderr.to_string()
        } else if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{}\n\nSTDERR:\n{}", stdout, stderr)
        };
        let result = truncate_output(result);

        if output.status.success() {
            Ok(ActionOutcome::success(result))
        } else {
            Ok(ActionOutcome::failure(format!(
                "Exit code: {}\n{}",
                output.status.code().unwrap_or(-1),
                result
            )))
        }
    }
}

fn truncate_output(text: String) -> String {
    if text.chars().count() <= MAX_OUTPUT_CHARS {
        return text;
    }
    let kept: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
    format!("{}...\n[truncated, {} chars total]", kept, text.chars().count())
}

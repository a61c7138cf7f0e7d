//! Action execution context - scoped to one agent's work directory

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::channel::ReplyChannel;

/// Everything an action factory may bind into the action it builds
#[derive(Clone)]
pub struct ActionContext {
    /// Identity of the acting agent
    pub agent_id: String,
    /// All file operations are confined here
    pub work_directory: PathBuf,
    /// Where outward messages go
    pub reply: Arc<dyn ReplyChannel>,
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("agent_id", &self.agent_id)
            .field("work_directory", &self.work_directory)
            .finish()
    }
}

impl ActionContext {
    pub fn new(agent_id: impl Into<String>, work_directory: impl Into<PathBuf>, reply: Arc<dyn ReplyChannel>) -> Self {
        Self {
            agent_id: agent_id.into(),
            work_directory: work_directory.into(),
            reply,
        }
    }

    /// Resolve a relative path inside the work directory.
    ///
    /// Rejects absolute paths and any `..` component, so the check holds for
    /// files that do not exist yet.
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf, ActionError> {
        let candidate = Path::new(path);
        let escapes = candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if path.trim().is_empty() || escapes {
            return Err(ActionError::SandboxViolation {
                path: candidate.to_path_buf(),
                work_directory: self.work_directory.clone(),
            });
        }
        Ok(self.work_directory.join(candidate))
    }
}

/// Errors raised while building or running an action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Path {path} escapes work directory {work_directory}")]
    SandboxViolation { path: PathBuf, work_directory: PathBuf },

    #[error("Action '{action}' is missing required parameter '{param}'")]
    MissingParam { action: String, param: String },

    #[error("Action '{action}' has an invalid parameter: {message}")]
    InvalidParam { action: String, message: String },

    #[error("Command timed out after {timeout_ms}ms")]
    CommandTimeout { timeout_ms: u64 },

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

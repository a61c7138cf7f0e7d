//! Messaging and completion actions

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channel::ReplyChannel;
use super::context::{ActionContext, ActionError};
use super::files::{ListFiles, ReadFile, RunCommand, WriteFile};
use super::registry::ActionDispatcherBuilder;
use super::{Action, required_str};
use crate::domain::{ActionOutcome, ActionParams, AgentMessage};
use crate::error::Result;

/// Reply to whoever started the cycle
pub struct SendMessage {
    reply: Arc<dyn ReplyChannel>,
    message: String,
}

impl SendMessage {
    pub const NAME: &'static str = "send_message";

    pub fn new(reply: Arc<dyn ReplyChannel>, message: impl Into<String>) -> Self {
        Self {
            reply,
            message: message.into(),
        }
    }

    pub fn build(params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let message = required_str(Self::NAME, params, "message")?;
        Ok(Box::new(Self::new(ctx.reply.clone(), message)))
    }
}

#[async_trait]
impl Action for SendMessage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        self.reply.send(&self.message).await?;
        Ok(ActionOutcome::success(format!("Message sent: {}", self.message)))
    }
}

/// A file a worker claims to have produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Declare the current goal done, verifying any declared output files
pub struct DeclareComplete {
    message: String,
    files: Vec<DeclaredFile>,
    ctx: ActionContext,
}

impl DeclareComplete {
    pub const NAME: &'static str = "declare_complete";

    pub fn build(params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let message = required_str(Self::NAME, params, "message")?;
        let files = match params.get("files") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok(DeclaredFile {
                        name: name.clone(),
                        description: String::new(),
                    }),
                    other => serde_json::from_value(other.clone()).map_err(|e| ActionError::InvalidParam {
                        action: Self::NAME.to_string(),
                        message: format!("files: {}", e),
                    }),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ActionError::InvalidParam {
                    action: Self::NAME.to_string(),
                    message: "files must be a list".to_string(),
                });
            }
        };
        Ok(Box::new(Self {
            message,
            files,
            ctx: ctx.clone(),
        }))
    }
}

#[async_trait]
impl Action for DeclareComplete {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        let mut output = format!("TASK_COMPLETE\n{}\n", self.message);
        if !self.files.is_empty() {
            output.push_str("Files created:\n");
            for file in &self.files {
                let path = match self.ctx.resolve_path(&file.name) {
                    Ok(path) => path,
                    Err(e) => return Ok(ActionOutcome::failure(e.to_string())),
                };
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Ok(ActionOutcome::failure(format!(
                        "Error: File {} does not exist in the work directory.",
                        file.name
                    )));
                }
                output.push_str(&format!("File: {} - {}\n", file.name, file.description));
            }
        }
        Ok(ActionOutcome::success(output))
    }

    fn completes_goal(&self) -> bool {
        true
    }
}

/// Agent address → base URL of its HTTP endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDirectory {
    agents: HashMap<String, String>,
}

impl AgentDirectory {
    pub fn new(agents: HashMap<String, String>) -> Self {
        Self { agents }
    }

    /// Message endpoint for an address; raw URLs pass through
    pub fn endpoint(&self, address: &str) -> Option<String> {
        let base = match self.agents.get(address) {
            Some(base) => base.as_str(),
            None if address.starts_with("http://") || address.starts_with("https://") => address,
            None => return None,
        };
        Some(format!("{}/agent-message/", base.trim_end_matches('/')))
    }

    pub fn addresses(&self) -> Vec<&str> {
        let mut addresses: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        addresses.sort();
        addresses
    }
}

/// POST an inter-agent message to the receiver's endpoint
pub struct SendAgentMessage {
    client: reqwest::Client,
    endpoint: Option<String>,
    payload: AgentMessage,
}

impl SendAgentMessage {
    pub const NAME: &'static str = "send_agent_message";

    pub fn build(
        params: &ActionParams,
        ctx: &ActionContext,
        directory: &AgentDirectory,
        client: &reqwest::Client,
    ) -> std::result::Result<Box<dyn Action>, ActionError> {
        let receiver = required_str(Self::NAME, params, "receiver")?;
        let message = required_str(Self::NAME, params, "message")?;
        let copied_files = params
            .get("copied_files")
            .and_then(|v| v.as_array())
            .map(|files| files.iter().filter_map(|f| f.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Ok(Box::new(Self {
            client: client.clone(),
            endpoint: directory.endpoint(&receiver),
            payload: AgentMessage {
                receiver,
                message,
                sender: ctx.agent_id.clone(),
                copied_files,
            },
        }))
    }
}

#[async_trait]
impl Action for SendAgentMessage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(ActionOutcome::failure(format!("Unknown agent: {}", self.payload.receiver)));
        };

        let response = match self.client.post(endpoint).json(&self.payload).send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(ActionOutcome::failure(format!(
                    "Failed to reach {}: {}",
                    self.payload.receiver, e
                )));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("(unreadable reply: {})", e));
        if status.is_success() {
            Ok(ActionOutcome::success(format!(
                "Message delivered to {}. Reply: {}",
                self.payload.receiver, body
            )))
        } else {
            Ok(ActionOutcome::failure(format!(
                "{} rejected the message ({}): {}",
                self.payload.receiver, status, body
            )))
        }
    }
}

/// Register the actions every agent and worker gets
pub fn register_core_actions(builder: ActionDispatcherBuilder) -> ActionDispatcherBuilder {
    builder
        .register(
            SendMessage::NAME,
            "send_message(message): send a message to whoever I am working for",
            SendMessage::build,
        )
        .register(
            ReadFile::NAME,
            "read_file(file_name): read a file from my work directory",
            ReadFile::build,
        )
        .register(
            WriteFile::NAME,
            "write_file(file_name, content): create or overwrite a file in my work directory",
            WriteFile::build,
        )
        .register(
            ListFiles::NAME,
            "list_files(path?): list the files in my work directory",
            ListFiles::build,
        )
        .register(
            RunCommand::NAME,
            "run_command(command, timeout_ms?): run a shell command in my work directory",
            RunCommand::build,
        )
        .register(
            DeclareComplete::NAME,
            "declare_complete(message, files?): declare the goal done, listing the files produced as {name, description}",
            DeclareComplete::build,
        )
}

/// Register inter-agent messaging over HTTP
pub fn register_messaging(
    builder: ActionDispatcherBuilder,
    directory: Arc<AgentDirectory>,
    client: reqwest::Client,
) -> ActionDispatcherBuilder {
    builder.register(
        SendAgentMessage::NAME,
        "send_agent_message(receiver, message, copied_files?): send a message to another agent",
        move |params: &ActionParams, ctx: &ActionContext| SendAgentMessage::build(params, ctx, &directory, &client),
    )
}

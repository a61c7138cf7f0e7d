//! Actions an agent can take
//!
//! An action is built by a registered factory from `(params, context)` and
//! executed once. The dispatcher owns the name → factory table.

mod builtin;
mod channel;
mod context;
mod files;
mod registry;

pub use builtin::{AgentDirectory, DeclareComplete, SendAgentMessage, SendMessage, register_core_actions, register_messaging};
pub use channel::{BufferedChannel, ReplyChannel};
pub use context::{ActionContext, ActionError};
pub use files::{ListFiles, ReadFile, RunCommand, WriteFile, list_work_directory};
pub use registry::{ActionDispatcher, ActionDispatcherBuilder, Resolution, missing_info_message, unknown_action_message};

use async_trait::async_trait;

use crate::domain::{ActionOutcome, ActionParams};
use crate::error::Result;

/// One executable capability.
///
/// Expected failures are reported as `Ok` with `success == false`; an `Err`
/// means the cycle cannot continue.
#[async_trait]
pub trait Action: Send + Sync {
    /// Registered name of the action
    fn name(&self) -> &str;

    async fn execute(&self) -> Result<ActionOutcome>;

    /// Whether a successful run ends the current goal immediately
    fn completes_goal(&self) -> bool {
        false
    }
}

/// Builds an action from its parameters and the acting agent's context
pub trait ActionFactory: Send + Sync {
    fn create(&self, params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError>;
}

impl<F> ActionFactory for F
where
    F: Fn(&ActionParams, &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> + Send + Sync,
{
    fn create(&self, params: &ActionParams, ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        self(params, ctx)
    }
}

/// Read a required string parameter
pub fn required_str(action: &str, params: &ActionParams, key: &str) -> std::result::Result<String, ActionError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ActionError::MissingParam {
            action: action.to_string(),
            param: key.to_string(),
        })
}

/// Read an optional string parameter
pub fn optional_str(params: &ActionParams, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

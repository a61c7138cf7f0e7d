//! Action registration table and dispatch

use std::sync::Arc;

use async_trait::async_trait;

use super::builtin::SendMessage;
use super::context::{ActionContext, ActionError};
use super::{Action, ActionFactory};
use crate::domain::{ActionDescriptor, ActionOutcome, ActionParams};
use crate::error::Result;
use crate::prompt::ActionListing;

/// Apology sent when the requested action is not registered
pub fn unknown_action_message(action: &str) -> String {
    format!(
        "I'm sorry, but I don't know how to perform the action '{}'. Could you please try a different request?",
        action
    )
}

/// Apology sent when the requested action cannot be built from its params
pub fn missing_info_message(action: &str) -> String {
    format!(
        "I'm sorry, but I'm missing some information to perform the action '{}'. Could you please provide more details?",
        action
    )
}

struct Registration {
    name: String,
    description: String,
    factory: Arc<dyn ActionFactory>,
}

/// Result of looking up an action descriptor
pub enum Resolution {
    /// A ready-to-run action
    Found(Box<dyn Action>),
    /// No action is registered under this name
    Unknown(String),
    /// The action exists but its parameters are unusable
    Invalid { action: String, error: ActionError },
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Found(action) => f.debug_tuple("Found").field(&action.name()).finish(),
            Resolution::Unknown(name) => f.debug_tuple("Unknown").field(name).finish(),
            Resolution::Invalid { action, error } => f
                .debug_struct("Invalid")
                .field("action", action)
                .field("error", &error.to_string())
                .finish(),
        }
    }
}

/// Builder for an [`ActionDispatcher`]
#[derive(Default)]
pub struct ActionDispatcherBuilder {
    entries: Vec<Registration>,
}

impl ActionDispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action; a later registration under the same name replaces
    /// the earlier one
    pub fn register<F>(self, name: &str, description: &str, factory: F) -> Self
    where
        F: Fn(&ActionParams, &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> + Send + Sync + 'static,
    {
        self.register_factory(name, description, Arc::new(factory))
    }

    /// Register a shared factory object
    pub fn register_factory(mut self, name: &str, description: &str, factory: Arc<dyn ActionFactory>) -> Self {
        let registration = Registration {
            name: name.to_string(),
            description: description.to_string(),
            factory,
        };
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => {
                log::debug!("Replacing action registration: {}", name);
                *existing = registration;
            }
            None => self.entries.push(registration),
        }
        self
    }

    pub fn build(self) -> ActionDispatcher {
        ActionDispatcher { entries: self.entries }
    }
}

/// Maps action descriptors to executable actions.
///
/// Built once at startup, then read-only; share it behind an `Arc`.
pub struct ActionDispatcher {
    entries: Vec<Registration>,
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher").field("actions", &self.names()).finish()
    }
}

impl ActionDispatcher {
    pub fn builder() -> ActionDispatcherBuilder {
        ActionDispatcherBuilder::new()
    }

    /// Look up and build an action, reporting why when that is impossible
    pub fn resolve(&self, descriptor: &ActionDescriptor, ctx: &ActionContext) -> Resolution {
        let Some(entry) = self.entries.iter().find(|e| e.name == descriptor.action) else {
            return Resolution::Unknown(descriptor.action.clone());
        };
        match entry.factory.create(&descriptor.params, ctx) {
            Ok(action) => Resolution::Found(action),
            Err(error) => Resolution::Invalid {
                action: descriptor.action.clone(),
                error,
            },
        }
    }

    /// Always yields something to run: the requested action, or an apology
    /// delivered to the reply channel when it cannot be built.
    pub fn dispatch(&self, descriptor: &ActionDescriptor, ctx: &ActionContext) -> Box<dyn Action> {
        match self.resolve(descriptor, ctx) {
            Resolution::Found(action) => action,
            Resolution::Unknown(name) => {
                log::warn!("Unknown action: {}", name);
                Box::new(Fallback::new(&name, SendMessage::new(ctx.reply.clone(), unknown_action_message(&name))))
            }
            Resolution::Invalid { action, error } => {
                log::error!("Cannot build action {}: {}", action, error);
                Box::new(Fallback::new(
                    &action,
                    SendMessage::new(ctx.reply.clone(), missing_info_message(&action)),
                ))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Registered action names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Names and descriptions for prompts
    pub fn available_actions(&self) -> Vec<ActionListing> {
        self.entries
            .iter()
            .map(|e| ActionListing {
                name: e.name.clone(),
                description: e.description.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apology standing in for an action that could not be built
struct Fallback {
    requested: String,
    apology: SendMessage,
}

impl Fallback {
    fn new(requested: &str, apology: SendMessage) -> Self {
        Self {
            requested: requested.to_string(),
            apology,
        }
    }
}

#[async_trait]
impl Action for Fallback {
    fn name(&self) -> &str {
        &self.requested
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        self.apology.execute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::channel::BufferedChannel;
    use crate::actions::register_core_actions;

    struct Echo(String);

    #[async_trait]
    impl Action for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self) -> Result<ActionOutcome> {
            Ok(ActionOutcome::success(self.0.clone()))
        }
    }

    fn echo_factory(params: &ActionParams, _ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let text = crate::actions::required_str("echo", params, "text")?;
        Ok(Box::new(Echo(text)))
    }

    fn context(channel: Arc<BufferedChannel>) -> ActionContext {
        ActionContext::new("agent", "/tmp", channel)
    }

    #[tokio::test]
    async fn test_resolve_registered_action() {
        let dispatcher = ActionDispatcher::builder()
            .register("echo", "echo(text): repeat text", echo_factory)
            .build();
        let ctx = context(Arc::new(BufferedChannel::new()));

        let desc = ActionDescriptor::new("echo").with_param("text", "hi");
        match dispatcher.resolve(&desc, &ctx) {
            Resolution::Found(action) => {
                let outcome = action.execute().await.unwrap();
                assert_eq!(outcome.result_text(), "hi");
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_unknown_and_invalid() {
        let dispatcher = ActionDispatcher::builder()
            .register("echo", "echo(text)", echo_factory)
            .build();
        let ctx = context(Arc::new(BufferedChannel::new()));

        assert!(matches!(
            dispatcher.resolve(&ActionDescriptor::new("teleport"), &ctx),
            Resolution::Unknown(name) if name == "teleport"
        ));
        assert!(matches!(
            dispatcher.resolve(&ActionDescriptor::new("echo"), &ctx),
            Resolution::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_sends_apology() {
        let dispatcher = ActionDispatcher::builder().build();
        let channel = Arc::new(BufferedChannel::new());
        let ctx = context(channel.clone());

        let action = dispatcher.dispatch(&ActionDescriptor::new("fly_to_moon"), &ctx);
        assert_eq!(action.name(), "fly_to_moon");
        let outcome = action.execute().await.unwrap();
        assert!(outcome.success);
        assert_eq!(channel.messages(), vec![unknown_action_message("fly_to_moon")]);
        assert!(channel.messages()[0].contains("don't know how to perform the action 'fly_to_moon'"));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_sends_missing_info() {
        let dispatcher = ActionDispatcher::builder()
            .register("echo", "echo(text)", echo_factory)
            .build();
        let channel = Arc::new(BufferedChannel::new());
        let action = dispatcher.dispatch(&ActionDescriptor::new("echo"), &context(channel.clone()));
        action.execute().await.unwrap();
        assert_eq!(channel.last(), Some(missing_info_message("echo")));
    }

    #[test]
    fn test_reregistration_replaces() {
        let dispatcher = ActionDispatcher::builder()
            .register("echo", "first", echo_factory)
            .register("echo", "second", echo_factory)
            .build();
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.available_actions()[0].description, "second");
    }

    #[test]
    fn test_core_actions_listing_order() {
        let dispatcher = register_core_actions(ActionDispatcher::builder()).build();
        assert_eq!(
            dispatcher.names(),
            vec!["send_message", "read_file", "write_file", "list_files", "run_command", "declare_complete"]
        );
        assert!(dispatcher.contains("declare_complete"));
        assert!(!dispatcher.is_empty());
    }
}

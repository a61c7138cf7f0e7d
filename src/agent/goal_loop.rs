//! Goal loop - one goal-directed cycle per inbound message.
//!
//! Each cycle:
//! 1. Asks the generator for a goal from the narrative (default on absence)
//! 2. Asks for exactly one next action and executes it
//! 3. Asks whether the goal is achieved (absence counts as "no")
//! 4. Repeats from 2 until achieved, completed by the action, aborted, or
//!    the iteration bound is hit
//!
//! Every generation call runs under a deadline. Nothing inside the cycle
//! returns an error to the caller; failures end up in the outcome and the log.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::retry::RetryPolicy;
use crate::actions::{ActionContext, ActionDispatcher, SendMessage};
use crate::domain::{ActionDescriptor, ActionOutcome, ActionRecord, Event};
use crate::error::Result;
use crate::history::EventLog;
use crate::llm::{GenerationRequest, OutputContract, TextGenerator, generate_within, parse_goal, parse_goal_achieved, structured};
use crate::prompt::Prompts;

/// Goal used when the generator produces none
pub const DEFAULT_GOAL: &str = "Respond helpfully to the most recent message and communicate the result.";

/// Message sent when no action could be determined
pub const CLARIFICATION_MESSAGE: &str =
    "I'm not sure how to proceed with that. Could you clarify what you would like me to do?";

/// Prefix of the result when the iteration bound is exhausted
pub const MAX_ITERATIONS_SENTINEL: &str = "MAX_ITERATIONS_REACHED";

/// Configuration for a goal loop
#[derive(Debug, Clone)]
pub struct GoalLoopConfig {
    /// Act/check rounds per cycle
    pub max_iterations: u32,
    pub default_goal: String,
    /// Deadline for every generation call
    pub generation_timeout: Duration,
    /// Retries for choosing the next action
    pub action_retry: RetryPolicy,
    /// Abort the cycle when no action could be chosen, instead of asking
    /// the requester for clarification
    pub abort_on_no_action: bool,
}

impl Default for GoalLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            default_goal: DEFAULT_GOAL.to_string(),
            generation_timeout: Duration::from_secs(120),
            action_retry: RetryPolicy::once(),
            abort_on_no_action: false,
        }
    }
}

/// Who the looping agent is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub name: String,
    /// Role description placed in the system prompt
    pub context: String,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: context.into(),
        }
    }
}

/// Goal loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    GoalPending,
    Acting,
    Checking,
    Done,
    Aborted,
}

/// Result of one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub goal: String,
    /// `Done` or `Aborted`
    pub state: CycleState,
    pub result: Option<String>,
    pub executed_actions: Vec<ActionRecord>,
    /// Act/check rounds run
    pub iterations: u32,
    pub max_reached: bool,
    /// Backoff delays spent choosing actions
    pub retry_delays: Vec<Duration>,
}

impl CycleOutcome {
    pub fn is_done(&self) -> bool {
        self.state == CycleState::Done
    }

    pub fn result_text(&self) -> &str {
        self.result.as_deref().unwrap_or("")
    }
}

/// Goal-directed execution loop for one agent
pub struct GoalLoop {
    generator: Arc<dyn TextGenerator>,
    dispatcher: Arc<ActionDispatcher>,
    prompts: Arc<Prompts>,
    config: GoalLoopConfig,
    profile: AgentProfile,
}

impl GoalLoop {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        dispatcher: Arc<ActionDispatcher>,
        prompts: Arc<Prompts>,
        config: GoalLoopConfig,
        profile: AgentProfile,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            prompts,
            config,
            profile,
        }
    }

    pub fn config(&self) -> &GoalLoopConfig {
        &self.config
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Run one cycle against the log, which must already hold the triggering
    /// message.
    pub async fn run(&self, log: &mut EventLog, ctx: &ActionContext) -> CycleOutcome {
        let mut state = CycleState::GoalPending;
        log::debug!("[{}] cycle start", self.profile.name);

        let system = self.system_prompt();

        let goal = self.set_goal(&system, &log.narrative()).await;
        log.append(Event::goal_set(&goal));
        log::info!("[{}] goal: {}", self.profile.name, goal);

        let mut executed: Vec<ActionRecord> = Vec::new();
        let mut retry_delays = Vec::new();
        let mut iterations = 0;
        let mut max_reached = false;
        let result: Option<String>;

        loop {
            self.transition(&mut state, CycleState::Acting);
            iterations += 1;

            let narrative = log.narrative();
            let attempt = self
                .config
                .action_retry
                .run("next_action", |_| self.next_action(&system, &goal, &narrative, &executed))
                .await;
            retry_delays.extend(attempt.delays.iter().copied());

            let descriptor = match attempt.value {
                Some(descriptor) => descriptor,
                None if self.config.abort_on_no_action => {
                    let message = format!(
                        "No action could be determined after {} attempts",
                        attempt.attempts
                    );
                    log::warn!("[{}] {}", self.profile.name, message);
                    self.transition(&mut state, CycleState::Aborted);
                    result = Some(message);
                    break;
                }
                None => ActionDescriptor::new(SendMessage::NAME).with_param("message", CLARIFICATION_MESSAGE),
            };

            let action = self.dispatcher.dispatch(&descriptor, ctx);
            log::debug!("[{}] executing {}", self.profile.name, action.name());

            match action.execute().await {
                Ok(outcome) => {
                    self.record(log, &mut executed, &descriptor, &outcome);
                    if !outcome.success {
                        self.surface(ctx, &format!("I encountered an issue: {}", outcome.result_text()))
                            .await;
                    } else if action.completes_goal() {
                        self.transition(&mut state, CycleState::Done);
                        result = outcome.result;
                        break;
                    }
                }
                Err(e) => {
                    log::error!("[{}] action {} aborted the cycle: {}", self.profile.name, descriptor.action, e);
                    let outcome = ActionOutcome::failure(e.to_string());
                    self.record(log, &mut executed, &descriptor, &outcome);
                    self.surface(ctx, &format!("I encountered an error: {}", e)).await;
                    self.transition(&mut state, CycleState::Aborted);
                    result = outcome.result;
                    break;
                }
            }

            self.transition(&mut state, CycleState::Checking);
            if self.goal_achieved(&system, &goal, &log.narrative(), &executed).await {
                self.transition(&mut state, CycleState::Done);
                result = executed.last().and_then(|r| r.result.clone());
                break;
            }

            if iterations >= self.config.max_iterations {
                self.transition(&mut state, CycleState::Done);
                max_reached = true;
                let trace: Vec<String> = executed.iter().map(ActionRecord::trace_entry).collect();
                result = Some(format!("{}: {}", MAX_ITERATIONS_SENTINEL, trace.join("; ")));
                log::warn!("[{}] max iterations reached for goal: {}", self.profile.name, goal);
                break;
            }
        }

        log::debug!("[{}] cycle end ({:?}) after {} iterations", self.profile.name, state, iterations);
        CycleOutcome {
            goal,
            state,
            result,
            executed_actions: executed,
            iterations,
            max_reached,
            retry_delays,
        }
    }

    fn transition(&self, state: &mut CycleState, next: CycleState) {
        log::debug!("[{}] {:?} -> {:?}", self.profile.name, state, next);
        *state = next;
    }

    fn system_prompt(&self) -> String {
        let actions = self.dispatcher.available_actions();
        match self.prompts.system(&self.profile.name, &self.profile.context, &actions) {
            Ok(text) => text,
            Err(e) => {
                log::error!("[{}] system prompt failed to render: {}", self.profile.name, e);
                self.profile.context.clone()
            }
        }
    }

    /// One generation call; render failures and absence both yield `None`
    async fn ask(&self, system: &str, user: Result<String>, contract: OutputContract) -> Option<Value> {
        let user = match user {
            Ok(user) => user,
            Err(e) => {
                log::error!("[{}] prompt failed to render: {}", self.profile.name, e);
                return None;
            }
        };
        let request = GenerationRequest::with_contract(system, user, contract);
        generate_within(self.generator.as_ref(), request, self.config.generation_timeout).await
    }

    async fn set_goal(&self, system: &str, narrative: &str) -> String {
        self.ask(system, self.prompts.goal(narrative), OutputContract::Goal)
            .await
            .and_then(|value| parse_goal(&value))
            .unwrap_or_else(|| {
                log::debug!("[{}] no goal generated, using default", self.profile.name);
                self.config.default_goal.clone()
            })
    }

    async fn next_action(
        &self,
        system: &str,
        goal: &str,
        narrative: &str,
        executed: &[ActionRecord],
    ) -> Option<ActionDescriptor> {
        let contract = OutputContract::Action {
            available: self.dispatcher.names(),
        };
        let value = self
            .ask(system, self.prompts.next_action(goal, narrative, executed), contract)
            .await?;
        ActionDescriptor::from_value(&structured(&value))
    }

    async fn goal_achieved(&self, system: &str, goal: &str, narrative: &str, executed: &[ActionRecord]) -> bool {
        self.ask(system, self.prompts.goal_check(goal, narrative, executed), OutputContract::GoalAchieved)
            .await
            .and_then(|value| parse_goal_achieved(&value))
            .unwrap_or(false)
    }

    fn record(
        &self,
        log: &mut EventLog,
        executed: &mut Vec<ActionRecord>,
        descriptor: &ActionDescriptor,
        outcome: &ActionOutcome,
    ) {
        let record = ActionRecord::new(descriptor, outcome);
        log.append(Event::agent_action(
            &record.action_name,
            &record.params,
            record.success,
            record.result.as_deref(),
        ));
        executed.push(record);
    }

    async fn surface(&self, ctx: &ActionContext, message: &str) {
        if let Err(e) = ctx.reply.send(message).await {
            log::warn!("[{}] could not deliver message: {}", self.profile.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionError, BufferedChannel, register_core_actions};
    use crate::domain::{ActionParams, EventType};
    use crate::error::ArcaneError;
    use crate::llm::{FnGenerator, ScriptedGenerator};
    use async_trait::async_trait;
    use serde_json::json;

    fn dispatcher() -> Arc<ActionDispatcher> {
        Arc::new(register_core_actions(ActionDispatcher::builder()).build())
    }

    fn goal_loop(generator: Arc<dyn TextGenerator>, config: GoalLoopConfig) -> GoalLoop {
        GoalLoop::new(
            generator,
            dispatcher(),
            Arc::new(Prompts::builtin().unwrap()),
            config,
            AgentProfile::new("TRIAGE", "I answer questions."),
        )
    }

    fn setup() -> (EventLog, Arc<BufferedChannel>, ActionContext) {
        let mut log = EventLog::new();
        log.append(Event::user_message("user", "What is 2+2?"));
        let channel = Arc::new(BufferedChannel::new());
        let ctx = ActionContext::new("TRIAGE", std::env::temp_dir(), channel.clone());
        (log, channel, ctx)
    }

    #[tokio::test]
    async fn test_achieved_after_one_action() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Answer the arithmetic question"}),
            json!({"action": "send_message", "params": {"message": "4"}}),
            json!({"goal_achieved": true}),
        ]));
        let (mut log, channel, ctx) = setup();

        let outcome = goal_loop(generator.clone(), GoalLoopConfig::default())
            .run(&mut log, &ctx)
            .await;

        assert_eq!(outcome.state, CycleState::Done);
        assert_eq!(outcome.goal, "Answer the arithmetic question");
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.max_reached);
        assert_eq!(outcome.result_text(), "Message sent: 4");
        assert_eq!(channel.messages(), vec!["4"]);

        let requests = generator.requests();
        assert_eq!(requests[0].contract, Some(OutputContract::Goal));
        assert!(matches!(requests[1].contract, Some(OutputContract::Action { .. })));
        assert_eq!(requests[2].contract, Some(OutputContract::GoalAchieved));
    }

    #[tokio::test]
    async fn test_log_records_goal_and_action() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!("Reply to the user"),
            json!({"action": "send_message", "params": {"message": "hello"}}),
            json!(true),
        ]));
        let (mut log, _channel, ctx) = setup();
        goal_loop(generator, GoalLoopConfig::default()).run(&mut log, &ctx).await;

        let types: Vec<EventType> = log.iter_ordered().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::UserMessage, EventType::GoalSet, EventType::AgentAction]
        );
        assert!(log.narrative().contains("Goal set: Reply to the user"));
    }

    #[tokio::test]
    async fn test_absence_everywhere_terminates_with_sentinel() {
        let generator = Arc::new(ScriptedGenerator::new());
        let (mut log, channel, ctx) = setup();

        let outcome = goal_loop(generator.clone(), GoalLoopConfig::default())
            .run(&mut log, &ctx)
            .await;

        assert_eq!(outcome.state, CycleState::Done);
        assert!(outcome.max_reached);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.goal, DEFAULT_GOAL);
        assert!(outcome.result_text().starts_with("MAX_ITERATIONS_REACHED: "));
        assert!(outcome.result_text().contains("Action: send_message - Result: Message sent:"));
        assert_eq!(outcome.executed_actions.len(), 5);
        assert_eq!(channel.len(), 5);
        // goal + 5 x (action + check)
        assert_eq!(generator.call_count(), 11);
    }

    #[tokio::test]
    async fn test_iteration_bound_respected() {
        let generator = Arc::new(FnGenerator::new(|req: &GenerationRequest| match req.contract {
            Some(OutputContract::Goal) => Some(json!({"goal": "Keep going"})),
            Some(OutputContract::Action { .. }) => Some(json!({"action": "list_files", "params": {}})),
            _ => Some(json!({"goal_achieved": false})),
        }));
        let (mut log, _channel, ctx) = setup();
        let config = GoalLoopConfig {
            max_iterations: 2,
            ..Default::default()
        };

        let outcome = goal_loop(generator, config).run(&mut log, &ctx).await;
        assert!(outcome.max_reached);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.executed_actions.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_action_is_visible_and_loop_continues() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Read the notes"}),
            json!({"action": "read_file", "params": {"file_name": "definitely-missing-file.txt"}}),
            json!({"goal_achieved": false}),
            json!({"action": "send_message", "params": {"message": "The notes are missing."}}),
            json!({"goal_achieved": true}),
        ]));
        let (mut log, channel, ctx) = setup();

        let outcome = goal_loop(generator, GoalLoopConfig::default()).run(&mut log, &ctx).await;

        assert_eq!(outcome.state, CycleState::Done);
        assert_eq!(outcome.iterations, 2);
        assert!(!outcome.executed_actions[0].success);
        let messages = channel.messages();
        assert!(messages[0].starts_with("I encountered an issue: "));
        assert_eq!(messages[1], "The notes are missing.");
        assert!(log.narrative().contains("Action read_file"));
    }

    #[tokio::test]
    async fn test_unknown_action_falls_back_to_apology() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Fly"}),
            json!({"action": "fly_to_moon", "params": {}}),
            json!({"goal_achieved": true}),
        ]));
        let (mut log, channel, ctx) = setup();

        let outcome = goal_loop(generator, GoalLoopConfig::default()).run(&mut log, &ctx).await;

        assert_eq!(outcome.executed_actions[0].action_name, "fly_to_moon");
        assert!(channel.messages()[0].contains("don't know how to perform the action 'fly_to_moon'"));
    }

    #[tokio::test]
    async fn test_declare_complete_ends_goal() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Finish"}),
            json!({"action": "declare_complete", "params": {"message": "finished"}}),
        ]));
        let (mut log, _channel, ctx) = setup();

        let outcome = goal_loop(generator.clone(), GoalLoopConfig::default())
            .run(&mut log, &ctx)
            .await;

        assert!(outcome.is_done());
        assert_eq!(outcome.result_text(), "TASK_COMPLETE\nfinished\n");
        assert_eq!(generator.call_count(), 2);
    }

    struct Exploding;

    #[async_trait]
    impl Action for Exploding {
        fn name(&self) -> &str {
            "explode"
        }

        async fn execute(&self) -> Result<ActionOutcome> {
            Err(ArcaneError::Action("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_execute_error_aborts() {
        let dispatcher = Arc::new(
            register_core_actions(ActionDispatcher::builder())
                .register(
                    "explode",
                    "explode(): fail hard",
                    |_: &ActionParams, _: &ActionContext| -> std::result::Result<Box<dyn Action>, ActionError> {
                        Ok(Box::new(Exploding))
                    },
                )
                .build(),
        );
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Explode"}),
            json!({"action": "explode", "params": {}}),
        ]));
        let goal_loop = GoalLoop::new(
            generator,
            dispatcher,
            Arc::new(Prompts::builtin().unwrap()),
            GoalLoopConfig::default(),
            AgentProfile::new("TRIAGE", ""),
        );
        let (mut log, channel, ctx) = setup();

        let outcome = goal_loop.run(&mut log, &ctx).await;

        assert_eq!(outcome.state, CycleState::Aborted);
        assert!(!outcome.executed_actions[0].success);
        assert!(outcome.result_text().contains("boom"));
        assert!(channel.messages()[0].starts_with("I encountered an error: "));
    }

    #[tokio::test]
    async fn test_abort_on_no_action_with_retries() {
        let generator = Arc::new(ScriptedGenerator::with_replies([json!({"goal": "Work"})]));
        let config = GoalLoopConfig {
            action_retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(2),
                factor: 2,
            },
            abort_on_no_action: true,
            ..Default::default()
        };
        let (mut log, _channel, ctx) = setup();

        let outcome = goal_loop(generator.clone(), config).run(&mut log, &ctx).await;

        assert_eq!(outcome.state, CycleState::Aborted);
        assert!(outcome.executed_actions.is_empty());
        assert_eq!(outcome.retry_delays, vec![Duration::from_millis(2), Duration::from_millis(4)]);
        // goal + 3 action attempts
        assert_eq!(generator.call_count(), 4);
    }

    #[tokio::test]
    async fn test_batch_reply_uses_first_action() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Greet"}),
            json!([
                {"action": "send_message", "params": {"message": "first"}},
                {"action": "send_message", "params": {"message": "second"}}
            ]),
            json!({"goal_achieved": true}),
        ]));
        let (mut log, channel, ctx) = setup();
        goal_loop(generator, GoalLoopConfig::default()).run(&mut log, &ctx).await;
        assert_eq!(channel.messages(), vec!["first"]);
    }
}

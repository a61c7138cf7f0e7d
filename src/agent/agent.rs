//! A long-lived agent: one event log, one goal loop, one message at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use super::goal_loop::{CycleOutcome, GoalLoop};
use crate::actions::{ActionContext, ReplyChannel};
use crate::domain::{Event, InboundMessage};
use crate::history::EventLog;

/// Status sent back when a message arrives mid-cycle
pub const BUSY_MESSAGE: &str =
    "I'm currently working on another request. I'll take your message into account once I'm done.";

/// What handling an inbound message produced
#[derive(Debug)]
pub enum Reply {
    /// The agent was busy; the message was queued and this status returned
    Busy(String),
    /// A full goal cycle ran
    Processed(CycleOutcome),
}

/// Clears the busy flag when a cycle ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Agent {
    id: String,
    work_directory: PathBuf,
    goal_loop: GoalLoop,
    log: Mutex<EventLog>,
    backlog: StdMutex<Vec<InboundMessage>>,
    busy: AtomicBool,
}

impl Agent {
    pub fn new(id: impl Into<String>, work_directory: impl Into<PathBuf>, goal_loop: GoalLoop) -> Self {
        Self::with_log(id, work_directory, goal_loop, EventLog::new())
    }

    /// Create an agent over an existing history
    pub fn with_log(id: impl Into<String>, work_directory: impl Into<PathBuf>, goal_loop: GoalLoop, log: EventLog) -> Self {
        Self {
            id: id.into(),
            work_directory: work_directory.into(),
            goal_loop,
            log: Mutex::new(log),
            backlog: StdMutex::new(Vec::new()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Messages queued while busy and not yet in the log
    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Handle one inbound message.
    ///
    /// While a cycle is running, further messages are answered with
    /// [`BUSY_MESSAGE`] and become visible in the log at the next cycle.
    pub async fn handle(&self, message: InboundMessage, reply: Arc<dyn ReplyChannel>) -> Reply {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("[{}] busy, queueing message from {}", self.id, message.sender());
            match self.backlog.lock() {
                Ok(mut backlog) => backlog.push(message),
                Err(e) => log::error!("[{}] backlog poisoned, dropping message: {}", self.id, e),
            }
            return Reply::Busy(BUSY_MESSAGE.to_string());
        }
        let _guard = BusyGuard(&self.busy);

        let mut log = self.log.lock().await;
        for queued in self.drain_backlog() {
            log.extend(queued.to_events());
        }
        log.extend(message.to_events());

        let ctx = ActionContext::new(self.id.clone(), self.work_directory.clone(), reply);
        let outcome = self.goal_loop.run(&mut log, &ctx).await;
        log::info!(
            "[{}] cycle finished ({:?}, {} iterations)",
            self.id,
            outcome.state,
            outcome.iterations
        );
        Reply::Processed(outcome)
    }

    /// Record that a file appeared in the workspace
    pub async fn file_added(&self, file: &str, source: Option<&str>) {
        self.log.lock().await.append(Event::file_added(file, source));
    }

    /// Record that a file was removed from the workspace
    pub async fn file_deleted(&self, file: &str) {
        self.log.lock().await.append(Event::file_deleted(file));
    }

    pub async fn narrative(&self) -> String {
        self.log.lock().await.narrative()
    }

    pub async fn event_count(&self) -> usize {
        self.log.lock().await.len()
    }

    fn drain_backlog(&self) -> Vec<InboundMessage> {
        match self.backlog.lock() {
            Ok(mut backlog) => std::mem::take(&mut *backlog),
            Err(e) => {
                log::error!("[{}] backlog poisoned: {}", self.id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionDispatcher, BufferedChannel, register_core_actions};
    use crate::agent::{AgentProfile, GoalLoopConfig};
    use crate::domain::AgentMessage;
    use crate::llm::{GenerationRequest, OutputContract, ScriptedGenerator, TextGenerator};
    use crate::prompt::Prompts;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::Notify;

    fn agent_with(generator: Arc<dyn TextGenerator>) -> Agent {
        let goal_loop = GoalLoop::new(
            generator,
            Arc::new(register_core_actions(ActionDispatcher::builder()).build()),
            Arc::new(Prompts::builtin().unwrap()),
            GoalLoopConfig::default(),
            AgentProfile::new("TRIAGE", "I answer questions."),
        );
        Agent::new("TRIAGE", std::env::temp_dir(), goal_loop)
    }

    #[tokio::test]
    async fn test_handle_runs_cycle() {
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Say hi"}),
            json!({"action": "send_message", "params": {"message": "hi"}}),
            json!({"goal_achieved": true}),
        ]));
        let agent = agent_with(generator);
        let channel = Arc::new(BufferedChannel::new());

        let reply = agent.handle(InboundMessage::user("user", "hello"), channel.clone()).await;

        assert!(matches!(reply, Reply::Processed(ref o) if o.is_done()));
        assert_eq!(channel.messages(), vec!["hi"]);
        assert!(!agent.is_busy());
        // user_message, goal_set, agent_action
        assert_eq!(agent.event_count().await, 3);
    }

    #[tokio::test]
    async fn test_agent_message_records_copied_files() {
        let agent = agent_with(Arc::new(ScriptedGenerator::new()));
        let message = InboundMessage::Agent(AgentMessage {
            receiver: "TRIAGE".to_string(),
            message: "see attached".to_string(),
            sender: "STRATOS".to_string(),
            copied_files: vec!["report.md".to_string()],
        });
        agent.handle(message, Arc::new(BufferedChannel::new())).await;
        assert!(agent.narrative().await.contains("report.md"));
    }

    /// Blocks the first generation call until released
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TextGenerator for Gate {
        async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, crate::llm::LlmError> {
            if request.contract == Some(OutputContract::Goal) {
                self.entered.notify_one();
                self.release.notified().await;
                return Ok(Some(json!({"goal": "Wait"})));
            }
            Ok(match request.contract {
                Some(OutputContract::Action { .. }) => {
                    Some(json!({"action": "send_message", "params": {"message": "done"}}))
                }
                _ => Some(json!({"goal_achieved": true})),
            })
        }
    }

    #[tokio::test]
    async fn test_busy_agent_queues_message() {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let agent = Arc::new(agent_with(gate.clone()));

        let first = {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .handle(InboundMessage::user("alice", "first"), Arc::new(BufferedChannel::new()))
                    .await
            })
        };
        gate.entered.notified().await;
        assert!(agent.is_busy());

        let second = agent
            .handle(InboundMessage::user("bob", "second"), Arc::new(BufferedChannel::new()))
            .await;
        assert!(matches!(second, Reply::Busy(ref m) if m == BUSY_MESSAGE));
        assert_eq!(agent.backlog_len(), 1);

        gate.release.notify_one();
        assert!(matches!(first.await.unwrap(), Reply::Processed(_)));
        assert!(!agent.is_busy());

        // The queued message surfaces in the log on the next cycle
        gate.release.notify_one();
        agent
            .handle(InboundMessage::user("carol", "third"), Arc::new(BufferedChannel::new()))
            .await;
        assert_eq!(agent.backlog_len(), 0);
        let narrative = agent.narrative().await;
        assert!(narrative.contains("second"));
        assert!(narrative.contains("third"));
    }

    #[tokio::test]
    async fn test_file_events() {
        let agent = agent_with(Arc::new(ScriptedGenerator::new()));
        agent.file_added("notes.txt", None).await;
        agent.file_deleted("notes.txt").await;
        assert_eq!(agent.event_count().await, 2);
    }
}

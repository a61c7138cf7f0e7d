//! Disposable per-task workers

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::actions::{ActionContext, ActionDispatcher, BufferedChannel};
use crate::agent::{AgentProfile, CycleState, GoalLoop, GoalLoopConfig, RetryPolicy};
use crate::domain::Event;
use crate::history::EventLog;
use crate::llm::TextGenerator;
use crate::plan::{Plan, Task};
use crate::prompt::{Prompts, WorkerContext};

/// Sender name used for the task assignment message
pub const TASK_ASSIGNER: &str = "plan-executor";

/// Everything a worker is told about its task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSeed {
    pub task_id: String,
    pub task_name: String,
    /// Includes context folded in from earlier levels
    pub task_description: String,
    pub input_files: Vec<String>,
    pub output_files: Vec<String>,
    pub plan_overview: String,
    /// Live status of every level and task at spawn time
    pub status_report: String,
    pub work_dir_listing: Vec<String>,
    pub work_directory: PathBuf,
}

impl WorkerSeed {
    pub fn new(plan: &Plan, task: &Task, work_dir_listing: Vec<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            task_description: task.description.clone(),
            input_files: task.input_files.clone(),
            output_files: task.output_files.clone(),
            plan_overview: plan.overview(),
            status_report: plan.status_report(),
            work_dir_listing,
            work_directory: plan.work_directory.clone(),
        }
    }

    /// Listing rendered for prompts
    pub fn listing_text(&self) -> String {
        if self.work_dir_listing.is_empty() {
            "(empty)".to_string()
        } else {
            self.work_dir_listing.join("\n")
        }
    }
}

/// What a worker reports back to the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub success: bool,
    pub output: String,
    /// Backoff delays spent choosing actions
    pub retry_delays: Vec<Duration>,
}

impl TaskOutcome {
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            retry_delays: Vec::new(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            retry_delays: Vec::new(),
        }
    }
}

/// Runs one task to completion; used once and dropped
#[async_trait]
pub trait TaskWorker: Send + Sync {
    async fn run(&self, seed: &WorkerSeed) -> TaskOutcome;
}

/// Creates a fresh worker per task
pub trait WorkerFactory: Send + Sync {
    fn create(&self, seed: &WorkerSeed) -> Box<dyn TaskWorker>;
}

/// Builds goal-loop workers sharing a generator, a dispatcher and prompts
pub struct GoalLoopWorkerFactory {
    generator: Arc<dyn TextGenerator>,
    dispatcher: Arc<ActionDispatcher>,
    prompts: Arc<Prompts>,
    config: GoalLoopConfig,
}

impl GoalLoopWorkerFactory {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        dispatcher: Arc<ActionDispatcher>,
        prompts: Arc<Prompts>,
        config: GoalLoopConfig,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            prompts,
            config,
        }
    }

    /// Worker defaults: three attempts at choosing an action with 2 s
    /// doubling backoff, and a task that cannot choose one fails
    pub fn default_config() -> GoalLoopConfig {
        GoalLoopConfig {
            action_retry: RetryPolicy::default(),
            abort_on_no_action: true,
            ..Default::default()
        }
    }
}

impl WorkerFactory for GoalLoopWorkerFactory {
    fn create(&self, seed: &WorkerSeed) -> Box<dyn TaskWorker> {
        let profile = AgentProfile::new(
            format!("Task_{}", seed.task_id),
            format!("Task-specific agent for {}", seed.task_name),
        );
        Box::new(GoalLoopWorker {
            goal_loop: GoalLoop::new(
                self.generator.clone(),
                self.dispatcher.clone(),
                self.prompts.clone(),
                self.config.clone(),
                profile,
            ),
            prompts: self.prompts.clone(),
        })
    }
}

struct GoalLoopWorker {
    goal_loop: GoalLoop,
    prompts: Arc<Prompts>,
}

impl GoalLoopWorker {
    fn assignment(&self, seed: &WorkerSeed) -> String {
        let listing = seed.listing_text();
        let context = WorkerContext {
            task_name: &seed.task_name,
            task_description: &seed.task_description,
            input_files: &seed.input_files,
            output_files: &seed.output_files,
            plan_overview: &seed.plan_overview,
            status_report: &seed.status_report,
            work_dir_listing: &listing,
        };
        self.prompts.worker_context(&context).unwrap_or_else(|e| {
            log::error!("Worker context failed to render for {}: {}", seed.task_name, e);
            format!("{}\n{}", seed.task_name, seed.task_description)
        })
    }
}

#[async_trait]
impl TaskWorker for GoalLoopWorker {
    async fn run(&self, seed: &WorkerSeed) -> TaskOutcome {
        let mut log = EventLog::new();
        log.append(Event::task_execution(&seed.task_name, "In Progress", "assigned"));
        log.append(Event::user_message(TASK_ASSIGNER, &self.assignment(seed)));

        let channel = Arc::new(BufferedChannel::new());
        let ctx = ActionContext::new(
            self.goal_loop.profile().name.clone(),
            seed.work_directory.clone(),
            channel.clone(),
        );

        let outcome = self.goal_loop.run(&mut log, &ctx).await;

        let mut output = outcome.result_text().trim().to_string();
        if output.is_empty() {
            output = channel.messages().join("\n");
        }

        TaskOutcome {
            success: outcome.state != CycleState::Aborted,
            output,
            retry_delays: outcome.retry_delays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::register_core_actions;
    use crate::llm::{GenerationRequest, ScriptedGenerator};
    use crate::plan::Level;
    use serde_json::json;

    fn seed(dir: &std::path::Path) -> WorkerSeed {
        let mut plan = Plan::new("Report", "Write a report", dir);
        let mut level = Level::new(0);
        level.add_task(Task::new("gather", "Gather sources", "worker"));
        plan.add_level(level).unwrap();
        WorkerSeed::new(&plan, &plan.levels[0].tasks[0], vec!["notes.md".to_string()])
    }

    fn factory(generator: Arc<dyn TextGenerator>, config: GoalLoopConfig) -> GoalLoopWorkerFactory {
        GoalLoopWorkerFactory::new(
            generator,
            Arc::new(register_core_actions(ActionDispatcher::builder()).build()),
            Arc::new(Prompts::builtin().unwrap()),
            config,
        )
    }

    #[test]
    fn test_seed_carries_plan_context() {
        let temp = tempfile::tempdir().unwrap();
        let seed = seed(temp.path());
        assert_eq!(seed.task_name, "gather");
        assert!(seed.plan_overview.contains("gather: Gather sources"));
        assert!(seed.status_report.contains("gather [Pending]"));
        assert_eq!(seed.listing_text(), "notes.md");
    }

    #[tokio::test]
    async fn test_worker_completes_with_declared_result() {
        let temp = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::with_replies([
            json!({"goal": "Gather sources"}),
            json!({"action": "declare_complete", "params": {"message": "three sources found"}}),
        ]));
        let seed = seed(temp.path());

        let worker = factory(generator.clone(), GoalLoopWorkerFactory::default_config()).create(&seed);
        let outcome = worker.run(&seed).await;

        assert!(outcome.success);
        assert!(outcome.output.contains("three sources found"));

        let requests: Vec<GenerationRequest> = generator.requests();
        assert!(requests[0].user.contains("My task: gather"));
        assert!(requests[0].user.contains("notes.md"));
    }

    #[tokio::test]
    async fn test_worker_fails_when_no_action_determined() {
        let temp = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::with_replies([json!({"goal": "Gather"})]));
        let config = GoalLoopConfig {
            action_retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                factor: 2,
            },
            abort_on_no_action: true,
            ..Default::default()
        };
        let seed = seed(temp.path());

        let outcome = factory(generator, config).create(&seed).run(&seed).await;

        assert!(!outcome.success);
        assert_eq!(outcome.retry_delays.len(), 2);
        assert!(outcome.output.contains("No action could be determined"));
    }

    #[test]
    fn test_default_worker_config() {
        let config = GoalLoopWorkerFactory::default_config();
        assert_eq!(config.action_retry, RetryPolicy::default());
        assert!(config.abort_on_no_action);
        assert_eq!(config.max_iterations, 5);
    }
}

//! Plan execution: the level-barrier executor, its per-task workers and the
//! delegation action that drives both

mod delegate;
mod plan_executor;
mod worker;

pub use delegate::{DEFAULT_PLAN_NAME, DelegateAndExecuteTask, Delegation, register_delegation};
pub use plan_executor::{ExecutionReport, LEVEL_CONTEXT_HEADER, PlanExecutor};
pub use worker::{GoalLoopWorkerFactory, TASK_ASSIGNER, TaskOutcome, TaskWorker, WorkerFactory, WorkerSeed};

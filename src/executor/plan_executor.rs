//! Level-barrier plan execution
//!
//! Levels run strictly in `order`. All remaining Tasks of a Level are spawned
//! together and joined before the Level is marked terminal; nothing from the
//! next Level starts until then. After every Level the plan is checkpointed
//! and the Level's combined output is folded into each Task description of
//! the following Level, replacing context from any earlier run.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::worker::{TaskOutcome, WorkerFactory, WorkerSeed};
use crate::actions::list_work_directory;
use crate::plan::{Plan, Status};
use crate::storage::PlanStore;

/// Separator placed before folded level output
pub const LEVEL_CONTEXT_HEADER: &str = "\n\nContext from previous level:\n";

/// Everything one `execute` call produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// `Level <order>:` blocks, one per level
    pub narrative: String,
    /// Backoff delays per task id, for tasks that retried
    pub retry_delays: Vec<(String, Vec<Duration>)>,
    /// Levels skipped because they were already completed
    pub skipped_levels: Vec<u32>,
}

pub struct PlanExecutor {
    store: Arc<dyn PlanStore>,
    workers: Arc<dyn WorkerFactory>,
}

impl PlanExecutor {
    pub fn new(store: Arc<dyn PlanStore>, workers: Arc<dyn WorkerFactory>) -> Self {
        Self { store, workers }
    }

    /// Run the plan to the end and return its narrative
    pub async fn execute_plan(&self, plan: &mut Plan) -> String {
        self.execute(plan).await.narrative
    }

    /// Run the plan to the end.
    ///
    /// Leading levels already `Completed` (from an earlier run) are skipped,
    /// and completed Tasks inside the first level that runs are kept. Every
    /// level after that one is reset and runs again on the fresh context.
    pub async fn execute(&self, plan: &mut Plan) -> ExecutionReport {
        log::info!("Executing plan {} ({} levels, {} tasks)", plan.id, plan.levels.len(), plan.task_count());
        plan.status = Status::InProgress;

        let mut report = ExecutionReport::default();
        let mut blocks = Vec::new();
        // Once a level runs, everything after it saw stale context and runs again
        let mut rerun_rest = false;

        for idx in 0..plan.levels.len() {
            let order = plan.levels[idx].order;

            if rerun_rest {
                if plan.levels[idx].status != Status::Pending {
                    log::info!("Plan {}: resetting level {} after an earlier level re-ran", plan.id, order);
                }
                plan.levels[idx].reset();
            } else if plan.levels[idx].status == Status::Completed {
                log::info!("Plan {}: level {} already completed, skipping", plan.id, order);
                report.skipped_levels.push(order);
                blocks.push(format!("Level {}:\n{}", order, plan.levels[idx].output()));
                continue;
            }

            let output = self.execute_level(plan, idx, &mut report).await;
            rerun_rest = true;

            if let Some(next) = plan.levels.get_mut(idx + 1) {
                for task in &mut next.tasks {
                    task.fold_context(LEVEL_CONTEXT_HEADER, &output);
                }
            }

            plan.refresh_status();
            self.checkpoint(plan).await;
            blocks.push(format!("Level {}:\n{}", order, output));
        }

        plan.refresh_status();
        log::info!("Plan {} finished: {}", plan.id, plan.status);
        report.narrative = blocks.join("\n\n");
        report
    }

    async fn execute_level(&self, plan: &mut Plan, idx: usize, report: &mut ExecutionReport) -> String {
        let listing = match list_work_directory(&plan.work_directory).await {
            Ok(listing) => listing,
            Err(e) => {
                log::warn!("Cannot list {}: {}", plan.work_directory.display(), e);
                Vec::new()
            }
        };

        let level = &mut plan.levels[idx];
        level.start();
        let runnable: Vec<usize> = level
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status != Status::Completed)
            .map(|(i, _)| i)
            .collect();
        for &i in &runnable {
            level.tasks[i].start();
        }
        log::info!("Plan {}: level {} started with {} tasks", plan.id, level.order, runnable.len());

        let seeds: Vec<WorkerSeed> = runnable
            .iter()
            .map(|&i| WorkerSeed::new(plan, &plan.levels[idx].tasks[i], listing.clone()))
            .collect();

        let handles = seeds.into_iter().map(|seed| {
            let workers = self.workers.clone();
            tokio::spawn(async move {
                let worker = workers.create(&seed);
                worker.run(&seed).await
            })
        });
        let results = join_all(handles).await;

        let level = &mut plan.levels[idx];
        for (&i, result) in runnable.iter().zip(results) {
            let task = &mut level.tasks[i];
            let outcome = result.unwrap_or_else(|e| {
                log::error!("Worker for task {} panicked: {}", task.name, e);
                TaskOutcome::failed(format!("Error: worker stopped unexpectedly: {}", e))
            });

            if outcome.success {
                log::info!("Task completed: {}", task.name);
            } else {
                log::warn!("Task failed: {}: {}", task.name, outcome.output);
            }
            if !outcome.retry_delays.is_empty() {
                report.retry_delays.push((task.id.clone(), outcome.retry_delays.clone()));
            }
            task.finish(outcome.success, outcome.output);
        }

        level.finish();
        log::info!("Plan {}: level {} {}", plan.id, level.order, level.status);
        level.output()
    }

    async fn checkpoint(&self, plan: &Plan) {
        if let Err(e) = self.store.save(plan).await {
            log::warn!("Checkpoint of plan {} failed: {}", plan.id, e);
        }
    }
}

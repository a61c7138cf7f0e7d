//! The `delegate_and_execute_task` action: synthesize a plan, run it, report

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::plan_executor::PlanExecutor;
use crate::actions::{Action, ActionContext, ActionDispatcherBuilder, ActionError, ActionFactory, optional_str, required_str};
use crate::domain::{ActionOutcome, ActionParams};
use crate::error::Result;
use crate::plan::{PlanSynthesizer, Status};
use crate::storage::PlanStore;

/// Plan name used when the caller gives none
pub const DEFAULT_PLAN_NAME: &str = "Delegated task";

/// Shared machinery behind every delegation
#[derive(Clone)]
pub struct Delegation {
    synthesizer: Arc<PlanSynthesizer>,
    store: Arc<dyn PlanStore>,
    executor: Arc<PlanExecutor>,
    workspace_root: PathBuf,
}

impl Delegation {
    pub const NAME: &'static str = "delegate_and_execute_task";

    pub fn new(
        synthesizer: Arc<PlanSynthesizer>,
        store: Arc<dyn PlanStore>,
        executor: Arc<PlanExecutor>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            synthesizer,
            store,
            executor,
            workspace_root: workspace_root.into(),
        }
    }

    /// Synthesize, persist and execute a plan; returns the summary
    pub async fn run(&self, name: &str, description: &str) -> Result<String> {
        let mut plan = self.synthesizer.synthesize(name, description, &self.workspace_root).await?;
        tokio::fs::create_dir_all(&plan.work_directory).await?;
        self.store.save(&plan).await?;

        let narrative = self.executor.execute_plan(&mut plan).await;

        let headline = if plan.status == Status::Completed {
            format!("Task '{}' was delegated and executed successfully.", plan.name)
        } else {
            format!("Task '{}' was delegated and executed with status {}.", plan.name, plan.status)
        };
        Ok(format!(
            "{} Description: {}\n\nExecution Details:\n{}\n\n\
             This task was broken down into subtasks and executed by specialized agents.",
            headline, plan.description, narrative
        ))
    }
}

impl ActionFactory for Delegation {
    fn create(&self, params: &ActionParams, _ctx: &ActionContext) -> std::result::Result<Box<dyn Action>, ActionError> {
        let description = required_str(Delegation::NAME, params, "plan_description")?;
        let name = optional_str(params, "plan_name").unwrap_or_else(|| DEFAULT_PLAN_NAME.to_string());
        Ok(Box::new(DelegateAndExecuteTask {
            delegation: self.clone(),
            name,
            description,
        }))
    }
}

pub struct DelegateAndExecuteTask {
    delegation: Delegation,
    name: String,
    description: String,
}

#[async_trait]
impl Action for DelegateAndExecuteTask {
    fn name(&self) -> &str {
        Delegation::NAME
    }

    async fn execute(&self) -> Result<ActionOutcome> {
        match self.delegation.run(&self.name, &self.description).await {
            Ok(summary) => Ok(ActionOutcome::success(summary)),
            Err(e) => {
                log::error!("Delegation of '{}' failed: {}", self.name, e);
                Ok(ActionOutcome::failure(format!("Error delegating and executing task: {}", e)))
            }
        }
    }
}

/// Add `delegate_and_execute_task` to a dispatcher
pub fn register_delegation(builder: ActionDispatcherBuilder, delegation: Arc<Delegation>) -> ActionDispatcherBuilder {
    builder.register_factory(
        Delegation::NAME,
        "delegate_and_execute_task(plan_name, plan_description): break a complex task into levels of \
         parallel subtasks, have specialized agents execute them, and return a summary of the execution",
        delegation,
    )
}

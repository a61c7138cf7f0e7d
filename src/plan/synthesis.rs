//! Turning a task description into a Plan via the text-generation port

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::model::{Level, Plan, Task};
use crate::error::{ArcaneError, Result};
use crate::llm::{GenerationRequest, OutputContract, TextGenerator, generate_within, structured};
use crate::prompt::Prompts;

/// System prompt for plan decomposition requests
pub const PLANNER_SYSTEM: &str = "I am a planning agent. I break complex tasks into ordered levels of \
     independent tasks that specialized agents can execute in parallel.";

/// Agent type used when a generated task names none
pub const DEFAULT_AGENT_TYPE: &str = "TaskAgent";

#[derive(Debug, Deserialize)]
struct PlanDraft {
    #[serde(default)]
    levels: Vec<LevelDraft>,
}

#[derive(Debug, Deserialize)]
struct LevelDraft {
    order: Option<u32>,
    #[serde(default)]
    tasks: Vec<TaskDraft>,
}

#[derive(Debug, Deserialize)]
struct TaskDraft {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    agent_type: Option<String>,
    #[serde(default)]
    input_files: Vec<String>,
    #[serde(default)]
    output_files: Vec<String>,
}

/// Build a plan from a generated structure.
///
/// Accepts `{"levels": [...]}` or the same wrapped as `{"plan": {...}}`.
/// Levels without an `order` are numbered after the highest explicit one,
/// in list order. The work directory is
/// `<workspace_root>/plans/<plan id>`.
pub fn plan_from_value(name: &str, description: &str, value: &Value, workspace_root: &Path) -> Result<Plan> {
    let value = structured(value);
    let body = value.get("plan").cloned().unwrap_or(value);
    let draft: PlanDraft = serde_json::from_value(body)?;

    if draft.levels.iter().all(|l| l.tasks.is_empty()) {
        return Err(ArcaneError::Llm("Generated plan has no tasks".to_string()));
    }

    let mut plan = Plan::new(name, description, workspace_root);
    plan.work_directory = workspace_root.join("plans").join(&plan.id);

    let mut next_order = draft.levels.iter().filter_map(|l| l.order).max().map_or(0, |max| max + 1);
    for level_draft in draft.levels {
        let order = match level_draft.order {
            Some(order) => order,
            None => {
                let order = next_order;
                next_order += 1;
                order
            }
        };
        let mut level = Level::new(order);
        for task in level_draft.tasks {
            let agent_type = task.agent_type.unwrap_or_else(|| DEFAULT_AGENT_TYPE.to_string());
            level.add_task(
                Task::new(task.name, task.description, agent_type).with_files(task.input_files, task.output_files),
            );
        }
        plan.add_level(level)?;
    }

    Ok(plan)
}

/// Asks the generator for a plan structure
pub struct PlanSynthesizer {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<Prompts>,
    timeout: Duration,
}

impl PlanSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: Arc<Prompts>, timeout: Duration) -> Self {
        Self {
            generator,
            prompts,
            timeout,
        }
    }

    pub async fn synthesize(&self, name: &str, description: &str, workspace_root: &Path) -> Result<Plan> {
        let user = self.prompts.plan_synthesis(name, description)?;
        let request = GenerationRequest::with_contract(PLANNER_SYSTEM, user, OutputContract::Plan);

        let value = generate_within(self.generator.as_ref(), request, self.timeout)
            .await
            .ok_or_else(|| ArcaneError::Llm("Failed to generate plan".to_string()))?;

        let plan = plan_from_value(name, description, &value, workspace_root)?;
        log::info!(
            "Synthesized plan {} '{}' with {} levels and {} tasks",
            plan.id,
            plan.name,
            plan.levels.len(),
            plan.task_count()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use serde_json::json;

    fn structure() -> Value {
        json!({
            "levels": [
                {"order": 1, "tasks": [
                    {"name": "combine", "description": "Merge", "agent_type": "Writer",
                     "input_files": ["a.md", "b.md"], "output_files": ["report.md"]}
                ]},
                {"order": 0, "tasks": [
                    {"name": "a", "description": "Part A", "output_files": ["a.md"]},
                    {"name": "b", "description": "Part B", "output_files": ["b.md"]}
                ]}
            ]
        })
    }

    #[test]
    fn test_plan_from_value_orders_levels() {
        let plan = plan_from_value("Report", "Write it", &structure(), Path::new("/ws")).unwrap();

        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[0].order, 0);
        assert_eq!(plan.levels[0].tasks[0].agent_type, DEFAULT_AGENT_TYPE);
        assert_eq!(plan.levels[1].tasks[0].input_files, vec!["a.md", "b.md"]);
        assert_eq!(plan.levels[1].tasks[0].level, 1);
        assert_eq!(plan.work_directory, Path::new("/ws/plans").join(&plan.id));
    }

    #[test]
    fn test_plan_from_wrapped_value() {
        let wrapped = json!({"plan": structure()});
        let plan = plan_from_value("Report", "Write it", &wrapped, Path::new("/ws")).unwrap();
        assert_eq!(plan.task_count(), 3);
    }

    #[test]
    fn test_plan_from_value_rejects_empty() {
        let err = plan_from_value("x", "y", &json!({"levels": []}), Path::new("/ws")).unwrap_err();
        assert!(matches!(err, ArcaneError::Llm(_)));
    }

    #[test]
    fn test_levels_without_order_follow_explicit_ones() {
        let value = json!({"levels": [
            {"order": 1, "tasks": [{"name": "explicit"}]},
            {"tasks": [{"name": "implicit-a"}]},
            {"tasks": [{"name": "implicit-b"}]}
        ]});
        let plan = plan_from_value("x", "y", &value, Path::new("/ws")).unwrap();

        let orders: Vec<(u32, &str)> = plan.levels.iter().map(|l| (l.order, l.tasks[0].name.as_str())).collect();
        assert_eq!(orders, vec![(1, "explicit"), (2, "implicit-a"), (3, "implicit-b")]);

        let value = json!({"levels": [{"tasks": [{"name": "a"}]}, {"tasks": [{"name": "b"}]}]});
        let plan = plan_from_value("x", "y", &value, Path::new("/ws")).unwrap();
        assert_eq!(plan.levels.iter().map(|l| l.order).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_plan_from_value_rejects_duplicate_orders() {
        let value = json!({"levels": [
            {"order": 0, "tasks": [{"name": "a"}]},
            {"order": 0, "tasks": [{"name": "b"}]}
        ]});
        assert!(plan_from_value("x", "y", &value, Path::new("/ws")).is_err());
    }

    #[tokio::test]
    async fn test_synthesize_requests_plan_contract() {
        let generator = Arc::new(ScriptedGenerator::with_replies([structure()]));
        let synthesizer = PlanSynthesizer::new(
            generator.clone(),
            Arc::new(Prompts::builtin().unwrap()),
            Duration::from_secs(5),
        );

        let plan = synthesizer.synthesize("Report", "Write it", Path::new("/ws")).await.unwrap();

        assert_eq!(plan.name, "Report");
        let requests = generator.requests();
        assert_eq!(requests[0].contract, Some(OutputContract::Plan));
        assert!(requests[0].user.contains("Write it"));
    }

    #[tokio::test]
    async fn test_synthesize_absence_is_error() {
        let synthesizer = PlanSynthesizer::new(
            Arc::new(ScriptedGenerator::new()),
            Arc::new(Prompts::builtin().unwrap()),
            Duration::from_secs(5),
        );
        let err = synthesizer.synthesize("x", "y", Path::new("/ws")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to generate plan"));
    }
}

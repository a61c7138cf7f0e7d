//! Versioned prompt templates
//!
//! Prompt wording is configuration: a `PromptSet` can be loaded from YAML and
//! any template it omits falls back to the built-in default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::render::PromptRenderer;
use crate::domain::ActionRecord;
use crate::error::Result;

/// Version tag of the built-in prompt set
pub const DEFAULT_PROMPT_VERSION: &str = "arcane-default-1";

const SYSTEM_TEMPLATE: &str = r#"I am {{agent_name}}, an autonomous agent in a multi-agent system.
{{agent_context}}

The current time is {{current_time}}.

My available actions:
{{#each actions}}- {{this.name}}: {{this.description}}
{{/each}}
I only use the actions listed above, with the parameter names given in their descriptions.
The user cannot see the results of my actions directly. After an action that retrieves information or completes work, I must send a message that communicates the result."#;

const GOAL_TEMPLATE: &str = r#"Here is everything that has happened so far, oldest first:
========
{{narrative}}
========

Set a single, short goal for what I should accomplish next in response to the latest message. Answer with the goal only."#;

const NEXT_ACTION_TEMPLATE: &str = r#"Goal: {{goal}}

History:
========
{{narrative}}
========

Actions already taken while pursuing this goal:
{{#if executed_actions}}{{#each executed_actions}}- {{this}}
{{/each}}{{else}}(none)
{{/if}}
Choose exactly one next action that moves me closer to the goal. Respond with the action name and its params."#;

const GOAL_CHECK_TEMPLATE: &str = r#"Goal: {{goal}}

History:
========
{{narrative}}
========

Actions taken while pursuing this goal:
{{#if executed_actions}}{{#each executed_actions}}- {{this}}
{{/each}}{{else}}(none)
{{/if}}
Has the goal been achieved? Only answer true if the history shows explicit evidence that the results were communicated back to whoever asked. Producing a result without sending it does not count."#;

const PLAN_SYNTHESIS_TEMPLATE: &str = r#"I will create a structured plan named "{{name}}" for the following task: {{description}}

The plan is broken down into ordered levels, each holding one or more tasks.

GUIDELINES:
1. Tasks on the same level execute in parallel and must be independent of each other.
2. If a task depends on another task, they must be on separate levels.
3. The output of each level is passed to every task of the next level. Tasks cannot see the output of other tasks on the same level.
4. Tasks on the same level must write to separate files.
5. Every task lists its input files and output files explicitly.
6. Output filenames are descriptive and unique.
7. A task that combines the outputs of earlier tasks belongs on a later level.

Every task has a name, a description, an agent type, input files and output files."#;

const WORKER_CONTEXT_TEMPLATE: &str = r#"I am a task-specific agent. I am focused and efficient in completing my assigned task, and I declare completion as soon as the task is done.

My task: {{task_name}}
{{task_description}}

Input files: {{#if input_files}}{{#each input_files}}{{this}} {{/each}}{{else}}(none){{/if}}
Output files: {{#if output_files}}{{#each output_files}}{{this}} {{/each}}{{else}}(none){{/if}}

Plan overview:
{{plan_overview}}

Current status of the plan:
{{status_report}}

Files in the plan work directory:
{{work_dir_listing}}"#;

/// A named, versioned set of prompt templates (Handlebars syntax)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub version: String,
    /// System prompt: who the agent is and what it can do
    pub system: String,
    /// User prompt asking for the cycle's goal
    pub goal: String,
    /// User prompt asking for exactly one next action
    pub next_action: String,
    /// User prompt asking whether the goal is achieved
    pub goal_check: String,
    /// User prompt asking for a plan decomposition
    pub plan_synthesis: String,
    /// Agent context given to plan task workers
    pub worker_context: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            version: DEFAULT_PROMPT_VERSION.to_string(),
            system: SYSTEM_TEMPLATE.to_string(),
            goal: GOAL_TEMPLATE.to_string(),
            next_action: NEXT_ACTION_TEMPLATE.to_string(),
            goal_check: GOAL_CHECK_TEMPLATE.to_string(),
            plan_synthesis: PLAN_SYNTHESIS_TEMPLATE.to_string(),
            worker_context: WORKER_CONTEXT_TEMPLATE.to_string(),
        }
    }
}

impl PromptSet {
    /// Load a prompt set from a YAML file; omitted templates keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let set: PromptSet = serde_yaml::from_str(&content)?;
        Ok(set)
    }
}

/// Action name and description, as listed in the system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionListing {
    pub name: String,
    pub description: String,
}

/// Inputs to the worker context template
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerContext<'a> {
    pub task_name: &'a str,
    pub task_description: &'a str,
    pub input_files: &'a [String],
    pub output_files: &'a [String],
    pub plan_overview: &'a str,
    pub status_report: &'a str,
    pub work_dir_listing: &'a str,
}

/// Compiled prompt set ready for rendering
#[derive(Clone)]
pub struct Prompts {
    set: PromptSet,
    renderer: PromptRenderer,
}

impl std::fmt::Debug for Prompts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompts").field("version", &self.set.version).finish()
    }
}

impl Prompts {
    /// Compile every template in the set; fails on malformed templates
    pub fn new(set: PromptSet) -> Result<Self> {
        let mut renderer = PromptRenderer::new();
        renderer.register_template("system", &set.system)?;
        renderer.register_template("goal", &set.goal)?;
        renderer.register_template("next_action", &set.next_action)?;
        renderer.register_template("goal_check", &set.goal_check)?;
        renderer.register_template("plan_synthesis", &set.plan_synthesis)?;
        renderer.register_template("worker_context", &set.worker_context)?;
        Ok(Self { set, renderer })
    }

    /// The built-in prompt set
    pub fn builtin() -> Result<Self> {
        Self::new(PromptSet::default())
    }

    pub fn version(&self) -> &str {
        &self.set.version
    }

    pub fn set(&self) -> &PromptSet {
        &self.set
    }

    pub fn system(&self, agent_name: &str, agent_context: &str, actions: &[ActionListing]) -> Result<String> {
        self.renderer.render_named(
            "system",
            &json!({
                "agent_name": agent_name,
                "agent_context": agent_context,
                "actions": actions,
                "current_time": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            }),
        )
    }

    pub fn goal(&self, narrative: &str) -> Result<String> {
        self.renderer.render_named("goal", &json!({ "narrative": narrative }))
    }

    pub fn next_action(&self, goal: &str, narrative: &str, executed: &[ActionRecord]) -> Result<String> {
        self.renderer.render_named("next_action", &cycle_context(goal, narrative, executed))
    }

    pub fn goal_check(&self, goal: &str, narrative: &str, executed: &[ActionRecord]) -> Result<String> {
        self.renderer.render_named("goal_check", &cycle_context(goal, narrative, executed))
    }

    pub fn plan_synthesis(&self, name: &str, description: &str) -> Result<String> {
        self.renderer
            .render_named("plan_synthesis", &json!({ "name": name, "description": description }))
    }

    pub fn worker_context(&self, context: &WorkerContext<'_>) -> Result<String> {
        self.renderer.render_named("worker_context", context)
    }
}

fn cycle_context(goal: &str, narrative: &str, executed: &[ActionRecord]) -> serde_json::Value {
    let trace: Vec<String> = executed.iter().map(ActionRecord::trace_entry).collect();
    json!({
        "goal": goal,
        "narrative": narrative,
        "executed_actions": trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionDescriptor, ActionOutcome};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn prompts() -> Prompts {
        Prompts::builtin().unwrap()
    }

    #[test]
    fn test_builtin_compiles() {
        let prompts = prompts();
        assert_eq!(prompts.version(), DEFAULT_PROMPT_VERSION);
    }

    #[test]
    fn test_system_lists_actions() {
        let actions = vec![
            ActionListing {
                name: "send_message".to_string(),
                description: "send_message(message): reply".to_string(),
            },
            ActionListing {
                name: "list_files".to_string(),
                description: "list_files(): list".to_string(),
            },
        ];
        let text = prompts().system("TRIAGE", "I route requests.", &actions).unwrap();
        assert!(text.starts_with("I am TRIAGE"));
        assert!(text.contains("I route requests."));
        assert!(text.contains("- send_message: send_message(message): reply"));
        assert!(text.contains("- list_files: list_files(): list"));
    }

    #[test]
    fn test_next_action_includes_trace() {
        let record = ActionRecord::new(
            &ActionDescriptor::new("read_file"),
            &ActionOutcome::failure("missing"),
        );
        let text = prompts().next_action("Read it", "<t> [user] hi", &[record]).unwrap();
        assert!(text.contains("Goal: Read it"));
        assert!(text.contains("<t> [user] hi"));
        assert!(text.contains("- Action: read_file - Result: missing"));
    }

    #[test]
    fn test_next_action_without_trace() {
        let text = prompts().next_action("g", "n", &[]).unwrap();
        assert!(text.contains("(none)"));
    }

    #[test]
    fn test_goal_check_demands_evidence() {
        let text = prompts().goal_check("Answer", "history", &[]).unwrap();
        assert!(text.contains("explicit evidence"));
    }

    #[test]
    fn test_worker_context() {
        let inputs = vec!["raw.csv".to_string()];
        let outputs = vec!["summary.json".to_string()];
        let context = WorkerContext {
            task_name: "Analyze",
            task_description: "Summarize the data",
            input_files: &inputs,
            output_files: &outputs,
            plan_overview: "Plan: Study",
            status_report: "Level 0 [In Progress]",
            work_dir_listing: "raw.csv",
        };
        let text = prompts().worker_context(&context).unwrap();
        assert!(text.contains("My task: Analyze"));
        assert!(text.contains("Input files: raw.csv"));
        assert!(text.contains("Output files: summary.json"));
        assert!(text.contains("Level 0 [In Progress]"));
    }

    #[test]
    fn test_load_partial_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "version: custom-2").unwrap();
        writeln!(file, "goal: \"Goal please: {{{{narrative}}}}\"").unwrap();

        let set = PromptSet::load(file.path()).unwrap();
        assert_eq!(set.version, "custom-2");
        assert_eq!(set.goal, "Goal please: {{narrative}}");
        assert_eq!(set.goal_check, PromptSet::default().goal_check);

        let prompts = Prompts::new(set).unwrap();
        assert_eq!(prompts.goal("abc").unwrap(), "Goal please: abc");
    }

    #[test]
    fn test_malformed_template_rejected() {
        let set = PromptSet {
            goal: "{{#each}}".to_string(),
            ..Default::default()
        };
        assert!(Prompts::new(set).is_err());
    }
}

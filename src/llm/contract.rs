//! Output contracts for structured generation
//!
//! Each contract maps to a forced tool for backends that support tool use,
//! and to a lenient parser that accepts the shapes models actually return.

use serde_json::{Value, json};

use super::types::ToolDefinition;

/// Shape the generated value must take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputContract {
    /// A short goal string
    Goal,
    /// One action descriptor, restricted to the listed action names
    Action { available: Vec<String> },
    /// A yes/no achievement flag
    GoalAchieved,
    /// A plan structure: named levels of independent tasks
    Plan,
}

impl OutputContract {
    /// Name of the forced tool for this contract
    pub fn tool_name(&self) -> &'static str {
        match self {
            OutputContract::Goal => "set_goal",
            OutputContract::Action { .. } => "create_action",
            OutputContract::GoalAchieved => "goal_check",
            OutputContract::Plan => "create_plan",
        }
    }

    /// Tool definition that makes a model answer in this shape
    pub fn tool_definition(&self) -> ToolDefinition {
        match self {
            OutputContract::Goal => ToolDefinition::new(
                self.tool_name(),
                "Set the goal for the current cycle",
                json!({
                    "type": "object",
                    "properties": {
                        "goal": {"type": "string", "description": "One short sentence describing what to achieve"}
                    },
                    "required": ["goal"]
                }),
            ),
            OutputContract::Action { available } => {
                let mut action = json!({"type": "string", "description": "Name of the action to perform"});
                if !available.is_empty() {
                    action["enum"] = json!(available);
                }
                ToolDefinition::new(
                    self.tool_name(),
                    "Choose exactly one next action",
                    json!({
                        "type": "object",
                        "properties": {
                            "action": action,
                            "params": {"type": "object", "description": "Parameters for the action"}
                        },
                        "required": ["action", "params"]
                    }),
                )
            }
            OutputContract::GoalAchieved => ToolDefinition::new(
                self.tool_name(),
                "Report whether the goal has been achieved",
                json!({
                    "type": "object",
                    "properties": {
                        "goal_achieved": {"type": "boolean"}
                    },
                    "required": ["goal_achieved"]
                }),
            ),
            OutputContract::Plan => ToolDefinition::new(
                self.tool_name(),
                "Create an execution plan of ordered levels",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "levels": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "order": {"type": "integer"},
                                    "tasks": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "name": {"type": "string"},
                                                "description": {"type": "string"},
                                                "agent_type": {"type": "string"},
                                                "input_files": {"type": "array", "items": {"type": "string"}},
                                                "output_files": {"type": "array", "items": {"type": "string"}}
                                            },
                                            "required": ["name", "description"]
                                        }
                                    }
                                },
                                "required": ["order", "tasks"]
                            }
                        }
                    },
                    "required": ["name", "levels"]
                }),
            ),
        }
    }
}

/// Pull a JSON value out of free text.
///
/// Handles fenced ```json blocks and bare objects or arrays embedded in prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && (value.is_object() || value.is_array())
    {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```")
            && let Ok(value) = serde_json::from_str::<Value>(body[..end].trim())
        {
            return Some(value);
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close))
            && start < end
            && let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end])
        {
            return Some(value);
        }
    }

    None
}

/// Turn a string value holding JSON into structured JSON; leave others alone
pub fn structured(value: &Value) -> Value {
    match value {
        Value::String(text) => extract_json(text).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Read a goal from a generated value
pub fn parse_goal(value: &Value) -> Option<String> {
    let goal = match value {
        Value::String(text) => match extract_json(text) {
            Some(inner) => return parse_goal(&inner),
            None => text.trim().to_string(),
        },
        Value::Object(map) => map.get("goal")?.as_str()?.trim().to_string(),
        _ => return None,
    };
    if goal.is_empty() { None } else { Some(goal) }
}

/// Read an achievement flag from a generated value
pub fn parse_goal_achieved(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Object(map) => map.get("goal_achieved").and_then(parse_goal_achieved),
        Value::String(text) => {
            if let Some(inner) = extract_json(text) {
                return parse_goal_achieved(&inner);
            }
            match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}

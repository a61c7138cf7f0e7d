//! Event records observed or produced by an agent.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::id::generate_event_id;

/// Kind of an event in an agent's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserMessage,
    AgentMessage,
    AgentAction,
    GoalSet,
    TaskExecution,
    FileAdded,
    FileDeleted,
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserMessage => "user_message",
            EventType::AgentMessage => "agent_message",
            EventType::AgentAction => "agent_action",
            EventType::GoalSet => "goal_set",
            EventType::TaskExecution => "task_execution",
            EventType::FileAdded => "file_added",
            EventType::FileDeleted => "file_deleted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable entry in an agent's event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Unique event identifier
    pub id: String,
    /// Event kind
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event-specific payload
    pub data: Map<String, Value>,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self::at(event_type, data, Utc::now())
    }

    /// Create a new event with an explicit timestamp
    pub fn at(event_type: EventType, data: Value, timestamp: DateTime<Utc>) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            id: generate_event_id(),
            event_type,
            data,
            timestamp,
        }
    }

    /// A message from a human user
    pub fn user_message(sender: &str, message: &str) -> Self {
        Self::new(
            EventType::UserMessage,
            json!({ "sender": sender, "message": message }),
        )
    }

    /// A message from another agent
    pub fn agent_message(sender: &str, message: &str) -> Self {
        Self::new(
            EventType::AgentMessage,
            json!({ "sender": sender, "message": message }),
        )
    }

    /// The goal chosen for the current cycle
    pub fn goal_set(goal: &str) -> Self {
        Self::new(EventType::GoalSet, json!({ "goal": goal }))
    }

    /// An executed action and its outcome
    pub fn agent_action(action: &str, params: &Map<String, Value>, success: bool, result: Option<&str>) -> Self {
        Self::new(
            EventType::AgentAction,
            json!({
                "action": action,
                "params": params,
                "success": success,
                "result": result,
            }),
        )
    }

    /// A plan task assignment or status change
    pub fn task_execution(task_name: &str, status: &str, detail: &str) -> Self {
        Self::new(
            EventType::TaskExecution,
            json!({ "task": task_name, "status": status, "detail": detail }),
        )
    }

    /// A file that appeared in the agent's workspace
    pub fn file_added(file: &str, source: Option<&str>) -> Self {
        Self::new(EventType::FileAdded, json!({ "file": file, "source": source }))
    }

    /// A file that was removed from the agent's workspace
    pub fn file_deleted(file: &str) -> Self {
        Self::new(EventType::FileDeleted, json!({ "file": file }))
    }

    fn str_field(&self, key: &str) -> &str {
        self.data.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }

    /// Render this event as a single narrative line
    pub fn render(&self) -> String {
        let ts = self.timestamp.format("%Y-%m-%dT%H:%M:%SZ");
        match self.event_type {
            EventType::UserMessage => {
                format!("<{}> [{}] {}", ts, self.str_field("sender"), self.str_field("message"))
            }
            EventType::AgentMessage => format!(
                "<{}> [agent {}] {}",
                ts,
                self.str_field("sender"),
                self.str_field("message")
            ),
            EventType::GoalSet => format!("<{}> Goal set: {}", ts, self.str_field("goal")),
            EventType::AgentAction => {
                let params = self
                    .data
                    .get("params")
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "{}".to_string());
                let outcome = match self.data.get("success").and_then(|v| v.as_bool()) {
                    Some(true) => "succeeded",
                    Some(false) => "failed",
                    None => "pending",
                };
                let mut line = format!("<{}> Action {} {} {}", ts, self.str_field("action"), params, outcome);
                let result = self.str_field("result");
                if !result.is_empty() {
                    line.push_str(": ");
                    line.push_str(result);
                }
                line
            }
            EventType::TaskExecution => {
                let mut line = format!("<{}> Task {} [{}]", ts, self.str_field("task"), self.str_field("status"));
                let detail = self.str_field("detail");
                if !detail.is_empty() {
                    line.push_str(": ");
                    line.push_str(detail);
                }
                line
            }
            EventType::FileAdded => match self.data.get("source").and_then(|v| v.as_str()) {
                Some(source) => format!("<{}> File added: {} (from {})", ts, self.str_field("file"), source),
                None => format!("<{}> File added: {}", ts, self.str_field("file")),
            },
            EventType::FileDeleted => format!("<{}> File deleted: {}", ts, self.str_field("file")),
        }
    }
}

//! Action descriptors, outcomes and records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter bag attached to an action descriptor
pub type ActionParams = Map<String, Value>;

/// Wire shape of a requested action: `{"action": ..., "params": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action: String,
    #[serde(default)]
    pub params: ActionParams,
}

impl ActionDescriptor {
    /// Create a descriptor with no parameters
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Get a string parameter
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// Parse a descriptor out of a generated value.
    ///
    /// Accepts a single descriptor, an ordered batch (`[...]`), or a wrapped
    /// batch (`{"actions": [...]}`). For batches the first descriptor wins.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.iter().find_map(Self::from_value),
            Value::Object(map) => {
                if let Some(actions) = map.get("actions") {
                    return Self::from_value(actions);
                }
                let action = map.get("action")?.as_str()?.trim();
                if action.is_empty() {
                    return None;
                }
                let params = match map.get("params") {
                    Some(Value::Object(params)) => params.clone(),
                    _ => Map::new(),
                };
                Some(Self {
                    action: action.to_string(),
                    params,
                })
            }
            _ => None,
        }
    }
}

/// Result of executing one action: `(success, result)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub result: Option<String>,
}

impl ActionOutcome {
    /// Successful outcome with a result message
    pub fn success(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
        }
    }

    /// Successful outcome with nothing to report
    pub fn empty() -> Self {
        Self {
            success: true,
            result: None,
        }
    }

    /// Failed outcome with an explanation
    pub fn failure(result: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Some(result.into()),
        }
    }

    /// Result text, or an empty string
    pub fn result_text(&self) -> &str {
        self.result.as_deref().unwrap_or("")
    }
}

/// One executed action within a goal cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_name: String,
    pub params: ActionParams,
    pub success: bool,
    pub result: Option<String>,
}

impl ActionRecord {
    /// Build a record from a descriptor and its outcome
    pub fn new(descriptor: &ActionDescriptor, outcome: &ActionOutcome) -> Self {
        Self {
            action_name: descriptor.action.clone(),
            params: descriptor.params.clone(),
            success: outcome.success,
            result: outcome.result.clone(),
        }
    }

    /// Short trace entry used in the max-iterations sentinel
    pub fn trace_entry(&self) -> String {
        format!(
            "Action: {} - Result: {}",
            self.action_name,
            self.result.as_deref().unwrap_or("(no result)")
        )
    }
}

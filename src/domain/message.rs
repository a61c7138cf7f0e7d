//! Inbound messages that start a goal cycle.

use serde::{Deserialize, Serialize};

use super::event::Event;

/// Inter-agent message wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Address of the receiving agent
    pub receiver: String,
    /// Message body
    pub message: String,
    /// Address of the sending agent
    pub sender: String,
    /// Files the sender copied into the receiver's workspace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copied_files: Vec<String>,
}

/// A message delivered to an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// From a human user
    User { sender: String, message: String },
    /// From another agent
    Agent(AgentMessage),
}

impl InboundMessage {
    /// Create a user message
    pub fn user(sender: impl Into<String>, message: impl Into<String>) -> Self {
        InboundMessage::User {
            sender: sender.into(),
            message: message.into(),
        }
    }

    /// Who sent the message
    pub fn sender(&self) -> &str {
        match self {
            InboundMessage::User { sender, .. } => sender,
            InboundMessage::Agent(msg) => &msg.sender,
        }
    }

    /// The message body
    pub fn body(&self) -> &str {
        match self {
            InboundMessage::User { message, .. } => message,
            InboundMessage::Agent(msg) => &msg.message,
        }
    }

    /// Events this message contributes to the receiving agent's log
    pub fn to_events(&self) -> Vec<Event> {
        match self {
            InboundMessage::User { sender, message } => vec![Event::user_message(sender, message)],
            InboundMessage::Agent(msg) => {
                let mut events = vec![Event::agent_message(&msg.sender, &msg.message)];
                events.extend(
                    msg.copied_files
                        .iter()
                        .map(|file| Event::file_added(file, Some(&msg.sender))),
                );
                events
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventType;

    #[test]
    fn test_agent_message_wire_shape() {
        let json = r#"{"receiver":"TRIAGE-5000","message":"done","sender":"STRATOS-5001"}"#;
        let msg: AgentMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.receiver, "TRIAGE-5000");
        assert!(msg.copied_files.is_empty());
    }

    #[test]
    fn test_user_message_events() {
        let msg = InboundMessage::user("alice", "hello");
        let events = msg.to_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::UserMessage);
        assert_eq!(msg.sender(), "alice");
        assert_eq!(msg.body(), "hello");
    }

    #[test]
    fn test_agent_message_events_include_copied_files() {
        let msg = InboundMessage::Agent(AgentMessage {
            receiver: "TRIAGE".to_string(),
            message: "see attached".to_string(),
            sender: "STRATOS".to_string(),
            copied_files: vec!["plan.md".to_string(), "data.csv".to_string()],
        });
        let events = msg.to_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, EventType::AgentMessage);
        assert_eq!(events[1].event_type, EventType::FileAdded);
        assert_eq!(events[2].data["file"], "data.csv");
    }
}

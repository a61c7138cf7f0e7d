//! Reply channels: where an agent's outward messages go

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ArcaneError, Result};

/// Destination for messages addressed to whoever started the cycle
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Keeps every message in memory, in send order.
///
/// Used by plan task workers, whose messages become part of the task output,
/// and by tests.
#[derive(Debug, Default)]
pub struct BufferedChannel {
    messages: Mutex<Vec<String>>,
}

impl BufferedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// The most recent message
    pub fn last(&self) -> Option<String> {
        self.messages.lock().ok().and_then(|m| m.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReplyChannel for BufferedChannel {
    async fn send(&self, message: &str) -> Result<()> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|e| ArcaneError::Action(format!("reply buffer poisoned: {}", e)))?;
        messages.push(message.to_string());
        Ok(())
    }
}

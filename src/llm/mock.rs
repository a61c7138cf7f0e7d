//! Fake text generators for tests and offline runs

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::client::{GenerationRequest, LlmError, TextGenerator};

/// Replays a fixed queue of replies in order, then returns nothing.
///
/// Every request is recorded so tests can assert on prompts and contracts.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Option<Value>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a sequence of replies
    pub fn with_replies(replies: impl IntoIterator<Item = Value>) -> Self {
        let generator = Self::new();
        for reply in replies {
            generator.push(reply);
        }
        generator
    }

    /// Queue a reply
    pub fn push(&self, reply: Value) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Some(reply));
        }
    }

    /// Queue an explicit "nothing returned"
    pub fn push_absent(&self) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(None);
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests received
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front()).flatten();
        Ok(reply)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Answers every request with a closure over the request.
///
/// Suited to concurrent callers, where a shared queue would hand replies to
/// whichever task asks first.
pub struct FnGenerator<F>
where
    F: Fn(&GenerationRequest) -> Option<Value> + Send + Sync,
{
    respond: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(&GenerationRequest) -> Option<Value> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&GenerationRequest) -> Option<Value> + Send + Sync,
{
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, LlmError> {
        Ok((self.respond)(&request))
    }

    fn model(&self) -> &str {
        "fn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::contract::OutputContract;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let generator = ScriptedGenerator::with_replies([json!("one"), json!("two")]);
        generator.push_absent();

        let first = generator.generate(GenerationRequest::text("s", "u")).await.unwrap();
        let second = generator.generate(GenerationRequest::text("s", "u")).await.unwrap();
        let third = generator.generate(GenerationRequest::text("s", "u")).await.unwrap();
        let fourth = generator.generate(GenerationRequest::text("s", "u")).await.unwrap();

        assert_eq!(first, Some(json!("one")));
        assert_eq!(second, Some(json!("two")));
        assert_eq!(third, None);
        assert_eq!(fourth, None);
        assert_eq!(generator.call_count(), 4);
        assert_eq!(generator.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_records_requests() {
        let generator = ScriptedGenerator::new();
        let _ = generator
            .generate(GenerationRequest::with_contract("sys", "user", OutputContract::Goal))
            .await;
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].contract, Some(OutputContract::Goal));
    }

    #[tokio::test]
    async fn test_fn_generator_routes_by_contract() {
        let generator = FnGenerator::new(|req: &GenerationRequest| match req.contract {
            Some(OutputContract::GoalAchieved) => Some(json!({"goal_achieved": true})),
            _ => None,
        });
        let achieved = generator
            .generate(GenerationRequest::with_contract("s", "u", OutputContract::GoalAchieved))
            .await
            .unwrap();
        assert_eq!(achieved, Some(json!({"goal_achieved": true})));
        let text = generator.generate(GenerationRequest::text("s", "u")).await.unwrap();
        assert!(text.is_none());
    }
}

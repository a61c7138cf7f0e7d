//! Anthropic API text generator
//!
//! Implements the TextGenerator port over the Anthropic Messages API. Each
//! output contract becomes a forced tool call so the model answers in shape.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{GenerationRequest, LlmError, TextGenerator};
use super::tool_parser::{generated_value, parse_response};
use super::types::{CompletionRequest, CompletionResponse, Role, Usage};

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default max tokens
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Configuration for the Anthropic generator
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_key_env: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(300),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Text generator backed by the Anthropic Messages API
pub struct AnthropicGenerator {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
    usage: Arc<Mutex<Usage>>,
}

impl AnthropicGenerator {
    /// Create a generator reading the API key from `config.api_key_env`
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| LlmError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;
        Self::with_api_key(api_key, config)
    }

    /// Create a generator with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    /// Translate a generation request into a completion request
    fn completion_request(&self, request: &GenerationRequest) -> CompletionRequest {
        let mut completion = CompletionRequest::new(request.system.clone())
            .with_user_message(request.user.clone())
            .with_max_tokens(self.config.max_tokens);
        if let Some(contract) = &request.contract {
            completion = completion.with_forced_tool(contract.tool_definition());
        }
        completion
    }

    /// Build the request body for the Anthropic API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model);
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages
        });

        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(|t| t.to_anthropic_schema()).collect();
            body["tools"] = json!(tools);
        }

        if let Some(name) = &request.forced_tool {
            body["tool_choice"] = json!({"type": "tool", "name": name});
        }

        body
    }

    /// Send a request to the Anthropic API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    fn record_usage(&self, response: &CompletionResponse) {
        if let Ok(mut total) = self.usage.lock() {
            total.add(&response.usage);
        }
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, LlmError> {
        let completion = self.completion_request(&request);
        let body = self.build_request(&completion);
        log::debug!(
            "Anthropic request: model={} contract={:?}",
            self.config.model,
            request.contract.as_ref().map(|c| c.tool_name())
        );
        let raw = self.send_request(body).await?;
        let response = parse_response(&raw)?;
        self.record_usage(&response);
        Ok(generated_value(&response, request.contract.as_ref()))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

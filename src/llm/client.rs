//! Text-generation port: the trait every model backend implements

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::contract::OutputContract;

/// One generation call: a system string, a user string and an optional
/// output contract the returned value must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub contract: Option<OutputContract>,
}

impl GenerationRequest {
    /// Free-text request
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            contract: None,
        }
    }

    /// Request constrained to an output contract
    pub fn with_contract(system: impl Into<String>, user: impl Into<String>, contract: OutputContract) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            contract: Some(contract),
        }
    }
}

/// Stateless text generator - each call is independent (fresh context).
///
/// `Ok(None)` means the model returned nothing usable. Callers treat that,
/// an `Err` and a timeout all as absence and fall back to defaults.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, LlmError>;

    /// Model identifier for logging
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Errors that can occur during text generation
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Run one generation call under a deadline, collapsing every failure into
/// absence. Errors and timeouts are logged, never returned.
pub async fn generate_within(generator: &dyn TextGenerator, request: GenerationRequest, limit: Duration) -> Option<Value> {
    match tokio::time::timeout(limit, generator.generate(request)).await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            log::warn!("Text generation failed ({}): {}", generator.model(), e);
            None
        }
        Err(_) => {
            log::warn!("{}", LlmError::Timeout(limit));
            None
        }
    }
}
